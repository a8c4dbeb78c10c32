use std::time::Duration;

use axum::http::{
    HeaderMap, HeaderValue,
    header::{ACCEPT, CONTENT_TYPE},
};
use reqwest::Client;
use url::{ParseError, Url};

/// Connection parameters for anything issuing requests against the backend.
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    pub base_url: Url,
    pub timeout: Duration,
    pub headers: HeaderMap,
}

impl ApiClientConfig {
    /// The base path always ends in `/` so [`Self::endpoint`] appends to it.
    pub fn new(mut base_url: Url, timeout: Duration) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Self {
            base_url,
            timeout,
            headers,
        }
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, ParseError> {
        self.base_url.join(path.trim_start_matches('/'))
    }

    pub fn build_client(&self) -> reqwest::Result<Client> {
        Client::builder()
            .timeout(self.timeout)
            .default_headers(self.headers.clone())
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base: &str) -> ApiClientConfig {
        ApiClientConfig::new(Url::parse(base).unwrap(), Duration::from_secs(5))
    }

    #[test]
    fn test_default_headers() {
        let api = config("http://localhost:8082");

        assert_eq!(api.headers[CONTENT_TYPE], "application/json");
        assert_eq!(api.headers[ACCEPT], "application/json");
    }

    #[test]
    fn test_endpoint() {
        let api = config("http://localhost:8082");
        assert_eq!(
            api.endpoint("/orders").unwrap().as_str(),
            "http://localhost:8082/orders"
        );
        assert_eq!(
            api.endpoint("pharmacy/orders/3/status").unwrap().as_str(),
            "http://localhost:8082/pharmacy/orders/3/status"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let api = config("https://api.medigo.app/v1/");
        assert_eq!(
            api.endpoint("/orders").unwrap().as_str(),
            "https://api.medigo.app/v1/orders"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path_without_slash() {
        let api = config("https://api.medigo.app/v1");

        assert_eq!(api.base_url.as_str(), "https://api.medigo.app/v1/");
        assert_eq!(
            api.endpoint("/orders").unwrap().as_str(),
            "https://api.medigo.app/v1/orders"
        );
        assert_eq!(
            api.endpoint("pharmacy/orders").unwrap().as_str(),
            "https://api.medigo.app/v1/pharmacy/orders"
        );
    }

    #[test]
    fn test_build_client() {
        assert!(config("http://localhost:8082").build_client().is_ok());
    }
}

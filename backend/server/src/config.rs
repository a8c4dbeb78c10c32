use std::{env, fmt::Display, fs::read_to_string, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{
    client::ApiClientConfig,
    database::StoreBackend,
    environment::{Environment, EnvironmentUrls},
    storage::StorageConfig,
};

const SECRETS: [&str; 1] = ["B2_APPLICATION_KEY"];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid {key} value: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub environment: Environment,
    pub backend_api_url: Url,
    pub frontend_url: Url,
    pub redis_url: String,
    pub order_store: StoreBackend,
    pub api: ApiClientConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Reads the process environment once. Secrets are taken from
    /// `/run/secrets` first.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| {
            if SECRETS.contains(&key) {
                read_secret(key).or_else(|| var(key))
            } else {
                var(key)
            }
        })
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = Environment::resolve(lookup("NODE_ENV").as_deref());
        let urls = EnvironmentUrls::for_environment(environment);

        let api = api_client(&lookup, environment)?;
        let frontend_url = try_url(&lookup, "FRONTEND_URL", urls.frontend_url)?;

        let application_key = match lookup("B2_APPLICATION_KEY") {
            Some(key) => key,
            None if environment.is_production() => {
                return Err(ConfigError::Missing("B2_APPLICATION_KEY"));
            }
            None => String::new(),
        };

        let storage = StorageConfig {
            account_id: or_default(&lookup, "B2_ACCOUNT_ID", ""),
            application_key,
            application_key_name: or_default(&lookup, "B2_APPLICATION_KEY_NAME", "medigo"),
            bucket_id: or_default(&lookup, "B2_BUCKET_ID", ""),
            bucket_name: or_default(&lookup, "B2_BUCKET_NAME", "medigo-uploads"),
            download_url: try_url(
                &lookup,
                "B2_DOWNLOAD_URL",
                "https://f005.backblazeb2.com",
            )?,
        };

        Ok(Self {
            port: try_load(&lookup, "PORT", "8082")?,
            environment,
            backend_api_url: api.base_url.clone(),
            api,
            frontend_url,
            redis_url: or_default(&lookup, "REDIS_URL", "redis://127.0.0.1:6379"),
            order_store: try_load(&lookup, "ORDER_STORE", "redis")?,
            storage,
        })
    }

    /// Only what a client of the backend needs, no storage or store settings.
    pub fn load_api_client() -> Result<ApiClientConfig, ConfigError> {
        Self::api_client_from_lookup(var)
    }

    pub fn api_client_from_lookup<F>(lookup: F) -> Result<ApiClientConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = Environment::resolve(lookup("NODE_ENV").as_deref());

        api_client(&lookup, environment)
    }

    /// Origin string (`scheme://host[:port]`) the CORS layer allows.
    pub fn frontend_origin(&self) -> String {
        self.frontend_url.origin().ascii_serialization()
    }
}

fn api_client<F>(lookup: &F, environment: Environment) -> Result<ApiClientConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let urls = EnvironmentUrls::for_environment(environment);

    let backend_api_url = try_url(lookup, "BACKEND_API_URL", urls.backend_api_url)?;
    let timeout_ms: u64 = try_load(lookup, "API_TIMEOUT_MS", "10000")?;

    Ok(ApiClientConfig::new(
        backend_api_url,
        Duration::from_millis(timeout_ms),
    ))
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.is_empty())
}

fn or_default<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    })
}

fn try_load<T, F>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    or_default(lookup, key, default).parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");
        ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }
    })
}

fn try_url<F>(lookup: &F, key: &'static str, default: &str) -> Result<Url, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let url: Url = try_load(lookup, key, default)?;

    if !matches!(url.scheme(), "http" | "https") || url.host().is_none() {
        return Err(ConfigError::Invalid {
            key,
            reason: format!("{url} is not an absolute http(s) URL"),
        });
    }

    Ok(url)
}

fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            info!("Secret {secret_name} not read from file: {e}");
        })
        .ok()
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();

        assert_eq!(config.port, 8082);
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.backend_api_url.as_str(), "http://localhost:8082/");
        assert_eq!(config.frontend_origin(), "http://localhost:8081");
        assert_eq!(config.order_store, StoreBackend::Redis);
        assert_eq!(config.api.timeout, Duration::from_secs(10));
        assert_eq!(config.storage.application_key, "");
    }

    #[test]
    fn test_environment_selects_urls() {
        let config = load(&[
            ("NODE_ENV", "production"),
            ("B2_APPLICATION_KEY", "secret"),
        ])
        .unwrap();

        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.frontend_origin(), "https://medigo.app");
        assert_eq!(config.api.base_url.as_str(), "https://api.medigo.app/");
    }

    #[test]
    fn test_url_overrides() {
        let config = load(&[
            ("NODE_ENV", "test"),
            ("FRONTEND_URL", "http://localhost:19006/"),
            ("BACKEND_API_URL", "http://10.0.2.2:8082"),
        ])
        .unwrap();

        assert_eq!(config.environment, Environment::Test);
        assert_eq!(config.frontend_origin(), "http://localhost:19006");
        assert_eq!(config.backend_api_url.as_str(), "http://10.0.2.2:8082/");
    }

    #[test]
    fn test_invalid_port() {
        let err = load(&[("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }

    #[test]
    fn test_invalid_url() {
        let err = load(&[("FRONTEND_URL", "not a url")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "FRONTEND_URL",
                ..
            }
        ));

        let err = load(&[("BACKEND_API_URL", "mailto:ops@medigo.app")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "BACKEND_API_URL",
                ..
            }
        ));
    }

    #[test]
    fn test_non_http_scheme() {
        for (key, url) in [
            ("FRONTEND_URL", "ftp://medigo.app"),
            ("BACKEND_API_URL", "redis://127.0.0.1:6379"),
        ] {
            match load(&[(key, url)]).unwrap_err() {
                ConfigError::Invalid { key: invalid, .. } => assert_eq!(invalid, key),
                other => panic!("unexpected error for {key}: {other}"),
            }
        }

        assert!(load(&[("FRONTEND_URL", "https://medigo.app")]).is_ok());
    }

    #[test]
    fn test_api_client_without_storage_key() {
        let vars: HashMap<&str, &str> = [
            ("NODE_ENV", "production"),
            ("BACKEND_API_URL", "https://api.medigo.app/v1"),
            ("API_TIMEOUT_MS", "2500"),
        ]
        .into_iter()
        .collect();
        let lookup = |key: &str| vars.get(key).map(|v| v.to_string());

        assert_eq!(
            Config::from_lookup(lookup).unwrap_err(),
            ConfigError::Missing("B2_APPLICATION_KEY")
        );

        let api = Config::api_client_from_lookup(lookup).unwrap();
        assert_eq!(api.base_url.as_str(), "https://api.medigo.app/v1/");
        assert_eq!(api.timeout, Duration::from_millis(2500));
    }

    #[test]
    fn test_production_requires_storage_key() {
        let err = load(&[("NODE_ENV", "production")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("B2_APPLICATION_KEY"));
    }

    #[test]
    fn test_unknown_store_backend() {
        let err = load(&[("ORDER_STORE", "mongo")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "ORDER_STORE",
                ..
            }
        ));
    }

    #[test]
    fn test_storage_values() {
        let config = load(&[
            ("B2_ACCOUNT_ID", "acct"),
            ("B2_APPLICATION_KEY", "k3y"),
            ("B2_APPLICATION_KEY_NAME", "medigo-dev"),
            ("B2_BUCKET_ID", "bucket-1"),
            ("B2_BUCKET_NAME", "prescriptions"),
        ])
        .unwrap();

        assert_eq!(config.storage.account_id, "acct");
        assert_eq!(config.storage.application_key, "k3y");
        assert_eq!(config.storage.application_key_name, "medigo-dev");
        assert_eq!(config.storage.bucket_id, "bucket-1");
        assert_eq!(config.storage.bucket_name, "prescriptions");
    }
}

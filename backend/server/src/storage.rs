//! # Backblaze B2
//!
//! Object storage for prescription photos and pharmacy documents.
//!
//! The backend never talks to B2 itself. Uploads happen from the app using
//! short-lived tokens issued elsewhere, so this module only carries the
//! account/bucket descriptor and builds public download URLs.
//!
//! ## Secrets
//! - `B2_APPLICATION_KEY` is read from `/run/secrets` before the environment
//! - Never logged, never served through `/config`
use std::fmt;

use url::Url;

#[derive(Clone)]
pub struct StorageConfig {
    pub account_id: String,
    pub application_key: String,
    pub application_key_name: String,
    pub bucket_id: String,
    pub bucket_name: String,
    pub download_url: Url,
}

impl StorageConfig {
    /// `<download_url>/file/<bucket_name>/<file_name>`
    pub fn file_url(&self, file_name: &str) -> Url {
        let mut url = self.download_url.clone();

        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("file")
                .push(&self.bucket_name)
                .extend(file_name.split('/').filter(|s| !s.is_empty()));
        }

        url
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("account_id", &self.account_id)
            .field("application_key", &"<redacted>")
            .field("application_key_name", &self.application_key_name)
            .field("bucket_id", &self.bucket_id)
            .field("bucket_name", &self.bucket_name)
            .field("download_url", &self.download_url.as_str())
            .finish()
    }
}

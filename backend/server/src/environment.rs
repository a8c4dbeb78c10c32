use std::{fmt, str::FromStr};

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

pub const DEVELOPMENT: &str = "development";
pub const PRODUCTION: &str = "production";
pub const TEST: &str = "test";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Unknown environment: {0}")]
pub struct UnknownEnvironment(pub String);

impl Environment {
    /// Table lookup with a default: absent or unknown indicators become
    /// [`Environment::Development`].
    pub fn resolve(indicator: Option<&str>) -> Self {
        match indicator {
            None => Self::default(),
            Some(name) => name.parse().unwrap_or_else(|e: UnknownEnvironment| {
                warn!("{e}, falling back to {DEVELOPMENT}");
                Self::default()
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => DEVELOPMENT,
            Self::Production => PRODUCTION,
            Self::Test => TEST,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for Environment {
    type Err = UnknownEnvironment;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            DEVELOPMENT => Ok(Self::Development),
            PRODUCTION => Ok(Self::Production),
            TEST => Ok(Self::Test),
            other => Err(UnknownEnvironment(other.to_string())),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The backend/frontend base URL pair for one environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvironmentUrls {
    pub backend_api_url: &'static str,
    pub frontend_url: &'static str,
}

impl EnvironmentUrls {
    pub const fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Development => Self {
                backend_api_url: "http://localhost:8082",
                frontend_url: "http://localhost:8081",
            },
            Environment::Production => Self {
                backend_api_url: "https://api.medigo.app",
                frontend_url: "https://medigo.app",
            },
            Environment::Test => Self {
                backend_api_url: "http://127.0.0.1:8082",
                frontend_url: "http://127.0.0.1:8081",
            },
        }
    }
}

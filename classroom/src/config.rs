use serde::Deserialize;
use std::collections::HashSet;
use std::fs::File;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("fanout.max_batch cannot be 0")]
    ZeroMaxBatch,

    #[error(
        "fanout.max_batch {0} exceeds the store's in-list limit of {max}",
        max = docstore::MAX_IN_LIST
    )]
    MaxBatchAboveStoreLimit(usize),

    #[error("session.path cannot be empty")]
    EmptySessionPath,

    #[error("StatsD port cannot be 0")]
    InvalidPort,

    #[error("Duplicate static account: {0}")]
    DuplicateAccount(String),
}

/// Where documents live.
#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum StoreConfig {
    Rest {
        url: Url,
        #[serde(default)]
        api_key: Option<String>,
    },
    /// In-process store, optionally seeded from a JSON file of
    /// `{collection: {id: fields}}`. Writes are lost on exit.
    Memory {
        #[serde(default)]
        seed: Option<PathBuf>,
    },
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct StaticAccount {
    pub email: String,
    pub password: String,
    pub uid: String,
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum AuthConfig {
    Http {
        url: Url,
        #[serde(default)]
        api_key: Option<String>,
    },
    Static {
        #[serde(default)]
        accounts: Vec<StaticAccount>,
    },
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct SessionConfig {
    pub path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            path: PathBuf::from(".classroom/session.json"),
        }
    }
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct FanOutConfig {
    pub max_batch: usize,
}

impl Default for FanOutConfig {
    fn default() -> Self {
        FanOutConfig {
            max_batch: fanout::MAX_BATCH,
        }
    }
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
    #[serde(default = "default_metrics_prefix")]
    pub prefix: String,
}

fn default_metrics_prefix() -> String {
    "classroom".into()
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub sentry_dsn: Option<String>,
    /// Overrides the default log filter. `RUST_LOG` still wins.
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Config {
    pub store: StoreConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub fanout: FanOutConfig,
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config: Config = serde_yaml::from_reader(file)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.fanout.max_batch {
            0 => return Err(ValidationError::ZeroMaxBatch),
            n if n > docstore::MAX_IN_LIST => {
                return Err(ValidationError::MaxBatchAboveStoreLimit(n));
            }
            _ => {}
        }

        if self.session.path.as_os_str().is_empty() {
            return Err(ValidationError::EmptySessionPath);
        }

        if self.metrics.as_ref().is_some_and(|m| m.statsd_port == 0) {
            return Err(ValidationError::InvalidPort);
        }

        if let AuthConfig::Static { accounts } = &self.auth {
            let mut seen = HashSet::new();
            for account in accounts {
                if !seen.insert(account.email.as_str()) {
                    return Err(ValidationError::DuplicateAccount(account.email.clone()));
                }
            }
        }

        Ok(())
    }

    /// The validated batch size.
    pub fn max_batch(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.fanout.max_batch).unwrap_or(NonZeroUsize::MIN)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(#[from] ValidationError),
}

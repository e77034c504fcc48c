//! Waitlist service configuration

use core_config::{ConfigError, FromEnv, env_flag, env_or_default, env_parse};
use database::RetryConfig;
use database::mongodb::MongoConfig;
use database::relational::RelationalConfig;
use email::SmtpConfig;

use crate::error::{WaitlistError, WaitlistResult};

pub const DEFAULT_COLLECTION: &str = "waitlist";

/// Document store settings: connection plus the collection holding entries
#[derive(Clone, Debug)]
pub struct DocumentStoreConfig {
    pub mongo: MongoConfig,
    pub collection: String,
}

impl DocumentStoreConfig {
    pub fn new(mongo: MongoConfig) -> Self {
        Self {
            mongo,
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }
}

/// Which persistence strategy backs the waitlist
#[derive(Clone, Debug, Default)]
pub enum BackendConfig {
    #[default]
    Local,
    Document(DocumentStoreConfig),
    Relational(RelationalConfig),
}

impl BackendConfig {
    pub fn document(url: impl Into<String>, database: impl Into<String>) -> Self {
        BackendConfig::Document(DocumentStoreConfig::new(MongoConfig::with_database(
            url, database,
        )))
    }

    pub fn relational(config: RelationalConfig) -> Self {
        BackendConfig::Relational(config)
    }

    fn validate(&self) -> WaitlistResult<()> {
        match self {
            BackendConfig::Local => Ok(()),
            BackendConfig::Document(document) => {
                if document.mongo.url.trim().is_empty() {
                    return Err(WaitlistError::Configuration(
                        "document backend requires a connection URI".to_string(),
                    ));
                }
                if document.collection.trim().is_empty() {
                    return Err(WaitlistError::Configuration(
                        "document backend requires a collection name".to_string(),
                    ));
                }
                Ok(())
            }
            BackendConfig::Relational(relational) => {
                if relational.url.is_none() && relational.database.trim().is_empty() {
                    return Err(WaitlistError::Configuration(
                        "relational backend requires a database name".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Load BackendConfig from environment variables
///
/// - `WAITLIST_BACKEND`: `local` (default), `document` or `relational`
/// - document: `MONGODB_URL`/`MONGO_URL`, `MONGODB_DATABASE`, `WAITLIST_COLLECTION`
/// - relational: see `RelationalConfig::from_env`
impl FromEnv for BackendConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let backend = env_or_default("WAITLIST_BACKEND", "local");
        match backend.to_ascii_lowercase().as_str() {
            "local" | "memory" => Ok(BackendConfig::Local),
            "document" | "mongodb" | "mongo" => {
                let mongo = MongoConfig::from_env()?;
                let collection = env_or_default("WAITLIST_COLLECTION", DEFAULT_COLLECTION);
                Ok(BackendConfig::Document(
                    DocumentStoreConfig::new(mongo).with_collection(collection),
                ))
            }
            "relational" | "sql" => Ok(BackendConfig::Relational(RelationalConfig::from_env()?)),
            other => Err(ConfigError::InvalidValue {
                key: "WAITLIST_BACKEND".to_string(),
                details: format!("expected local, document or relational, got '{}'", other),
            }),
        }
    }
}

/// Everything `WaitlistService::new` needs
#[derive(Clone, Debug)]
pub struct WaitlistConfig {
    pub smtp: SmtpConfig,
    pub backend: BackendConfig,
    /// Substituted for `[Company Name]` and the `companyName` placeholder
    pub company_name: String,
    /// Reject addresses whose domain has no `.`
    pub require_tld: bool,
    /// Concurrent sends during bulk fan-out; 1 is strictly sequential
    pub bulk_concurrency: usize,
    /// Backoff for the store's initial connection; `None` uses the default
    pub connect_retry: Option<RetryConfig>,
}

impl WaitlistConfig {
    pub fn new(smtp: SmtpConfig, backend: BackendConfig) -> Self {
        Self {
            smtp,
            backend,
            company_name: String::new(),
            require_tld: false,
            bulk_concurrency: 1,
            connect_retry: None,
        }
    }

    pub fn with_company_name(mut self, company_name: impl Into<String>) -> Self {
        self.company_name = company_name.into();
        self
    }

    pub fn with_require_tld(mut self, require_tld: bool) -> Self {
        self.require_tld = require_tld;
        self
    }

    pub fn with_bulk_concurrency(mut self, bulk_concurrency: usize) -> Self {
        self.bulk_concurrency = bulk_concurrency;
        self
    }

    pub fn with_connect_retry(mut self, retry: RetryConfig) -> Self {
        self.connect_retry = Some(retry);
        self
    }

    /// Reject incomplete configuration before anything touches the network
    pub fn validate(&self) -> WaitlistResult<()> {
        let missing = self.smtp.missing_fields();
        if !missing.is_empty() {
            return Err(WaitlistError::Configuration(format!(
                "mail transport configuration is missing: {}",
                missing.join(", ")
            )));
        }

        if self.bulk_concurrency == 0 {
            return Err(WaitlistError::Configuration(
                "bulk_concurrency must be at least 1".to_string(),
            ));
        }

        self.backend.validate()
    }
}

/// Load WaitlistConfig from environment variables
///
/// Combines `SmtpConfig::from_env`, `BackendConfig::from_env` and:
/// - `COMPANY_NAME` (optional, default: empty)
/// - `WAITLIST_REQUIRE_TLD` (optional, default: false)
/// - `WAITLIST_BULK_CONCURRENCY` (optional, default: 1)
impl FromEnv for WaitlistConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            smtp: SmtpConfig::from_env()?,
            backend: BackendConfig::from_env()?,
            company_name: env_or_default("COMPANY_NAME", ""),
            require_tld: env_flag("WAITLIST_REQUIRE_TLD", false)?,
            bulk_concurrency: env_parse("WAITLIST_BULK_CONCURRENCY", "1")?,
            connect_retry: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smtp() -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "mailer".to_string(),
            password: "secret".to_string(),
            from_email: String::new(),
            from_name: String::new(),
            use_tls: true,
        }
    }

    #[test]
    fn test_validate_names_missing_transport_fields() {
        let mut config = WaitlistConfig::new(smtp(), BackendConfig::Local);
        assert!(config.validate().is_ok());

        config.smtp.password.clear();
        let err = config.validate().unwrap_err();
        assert_eq!(
            err,
            WaitlistError::Configuration("mail transport configuration is missing: pass".into())
        );
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = WaitlistConfig::new(smtp(), BackendConfig::Local).with_bulk_concurrency(0);
        assert!(matches!(config.validate(), Err(WaitlistError::Configuration(_))));
    }

    #[test]
    fn test_validate_document_requires_uri() {
        let config = WaitlistConfig::new(smtp(), BackendConfig::document("", "waitlist"));
        assert!(matches!(config.validate(), Err(WaitlistError::Configuration(_))));
    }

    #[test]
    fn test_backend_defaults_to_local() {
        temp_env::with_var_unset("WAITLIST_BACKEND", || {
            assert!(matches!(BackendConfig::from_env().unwrap(), BackendConfig::Local));
        });
    }

    #[test]
    fn test_backend_rejects_unknown_kind() {
        temp_env::with_var("WAITLIST_BACKEND", Some("redis"), || {
            let err = BackendConfig::from_env().unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "WAITLIST_BACKEND"));
        });
    }

    #[test]
    fn test_document_backend_from_env() {
        temp_env::with_vars(
            [
                ("WAITLIST_BACKEND", Some("document")),
                ("MONGODB_URL", Some("mongodb://mongo:27017")),
                ("MONGODB_DATABASE", Some("signups")),
                ("WAITLIST_COLLECTION", Some("entries")),
            ],
            || match BackendConfig::from_env().unwrap() {
                BackendConfig::Document(document) => {
                    assert_eq!(document.mongo.url(), "mongodb://mongo:27017");
                    assert_eq!(document.mongo.database(), "signups");
                    assert_eq!(document.collection, "entries");
                }
                other => panic!("expected document backend, got {:?}", other),
            },
        );
    }

    #[test]
    fn test_waitlist_config_from_env_without_password_fails_validation() {
        temp_env::with_vars(
            [
                ("SMTP_HOST", Some("smtp.example.com")),
                ("SMTP_PORT", Some("587")),
                ("SMTP_USERNAME", Some("mailer")),
                ("SMTP_PASSWORD", None),
                ("WAITLIST_BACKEND", None),
                ("COMPANY_NAME", Some("Acme")),
                ("WAITLIST_BULK_CONCURRENCY", Some("4")),
            ],
            || {
                let config = WaitlistConfig::from_env().unwrap();
                assert_eq!(config.company_name, "Acme");
                assert_eq!(config.bulk_concurrency, 4);
                assert!(matches!(config.validate(), Err(WaitlistError::Configuration(_))));
            },
        );
    }
}

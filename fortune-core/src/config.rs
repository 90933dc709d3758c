use std::env;
use std::path::{Path, PathBuf};

use crate::errors::ConfigError;

const DEFAULT_PREFIX: &str = "FORTUNE_";
const DEFAULT_HTTP_BIND: &str = "0.0.0.0:8081";

/// Runtime environment used by the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "staging" | "stage" => Environment::Staging,
            _ => Environment::Development,
        }
    }
}

/// Process configuration shared by the fortune binaries.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub environment: Environment,
    pub http_bind: String,
    pub rules_path: Option<PathBuf>,
    pub catalog_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub strict_rules: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            http_bind: DEFAULT_HTTP_BIND.to_string(),
            rules_path: None,
            catalog_path: None,
            log_level: None,
            strict_rules: false,
        }
    }
}

impl CoreConfig {
    /// Loads configuration from the process environment (`FORTUNE_*`).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env_with_prefix(DEFAULT_PREFIX)
    }

    /// Loads configuration from env vars prefixed with the provided value (e.g. `TEA_`).
    pub fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError> {
        let key = |suffix: &str| format!("{}{}", prefix, suffix);

        let environment = env::var(key("ENV"))
            .map(|raw| Environment::parse(&raw))
            .unwrap_or_default();

        let http_bind = read_non_empty(&key("HTTP_BIND"))
            .unwrap_or_else(|| DEFAULT_HTTP_BIND.to_string());

        let rules_path = read_non_empty(&key("RULES_PATH")).map(PathBuf::from);
        let catalog_path = read_non_empty(&key("CATALOG_PATH")).map(PathBuf::from);
        let log_level = read_non_empty(&key("LOG_LEVEL"));

        let strict_key = key("STRICT_RULES");
        let strict_rules = match read_non_empty(&strict_key) {
            Some(raw) => parse_flag(&strict_key, &raw)?,
            None => false,
        };

        Ok(Self {
            environment,
            http_bind,
            rules_path,
            catalog_path,
            log_level,
            strict_rules,
        })
    }

    /// Whether the service is running in production.
    pub fn is_production(&self) -> bool {
        matches!(self.environment, Environment::Production)
    }

    /// Whether rule sets with validation issues must be refused at startup.
    /// Production always refuses them.
    pub fn requires_valid_rules(&self) -> bool {
        self.strict_rules || self.is_production()
    }

    pub fn rules_path(&self) -> Option<&Path> {
        self.rules_path.as_deref()
    }

    pub fn catalog_path(&self) -> Option<&Path> {
        self.catalog_path.as_deref()
    }
}

fn read_non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnvVar {
            key: key.to_string(),
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_defaults_when_nothing_is_set() {
        let cfg = CoreConfig::from_env_with_prefix("FORTUNE_TEST_EMPTY_").expect("config should load");
        assert_eq!(cfg.environment, Environment::Development);
        assert_eq!(cfg.http_bind, DEFAULT_HTTP_BIND);
        assert!(cfg.rules_path().is_none());
        assert!(!cfg.strict_rules);
    }

    #[test]
    fn reads_prefixed_variables() {
        std::env::set_var("FORTUNE_TEST_SET_ENV", "prod");
        std::env::set_var("FORTUNE_TEST_SET_HTTP_BIND", "127.0.0.1:9000");
        std::env::set_var("FORTUNE_TEST_SET_RULES_PATH", "/etc/fortune/rules");
        std::env::set_var("FORTUNE_TEST_SET_STRICT_RULES", "yes");

        let cfg = CoreConfig::from_env_with_prefix("FORTUNE_TEST_SET_").expect("config should load");
        assert!(cfg.is_production());
        assert_eq!(cfg.http_bind, "127.0.0.1:9000");
        assert_eq!(cfg.rules_path(), Some(Path::new("/etc/fortune/rules")));
        assert!(cfg.strict_rules);
    }

    #[test]
    fn production_requires_valid_rules() {
        std::env::set_var("FORTUNE_TEST_PROD_ENV", "production");
        let cfg = CoreConfig::from_env_with_prefix("FORTUNE_TEST_PROD_").expect("config should load");
        assert!(!cfg.strict_rules);
        assert!(cfg.requires_valid_rules());

        std::env::set_var("FORTUNE_TEST_STAGE_ENV", "staging");
        let cfg = CoreConfig::from_env_with_prefix("FORTUNE_TEST_STAGE_").expect("config should load");
        assert_eq!(cfg.environment, Environment::Staging);
        assert!(!cfg.requires_valid_rules());
    }

    #[test]
    fn rejects_unparseable_flags() {
        std::env::set_var("FORTUNE_TEST_BAD_STRICT_RULES", "maybe");
        let err = CoreConfig::from_env_with_prefix("FORTUNE_TEST_BAD_").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar { .. }));
    }
}

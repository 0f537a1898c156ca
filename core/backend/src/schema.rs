//! Account option schemas.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use credkeep_common::{AccountConfig, Error, Result};

/// Value kind accepted by an option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionKind {
    Bool,
    Int,
    Text,
    /// One of a fixed set of strings.
    Choice(Vec<String>),
}

impl OptionKind {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            OptionKind::Bool => value.is_boolean(),
            OptionKind::Int => value.is_i64() || value.is_u64(),
            OptionKind::Text => value.is_string(),
            OptionKind::Choice(choices) => value
                .as_str()
                .map(|v| choices.iter().any(|c| c == v))
                .unwrap_or(false),
        }
    }
}

/// A single backend option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigOption {
    pub name: String,
    pub kind: OptionKind,
    pub default: Value,
    pub description: String,
}

impl ConfigOption {
    /// Create an option.
    pub fn new(
        name: impl Into<String>,
        kind: OptionKind,
        default: Value,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            default,
            description: description.into(),
        }
    }
}

/// Ordered set of options a backend accepts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigSchema {
    options: Vec<ConfigOption>,
}

impl ConfigSchema {
    /// Schema without options; every non-empty config is rejected.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add an option.
    ///
    /// A later option with the same name replaces the earlier one.
    pub fn with_option(mut self, option: ConfigOption) -> Self {
        self.options.retain(|o| o.name != option.name);
        self.options.push(option);
        self
    }

    /// All options in declaration order.
    pub fn options(&self) -> &[ConfigOption] {
        &self.options
    }

    /// Look up an option by name.
    pub fn option(&self, name: &str) -> Option<&ConfigOption> {
        self.options.iter().find(|o| o.name == name)
    }

    /// Validate a configuration against this schema.
    ///
    /// # Errors
    /// - `InvalidConfig` naming the first unknown key or mistyped value
    pub fn validate(&self, config: &AccountConfig) -> Result<()> {
        for (key, value) in config {
            let option = self
                .option(key)
                .ok_or_else(|| Error::InvalidConfig(format!("Unknown option '{}'", key)))?;

            if !option.kind.accepts(value) {
                return Err(Error::InvalidConfig(format!(
                    "Option '{}' expects {:?}, got {}",
                    key, option.kind, value
                )));
            }
        }
        Ok(())
    }

    /// Default values for every option.
    pub fn defaults(&self) -> AccountConfig {
        self.options
            .iter()
            .map(|o| (o.name.clone(), o.default.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> ConfigSchema {
        ConfigSchema::empty()
            .with_option(ConfigOption::new("limit_dl", OptionKind::Int, json!(0), "Max downloads"))
            .with_option(ConfigOption::new("use_ssl", OptionKind::Bool, json!(true), ""))
            .with_option(ConfigOption::new(
                "region",
                OptionKind::Choice(vec!["eu".to_string(), "us".to_string()]),
                json!("eu"),
                "",
            ))
    }

    fn config(pairs: &[(&str, Value)]) -> AccountConfig {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_valid_config_passes() {
        let cfg = config(&[("limit_dl", json!(3)), ("region", json!("us"))]);
        assert!(schema().validate(&cfg).is_ok());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let cfg = config(&[("nope", json!(1))]);
        let err = schema().validate(&cfg).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_wrong_kind_rejected() {
        assert!(schema().validate(&config(&[("use_ssl", json!("yes"))])).is_err());
        assert!(schema().validate(&config(&[("limit_dl", json!(1.5))])).is_err());
        assert!(schema().validate(&config(&[("region", json!("asia"))])).is_err());
    }

    #[test]
    fn test_empty_schema_accepts_empty_config() {
        assert!(ConfigSchema::empty().validate(&AccountConfig::new()).is_ok());
    }

    #[test]
    fn test_defaults() {
        let defaults = schema().defaults();
        assert_eq!(defaults.get("use_ssl"), Some(&json!(true)));
        assert_eq!(defaults.len(), 3);
    }
}

//! Dispatcher configuration loaded from environment variables.

use std::env;

/// Default stream the executor consumes commands from.
pub const DEFAULT_COMMAND_STREAM: &str = "execution_commands";

/// Default stream replies are published to.
pub const DEFAULT_REPLY_STREAM: &str = "execution_replies";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Where commands go and where replies are expected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    pub command_stream: String,
    pub reply_stream: String,
    /// Approximate upper bound on the command stream length
    pub command_stream_maxlen: Option<u64>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            command_stream: DEFAULT_COMMAND_STREAM.to_string(),
            reply_stream: DEFAULT_REPLY_STREAM.to_string(),
            command_stream_maxlen: None,
        }
    }
}

impl DispatchConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let command_stream_maxlen = match lookup("COMMAND_STREAM_MAXLEN") {
            Some(raw) => Some(
                raw.trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|maxlen| *maxlen > 0)
                    .ok_or_else(|| ConfigError::InvalidValue("COMMAND_STREAM_MAXLEN".to_string()))?,
            ),
            None => None,
        };

        Ok(Self {
            command_stream: lookup("COMMAND_STREAM")
                .unwrap_or_else(|| DEFAULT_COMMAND_STREAM.to_string()),
            reply_stream: lookup("REPLY_STREAM").unwrap_or_else(|| DEFAULT_REPLY_STREAM.to_string()),
            command_stream_maxlen,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = DispatchConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, DispatchConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = DispatchConfig::from_lookup(lookup_from(&[
            ("COMMAND_STREAM", "runner_commands"),
            ("REPLY_STREAM", "runner_replies"),
            ("COMMAND_STREAM_MAXLEN", "10000"),
        ]))
        .unwrap();

        assert_eq!(config.command_stream, "runner_commands");
        assert_eq!(config.reply_stream, "runner_replies");
        assert_eq!(config.command_stream_maxlen, Some(10000));
    }

    #[test]
    fn test_invalid_maxlen() {
        let err = DispatchConfig::from_lookup(lookup_from(&[("COMMAND_STREAM_MAXLEN", "lots")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(name) if name == "COMMAND_STREAM_MAXLEN"));

        assert!(DispatchConfig::from_lookup(lookup_from(&[("COMMAND_STREAM_MAXLEN", "0")])).is_err());
    }
}

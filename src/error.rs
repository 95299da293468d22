//! Error types and handling for the reconnect tool

use thiserror::Error;

/// Main error type for reconnect operations
#[derive(Error, Debug)]
pub enum SwitchError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network errors reaching the statistics feed
    #[error("Stats transport error: {0}")]
    Transport(String),

    /// Malformed or out-of-range statistics payload
    #[error("Stats decode error: {0}")]
    Decode(String),

    /// The load report contained no usable server
    #[error("no usable server in the load report")]
    NoServer,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Daemon invocation failed
    #[error("ipsec {action} failed: {output}")]
    Daemon { action: String, output: String },

    /// The daemon has not loaded the named connection yet
    #[error("config {0} is not loaded yet")]
    ConfigNotLoaded(String),
}

impl SwitchError {
    /// Whether the error is an expected-transient daemon condition that the
    /// bring-up loop recovers from.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SwitchError::Daemon { .. } | SwitchError::ConfigNotLoaded(_)
        )
    }
}

/// Result type alias for reconnect operations
pub type Result<T> = std::result::Result<T, SwitchError>;

// Implement From for common error types
impl From<toml::de::Error> for SwitchError {
    fn from(err: toml::de::Error) -> Self {
        SwitchError::Config(format!("TOML parsing error: {err}"))
    }
}

impl From<serde_json::Error> for SwitchError {
    fn from(err: serde_json::Error) -> Self {
        SwitchError::Decode(err.to_string())
    }
}

impl From<reqwest::Error> for SwitchError {
    fn from(err: reqwest::Error) -> Self {
        SwitchError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SwitchError::Config("test config error".to_string());
        assert_eq!(err.to_string(), "Configuration error: test config error");

        let err = SwitchError::Daemon {
            action: "up".to_string(),
            output: "initiation failed".to_string(),
        };
        assert_eq!(err.to_string(), "ipsec up failed: initiation failed");

        let err = SwitchError::ConfigNotLoaded("vpn1".to_string());
        assert_eq!(err.to_string(), "config vpn1 is not loaded yet");
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let switch_err: SwitchError = io_err.into();
        assert!(matches!(switch_err, SwitchError::Io(_)));

        let json_err = serde_json::from_str::<u8>("not json").unwrap_err();
        let switch_err: SwitchError = json_err.into();
        assert!(matches!(switch_err, SwitchError::Decode(_)));
    }

    #[test]
    fn test_transient_classification() {
        assert!(SwitchError::ConfigNotLoaded("vpn1".to_string()).is_transient());
        assert!(SwitchError::Daemon {
            action: "up".to_string(),
            output: String::new(),
        }
        .is_transient());
        assert!(!SwitchError::NoServer.is_transient());
        assert!(!SwitchError::Transport("timeout".to_string()).is_transient());
    }
}

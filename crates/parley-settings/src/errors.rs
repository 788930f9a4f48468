//! Errors raised while loading and validating client settings.

use thiserror::Error;

/// Why a [`ClientSettings`](crate::ClientSettings) could not be produced.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// `settings.json` exists but could not be read.
    #[error("cannot read parley settings: {0}")]
    Io(#[from] std::io::Error),
    /// `settings.json` is not valid JSON or does not match the settings shape.
    #[error("malformed parley settings: {0}")]
    Json(#[from] serde_json::Error),
    /// A hub endpoint has the wrong scheme.
    #[error("{field} must be a {expected} URL, got {url:?}")]
    InvalidUrl {
        /// Settings key, e.g. `hub.wsUrl`.
        field: &'static str,
        /// Accepted schemes.
        expected: &'static str,
        /// The rejected value.
        url: String,
    },
    /// Any other out-of-range value.
    #[error("invalid settings value: {0}")]
    InvalidValue(String),
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreadable_file_display() {
        let err: SettingsError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert!(matches!(err, SettingsError::Io(_)));
        assert_eq!(err.to_string(), "cannot read parley settings: denied");
    }

    #[test]
    fn malformed_file_display() {
        let json_err = serde_json::from_str::<serde_json::Value>("{hub").unwrap_err();
        let err = SettingsError::Json(json_err);
        assert!(err.to_string().starts_with("malformed parley settings"));
    }

    #[test]
    fn invalid_url_names_field_and_value() {
        let err = SettingsError::InvalidUrl {
            field: "hub.wsUrl",
            expected: "ws(s)",
            url: "http://hub/ws".into(),
        };
        assert_eq!(
            err.to_string(),
            r#"hub.wsUrl must be a ws(s) URL, got "http://hub/ws""#
        );
    }

    #[test]
    fn invalid_value_display() {
        let err = SettingsError::InvalidValue("connection timeouts must be positive".into());
        assert_eq!(
            err.to_string(),
            "invalid settings value: connection timeouts must be positive"
        );
    }
}

use thiserror::Error;

use crate::dnssec::{DenialError, KeyLoadError, SignError, VerifyError};
use crate::response::ResponseError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("No key file configured")]
    MissingKeyFile,

    #[error("Cannot read config file {path}: {reason}")]
    Io { path: String, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Crate-level error for callers that do not care which stage failed.
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    KeyLoad(#[from] KeyLoadError),

    #[error(transparent)]
    Sign(#[from] SignError),

    #[error(transparent)]
    Denial(#[from] DenialError),

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error(transparent)]
    Response(#[from] ResponseError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::enums::DNSResourceType;

    fn stage(err: impl Into<Error>) -> &'static str {
        match err.into() {
            Error::Config(_) => "config",
            Error::KeyLoad(_) => "key",
            Error::Sign(_) => "sign",
            Error::Denial(_) => "denial",
            Error::Verify(_) => "verify",
            Error::Response(_) => "response",
        }
    }

    #[test]
    fn test_conversions_keep_stage() {
        assert_eq!(stage(ConfigError::MissingKeyFile), "config");
        assert_eq!(stage(KeyLoadError::KeyPairMismatch), "key");
        assert_eq!(stage(SignError::EmptyRRset), "sign");
        assert_eq!(
            stage(DenialError::ZoneOrderUnavailable("empty".to_string())),
            "denial"
        );
        assert_eq!(stage(VerifyError::SignatureExpired), "verify");
        assert_eq!(
            stage(ResponseError::Sign {
                owner: "www.example.com.".to_string(),
                rtype: DNSResourceType::A,
                source: SignError::EmptyRRset,
            }),
            "response"
        );

        let err: Error = ConfigError::MissingKeyFile.into();
        assert_eq!(err.to_string(), "No key file configured");
    }
}

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::dns::enums::DNSResourceType;

/// Failures while loading a key pair. Fatal for the zone: DNSSEC must not be
/// enabled with keys that cannot be loaded.
#[derive(Debug, Clone, Error)]
pub enum KeyLoadError {
    #[error("key file {path} is missing or unreadable: {source}")]
    KeyFileMissing {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("key file {path} is malformed: {reason}")]
    KeyFileMalformed { path: PathBuf, reason: String },

    #[error("public key record has type {found}, expected DNSKEY")]
    KeyTypeMismatch { found: String },

    #[error("private key algorithm {private} does not match DNSKEY algorithm {public}")]
    AlgorithmMismatch { public: u8, private: u8 },

    #[error("private key does not match the published public key")]
    KeyPairMismatch,

    #[error("no signing support for DNSSEC algorithm {0}")]
    UnsupportedAlgorithm(u8),
}

impl KeyLoadError {
    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        KeyLoadError::KeyFileMalformed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Failures while producing one RRSIG. Scoped to a single RRset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignError {
    #[error("no signing support for DNSSEC algorithm {0}")]
    UnsupportedAlgorithm(u8),

    #[error("signing primitive failed: {0}")]
    SigningPrimitiveFailure(String),

    #[error("nothing to sign: RRset is empty")]
    EmptyRRset,

    #[error("records do not form a single {expected} RRset")]
    MixedRRset { expected: DNSResourceType },

    #[error("invalid signature validity period of {0} seconds")]
    InvalidValidityPeriod(u64),

    #[error("malformed {rtype} RDATA: {reason}")]
    MalformedRdata {
        rtype: DNSResourceType,
        reason: String,
    },
}

/// Failures while building an authenticated denial.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DenialError {
    #[error("canonical zone order unavailable: {0}")]
    ZoneOrderUnavailable(String),
}

/// Reasons an RRSIG fails to verify.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("RRSIG algorithm {rrsig} does not match DNSKEY algorithm {dnskey}")]
    AlgorithmMismatch { rrsig: u8, dnskey: u8 },

    #[error("RRSIG key tag {rrsig} does not match DNSKEY key tag {dnskey}")]
    KeyTagMismatch { rrsig: u16, dnskey: u16 },

    #[error("RRSIG signer name does not match the DNSKEY owner")]
    SignerMismatch,

    #[error("RRSIG labels field exceeds the owner name label count")]
    InvalidLabelCount,

    #[error("signature not yet valid")]
    SignatureNotYetValid,

    #[error("signature expired")]
    SignatureExpired,

    #[error("no verification support for DNSSEC algorithm {0}")]
    UnsupportedAlgorithm(u8),

    #[error("invalid DNSKEY public key")]
    InvalidPublicKey,

    #[error("signature verification failed")]
    SignatureVerificationFailed,

    #[error(transparent)]
    Canonical(#[from] SignError),
}

pub type Result<T> = std::result::Result<T, SignError>;

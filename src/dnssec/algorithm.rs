use std::fmt;
use std::str::FromStr;

use ring::signature::{
    self, EcdsaSigningAlgorithm, RsaEncoding, RsaParameters, VerificationAlgorithm,
};

/// DNSSEC algorithm numbers (RFC 4034, 5155, 5702, 5933, 6605, 8080, 8624)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DnsSecAlgorithm {
    /// RSA/MD5 (deprecated)
    RsaMd5,
    /// DSA/SHA1 (RFC 2536)
    Dsa,
    /// RSA/SHA-1 (RFC 3110)
    RsaSha1,
    /// DSA-NSEC3-SHA1 (RFC 5155)
    DsaNsec3Sha1,
    /// RSASHA1-NSEC3-SHA1 (RFC 5155)
    RsaSha1Nsec3Sha1,
    /// RSA/SHA-256 (RFC 5702)
    RsaSha256,
    /// RSA/SHA-512 (RFC 5702)
    RsaSha512,
    /// GOST R 34.10-2001 (RFC 5933)
    EccGost,
    /// ECDSA Curve P-256 with SHA-256 (RFC 6605)
    EcdsaP256Sha256,
    /// ECDSA Curve P-384 with SHA-384 (RFC 6605)
    EcdsaP384Sha384,
    /// Ed25519 (RFC 8080)
    Ed25519,
    /// Ed448 (RFC 8080)
    Ed448,
    /// Any other registry value
    Other(u8),
}

impl DnsSecAlgorithm {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::RsaMd5,
            3 => Self::Dsa,
            5 => Self::RsaSha1,
            6 => Self::DsaNsec3Sha1,
            7 => Self::RsaSha1Nsec3Sha1,
            8 => Self::RsaSha256,
            10 => Self::RsaSha512,
            12 => Self::EccGost,
            13 => Self::EcdsaP256Sha256,
            14 => Self::EcdsaP384Sha384,
            15 => Self::Ed25519,
            16 => Self::Ed448,
            other => Self::Other(other),
        }
    }

    pub fn to_u8(self) -> u8 {
        match self {
            Self::RsaMd5 => 1,
            Self::Dsa => 3,
            Self::RsaSha1 => 5,
            Self::DsaNsec3Sha1 => 6,
            Self::RsaSha1Nsec3Sha1 => 7,
            Self::RsaSha256 => 8,
            Self::RsaSha512 => 10,
            Self::EccGost => 12,
            Self::EcdsaP256Sha256 => 13,
            Self::EcdsaP384Sha384 => 14,
            Self::Ed25519 => 15,
            Self::Ed448 => 16,
            Self::Other(value) => value,
        }
    }

    /// Whether this crate can produce signatures with the algorithm
    pub fn can_sign(&self) -> bool {
        matches!(
            self,
            Self::RsaSha256
                | Self::RsaSha512
                | Self::EcdsaP256Sha256
                | Self::EcdsaP384Sha384
                | Self::Ed25519
        )
    }

    pub fn is_rsa(&self) -> bool {
        matches!(
            self,
            Self::RsaMd5 | Self::RsaSha1 | Self::RsaSha1Nsec3Sha1 | Self::RsaSha256 | Self::RsaSha512
        )
    }

    /// PKCS#1 v1.5 padding used when signing with an RSA key
    pub(crate) fn rsa_encoding(&self) -> Option<&'static dyn RsaEncoding> {
        match self {
            Self::RsaSha256 => Some(&signature::RSA_PKCS1_SHA256),
            Self::RsaSha512 => Some(&signature::RSA_PKCS1_SHA512),
            _ => None,
        }
    }

    /// RSA verification parameters, used with the key's (n, e) components
    pub(crate) fn rsa_parameters(&self) -> Option<&'static RsaParameters> {
        match self {
            Self::RsaSha256 => Some(&signature::RSA_PKCS1_2048_8192_SHA256),
            Self::RsaSha512 => Some(&signature::RSA_PKCS1_2048_8192_SHA512),
            _ => None,
        }
    }

    /// ECDSA signing parameters; DNSSEC wants the fixed-width `r || s` form
    pub(crate) fn ecdsa_signing(&self) -> Option<&'static EcdsaSigningAlgorithm> {
        match self {
            Self::EcdsaP256Sha256 => Some(&signature::ECDSA_P256_SHA256_FIXED_SIGNING),
            Self::EcdsaP384Sha384 => Some(&signature::ECDSA_P384_SHA384_FIXED_SIGNING),
            _ => None,
        }
    }

    /// Verification parameters matching the signing side
    pub(crate) fn verification(&self) -> Option<&'static dyn VerificationAlgorithm> {
        match self {
            Self::RsaSha256 => Some(&signature::RSA_PKCS1_2048_8192_SHA256),
            Self::RsaSha512 => Some(&signature::RSA_PKCS1_2048_8192_SHA512),
            Self::EcdsaP256Sha256 => Some(&signature::ECDSA_P256_SHA256_FIXED),
            Self::EcdsaP384Sha384 => Some(&signature::ECDSA_P384_SHA384_FIXED),
            Self::Ed25519 => Some(&signature::ED25519),
            _ => None,
        }
    }

    /// Length of the raw private key for curve algorithms
    pub(crate) fn private_key_len(&self) -> Option<usize> {
        match self {
            Self::EcdsaP256Sha256 | Self::Ed25519 => Some(32),
            Self::EcdsaP384Sha384 => Some(48),
            Self::Ed448 => Some(57),
            _ => None,
        }
    }

    /// Mnemonic used in key files and presentation format
    pub fn mnemonic(&self) -> Option<&'static str> {
        let name = match self {
            Self::RsaMd5 => "RSAMD5",
            Self::Dsa => "DSA",
            Self::RsaSha1 => "RSASHA1",
            Self::DsaNsec3Sha1 => "DSA-NSEC3-SHA1",
            Self::RsaSha1Nsec3Sha1 => "RSASHA1-NSEC3-SHA1",
            Self::RsaSha256 => "RSASHA256",
            Self::RsaSha512 => "RSASHA512",
            Self::EccGost => "ECC-GOST",
            Self::EcdsaP256Sha256 => "ECDSAP256SHA256",
            Self::EcdsaP384Sha384 => "ECDSAP384SHA384",
            Self::Ed25519 => "ED25519",
            Self::Ed448 => "ED448",
            Self::Other(_) => return None,
        };
        Some(name)
    }
}

impl fmt::Display for DnsSecAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mnemonic() {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.to_u8()),
        }
    }
}

impl FromStr for DnsSecAlgorithm {
    type Err = String;

    /// Accepts either the number or the mnemonic
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(number) = s.parse::<u8>() {
            return Ok(Self::from_u8(number));
        }
        let upper = s.to_ascii_uppercase();
        (0..=u8::MAX)
            .map(Self::from_u8)
            .find(|alg| alg.mnemonic() == Some(upper.as_str()))
            .ok_or_else(|| format!("unknown DNSSEC algorithm: {}", s))
    }
}

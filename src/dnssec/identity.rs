use std::fmt;

use base64::{Engine, engine::general_purpose::STANDARD};
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, Ed25519KeyPair, KeyPair, RsaKeyPair};
use tracing::{debug, warn};

use super::errors::{KeyLoadError, SignError};
use super::{DnsSecAlgorithm, calculate_key_tag};
use crate::dns::enums::{DNSResourceClass, DNSResourceType};
use crate::dns::name;
use crate::dns::resource::DNSResource;

/// DNSKEY protocol field value (RFC 4034 §2.1.2)
pub const DNSKEY_PROTOCOL: u8 = 3;

/// Zone Key flag
pub const FLAG_ZONE: u16 = 0x0100;

/// Secure Entry Point flag
pub const FLAG_SEP: u16 = 0x0001;

/// The public half of a signing key, as published in the zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dnskey {
    pub owner: Vec<String>,
    pub ttl: u32,
    pub class: DNSResourceClass,
    pub flags: u16,
    pub protocol: u8,
    pub algorithm: DnsSecAlgorithm,
    pub public_key: Vec<u8>,
}

impl Dnskey {
    pub fn key_tag(&self) -> u16 {
        calculate_key_tag(
            self.flags,
            self.protocol,
            self.algorithm.to_u8(),
            &self.public_key,
        )
    }

    pub fn is_zone_key(&self) -> bool {
        self.flags & FLAG_ZONE != 0
    }

    pub fn is_sep(&self) -> bool {
        self.flags & FLAG_SEP != 0
    }

    pub fn rdata(&self) -> Vec<u8> {
        let mut rdata = Vec::with_capacity(4 + self.public_key.len());
        rdata.extend_from_slice(&self.flags.to_be_bytes());
        rdata.push(self.protocol);
        rdata.push(self.algorithm.to_u8());
        rdata.extend_from_slice(&self.public_key);
        rdata
    }

    pub fn to_resource(&self) -> DNSResource {
        DNSResource {
            labels: self.owner.clone(),
            rtype: DNSResourceType::DNSKEY,
            rclass: self.class,
            ttl: self.ttl,
            rdata: self.rdata(),
        }
    }

    /// Read a DNSKEY back out of a resource record.
    pub fn from_resource(record: &DNSResource) -> Option<Self> {
        if record.rtype != DNSResourceType::DNSKEY || record.rdata.len() < 4 {
            return None;
        }
        Some(Self {
            owner: record.labels.clone(),
            ttl: record.ttl,
            class: record.rclass,
            flags: u16::from_be_bytes([record.rdata[0], record.rdata[1]]),
            protocol: record.rdata[2],
            algorithm: DnsSecAlgorithm::from_u8(record.rdata[3]),
            public_key: record.rdata[4..].to_vec(),
        })
    }

    /// Split an RFC 3110 RSA public key into (exponent, modulus).
    pub(crate) fn rsa_components(&self) -> Option<(&[u8], &[u8])> {
        let key = self.public_key.as_slice();
        let (exp_len, rest) = match key {
            [0, hi, lo, rest @ ..] => (usize::from(u16::from_be_bytes([*hi, *lo])), rest),
            [len, rest @ ..] if *len != 0 => (usize::from(*len), rest),
            _ => return None,
        };
        if rest.len() <= exp_len {
            return None;
        }
        Some(rest.split_at(exp_len))
    }

    /// ECDSA public keys are published as bare `x || y`; ring wants the
    /// uncompressed SEC1 point.
    pub(crate) fn ecdsa_point(&self) -> Vec<u8> {
        let mut point = Vec::with_capacity(1 + self.public_key.len());
        point.push(0x04);
        point.extend_from_slice(&self.public_key);
        point
    }
}

impl fmt::Display for Dnskey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} DNSKEY {} {} {} {}",
            name::name_to_string(&self.owner),
            self.ttl,
            self.class,
            self.flags,
            self.protocol,
            self.algorithm.to_u8(),
            STANDARD.encode(&self.public_key)
        )
    }
}

/// RSA private key fields, big-endian integers as stored in key files.
#[derive(Clone, Default)]
pub struct RsaPrivateFields {
    pub modulus: Vec<u8>,
    pub public_exponent: Vec<u8>,
    pub private_exponent: Vec<u8>,
    pub prime1: Vec<u8>,
    pub prime2: Vec<u8>,
    pub exponent1: Vec<u8>,
    pub exponent2: Vec<u8>,
    pub coefficient: Vec<u8>,
}

/// Private key parameters as read from storage, before they are bound to a
/// public key.
#[derive(Clone)]
pub enum PrivateKeyMaterial {
    Rsa {
        algorithm: DnsSecAlgorithm,
        fields: RsaPrivateFields,
    },
    /// Curve algorithms carry a single scalar or seed
    Raw {
        algorithm: DnsSecAlgorithm,
        key: Vec<u8>,
    },
}

impl PrivateKeyMaterial {
    pub fn algorithm(&self) -> DnsSecAlgorithm {
        match self {
            PrivateKeyMaterial::Rsa { algorithm, .. } => *algorithm,
            PrivateKeyMaterial::Raw { algorithm, .. } => *algorithm,
        }
    }
}

impl fmt::Debug for PrivateKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKeyMaterial")
            .field("algorithm", &self.algorithm())
            .finish_non_exhaustive()
    }
}

enum PrivateKey {
    Rsa(RsaKeyPair),
    Ecdsa(EcdsaKeyPair),
    Ed25519(Ed25519KeyPair),
}

/// A loaded zone signing key: the published DNSKEY bound to its private key.
///
/// Immutable after construction and safe to share across threads; replace
/// the whole identity on key rollover.
pub struct SigningIdentity {
    dnskey: Dnskey,
    key_tag: u16,
    private_key: PrivateKey,
    rng: SystemRandom,
}

impl SigningIdentity {
    /// Bind private key material to its DNSKEY, checking that both describe
    /// the same key.
    pub fn new(dnskey: Dnskey, material: &PrivateKeyMaterial) -> Result<Self, KeyLoadError> {
        let algorithm = dnskey.algorithm;
        if material.algorithm() != algorithm {
            return Err(KeyLoadError::AlgorithmMismatch {
                public: algorithm.to_u8(),
                private: material.algorithm().to_u8(),
            });
        }
        if !algorithm.can_sign() {
            return Err(KeyLoadError::UnsupportedAlgorithm(algorithm.to_u8()));
        }

        let rng = SystemRandom::new();
        let private_key = match material {
            PrivateKeyMaterial::Rsa { fields, .. } => {
                let (exponent, modulus) = dnskey
                    .rsa_components()
                    .ok_or(KeyLoadError::KeyPairMismatch)?;
                if strip_zeros(exponent) != strip_zeros(&fields.public_exponent)
                    || strip_zeros(modulus) != strip_zeros(&fields.modulus)
                {
                    return Err(KeyLoadError::KeyPairMismatch);
                }

                let components = ring::rsa::KeyPairComponents {
                    public_key: ring::rsa::PublicKeyComponents {
                        n: strip_zeros(&fields.modulus),
                        e: strip_zeros(&fields.public_exponent),
                    },
                    d: fields.private_exponent.as_slice(),
                    p: fields.prime1.as_slice(),
                    q: fields.prime2.as_slice(),
                    dP: fields.exponent1.as_slice(),
                    dQ: fields.exponent2.as_slice(),
                    qInv: fields.coefficient.as_slice(),
                };
                let key = RsaKeyPair::from_components(&components).map_err(|e| {
                    warn!("RSA key rejected: {}", e);
                    KeyLoadError::KeyPairMismatch
                })?;
                PrivateKey::Rsa(key)
            }
            PrivateKeyMaterial::Raw { key, .. } => match algorithm {
                DnsSecAlgorithm::Ed25519 => {
                    let pair = Ed25519KeyPair::from_seed_and_public_key(key, &dnskey.public_key)
                        .map_err(|e| {
                            warn!("Ed25519 key rejected: {}", e);
                            KeyLoadError::KeyPairMismatch
                        })?;
                    PrivateKey::Ed25519(pair)
                }
                _ => {
                    let signing = algorithm
                        .ecdsa_signing()
                        .ok_or(KeyLoadError::UnsupportedAlgorithm(algorithm.to_u8()))?;
                    let pair = EcdsaKeyPair::from_private_key_and_public_key(
                        signing,
                        key,
                        &dnskey.ecdsa_point(),
                        &rng,
                    )
                    .map_err(|e| {
                        warn!("ECDSA key rejected: {}", e);
                        KeyLoadError::KeyPairMismatch
                    })?;
                    PrivateKey::Ecdsa(pair)
                }
            },
        };

        let key_tag = dnskey.key_tag();
        debug!(
            "Bound {} key {} for {}",
            algorithm,
            key_tag,
            name::name_to_string(&dnskey.owner)
        );

        Ok(Self {
            dnskey,
            key_tag,
            private_key,
            rng,
        })
    }

    /// Generate a fresh Ed25519 identity, mainly for tests and benchmarks.
    pub fn generate_ed25519(owner: &str, flags: u16) -> Result<Self, KeyLoadError> {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng)
            .map_err(|_| KeyLoadError::UnsupportedAlgorithm(DnsSecAlgorithm::Ed25519.to_u8()))?;
        let pair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref())
            .map_err(|_| KeyLoadError::KeyPairMismatch)?;

        let dnskey = Dnskey {
            owner: name::parse_name(owner),
            ttl: 3600,
            class: DNSResourceClass::IN,
            flags,
            protocol: DNSKEY_PROTOCOL,
            algorithm: DnsSecAlgorithm::Ed25519,
            public_key: pair.public_key().as_ref().to_vec(),
        };
        let key_tag = dnskey.key_tag();

        Ok(Self {
            dnskey,
            key_tag,
            private_key: PrivateKey::Ed25519(pair),
            rng,
        })
    }

    pub fn dnskey(&self) -> &Dnskey {
        &self.dnskey
    }

    pub fn key_tag(&self) -> u16 {
        self.key_tag
    }

    pub fn algorithm(&self) -> DnsSecAlgorithm {
        self.dnskey.algorithm
    }

    /// Owner of the DNSKEY, used as the RRSIG signer name
    pub fn signer_name(&self) -> &[String] {
        &self.dnskey.owner
    }

    /// Canonical wire form of the signer name
    pub(crate) fn signer_wire(&self) -> Vec<u8> {
        name::canonical_wire(&self.dnskey.owner)
    }

    /// Sign raw bytes with the private key.
    pub fn sign_raw(&self, data: &[u8]) -> Result<Vec<u8>, SignError> {
        match &self.private_key {
            PrivateKey::Rsa(key) => {
                let encoding = self
                    .algorithm()
                    .rsa_encoding()
                    .ok_or(SignError::UnsupportedAlgorithm(self.algorithm().to_u8()))?;
                let mut signature = vec![0; key.public().modulus_len()];
                key.sign(encoding, &self.rng, data, &mut signature)
                    .map_err(|_| {
                        SignError::SigningPrimitiveFailure("RSA signing failed".to_string())
                    })?;
                Ok(signature)
            }
            PrivateKey::Ecdsa(key) => key
                .sign(&self.rng, data)
                .map(|sig| sig.as_ref().to_vec())
                .map_err(|_| SignError::SigningPrimitiveFailure("ECDSA signing failed".to_string())),
            PrivateKey::Ed25519(key) => Ok(key.sign(data).as_ref().to_vec()),
        }
    }
}

impl fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("owner", &name::name_to_string(&self.dnskey.owner))
            .field("algorithm", &self.dnskey.algorithm)
            .field("key_tag", &self.key_tag)
            .finish_non_exhaustive()
    }
}

fn strip_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

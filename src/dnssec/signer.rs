use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::canonical::{CanonicalRRset, RrsetDigest};
use super::errors::{Result, SignError};
use super::identity::SigningIdentity;
use super::rrsig::Rrsig;
use crate::dns::enums::DNSResourceType;
use crate::dns::name;
use crate::dns::resource::DNSResource;

/// Largest validity the 32-bit serial timestamps can express unambiguously
const MAX_VALIDITY_SECS: u64 = (1 << 31) - 1;

/// Timing parameters applied to every signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningPolicy {
    /// TTL recorded in the RRSIG and used in the signed image
    pub original_ttl: u32,
    /// Expiration minus inception
    pub validity: Duration,
    /// How far inception is backdated from the current time
    pub inception_skew: Duration,
    /// Cached signatures this close to expiry are replaced
    pub refresh_margin: Duration,
}

impl Default for SigningPolicy {
    fn default() -> Self {
        Self {
            original_ttl: 3600,
            validity: Duration::from_secs(7 * 24 * 3600),
            inception_skew: Duration::from_secs(3 * 3600),
            refresh_margin: Duration::from_secs(24 * 3600),
        }
    }
}

/// Produces RRSIGs for RRsets with one signing identity.
///
/// Works the same for every RR type; the only per-type behaviour is RDATA
/// name lowercasing during canonicalization.
#[derive(Debug, Clone)]
pub struct Signer {
    identity: Arc<SigningIdentity>,
    policy: SigningPolicy,
}

impl Signer {
    pub fn new(identity: Arc<SigningIdentity>, policy: SigningPolicy) -> Self {
        Self { identity, policy }
    }

    pub fn identity(&self) -> &Arc<SigningIdentity> {
        &self.identity
    }

    pub fn policy(&self) -> &SigningPolicy {
        &self.policy
    }

    pub fn canonicalize(
        &self,
        rrset: &[DNSResource],
        type_covered: DNSResourceType,
    ) -> Result<CanonicalRRset> {
        CanonicalRRset::new(rrset, type_covered, self.policy.original_ttl)
    }

    /// Cache key of an RRset under this signer's key.
    pub fn digest(&self, rrset: &[DNSResource], type_covered: DNSResourceType) -> Result<RrsetDigest> {
        Ok(self
            .canonicalize(rrset, type_covered)?
            .digest(self.identity.key_tag(), self.identity.algorithm()))
    }

    /// Sign an RRset. `expiration = inception + validity`, so a zero
    /// validity is rejected rather than producing an empty window.
    pub fn sign(
        &self,
        rrset: &[DNSResource],
        type_covered: DNSResourceType,
        inception: u32,
        validity: Duration,
    ) -> Result<Rrsig> {
        let canonical = self.canonicalize(rrset, type_covered)?;
        self.sign_canonical(&canonical, inception, validity)
    }

    /// Sign an RRset that has already been canonicalized.
    pub fn sign_canonical(
        &self,
        canonical: &CanonicalRRset,
        inception: u32,
        validity: Duration,
    ) -> Result<Rrsig> {
        let algorithm = self.identity.algorithm();
        if !algorithm.can_sign() {
            return Err(SignError::UnsupportedAlgorithm(algorithm.to_u8()));
        }

        let validity_secs = validity.as_secs();
        if validity_secs == 0 || validity_secs > MAX_VALIDITY_SECS {
            return Err(SignError::InvalidValidityPeriod(validity_secs));
        }
        let expiration = inception
            .checked_add(validity_secs as u32)
            .ok_or(SignError::InvalidValidityPeriod(validity_secs))?;

        let mut rrsig = Rrsig {
            type_covered: canonical.type_covered,
            algorithm,
            labels: name::signature_label_count(&canonical.owner),
            original_ttl: canonical.original_ttl,
            expiration,
            inception,
            key_tag: self.identity.key_tag(),
            signer_name: self.identity.signer_name().to_vec(),
            signature: Vec::new(),
        };

        let mut signed_data = rrsig.rdata_without_signature();
        signed_data.extend_from_slice(&canonical.image);
        rrsig.signature = self.identity.sign_raw(&signed_data)?;

        debug!(
            "Signed {} {} ({} records) with key {}, valid {}..{}",
            name::name_to_string(&canonical.owner),
            canonical.type_covered,
            canonical.record_count,
            rrsig.key_tag,
            inception,
            expiration
        );
        Ok(rrsig)
    }
}

//! RRSIG verification against a DNSKEY (RFC 4035 §5.3).
//!
//! The signing side never needs this at runtime; it backs the CLI self-check
//! and the round-trip tests.

use std::borrow::Cow;

use ring::signature;
use tracing::{debug, trace};

use super::canonical::CanonicalRRset;
use super::errors::VerifyError;
use super::identity::Dnskey;
use super::rrsig::Rrsig;
use crate::dns::name::{self, names_equal};
use crate::dns::resource::DNSResource;

/// Verify `rrsig` over `rrset` with `dnskey` at time `now` (Unix seconds).
pub fn verify_rrsig(
    dnskey: &Dnskey,
    rrsig: &Rrsig,
    rrset: &[DNSResource],
    now: u32,
) -> Result<(), VerifyError> {
    if rrsig.algorithm != dnskey.algorithm {
        return Err(VerifyError::AlgorithmMismatch {
            rrsig: rrsig.algorithm.to_u8(),
            dnskey: dnskey.algorithm.to_u8(),
        });
    }
    let key_tag = dnskey.key_tag();
    if rrsig.key_tag != key_tag {
        return Err(VerifyError::KeyTagMismatch {
            rrsig: rrsig.key_tag,
            dnskey: key_tag,
        });
    }
    if !names_equal(&rrsig.signer_name, &dnskey.owner) {
        return Err(VerifyError::SignerMismatch);
    }

    check_signature_validity(rrsig, now)?;

    let rrset = expand_wildcard_owner(rrsig, rrset)?;
    let canonical = CanonicalRRset::new(&rrset, rrsig.type_covered, rrsig.original_ttl)?;

    let mut signed_data = rrsig.rdata_without_signature();
    signed_data.extend_from_slice(&canonical.image);
    trace!("Verifying {} octets of signed data", signed_data.len());

    verify_signature(dnskey, &signed_data, &rrsig.signature)?;

    debug!(
        "Signature verified for {} {}",
        name::name_to_string(&canonical.owner),
        canonical.type_covered
    );
    Ok(())
}

fn check_signature_validity(rrsig: &Rrsig, now: u32) -> Result<(), VerifyError> {
    if rrsig.is_valid_at(now) {
        return Ok(());
    }
    if now.wrapping_sub(rrsig.inception) >= 1 << 31 {
        Err(VerifyError::SignatureNotYetValid)
    } else {
        Err(VerifyError::SignatureExpired)
    }
}

/// A signature with fewer labels than the owner was made over the wildcard
/// that synthesized the answer; rebuild that owner.
fn expand_wildcard_owner<'a>(
    rrsig: &Rrsig,
    rrset: &'a [DNSResource],
) -> Result<Cow<'a, [DNSResource]>, VerifyError> {
    let Some(first) = rrset.first() else {
        return Ok(Cow::Borrowed(rrset));
    };
    let owner = name::trim_root(&first.labels);
    let count = name::signature_label_count(owner) as usize;
    let labels = rrsig.labels as usize;

    if labels > count {
        return Err(VerifyError::InvalidLabelCount);
    }
    if labels == count {
        return Ok(Cow::Borrowed(rrset));
    }

    let mut wildcard = vec!["*".to_string()];
    wildcard.extend_from_slice(&owner[owner.len() - labels..]);
    Ok(Cow::Owned(
        rrset
            .iter()
            .map(|record| DNSResource {
                labels: wildcard.clone(),
                ..record.clone()
            })
            .collect(),
    ))
}

fn verify_signature(dnskey: &Dnskey, message: &[u8], sig: &[u8]) -> Result<(), VerifyError> {
    let algorithm = dnskey.algorithm;

    if let Some(parameters) = algorithm.rsa_parameters() {
        let (e, n) = dnskey
            .rsa_components()
            .ok_or(VerifyError::InvalidPublicKey)?;
        let public_key = signature::RsaPublicKeyComponents { n, e };
        return public_key
            .verify(parameters, message, sig)
            .map_err(|_| VerifyError::SignatureVerificationFailed);
    }

    let verification = algorithm
        .verification()
        .ok_or(VerifyError::UnsupportedAlgorithm(algorithm.to_u8()))?;
    let key_bytes = if algorithm.ecdsa_signing().is_some() {
        dnskey.ecdsa_point()
    } else {
        dnskey.public_key.clone()
    };

    signature::UnparsedPublicKey::new(verification, &key_bytes)
        .verify(message, sig)
        .map_err(|_| VerifyError::SignatureVerificationFailed)
}

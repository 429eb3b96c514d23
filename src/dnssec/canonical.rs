//! DNSSEC canonical RR form and RRset ordering (RFC 4034 §6).

use std::fmt;

use ring::digest;
use tracing::trace;

use super::DnsSecAlgorithm;
use super::errors::SignError;
use crate::dns::enums::{DNSResourceClass, DNSResourceType};
use crate::dns::name::{self, lowercase_wire_name};
use crate::dns::resource::DNSResource;

/// Where the embedded domain names sit in an RDATA.
enum NameLayout {
    /// A single name filling the whole RDATA
    Single,
    /// Two consecutive names followed by `trailing` fixed octets
    Pair { trailing: usize },
    /// `skip` fixed octets followed by a name ending the RDATA
    After { skip: usize },
}

fn name_layout(rtype: DNSResourceType) -> Option<NameLayout> {
    use DNSResourceType::*;
    match rtype {
        NS | MD | MF | CNAME | MB | MG | MR | PTR | DNAME => Some(NameLayout::Single),
        SOA => Some(NameLayout::Pair { trailing: 20 }),
        MINFO | RP => Some(NameLayout::Pair { trailing: 0 }),
        MX | AFSDB | RT | KX => Some(NameLayout::After { skip: 2 }),
        SRV => Some(NameLayout::After { skip: 6 }),
        _ => None,
    }
}

/// Canonical RDATA: names embedded in the well-known types are lowercased,
/// everything else is passed through untouched.
pub fn canonical_rdata(rtype: DNSResourceType, rdata: &[u8]) -> Result<Vec<u8>, SignError> {
    let mut out = rdata.to_vec();
    let Some(layout) = name_layout(rtype) else {
        return Ok(out);
    };

    let malformed = |reason: &str| SignError::MalformedRdata {
        rtype,
        reason: reason.to_string(),
    };

    let (end, trailing) = match layout {
        NameLayout::Single => (
            lowercase_wire_name(&mut out, 0).ok_or_else(|| malformed("bad name"))?,
            0,
        ),
        NameLayout::Pair { trailing } => {
            let first = lowercase_wire_name(&mut out, 0).ok_or_else(|| malformed("bad first name"))?;
            let second =
                lowercase_wire_name(&mut out, first).ok_or_else(|| malformed("bad second name"))?;
            (second, trailing)
        }
        NameLayout::After { skip } => {
            if out.len() < skip {
                return Err(malformed("truncated"));
            }
            (
                lowercase_wire_name(&mut out, skip).ok_or_else(|| malformed("bad name"))?,
                0,
            )
        }
    };

    if end + trailing != out.len() {
        return Err(malformed("unexpected RDATA length"));
    }
    Ok(out)
}

/// An RRset reduced to the exact octets that get signed after the RRSIG
/// header: every RR in canonical form with the original TTL, sorted by
/// canonical RDATA, duplicates removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRRset {
    pub owner: Vec<String>,
    pub class: DNSResourceClass,
    pub type_covered: DNSResourceType,
    pub original_ttl: u32,
    /// Number of distinct records after duplicate removal
    pub record_count: usize,
    pub image: Vec<u8>,
}

impl CanonicalRRset {
    pub fn new(
        rrset: &[DNSResource],
        type_covered: DNSResourceType,
        original_ttl: u32,
    ) -> Result<Self, SignError> {
        let first = rrset.first().ok_or(SignError::EmptyRRset)?;
        if first.rtype != type_covered
            || rrset.iter().any(|record| !record.same_rrset(first))
        {
            return Err(SignError::MixedRRset {
                expected: type_covered,
            });
        }
        if !name::is_valid_name(&first.labels) {
            return Err(SignError::MalformedRdata {
                rtype: type_covered,
                reason: format!(
                    "owner name {} exceeds wire limits",
                    name::name_to_string(&first.labels)
                ),
            });
        }

        let mut rdatas = rrset
            .iter()
            .map(|record| canonical_rdata(type_covered, &record.rdata))
            .collect::<Result<Vec<_>, _>>()?;
        rdatas.sort();
        rdatas.dedup();

        if let Some(oversized) = rdatas.iter().find(|rdata| rdata.len() > u16::MAX as usize) {
            return Err(SignError::MalformedRdata {
                rtype: type_covered,
                reason: format!("RDATA of {} octets", oversized.len()),
            });
        }

        let owner_wire = name::canonical_wire(&first.labels);
        let type_value = type_covered.to_u16();
        let class_value: u16 = first.rclass.into();

        let mut image = Vec::with_capacity(
            rdatas
                .iter()
                .map(|rdata| owner_wire.len() + 10 + rdata.len())
                .sum(),
        );
        for rdata in &rdatas {
            image.extend_from_slice(&owner_wire);
            image.extend_from_slice(&type_value.to_be_bytes());
            image.extend_from_slice(&class_value.to_be_bytes());
            image.extend_from_slice(&original_ttl.to_be_bytes());
            image.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
            image.extend_from_slice(rdata);
        }

        trace!(
            "Canonical {} {} RRset: {} records, {} octets",
            name::name_to_string(&first.labels),
            type_covered,
            rdatas.len(),
            image.len()
        );

        Ok(Self {
            owner: first.labels.clone(),
            class: first.rclass,
            type_covered,
            original_ttl,
            record_count: rdatas.len(),
            image,
        })
    }

    /// Cache key for this RRset as signed by the given key.
    pub fn digest(&self, key_tag: u16, algorithm: DnsSecAlgorithm) -> RrsetDigest {
        let mut ctx = digest::Context::new(&digest::SHA256);
        ctx.update(&key_tag.to_be_bytes());
        ctx.update(&[algorithm.to_u8()]);
        ctx.update(&self.type_covered.to_u16().to_be_bytes());
        ctx.update(&self.image);

        let mut out = [0u8; 32];
        out.copy_from_slice(ctx.finish().as_ref());
        RrsetDigest(out)
    }
}

/// SHA-256 identity of a canonical RRset under a given key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RrsetDigest(pub [u8; 32]);

impl fmt::Debug for RrsetDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RrsetDigest({})", self)
    }
}

impl fmt::Display for RrsetDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0[..8]))
    }
}

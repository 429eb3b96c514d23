use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::debug;

use super::errors::{DenialError, SignError};
use crate::dns::enums::{DNSResourceClass, DNSResourceType};
use crate::dns::name::{self, canonical_cmp};
use crate::dns::resource::DNSResource;
use crate::zone::{ZoneError, ZoneOrdering};

/// An NSEC record (RFC 4034 §4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nsec {
    pub owner: Vec<String>,
    pub next: Vec<String>,
    pub types: BTreeSet<u16>,
}

impl Nsec {
    pub fn has_type(&self, rtype: DNSResourceType) -> bool {
        self.types.contains(&rtype.to_u16())
    }

    /// Whether `qname` falls strictly between owner and next, treating the
    /// last NSEC of the chain (next = apex) as wrapping.
    pub fn covers(&self, qname: &[String]) -> bool {
        use std::cmp::Ordering::*;
        let after_owner = canonical_cmp(&self.owner, qname) == Less;
        let before_next = canonical_cmp(qname, &self.next) == Less;
        if canonical_cmp(&self.owner, &self.next) == Less {
            after_owner && before_next
        } else {
            after_owner || before_next
        }
    }

    pub fn rdata(&self) -> Vec<u8> {
        let mut rdata = Vec::new();
        name::write_name(&self.next, &mut rdata);
        rdata.extend_from_slice(&types_to_bitmap(self.types.iter().copied()));
        rdata
    }

    pub fn to_resource(&self, class: DNSResourceClass, ttl: u32) -> DNSResource {
        DNSResource {
            labels: self.owner.clone(),
            rtype: DNSResourceType::NSEC,
            rclass: class,
            ttl,
            rdata: self.rdata(),
        }
    }

    pub fn from_resource(record: &DNSResource) -> Result<Self, SignError> {
        let malformed = |reason: &str| SignError::MalformedRdata {
            rtype: DNSResourceType::NSEC,
            reason: reason.to_string(),
        };
        if record.rtype != DNSResourceType::NSEC {
            return Err(malformed("not an NSEC record"));
        }

        let mut next = Vec::new();
        let mut pos = 0;
        loop {
            let len = *record
                .rdata
                .get(pos)
                .ok_or_else(|| malformed("truncated next name"))? as usize;
            pos += 1;
            if len == 0 {
                break;
            }
            let label = record
                .rdata
                .get(pos..pos + len)
                .filter(|_| len <= name::MAX_LABEL_LEN)
                .ok_or_else(|| malformed("bad next name"))?;
            next.push(String::from_utf8_lossy(label).into_owned());
            pos += len;
        }

        let types = bitmap_to_types(&record.rdata[pos..]).ok_or_else(|| malformed("bad type bitmap"))?;
        Ok(Self {
            owner: name::trim_root(&record.labels).to_vec(),
            next,
            types: types.into_iter().collect(),
        })
    }
}

impl fmt::Display for Nsec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} NSEC {}",
            name::name_to_string(&self.owner),
            name::name_to_string(&self.next)
        )?;
        for &t in &self.types {
            write!(f, " {}", DNSResourceType::from(t))?;
        }
        Ok(())
    }
}

/// Encode types as an NSEC type bitmap (RFC 4034 §4.1.2).
pub fn types_to_bitmap(types: impl IntoIterator<Item = u16>) -> Vec<u8> {
    let mut windows: BTreeMap<u8, Vec<u8>> = BTreeMap::new();
    for type_num in types {
        let window = (type_num >> 8) as u8;
        let offset = (type_num & 0xff) as u8;
        let bits = windows.entry(window).or_default();
        let byte_idx = usize::from(offset / 8);
        if bits.len() <= byte_idx {
            bits.resize(byte_idx + 1, 0);
        }
        bits[byte_idx] |= 0x80 >> (offset % 8);
    }

    let mut bitmap = Vec::new();
    for (window, bits) in windows {
        bitmap.push(window);
        bitmap.push(bits.len() as u8);
        bitmap.extend(bits);
    }
    bitmap
}

/// Decode an NSEC type bitmap. Returns `None` on malformed input.
pub fn bitmap_to_types(mut bitmap: &[u8]) -> Option<Vec<u16>> {
    let mut types = Vec::new();
    let mut last_window = None;
    while !bitmap.is_empty() {
        let [window, len, rest @ ..] = bitmap else {
            return None;
        };
        let len = usize::from(*len);
        if len == 0 || len > 32 || rest.len() < len || last_window >= Some(*window) {
            return None;
        }
        for (byte_idx, byte) in rest[..len].iter().enumerate() {
            for bit in 0..8 {
                if byte & (0x80 >> bit) != 0 {
                    types.push(u16::from(*window) << 8 | (byte_idx * 8 + bit) as u16);
                }
            }
        }
        last_window = Some(*window);
        bitmap = &rest[len..];
    }
    Some(types)
}

/// Builds the NSEC record proving a negative answer.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenialSynthesizer;

impl DenialSynthesizer {
    pub fn new() -> Self {
        Self
    }

    /// NSEC denying `qname` (NXDOMAIN) or `qtype` at `qname` (NODATA),
    /// depending on whether the name exists in `zone`.
    pub fn synthesize(
        &self,
        qname: &[String],
        qtype: DNSResourceType,
        zone: &dyn ZoneOrdering,
    ) -> Result<Nsec, DenialError> {
        let qname = name::trim_root(qname);

        let nsec = match zone.types_at(qname).map_err(unavailable)? {
            Some(present) => {
                let types = present
                    .into_iter()
                    .filter(|&t| t != qtype)
                    .map(DNSResourceType::to_u16)
                    .chain(chain_types())
                    .collect();
                Nsec {
                    owner: qname.to_vec(),
                    next: zone.successor(qname).map_err(unavailable)?,
                    types,
                }
            }
            None => {
                let owner = zone.predecessor(qname).map_err(unavailable)?;
                let present = zone.types_at(&owner).map_err(unavailable)?.ok_or_else(|| {
                    DenialError::ZoneOrderUnavailable(format!(
                        "predecessor {} has no records",
                        name::name_to_string(&owner)
                    ))
                })?;
                Nsec {
                    next: zone.successor(&owner).map_err(unavailable)?,
                    types: present
                        .into_iter()
                        .map(DNSResourceType::to_u16)
                        .chain(chain_types())
                        .collect(),
                    owner,
                }
            }
        };

        debug!("Synthesized denial for {} {}: {}", name::name_to_string(qname), qtype, nsec);
        Ok(nsec)
    }
}

fn chain_types() -> [u16; 2] {
    [DNSResourceType::RRSIG.to_u16(), DNSResourceType::NSEC.to_u16()]
}

fn unavailable(err: ZoneError) -> DenialError {
    DenialError::ZoneOrderUnavailable(err.to_string())
}

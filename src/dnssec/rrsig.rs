use std::fmt;

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::DateTime;

use super::DnsSecAlgorithm;
use super::errors::SignError;
use crate::dns::enums::{DNSResourceClass, DNSResourceType};
use crate::dns::name;
use crate::dns::resource::DNSResource;

/// Fixed-size part of the RRSIG RDATA before the signer name
const RRSIG_FIXED_LEN: usize = 18;

/// A signature over one RRset (RFC 4034 §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rrsig {
    pub type_covered: DNSResourceType,
    pub algorithm: DnsSecAlgorithm,
    pub labels: u8,
    pub original_ttl: u32,
    pub expiration: u32,
    pub inception: u32,
    pub key_tag: u16,
    pub signer_name: Vec<String>,
    pub signature: Vec<u8>,
}

impl Rrsig {
    /// RDATA up to and including the signer name; the first part of the
    /// signed data. The signer name is always in canonical form.
    pub fn rdata_without_signature(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(RRSIG_FIXED_LEN + 64);
        data.extend_from_slice(&self.type_covered.to_u16().to_be_bytes());
        data.push(self.algorithm.to_u8());
        data.push(self.labels);
        data.extend_from_slice(&self.original_ttl.to_be_bytes());
        data.extend_from_slice(&self.expiration.to_be_bytes());
        data.extend_from_slice(&self.inception.to_be_bytes());
        data.extend_from_slice(&self.key_tag.to_be_bytes());
        name::write_canonical_name(&self.signer_name, &mut data);
        data
    }

    pub fn to_rdata(&self) -> Vec<u8> {
        let mut data = self.rdata_without_signature();
        data.extend_from_slice(&self.signature);
        data
    }

    /// Wrap as a resource record. The owner and class are the covered
    /// RRset's; the TTL should be the RRset's live TTL.
    pub fn to_resource(&self, owner: &[String], class: DNSResourceClass, ttl: u32) -> DNSResource {
        DNSResource {
            labels: owner.to_vec(),
            rtype: DNSResourceType::RRSIG,
            rclass: class,
            ttl,
            rdata: self.to_rdata(),
        }
    }

    /// Parse RRSIG RDATA.
    pub fn from_rdata(rdata: &[u8]) -> Result<Self, SignError> {
        let malformed = |reason: &str| SignError::MalformedRdata {
            rtype: DNSResourceType::RRSIG,
            reason: reason.to_string(),
        };
        if rdata.len() < RRSIG_FIXED_LEN + 1 {
            return Err(malformed("truncated"));
        }

        let mut signer_name = Vec::new();
        let mut pos = RRSIG_FIXED_LEN;
        loop {
            let len = *rdata.get(pos).ok_or_else(|| malformed("truncated signer name"))? as usize;
            pos += 1;
            if len == 0 {
                break;
            }
            if len > name::MAX_LABEL_LEN {
                return Err(malformed("compressed or oversized signer label"));
            }
            let label = rdata
                .get(pos..pos + len)
                .ok_or_else(|| malformed("truncated signer name"))?;
            signer_name.push(String::from_utf8_lossy(label).into_owned());
            pos += len;
        }

        let be32 = |at: usize| u32::from_be_bytes([rdata[at], rdata[at + 1], rdata[at + 2], rdata[at + 3]]);
        Ok(Self {
            type_covered: DNSResourceType::from(u16::from_be_bytes([rdata[0], rdata[1]])),
            algorithm: DnsSecAlgorithm::from_u8(rdata[2]),
            labels: rdata[3],
            original_ttl: be32(4),
            expiration: be32(8),
            inception: be32(12),
            key_tag: u16::from_be_bytes([rdata[16], rdata[17]]),
            signer_name,
            signature: rdata[pos..].to_vec(),
        })
    }

    /// Whether `now` lies inside the validity window, with serial number
    /// arithmetic on the 32-bit timestamps (RFC 4034 §3.1.5).
    pub fn is_valid_at(&self, now: u32) -> bool {
        serial_le(self.inception, now) && serial_le(now, self.expiration)
    }
}

/// `a <= b` in RFC 1982 serial number arithmetic
fn serial_le(a: u32, b: u32) -> bool {
    b.wrapping_sub(a) < 1 << 31
}

/// RRSIG timestamp in presentation format, `YYYYMMDDHHmmSS` UTC.
pub fn format_timestamp(timestamp: u32) -> String {
    match DateTime::from_timestamp(i64::from(timestamp), 0) {
        Some(time) => time.format("%Y%m%d%H%M%S").to_string(),
        None => timestamp.to_string(),
    }
}

impl fmt::Display for Rrsig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} {} {} {}",
            self.type_covered,
            self.algorithm.to_u8(),
            self.labels,
            self.original_ttl,
            format_timestamp(self.expiration),
            format_timestamp(self.inception),
            self.key_tag,
            name::name_to_string(&self.signer_name),
            STANDARD.encode(&self.signature)
        )
    }
}

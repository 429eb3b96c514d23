use std::fmt;

use super::{
    enums::{DNSResourceClass, DNSResourceType},
    name::{self, names_equal},
};

/// A resource record with its RDATA kept in uncompressed wire form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSResource {
    pub labels: Vec<String>,
    pub rtype: DNSResourceType,
    pub rclass: DNSResourceClass,
    pub ttl: u32,
    pub rdata: Vec<u8>,
}

impl DNSResource {
    pub fn new(owner: &str, rtype: DNSResourceType, ttl: u32, rdata: Vec<u8>) -> Self {
        Self {
            labels: name::parse_name(owner),
            rtype,
            rclass: DNSResourceClass::IN,
            ttl,
            rdata,
        }
    }

    pub fn owner(&self) -> String {
        name::name_to_string(&self.labels)
    }

    /// Whether `other` belongs to the same RRset (owner, class and type).
    pub fn same_rrset(&self, other: &DNSResource) -> bool {
        self.rtype == other.rtype
            && self.rclass == other.rclass
            && names_equal(&self.labels, &other.labels)
    }
}

impl fmt::Display for DNSResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} \\# {}",
            self.owner(),
            self.ttl,
            self.rclass,
            self.rtype,
            self.rdata.len()
        )?;
        if !self.rdata.is_empty() {
            write!(f, " {}", hex::encode(&self.rdata))?;
        }
        Ok(())
    }
}

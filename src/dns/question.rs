use super::enums::{DNSResourceClass, DNSResourceType};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSQuestion {
    pub labels: Vec<String>,
    pub qtype: DNSResourceType,
    pub qclass: DNSResourceClass,
}

impl DNSQuestion {
    pub fn new(qname: &str, qtype: DNSResourceType) -> Self {
        Self {
            labels: super::name::parse_name(qname),
            qtype,
            qclass: DNSResourceClass::IN,
        }
    }
}

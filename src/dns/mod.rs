//! In-memory DNS message model.
//!
//! Wire parsing and encoding of whole messages belong to the server that
//! embeds this crate; the types here only carry what response signing needs.

pub mod enums;
pub mod header;
pub mod name;
pub mod question;
pub mod resource;

use enums::{DNSResourceType, ResponseCode};
use header::DNSHeader;
use question::DNSQuestion;
use resource::DNSResource;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DNSPacket {
    pub header: DNSHeader,
    pub questions: Vec<DNSQuestion>,
    pub answers: Vec<DNSResource>,
    pub authorities: Vec<DNSResource>,
    pub resources: Vec<DNSResource>,
}

impl DNSPacket {
    /// Start a response to `query`, copying its id and question.
    pub fn response_to(query: &DNSPacket) -> Self {
        let mut packet = DNSPacket {
            header: DNSHeader {
                id: query.header.id,
                qr: true,
                opcode: query.header.opcode,
                rd: query.header.rd,
                ..Default::default()
            },
            questions: query.questions.clone(),
            ..Default::default()
        };
        packet.update_counts();
        packet
    }

    pub fn rcode(&self) -> Option<ResponseCode> {
        ResponseCode::from_u8(self.header.rcode)
    }

    pub fn set_rcode(&mut self, rcode: ResponseCode) {
        self.header.rcode = rcode.to_u8();
    }

    /// Whether the response denies a name (NXDOMAIN) or a type (NODATA).
    pub fn is_negative(&self) -> bool {
        match self.rcode() {
            Some(ResponseCode::NameError) => true,
            Some(ResponseCode::NoError) => {
                !self.questions.is_empty()
                    && !self
                        .answers
                        .iter()
                        .any(|rr| rr.rtype != DNSResourceType::RRSIG)
            }
            _ => false,
        }
    }

    /// Recompute the header section counts from the section contents.
    pub fn update_counts(&mut self) {
        self.header.qdcount = self.questions.len() as u16;
        self.header.ancount = self.answers.len() as u16;
        self.header.nscount = self.authorities.len() as u16;
        self.header.arcount = self.resources.len() as u16;
    }

    /// Check header counts against the sections.
    pub fn valid(&self) -> bool {
        self.header.qdcount as usize == self.questions.len()
            && self.header.ancount as usize == self.answers.len()
            && self.header.nscount as usize == self.authorities.len()
            && self.header.arcount as usize == self.resources.len()
    }
}

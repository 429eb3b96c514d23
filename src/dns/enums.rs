use std::fmt;
use std::str::FromStr;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum DNSResourceType {
    #[default]
    A,
    NS,
    MD,
    MF,
    CNAME,
    SOA,
    MB,
    MG,
    MR,
    PTR,
    HINFO,
    MINFO,
    MX,
    TXT,
    RP,
    AFSDB,
    RT,
    AAAA,
    SRV,
    KX,
    DNAME,
    OPT,
    DS,
    SSHFP,
    RRSIG,
    NSEC,
    DNSKEY,
    TLSA,
    HTTPS,
    CAA,
    /// Any type without a dedicated variant, kept by number
    Unknown(u16),
}

impl From<u16> for DNSResourceType {
    fn from(value: u16) -> Self {
        match value {
            1 => DNSResourceType::A,
            2 => DNSResourceType::NS,
            3 => DNSResourceType::MD,
            4 => DNSResourceType::MF,
            5 => DNSResourceType::CNAME,
            6 => DNSResourceType::SOA,
            7 => DNSResourceType::MB,
            8 => DNSResourceType::MG,
            9 => DNSResourceType::MR,
            12 => DNSResourceType::PTR,
            13 => DNSResourceType::HINFO,
            14 => DNSResourceType::MINFO,
            15 => DNSResourceType::MX,
            16 => DNSResourceType::TXT,
            17 => DNSResourceType::RP,
            18 => DNSResourceType::AFSDB,
            21 => DNSResourceType::RT,
            28 => DNSResourceType::AAAA,
            33 => DNSResourceType::SRV,
            36 => DNSResourceType::KX,
            39 => DNSResourceType::DNAME,
            41 => DNSResourceType::OPT,
            43 => DNSResourceType::DS,
            44 => DNSResourceType::SSHFP,
            46 => DNSResourceType::RRSIG,
            47 => DNSResourceType::NSEC,
            48 => DNSResourceType::DNSKEY,
            52 => DNSResourceType::TLSA,
            65 => DNSResourceType::HTTPS,
            257 => DNSResourceType::CAA,
            x => DNSResourceType::Unknown(x),
        }
    }
}

impl From<DNSResourceType> for u16 {
    fn from(value: DNSResourceType) -> Self {
        match value {
            DNSResourceType::A => 1,
            DNSResourceType::NS => 2,
            DNSResourceType::MD => 3,
            DNSResourceType::MF => 4,
            DNSResourceType::CNAME => 5,
            DNSResourceType::SOA => 6,
            DNSResourceType::MB => 7,
            DNSResourceType::MG => 8,
            DNSResourceType::MR => 9,
            DNSResourceType::PTR => 12,
            DNSResourceType::HINFO => 13,
            DNSResourceType::MINFO => 14,
            DNSResourceType::MX => 15,
            DNSResourceType::TXT => 16,
            DNSResourceType::RP => 17,
            DNSResourceType::AFSDB => 18,
            DNSResourceType::RT => 21,
            DNSResourceType::AAAA => 28,
            DNSResourceType::SRV => 33,
            DNSResourceType::KX => 36,
            DNSResourceType::DNAME => 39,
            DNSResourceType::OPT => 41,
            DNSResourceType::DS => 43,
            DNSResourceType::SSHFP => 44,
            DNSResourceType::RRSIG => 46,
            DNSResourceType::NSEC => 47,
            DNSResourceType::DNSKEY => 48,
            DNSResourceType::TLSA => 52,
            DNSResourceType::HTTPS => 65,
            DNSResourceType::CAA => 257,
            DNSResourceType::Unknown(x) => x,
        }
    }
}

impl DNSResourceType {
    pub fn to_u16(self) -> u16 {
        self.into()
    }

    fn mnemonic(self) -> Option<&'static str> {
        let name = match self {
            DNSResourceType::A => "A",
            DNSResourceType::NS => "NS",
            DNSResourceType::MD => "MD",
            DNSResourceType::MF => "MF",
            DNSResourceType::CNAME => "CNAME",
            DNSResourceType::SOA => "SOA",
            DNSResourceType::MB => "MB",
            DNSResourceType::MG => "MG",
            DNSResourceType::MR => "MR",
            DNSResourceType::PTR => "PTR",
            DNSResourceType::HINFO => "HINFO",
            DNSResourceType::MINFO => "MINFO",
            DNSResourceType::MX => "MX",
            DNSResourceType::TXT => "TXT",
            DNSResourceType::RP => "RP",
            DNSResourceType::AFSDB => "AFSDB",
            DNSResourceType::RT => "RT",
            DNSResourceType::AAAA => "AAAA",
            DNSResourceType::SRV => "SRV",
            DNSResourceType::KX => "KX",
            DNSResourceType::DNAME => "DNAME",
            DNSResourceType::OPT => "OPT",
            DNSResourceType::DS => "DS",
            DNSResourceType::SSHFP => "SSHFP",
            DNSResourceType::RRSIG => "RRSIG",
            DNSResourceType::NSEC => "NSEC",
            DNSResourceType::DNSKEY => "DNSKEY",
            DNSResourceType::TLSA => "TLSA",
            DNSResourceType::HTTPS => "HTTPS",
            DNSResourceType::CAA => "CAA",
            DNSResourceType::Unknown(_) => return None,
        };
        Some(name)
    }
}

impl fmt::Display for DNSResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mnemonic() {
            Some(name) => f.write_str(name),
            // RFC 3597 generic form
            None => write!(f, "TYPE{}", self.to_u16()),
        }
    }
}

impl FromStr for DNSResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        if let Some(number) = upper.strip_prefix("TYPE") {
            return number
                .parse::<u16>()
                .map(DNSResourceType::from)
                .map_err(|_| format!("invalid record type: {}", s));
        }

        // Every named variant maps back from its number, so probing the
        // well-known range is enough.
        (0..=u16::from(DNSResourceType::CAA))
            .map(DNSResourceType::from)
            .find(|t| t.mnemonic() == Some(upper.as_str()))
            .ok_or_else(|| format!("unknown record type: {}", s))
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum DNSResourceClass {
    #[default]
    IN,
    CS,
    CH,
    HS,
    Unknown(u16),
}

impl From<u16> for DNSResourceClass {
    fn from(value: u16) -> Self {
        match value {
            1 => DNSResourceClass::IN,
            2 => DNSResourceClass::CS,
            3 => DNSResourceClass::CH,
            4 => DNSResourceClass::HS,
            x => DNSResourceClass::Unknown(x),
        }
    }
}

impl From<DNSResourceClass> for u16 {
    fn from(value: DNSResourceClass) -> Self {
        match value {
            DNSResourceClass::IN => 1,
            DNSResourceClass::CS => 2,
            DNSResourceClass::CH => 3,
            DNSResourceClass::HS => 4,
            DNSResourceClass::Unknown(x) => x,
        }
    }
}

impl fmt::Display for DNSResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DNSResourceClass::IN => f.write_str("IN"),
            DNSResourceClass::CS => f.write_str("CS"),
            DNSResourceClass::CH => f.write_str("CH"),
            DNSResourceClass::HS => f.write_str("HS"),
            DNSResourceClass::Unknown(x) => write!(f, "CLASS{}", x),
        }
    }
}

impl FromStr for DNSResourceClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "IN" => Ok(DNSResourceClass::IN),
            "CS" => Ok(DNSResourceClass::CS),
            "CH" => Ok(DNSResourceClass::CH),
            "HS" => Ok(DNSResourceClass::HS),
            other => other
                .strip_prefix("CLASS")
                .and_then(|n| n.parse::<u16>().ok())
                .map(DNSResourceClass::from)
                .ok_or_else(|| format!("unknown class: {}", s)),
        }
    }
}

/// DNS response codes (RFC 1035)
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseCode {
    #[default]
    NoError = 0,
    FormatError = 1,
    ServerFailure = 2,
    NameError = 3,
    NotImplemented = 4,
    Refused = 5,
}

impl ResponseCode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::NoError),
            1 => Some(Self::FormatError),
            2 => Some(Self::ServerFailure),
            3 => Some(Self::NameError),
            4 => Some(Self::NotImplemented),
            5 => Some(Self::Refused),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_number_round_trip() {
        for n in [1u16, 2, 6, 15, 28, 46, 47, 48, 257, 65280] {
            assert_eq!(u16::from(DNSResourceType::from(n)), n);
        }
        assert_eq!(DNSResourceType::from(99), DNSResourceType::Unknown(99));
    }

    #[test]
    fn test_type_parse_and_display() {
        assert_eq!("aaaa".parse::<DNSResourceType>(), Ok(DNSResourceType::AAAA));
        assert_eq!("DNSKEY".parse::<DNSResourceType>(), Ok(DNSResourceType::DNSKEY));
        assert_eq!(
            "TYPE65280".parse::<DNSResourceType>(),
            Ok(DNSResourceType::Unknown(65280))
        );
        assert!("BOGUS".parse::<DNSResourceType>().is_err());

        assert_eq!(DNSResourceType::RRSIG.to_string(), "RRSIG");
        assert_eq!(DNSResourceType::Unknown(65280).to_string(), "TYPE65280");
    }

    #[test]
    fn test_class_parse() {
        assert_eq!("in".parse::<DNSResourceClass>(), Ok(DNSResourceClass::IN));
        assert_eq!(
            "CLASS7".parse::<DNSResourceClass>(),
            Ok(DNSResourceClass::Unknown(7))
        );
    }
}

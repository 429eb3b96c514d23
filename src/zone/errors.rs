use std::fmt;

/// Zone ordering errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneError {
    /// The zone holds no names
    Empty,
    /// Name lies outside the zone apex
    OutOfZone(String),
    /// Backing store could not be consulted
    Unavailable(String),
}

impl fmt::Display for ZoneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "zone has no names"),
            Self::OutOfZone(name) => write!(f, "name {} is outside the zone", name),
            Self::Unavailable(msg) => write!(f, "zone unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ZoneError {}

pub type Result<T> = std::result::Result<T, ZoneError>;

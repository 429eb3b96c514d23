//! Canonical ordering of the names in a zone, as needed for NSEC chains.

pub mod errors;
pub mod sorted;

pub use errors::{Result, ZoneError};
pub use sorted::SortedZone;

use crate::dns::enums::DNSResourceType;

/// Read access to the names of one zone in canonical order.
///
/// Implementations are consulted while a response is being signed, so they
/// must be cheap and must not block on the network.
pub trait ZoneOrdering: Send + Sync {
    /// The zone apex; the first name in canonical order.
    fn apex(&self) -> Result<Vec<String>>;

    /// Types present at `name`, or `None` if the name does not exist.
    fn types_at(&self, name: &[String]) -> Result<Option<Vec<DNSResourceType>>>;

    /// The last existing name strictly before `name`, wrapping to the last
    /// name of the zone.
    fn predecessor(&self, name: &[String]) -> Result<Vec<String>>;

    /// The first existing name strictly after `name`, wrapping to the apex.
    fn successor(&self, name: &[String]) -> Result<Vec<String>>;
}

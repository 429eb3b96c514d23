pub mod cache;
pub mod clock;
pub mod config;
pub mod dns;
pub mod dnssec;
pub mod error;
pub mod response;
pub mod zone;

pub use cache::SignatureCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SignerConfig;
pub use dns::DNSPacket;
pub use error::{ConfigError, Error, Result};
pub use response::{ResponseError, ResponseSigner, SignFailurePolicy, SignReport};
pub use zone::{SortedZone, ZoneOrdering};

//! DNSSEC online signing: key material, canonical form, RRSIG generation
//! and authenticated denial.

pub mod algorithm;
pub mod canonical;
pub mod denial;
pub mod errors;
pub mod identity;
pub mod key_tag;
pub mod keyfile;
pub mod rrsig;
pub mod signer;
pub mod verify;

pub use algorithm::DnsSecAlgorithm;
pub use canonical::{CanonicalRRset, RrsetDigest};
pub use denial::{DenialSynthesizer, Nsec};
pub use errors::{DenialError, KeyLoadError, SignError, VerifyError};
pub use identity::{Dnskey, SigningIdentity};
pub use key_tag::calculate_key_tag;
pub use keyfile::load_key_pair;
pub use rrsig::Rrsig;
pub use signer::{Signer, SigningPolicy};
pub use verify::verify_rrsig;

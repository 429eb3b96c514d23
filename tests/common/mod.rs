//! Shared fixtures for the integration tests.

#![allow(dead_code)] // each test binary uses a different subset

use std::path::PathBuf;
use std::sync::Arc;

use dnssec_signer::clock::ManualClock;
use dnssec_signer::dns::DNSPacket;
use dnssec_signer::dns::enums::DNSResourceType;
use dnssec_signer::dns::question::DNSQuestion;
use dnssec_signer::dns::resource::DNSResource;
use dnssec_signer::dnssec::{SigningIdentity, load_key_pair};

pub const ED25519_KEY: &str = "Kexample.com.+015+03180";
pub const ECDSA_P256_KEY: &str = "Kexample.com.+013+14542";
pub const RSA_SHA256_KEY: &str = "Kexample.com.+008+50151";

pub const ALL_KEYS: [&str; 3] = [ED25519_KEY, ECDSA_P256_KEY, RSA_SHA256_KEY];

/// 2023-11-14T22:13:20Z
pub const NOW: u32 = 1_700_000_000;

pub fn data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("data")
}

pub fn key_basename(name: &str) -> PathBuf {
    data_dir().join(name)
}

pub fn load_identity(name: &str) -> Arc<SigningIdentity> {
    Arc::new(load_key_pair(key_basename(name)).expect("fixture key loads"))
}

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(NOW))
}

pub fn a_record(owner: &str, ttl: u32, addr: [u8; 4]) -> DNSResource {
    DNSResource::new(owner, DNSResourceType::A, ttl, addr.to_vec())
}

/// `www.Example.com. A {192.0.2.2, 192.0.2.1}` in deliberately non-canonical
/// order and case.
pub fn www_rrset(ttl: u32) -> Vec<DNSResource> {
    vec![
        a_record("www.Example.com.", ttl, [192, 0, 2, 2]),
        a_record("www.Example.com.", ttl, [192, 0, 2, 1]),
    ]
}

/// An empty NOERROR response to `qname`/`qtype`.
pub fn response_for(qname: &str, qtype: DNSResourceType) -> DNSPacket {
    let mut query = DNSPacket::default();
    query.header.id = 4242;
    query.questions.push(DNSQuestion::new(qname, qtype));
    query.update_counts();
    DNSPacket::response_to(&query)
}

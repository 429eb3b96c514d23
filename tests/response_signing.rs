mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::*;
use dnssec_signer::dns::DNSPacket;
use dnssec_signer::dns::enums::{DNSResourceClass, DNSResourceType, ResponseCode};
use dnssec_signer::dns::name::{self, names_equal};
use dnssec_signer::dns::resource::DNSResource;
use dnssec_signer::dnssec::{Dnskey, Nsec, Rrsig, SigningPolicy, verify_rrsig};
use dnssec_signer::{ManualClock, ResponseSigner, SignFailurePolicy, SignerConfig, SortedZone};

fn soa_rdata() -> Vec<u8> {
    let mut rdata = Vec::new();
    name::write_name(&name::parse_name("ns1.example.com"), &mut rdata);
    name::write_name(&name::parse_name("hostmaster.example.com"), &mut rdata);
    for value in [2023111401u32, 7200, 3600, 1_209_600, 300] {
        rdata.extend_from_slice(&value.to_be_bytes());
    }
    rdata
}

fn zone() -> Arc<SortedZone> {
    let zone = SortedZone::new("example.com");
    for (owner, rtype) in [
        ("example.com", DNSResourceType::SOA),
        ("example.com", DNSResourceType::NS),
        ("a.example.com", DNSResourceType::A),
        ("c.example.com", DNSResourceType::A),
        ("c.example.com", DNSResourceType::TXT),
        ("e.example.com", DNSResourceType::A),
    ] {
        zone.add_type(&name::parse_name(owner), rtype).unwrap();
    }
    Arc::new(zone)
}

fn responder(key: &str, clock: Arc<ManualClock>) -> ResponseSigner {
    ResponseSigner::new(load_identity(key), SigningPolicy::default(), 1_000, clock)
        .with_zone(zone())
}

/// Verify every RRSIG in `section` against the RRset it covers.
fn verify_section(dnskey: &Dnskey, section: &[DNSResource], now: u32) -> usize {
    let mut verified = 0;
    for sig in section.iter().filter(|rr| rr.rtype == DNSResourceType::RRSIG) {
        let rrsig = Rrsig::from_rdata(&sig.rdata).unwrap();
        let rrset: Vec<DNSResource> = section
            .iter()
            .filter(|rr| rr.rtype == rrsig.type_covered && names_equal(&rr.labels, &sig.labels))
            .cloned()
            .collect();
        assert!(!rrset.is_empty(), "RRSIG without RRset: {}", sig);
        assert_eq!(verify_rrsig(dnskey, &rrsig, &rrset, now), Ok(()), "{}", sig);
        verified += 1;
    }
    verified
}

#[test]
fn test_positive_answer_verifies() {
    for key in ALL_KEYS {
        let signer = responder(key, manual_clock());
        let mut packet = response_for("www.example.com", DNSResourceType::A);
        packet.answers = www_rrset(300);
        packet.authorities = vec![DNSResource::new(
            "example.com",
            DNSResourceType::NS,
            86_400,
            {
                let mut rdata = Vec::new();
                name::write_name(&name::parse_name("ns1.example.com"), &mut rdata);
                rdata
            },
        )];

        let report = signer.sign_response(&mut packet).unwrap();
        assert_eq!(report.rrsets_signed, 2, "{}", key);
        assert!(!report.denial);
        assert!(packet.valid());

        let dnskey = signer.signer().identity().dnskey();
        assert_eq!(verify_section(dnskey, &packet.answers, NOW), 1);
        assert_eq!(verify_section(dnskey, &packet.authorities, NOW), 1);
    }
}

#[test]
fn test_nxdomain_proof() {
    let signer = responder(ED25519_KEY, manual_clock());
    let mut packet = response_for("b.example.com", DNSResourceType::A);
    packet.set_rcode(ResponseCode::NameError);
    packet.authorities = vec![DNSResource::new("example.com", DNSResourceType::SOA, 300, soa_rdata())];

    let report = signer.sign_response(&mut packet).unwrap();
    assert!(report.denial);
    assert_eq!(report.rrsets_signed, 2);
    assert_eq!(packet.rcode(), Some(ResponseCode::NameError));

    let nsec_record = packet
        .authorities
        .iter()
        .find(|rr| rr.rtype == DNSResourceType::NSEC)
        .unwrap();
    let nsec = Nsec::from_resource(nsec_record).unwrap();
    assert_eq!(nsec.owner, name::parse_name("a.example.com"));
    assert_eq!(nsec.next, name::parse_name("c.example.com"));
    assert!(nsec.covers(&name::parse_name("b.example.com")));

    let dnskey = signer.signer().identity().dnskey();
    assert_eq!(verify_section(dnskey, &packet.authorities, NOW), 2);
}

#[test]
fn test_nodata_proof() {
    let signer = responder(ECDSA_P256_KEY, manual_clock());
    let mut packet = response_for("c.example.com", DNSResourceType::MX);

    let report = signer.sign_response(&mut packet).unwrap();
    assert!(report.denial);

    let nsec = Nsec::from_resource(&packet.authorities[0]).unwrap();
    assert_eq!(nsec.owner, name::parse_name("c.example.com"));
    assert!(nsec.has_type(DNSResourceType::A));
    assert!(nsec.has_type(DNSResourceType::TXT));
    assert!(!nsec.has_type(DNSResourceType::MX));
    assert_eq!(
        verify_section(signer.signer().identity().dnskey(), &packet.authorities, NOW),
        1
    );
}

#[test]
fn test_existing_nsec_is_signed_not_replaced() {
    let signer = responder(ED25519_KEY, manual_clock());
    let mut packet = response_for("d.example.com", DNSResourceType::A);
    packet.set_rcode(ResponseCode::NameError);
    let supplied = Nsec {
        owner: name::parse_name("c.example.com"),
        next: name::parse_name("e.example.com"),
        types: [1, 16, 46, 47].into_iter().collect(),
    };
    packet
        .authorities
        .push(supplied.to_resource(DNSResourceClass::IN, 600));

    signer.sign_response(&mut packet).unwrap();
    let nsecs: Vec<_> = packet
        .authorities
        .iter()
        .filter(|rr| rr.rtype == DNSResourceType::NSEC)
        .collect();
    assert_eq!(nsecs.len(), 1);
    assert_eq!(nsecs[0].ttl, 600);
    assert_eq!(Nsec::from_resource(nsecs[0]).unwrap(), supplied);
}

#[test]
fn test_cached_signature_reused_across_responses() {
    let clock = manual_clock();
    let signer = responder(ECDSA_P256_KEY, clock.clone());

    let mut first = response_for("www.example.com", DNSResourceType::A);
    first.answers = www_rrset(300);
    signer.sign_response(&mut first).unwrap();

    // later response, lower TTL, different order: same RRset
    clock.advance(600);
    let mut second = response_for("WWW.example.com", DNSResourceType::A);
    second.answers = www_rrset(240);
    second.answers.reverse();
    signer.sign_response(&mut second).unwrap();

    assert_eq!(first.answers[2].rdata, second.answers[2].rdata);
    assert_eq!(second.answers[2].ttl, 240);
    assert_eq!(signer.cache().len(), 1);
}

#[test]
fn test_omit_policy_keeps_response() {
    let signer = responder(ED25519_KEY, manual_clock()).with_failure_policy(SignFailurePolicy::Omit);
    let mut packet = response_for("example.com", DNSResourceType::NS);
    // NS RDATA that is not a name
    packet.answers = vec![DNSResource::new("example.com", DNSResourceType::NS, 300, vec![7, 1])];

    let report = signer.sign_response(&mut packet).unwrap();
    assert_eq!(report.rrsets_failed, 1);
    assert_eq!(packet.answers.len(), 1);
    assert_eq!(packet.rcode(), Some(ResponseCode::NoError));
    assert_eq!(signer.failure_count(), 1);
}

#[tokio::test]
async fn test_async_signing() {
    let signer = Arc::new(responder(RSA_SHA256_KEY, manual_clock()));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let signer = Arc::clone(&signer);
            tokio::spawn(async move {
                let mut packet = response_for("www.example.com", DNSResourceType::A);
                packet.answers = www_rrset(300);
                signer.sign_response_async(packet).await
            })
        })
        .collect();

    let mut signatures = Vec::new();
    for task in tasks {
        let (packet, result): (DNSPacket, _) = task.await.unwrap();
        assert_eq!(result.unwrap().rrsets_signed, 1);
        assert_eq!(packet.header.id, 4242);
        signatures.push(packet.answers[2].rdata.clone());
    }
    assert!(signatures.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(signer.cache().stats().computes.load(Ordering::Relaxed), 1);
}

#[test]
fn test_tightest_valid_config_still_caches() {
    let config = SignerConfig {
        signature_validity_secs: 3 * 3600 + 24 * 3600 + 60,
        ..Default::default()
    };
    config.validate().unwrap();
    let signer = ResponseSigner::from_config(load_identity(ED25519_KEY), &config);

    for _ in 0..3 {
        let mut packet = response_for("www.example.com", DNSResourceType::A);
        packet.answers = www_rrset(300);
        assert_eq!(signer.sign_response(&mut packet).unwrap().rrsets_signed, 1);
    }
    assert_eq!(signer.cache().stats().computes.load(Ordering::Relaxed), 1);
    assert_eq!(signer.cache().stats().hits.load(Ordering::Relaxed), 2);
}

#[tokio::test]
async fn test_abandoned_caller_still_fills_cache() {
    let signer = Arc::new(responder(RSA_SHA256_KEY, manual_clock()));
    let mut packet = response_for("www.example.com", DNSResourceType::A);
    packet.answers = www_rrset(300);

    // the caller gives up right after the work is handed to the blocking pool
    let _ = tokio::time::timeout(
        Duration::from_nanos(1),
        Arc::clone(&signer).sign_response_async(packet),
    )
    .await;

    tokio::time::timeout(Duration::from_secs(5), async {
        while signer.cache().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(signer.cache().len(), 1);
    assert_eq!(signer.cache().stats().computes.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_async_failure_returns_servfail() {
    let signer = Arc::new(ResponseSigner::new(
        load_identity(ED25519_KEY),
        SigningPolicy::default(),
        10,
        manual_clock(),
    ));
    let mut packet = response_for("missing.example.com", DNSResourceType::A);
    packet.set_rcode(ResponseCode::NameError);

    let (packet, result) = signer.sign_response_async(packet).await;
    assert!(result.is_err());
    assert_eq!(packet.rcode(), Some(ResponseCode::ServerFailure));
    assert_eq!(packet.questions.len(), 1);
    assert!(packet.authorities.is_empty());
}

#[tokio::test]
async fn test_sweeper_purges_stale_signatures() {
    let clock = manual_clock();
    let signer = responder(ED25519_KEY, clock.clone());
    let mut packet = response_for("www.example.com", DNSResourceType::A);
    packet.answers = www_rrset(300);
    signer.sign_response(&mut packet).unwrap();
    assert_eq!(signer.cache().len(), 1);

    let sweeper = signer.cache().spawn_sweeper(Duration::from_millis(10));
    clock.advance(7 * 86_400);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(signer.cache().is_empty());

    // the sweeper stops once the cache is gone
    drop(signer);
    tokio::time::timeout(Duration::from_secs(1), sweeper)
        .await
        .unwrap()
        .unwrap();
}

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use common::*;
use dnssec_signer::Clock;
use dnssec_signer::SignatureCache;
use dnssec_signer::dns::enums::DNSResourceType;
use dnssec_signer::dnssec::{SignError, Signer, SigningPolicy, verify_rrsig};

const THREADS: usize = 16;

fn signer() -> Arc<Signer> {
    Arc::new(Signer::new(load_identity(ED25519_KEY), SigningPolicy::default()))
}

#[test]
fn test_repeated_lookups_share_one_signature() {
    let clock = manual_clock();
    let cache = SignatureCache::new(100, Duration::from_secs(3600), clock.clone());
    let signer = signer();
    let rrset = www_rrset(300);
    let digest = signer.digest(&rrset, DNSResourceType::A).unwrap();

    let computes = AtomicUsize::new(0);
    let sign = || {
        computes.fetch_add(1, Ordering::SeqCst);
        signer.sign(&rrset, DNSResourceType::A, clock.now(), Duration::from_secs(86_400))
    };

    let first = cache.get_or_compute(digest, sign).unwrap();
    let second = cache.get_or_compute(digest, sign).unwrap();
    assert_eq!(first, second);
    assert_eq!(computes.load(Ordering::SeqCst), 1);

    // same RRset in another order and case maps to the same entry
    let mut reordered = www_rrset(60);
    reordered.reverse();
    assert_eq!(signer.digest(&reordered, DNSResourceType::A).unwrap(), digest);
}

#[test]
fn test_concurrent_misses_compute_once() {
    let clock = manual_clock();
    let cache = Arc::new(SignatureCache::new(100, Duration::from_secs(3600), clock.clone()));
    let signer = signer();
    let rrset = Arc::new(www_rrset(300));
    let digest = signer.digest(&rrset, DNSResourceType::A).unwrap();
    let computes = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let signer = Arc::clone(&signer);
            let rrset = Arc::clone(&rrset);
            let computes = Arc::clone(&computes);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache
                    .get_or_compute(digest, || {
                        computes.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(50));
                        signer.sign(&rrset, DNSResourceType::A, NOW, Duration::from_secs(86_400))
                    })
                    .unwrap()
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(computes.load(Ordering::SeqCst), 1);
    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(
        verify_rrsig(signer.identity().dnskey(), &results[0], &rrset, NOW),
        Ok(())
    );
    assert_eq!(cache.stats().computes.load(Ordering::Relaxed), 1);
    assert_eq!(cache.stats().hits.load(Ordering::Relaxed), (THREADS - 1) as u64);
}

#[test]
fn test_distinct_rrsets_do_not_wait_on_each_other() {
    let clock = manual_clock();
    let cache = Arc::new(SignatureCache::new(100, Duration::from_secs(3600), clock));
    let signer = signer();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let cache = Arc::clone(&cache);
            let signer = Arc::clone(&signer);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let rrset = vec![a_record("www.example.com", 300, [192, 0, 2, i as u8])];
                let digest = signer.digest(&rrset, DNSResourceType::A).unwrap();
                barrier.wait();
                cache.get_or_compute(digest, || {
                    signer.sign(&rrset, DNSResourceType::A, NOW, Duration::from_secs(86_400))
                })
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap().is_ok());
    }
    assert_eq!(cache.len(), THREADS);
    assert_eq!(cache.stats().computes.load(Ordering::Relaxed), THREADS as u64);
}

#[test]
fn test_refresh_boundary() {
    let clock = manual_clock();
    let margin = 3600;
    let cache = SignatureCache::new(100, Duration::from_secs(margin), clock.clone());
    let signer = signer();
    let rrset = www_rrset(300);
    let digest = signer.digest(&rrset, DNSResourceType::A).unwrap();
    let sign = || signer.sign(&rrset, DNSResourceType::A, clock.now(), Duration::from_secs(86_400));

    let first = cache.get_or_compute(digest, sign).unwrap();
    let refresh_at = first.expiration - margin as u32;

    clock.set(refresh_at - 1);
    assert_eq!(cache.get_or_compute(digest, sign).unwrap(), first);

    clock.set(refresh_at);
    assert_eq!(cache.get(&digest), None);
    let renewed = cache.get_or_compute(digest, sign).unwrap();
    assert_eq!(renewed.inception, refresh_at);
    assert!(renewed.expiration > first.expiration);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_failure_does_not_poison_entry() {
    let clock = manual_clock();
    let cache = Arc::new(SignatureCache::new(100, Duration::from_secs(3600), clock));
    let signer = signer();
    let rrset = www_rrset(300);
    let digest = signer.digest(&rrset, DNSResourceType::A).unwrap();
    let barrier = Arc::new(Barrier::new(2));

    // one caller fails while another waits on the same digest
    let failing = {
        let cache = Arc::clone(&cache);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            cache.get_or_compute(digest, || {
                barrier.wait();
                thread::sleep(Duration::from_millis(20));
                Err(SignError::SigningPrimitiveFailure("hsm offline".to_string()))
            })
        })
    };
    barrier.wait();
    let waiting = cache.get_or_compute(digest, || {
        signer.sign(&rrset, DNSResourceType::A, NOW, Duration::from_secs(86_400))
    });

    assert!(matches!(failing.join().unwrap(), Err(SignError::SigningPrimitiveFailure(_))));
    assert!(waiting.is_ok());
    assert_eq!(cache.get(&digest), waiting.ok());
    assert_eq!(cache.stats().failures.load(Ordering::Relaxed), 1);
}

#[test]
fn test_capacity_bound() {
    let clock = manual_clock();
    let cache = SignatureCache::new(8, Duration::from_secs(3600), clock);
    let signer = signer();

    for i in 0..32u8 {
        let rrset = vec![a_record("host.example.com", 300, [198, 51, 100, i])];
        let digest = signer.digest(&rrset, DNSResourceType::A).unwrap();
        cache
            .get_or_compute(digest, || {
                signer.sign(&rrset, DNSResourceType::A, NOW, Duration::from_secs(86_400))
            })
            .unwrap();
        assert!(cache.len() <= cache.capacity());
    }

    // the most recent entry always survives
    let last = vec![a_record("host.example.com", 300, [198, 51, 100, 31])];
    let digest = signer.digest(&last, DNSResourceType::A).unwrap();
    assert!(cache.get(&digest).is_some());
    assert_eq!(cache.stats().evictions.load(Ordering::Relaxed), 24);
}

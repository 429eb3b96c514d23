//! Signing of whole responses: RRset grouping, RRSIG placement, negative
//! answers and the failure policy.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::SignatureCache;
use crate::clock::{Clock, SystemClock};
use crate::config::SignerConfig;
use crate::dns::DNSPacket;
use crate::dns::enums::{DNSResourceClass, DNSResourceType, ResponseCode};
use crate::dns::name::{self, names_equal};
use crate::dns::resource::DNSResource;
use crate::dnssec::{
    DenialError, DenialSynthesizer, Rrsig, SignError, Signer, SigningIdentity, SigningPolicy,
};
use crate::zone::ZoneOrdering;

/// What to do when an RRset cannot be signed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignFailurePolicy {
    /// Replace the whole response with SERVFAIL
    #[default]
    ServFail,
    /// Leave the RRset unsigned and carry on
    #[serde(alias = "omit-signature", alias = "omit_signature")]
    Omit,
}

impl FromStr for SignFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "servfail" => Ok(SignFailurePolicy::ServFail),
            "omit" | "omit-signature" | "omit_signature" => Ok(SignFailurePolicy::Omit),
            other => Err(format!("unknown signing failure policy: {}", other)),
        }
    }
}

impl fmt::Display for SignFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignFailurePolicy::ServFail => f.write_str("servfail"),
            SignFailurePolicy::Omit => f.write_str("omit"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ResponseError {
    #[error("failed to sign {owner} {rtype}: {source}")]
    Sign {
        owner: String,
        rtype: DNSResourceType,
        #[source]
        source: SignError,
    },

    #[error(transparent)]
    Denial(#[from] DenialError),

    #[error("signing task failed: {0}")]
    TaskFailed(String),
}

/// Outcome of signing one response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignReport {
    /// RRsets that received an RRSIG
    pub rrsets_signed: usize,
    /// RRsets that already carried an RRSIG and were left alone
    pub rrsets_presigned: usize,
    /// RRsets left unsigned under the omit policy
    pub rrsets_failed: usize,
    /// Whether an NSEC record was synthesized
    pub denial: bool,
}

/// Signs outgoing responses with one zone key.
///
/// Owns its signature cache; build one per zone and share it behind an `Arc`.
pub struct ResponseSigner {
    signer: Signer,
    cache: Arc<SignatureCache>,
    clock: Arc<dyn Clock>,
    zone: Option<Arc<dyn ZoneOrdering>>,
    denial: DenialSynthesizer,
    failure_policy: SignFailurePolicy,
    negative_ttl: u32,
    failures: AtomicU64,
}

impl ResponseSigner {
    pub fn new(
        identity: Arc<SigningIdentity>,
        policy: SigningPolicy,
        cache_capacity: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = SignatureCache::new(cache_capacity, policy.refresh_margin, clock.clone());
        Self {
            signer: Signer::new(identity, policy),
            cache: Arc::new(cache),
            clock,
            zone: None,
            denial: DenialSynthesizer::new(),
            failure_policy: SignFailurePolicy::default(),
            negative_ttl: 300,
            failures: AtomicU64::new(0),
        }
    }

    pub fn from_config(identity: Arc<SigningIdentity>, config: &SignerConfig) -> Self {
        Self::new(
            identity,
            config.signing_policy(),
            config.cache_capacity,
            Arc::new(SystemClock),
        )
        .with_failure_policy(config.failure_policy)
        .with_negative_ttl(config.negative_ttl)
    }

    /// Zone ordering used to prove negative answers.
    pub fn with_zone(mut self, zone: Arc<dyn ZoneOrdering>) -> Self {
        self.zone = Some(zone);
        self
    }

    pub fn with_failure_policy(mut self, policy: SignFailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// TTL of synthesized NSEC records.
    pub fn with_negative_ttl(mut self, ttl: u32) -> Self {
        self.negative_ttl = ttl;
        self
    }

    pub fn signer(&self) -> &Signer {
        &self.signer
    }

    pub fn cache(&self) -> &Arc<SignatureCache> {
        &self.cache
    }

    /// Signing failures seen so far, including denial failures.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    fn inception(&self) -> u32 {
        let skew = self.signer.policy().inception_skew.as_secs();
        self.clock
            .now()
            .saturating_sub(skew.min(u64::from(u32::MAX)) as u32)
    }

    /// Signature for one RRset, from the cache when still fresh.
    pub fn sign_rrset(&self, rrset: &[DNSResource]) -> Result<Rrsig, SignError> {
        let rtype = rrset.first().ok_or(SignError::EmptyRRset)?.rtype;
        let canonical = self.signer.canonicalize(rrset, rtype)?;
        let identity = self.signer.identity();
        let digest = canonical.digest(identity.key_tag(), identity.algorithm());

        self.cache.get_or_compute(digest, || {
            self.signer
                .sign_canonical(&canonical, self.inception(), self.signer.policy().validity)
        })
    }

    /// Add RRSIGs (and an NSEC proof for negative answers) to a response.
    ///
    /// On error the packet has already been turned into SERVFAIL and is
    /// ready to send.
    pub fn sign_response(&self, packet: &mut DNSPacket) -> Result<SignReport, ResponseError> {
        let mut report = SignReport::default();
        if !matches!(
            packet.rcode(),
            Some(ResponseCode::NoError) | Some(ResponseCode::NameError)
        ) {
            return Ok(report);
        }

        let mut denial_rrset = None;
        if packet.is_negative() && !packet.questions.is_empty() {
            match self.add_denial(packet) {
                Ok(owner) => {
                    report.denial = true;
                    denial_rrset = Some(owner);
                }
                Err(e) => {
                    self.record_failure(&e);
                    servfail(packet);
                    return Err(e);
                }
            }
        }

        let answers = std::mem::take(&mut packet.answers);
        let authorities = std::mem::take(&mut packet.authorities);
        let signed = self
            .sign_section(answers, None, &mut report)
            .and_then(|answers| {
                self.sign_section(authorities, denial_rrset.as_deref(), &mut report)
                    .map(|authorities| (answers, authorities))
            });

        match signed {
            Ok((answers, authorities)) => {
                packet.answers = answers;
                packet.authorities = authorities;
                packet.update_counts();
                debug!(
                    "Signed response {}: {} RRsets signed, {} reused, {} unsigned",
                    packet.header.id,
                    report.rrsets_signed,
                    report.rrsets_presigned,
                    report.rrsets_failed
                );
                Ok(report)
            }
            Err(e) => {
                servfail(packet);
                Err(e)
            }
        }
    }

    /// Sign on the blocking pool. The signing work runs to completion even if
    /// the returned future is dropped, so its signatures still reach the cache.
    pub async fn sign_response_async(
        self: Arc<Self>,
        packet: DNSPacket,
    ) -> (DNSPacket, Result<SignReport, ResponseError>) {
        let mut fallback = DNSPacket {
            header: packet.header.clone(),
            questions: packet.questions.clone(),
            ..Default::default()
        };

        let task = tokio::task::spawn_blocking(move || {
            let mut packet = packet;
            let result = self.sign_response(&mut packet);
            (packet, result)
        });

        match task.await {
            Ok(done) => done,
            Err(e) => {
                warn!("Signing task for response {} failed: {}", fallback.header.id, e);
                servfail(&mut fallback);
                (fallback, Err(ResponseError::TaskFailed(e.to_string())))
            }
        }
    }

    /// Append the NSEC proving the negative answer to the authority section;
    /// returns its owner.
    fn add_denial(&self, packet: &mut DNSPacket) -> Result<Vec<String>, ResponseError> {
        let question = &packet.questions[0];
        if let Some(existing) = packet
            .authorities
            .iter()
            .find(|rr| rr.rtype == DNSResourceType::NSEC)
        {
            return Ok(existing.labels.clone());
        }

        let zone = self.zone.as_deref().ok_or_else(|| {
            DenialError::ZoneOrderUnavailable("no zone ordering configured".to_string())
        })?;
        let nsec = self
            .denial
            .synthesize(&question.labels, question.qtype, zone)?;

        let class = match question.qclass {
            DNSResourceClass::Unknown(_) => DNSResourceClass::IN,
            class => class,
        };
        packet
            .authorities
            .push(nsec.to_resource(class, self.negative_ttl));
        Ok(nsec.owner)
    }

    /// Rebuild a section with each RRset followed by its RRSIG.
    fn sign_section(
        &self,
        records: Vec<DNSResource>,
        denial_owner: Option<&[String]>,
        report: &mut SignReport,
    ) -> Result<Vec<DNSResource>, ResponseError> {
        let (mut existing_sigs, rrsets) = group_rrsets(records);
        let mut out = Vec::new();

        for rrset in rrsets {
            let first = &rrset[0];
            let owner = first.labels.clone();
            let rtype = first.rtype;
            let class = first.rclass;
            let live_ttl = rrset.iter().map(|rr| rr.ttl).min().unwrap_or(0);
            out.extend(rrset.iter().cloned());

            let (covering, rest): (Vec<_>, Vec<_>) = existing_sigs
                .into_iter()
                .partition(|sig| covers(sig, &owner, rtype));
            existing_sigs = rest;
            if !covering.is_empty() {
                report.rrsets_presigned += 1;
                out.extend(covering);
                continue;
            }

            match self.sign_rrset(&rrset) {
                Ok(rrsig) => {
                    report.rrsets_signed += 1;
                    out.push(rrsig.to_resource(&owner, class, live_ttl));
                }
                Err(source) => {
                    let is_denial = rtype == DNSResourceType::NSEC
                        && denial_owner.is_some_and(|d| names_equal(d, &owner));
                    let err = ResponseError::Sign {
                        owner: name::name_to_string(&owner),
                        rtype,
                        source,
                    };
                    self.record_failure(&err);
                    if is_denial || self.failure_policy == SignFailurePolicy::ServFail {
                        return Err(err);
                    }
                    report.rrsets_failed += 1;
                }
            }
        }

        out.extend(existing_sigs);
        Ok(out)
    }

    fn record_failure(&self, err: &ResponseError) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        warn!("DNSSEC signing failed: {}", err);
    }
}

/// Split a section into RRsets in order of first appearance, setting aside
/// RRSIG and OPT records.
fn group_rrsets(records: Vec<DNSResource>) -> (Vec<DNSResource>, Vec<Vec<DNSResource>>) {
    let mut sigs = Vec::new();
    let mut rrsets: Vec<Vec<DNSResource>> = Vec::new();
    for record in records {
        match record.rtype {
            DNSResourceType::RRSIG => sigs.push(record),
            DNSResourceType::OPT => {}
            _ => match rrsets.iter_mut().find(|set| set[0].same_rrset(&record)) {
                Some(set) => set.push(record),
                None => rrsets.push(vec![record]),
            },
        }
    }
    (sigs, rrsets)
}

/// Whether an RRSIG record covers the RRset `owner`/`rtype`.
fn covers(sig: &DNSResource, owner: &[String], rtype: DNSResourceType) -> bool {
    sig.rdata.len() >= 2
        && DNSResourceType::from(u16::from_be_bytes([sig.rdata[0], sig.rdata[1]])) == rtype
        && names_equal(&sig.labels, owner)
}

/// Turn a response into an empty SERVFAIL, keeping only EDNS records.
fn servfail(packet: &mut DNSPacket) {
    packet.set_rcode(ResponseCode::ServerFailure);
    packet.header.aa = false;
    packet.answers.clear();
    packet.authorities.clear();
    packet.resources.retain(|rr| rr.rtype == DNSResourceType::OPT);
    packet.update_counts();
}

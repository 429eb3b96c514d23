use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use parking_lot::RwLock;
use tracing::debug;

use super::{Result, ZoneError, ZoneOrdering};
use crate::dns::enums::DNSResourceType;
use crate::dns::name::{self, canonical_cmp};
use crate::dns::resource::DNSResource;

/// Map key ordering names canonically (RFC 4034 §6.1)
#[derive(Debug, Clone)]
struct CanonicalName(Vec<String>);

impl PartialEq for CanonicalName {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CanonicalName {}

impl PartialOrd for CanonicalName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CanonicalName {
    fn cmp(&self, other: &Self) -> Ordering {
        canonical_cmp(&self.0, &other.0)
    }
}

/// In-memory zone index: owner names in canonical order with the types
/// present at each.
pub struct SortedZone {
    apex: Vec<String>,
    names: RwLock<BTreeMap<CanonicalName, BTreeSet<u16>>>,
}

impl SortedZone {
    pub fn new(apex: &str) -> Self {
        Self {
            apex: name::parse_name(apex),
            names: RwLock::new(BTreeMap::new()),
        }
    }

    /// Build a zone index from its records.
    pub fn from_records<'a>(
        apex: &str,
        records: impl IntoIterator<Item = &'a DNSResource>,
    ) -> Result<Self> {
        let zone = Self::new(apex);
        for record in records {
            zone.add_record(record)?;
        }
        Ok(zone)
    }

    fn in_zone(&self, labels: &[String]) -> bool {
        let labels = name::trim_root(labels);
        labels.len() >= self.apex.len()
            && name::names_equal(&labels[labels.len() - self.apex.len()..], &self.apex)
    }

    /// Record that `record`'s type exists at its owner name.
    pub fn add_record(&self, record: &DNSResource) -> Result<()> {
        self.add_type(&record.labels, record.rtype)
    }

    pub fn add_type(&self, owner: &[String], rtype: DNSResourceType) -> Result<()> {
        if !self.in_zone(owner) {
            return Err(ZoneError::OutOfZone(name::name_to_string(owner)));
        }
        let key = CanonicalName(name::trim_root(owner).to_vec());
        self.names.write().entry(key).or_default().insert(rtype.to_u16());
        Ok(())
    }

    /// Remove a whole name from the index; returns whether it existed.
    pub fn remove_name(&self, owner: &[String]) -> bool {
        let removed = self
            .names
            .write()
            .remove(&CanonicalName(name::trim_root(owner).to_vec()))
            .is_some();
        if removed {
            debug!("Removed {} from zone index", name::name_to_string(owner));
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.names.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.read().is_empty()
    }
}

impl ZoneOrdering for SortedZone {
    fn apex(&self) -> Result<Vec<String>> {
        if self.is_empty() {
            return Err(ZoneError::Empty);
        }
        Ok(self.apex.clone())
    }

    fn types_at(&self, owner: &[String]) -> Result<Option<Vec<DNSResourceType>>> {
        let names = self.names.read();
        if names.is_empty() {
            return Err(ZoneError::Empty);
        }
        Ok(names
            .get(&CanonicalName(name::trim_root(owner).to_vec()))
            .map(|types| types.iter().map(|&t| DNSResourceType::from(t)).collect()))
    }

    fn predecessor(&self, owner: &[String]) -> Result<Vec<String>> {
        let names = self.names.read();
        let key = CanonicalName(name::trim_root(owner).to_vec());
        names
            .range(..key)
            .next_back()
            .or_else(|| names.iter().next_back())
            .map(|(name, _)| name.0.clone())
            .ok_or(ZoneError::Empty)
    }

    fn successor(&self, owner: &[String]) -> Result<Vec<String>> {
        let names = self.names.read();
        let key = CanonicalName(name::trim_root(owner).to_vec());
        names
            .range((Bound::Excluded(key), Bound::Unbounded))
            .next()
            .or_else(|| names.iter().next())
            .map(|(name, _)| name.0.clone())
            .ok_or(ZoneError::Empty)
    }
}

//! Domain name helpers over label vectors.
//!
//! Names are carried as `Vec<String>` of labels without the root label, the
//! same shape the packet model uses. Everything here that produces signing
//! input applies the DNSSEC canonical form (RFC 4034 §6): ASCII lowercase,
//! uncompressed wire encoding.

use std::cmp::Ordering;

/// Maximum length of a single label in octets
pub const MAX_LABEL_LEN: usize = 63;

/// Maximum length of an encoded name in octets
pub const MAX_NAME_LEN: usize = 255;

/// Split a presentation-format name into labels.
///
/// Both `example.com` and `example.com.` yield the same labels; `.` and the
/// empty string yield the root (no labels).
pub fn parse_name(name: &str) -> Vec<String> {
    name.split('.')
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .collect()
}

/// Render labels as an absolute presentation-format name.
pub fn name_to_string(labels: &[String]) -> String {
    let labels = trim_root(labels);
    if labels.is_empty() {
        return ".".to_string();
    }
    let mut out = String::with_capacity(labels.iter().map(|l| l.len() + 1).sum());
    for label in labels {
        out.push_str(label);
        out.push('.');
    }
    out
}

/// Check that a name fits the wire-format limits.
pub fn is_valid_name(labels: &[String]) -> bool {
    let labels = trim_root(labels);
    let total: usize = labels.iter().map(|l| l.len() + 1).sum::<usize>() + 1;
    total <= MAX_NAME_LEN
        && labels
            .iter()
            .all(|l| !l.is_empty() && l.len() <= MAX_LABEL_LEN)
}

/// Append the canonical (lowercased) wire form of a name to `out`.
pub fn write_canonical_name(labels: &[String], out: &mut Vec<u8>) {
    for label in labels.iter().filter(|l| !l.is_empty()) {
        out.push(label.len() as u8);
        out.extend(label.bytes().map(|b| b.to_ascii_lowercase()));
    }
    out.push(0);
}

/// Canonical wire form of a name as a fresh buffer.
pub fn canonical_wire(labels: &[String]) -> Vec<u8> {
    let mut out = Vec::with_capacity(labels.iter().map(|l| l.len() + 1).sum::<usize>() + 1);
    write_canonical_name(labels, &mut out);
    out
}

/// Append the wire form of a name without changing case.
pub fn write_name(labels: &[String], out: &mut Vec<u8>) {
    for label in labels.iter().filter(|l| !l.is_empty()) {
        out.push(label.len() as u8);
        out.extend_from_slice(label.as_bytes());
    }
    out.push(0);
}

/// Drop a trailing empty root label, as left behind by wire parsers.
pub fn trim_root(labels: &[String]) -> &[String] {
    match labels.split_last() {
        Some((last, rest)) if last.is_empty() => rest,
        _ => labels,
    }
}

/// Case-insensitive name equality.
pub fn names_equal(a: &[String], b: &[String]) -> bool {
    let (a, b) = (trim_root(a), trim_root(b));
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|(x, y)| x.eq_ignore_ascii_case(y))
}

/// Canonical DNS name order (RFC 4034 §6.1).
///
/// Labels are compared right to left as lowercased octet strings; a name
/// that is a proper suffix of another sorts first.
pub fn canonical_cmp(a: &[String], b: &[String]) -> Ordering {
    let (a, b) = (trim_root(a), trim_root(b));
    for (x, y) in a.iter().rev().zip(b.iter().rev()) {
        let ord = x
            .bytes()
            .map(|c| c.to_ascii_lowercase())
            .cmp(y.bytes().map(|c| c.to_ascii_lowercase()));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

/// Value of the RRSIG labels field for an owner name.
///
/// The root and a leading wildcard label are not counted (RFC 4034 §3.1.3).
pub fn signature_label_count(labels: &[String]) -> u8 {
    let labels = trim_root(labels);
    let count = match labels.first() {
        Some(first) if first == "*" => labels.len() - 1,
        _ => labels.len(),
    };
    count.min(u8::MAX as usize) as u8
}

/// Lowercase an uncompressed wire-format name in place, starting at `start`.
///
/// Returns the offset just past the terminating root label, or `None` if the
/// data is truncated or contains a compression pointer.
pub fn lowercase_wire_name(data: &mut [u8], start: usize) -> Option<usize> {
    let mut pos = start;
    loop {
        let len = *data.get(pos)? as usize;
        if len == 0 {
            return Some(pos + 1);
        }
        if len > MAX_LABEL_LEN {
            return None;
        }
        let label = data.get_mut(pos + 1..pos + 1 + len)?;
        label.make_ascii_lowercase();
        pos += 1 + len;
    }
}

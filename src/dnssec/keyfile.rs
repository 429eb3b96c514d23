//! Loading of BIND-style key pairs (`K<zone>+<alg>+<tag>.key` / `.private`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use tracing::info;

use super::DnsSecAlgorithm;
use super::errors::KeyLoadError;
use super::identity::{Dnskey, PrivateKeyMaterial, RsaPrivateFields, SigningIdentity};
use crate::dns::enums::DNSResourceClass;
use crate::dns::name;

/// TTL used when the public key record does not carry one
pub const DEFAULT_DNSKEY_TTL: u32 = 3600;

/// Paths of the public and private halves for a key basename.
///
/// Basenames contain dots (`Kexample.com.+015+03180`), so the suffix is
/// appended rather than substituted.
pub fn key_file_paths(basename: impl AsRef<Path>) -> (PathBuf, PathBuf) {
    let base = basename.as_ref().as_os_str();
    let mut public = base.to_os_string();
    public.push(".key");
    let mut private = base.to_os_string();
    private.push(".private");
    (PathBuf::from(public), PathBuf::from(private))
}

/// Load and cross-check a key pair from `<basename>.key` and
/// `<basename>.private`.
pub fn load_key_pair(basename: impl AsRef<Path>) -> Result<SigningIdentity, KeyLoadError> {
    let (public_path, private_path) = key_file_paths(basename);

    let public_text = read_key_file(&public_path)?;
    let dnskey = parse_public_key(&public_text, &public_path)?;

    let private_text = read_key_file(&private_path)?;
    let material = parse_private_key(&private_text, &private_path)?;

    let identity = SigningIdentity::new(dnskey, &material)?;
    info!(
        "Loaded DNSSEC key for {}: algorithm {}, key tag {}",
        name::name_to_string(identity.signer_name()),
        identity.algorithm(),
        identity.key_tag()
    );
    Ok(identity)
}

impl SigningIdentity {
    /// Build an identity from a DNSKEY and the text of its private key file.
    pub fn from_parts(dnskey: Dnskey, private_text: &str) -> Result<Self, KeyLoadError> {
        let material = parse_private_key(private_text, Path::new("<private key>"))?;
        SigningIdentity::new(dnskey, &material)
    }
}

fn read_key_file(path: &Path) -> Result<String, KeyLoadError> {
    std::fs::read_to_string(path).map_err(|e| KeyLoadError::KeyFileMissing {
        path: path.to_path_buf(),
        source: Arc::new(e),
    })
}

/// Parse the first DNSKEY record in presentation format.
///
/// Accepts `;` comments, an optional TTL and class in either order, and a
/// parenthesised RDATA spread over several lines with the key split into
/// whitespace-separated base64 chunks.
pub fn parse_public_key(text: &str, path: &Path) -> Result<Dnskey, KeyLoadError> {
    let mut tokens = Vec::new();
    for line in text.lines() {
        let line = match line.find(';') {
            Some(pos) => &line[..pos],
            None => line,
        };
        tokens.extend(
            line.split_whitespace()
                .flat_map(|token| token.split(['(', ')']))
                .filter(|token| !token.is_empty()),
        );
    }

    let mut tokens = tokens.into_iter();
    let owner = tokens
        .next()
        .ok_or_else(|| KeyLoadError::malformed(path, "no resource record found"))?;

    let mut ttl = None;
    let mut class = None;
    let rtype = loop {
        let token = tokens
            .next()
            .ok_or_else(|| KeyLoadError::malformed(path, "record has no type"))?;
        if ttl.is_none() {
            if let Ok(value) = token.parse::<u32>() {
                ttl = Some(value);
                continue;
            }
        }
        if class.is_none() {
            if let Ok(value) = token.parse::<DNSResourceClass>() {
                class = Some(value);
                continue;
            }
        }
        break token;
    };

    if !rtype.eq_ignore_ascii_case("DNSKEY") {
        return Err(KeyLoadError::KeyTypeMismatch {
            found: rtype.to_ascii_uppercase(),
        });
    }

    let flags = tokens
        .next()
        .and_then(|t| t.parse::<u16>().ok())
        .ok_or_else(|| KeyLoadError::malformed(path, "invalid DNSKEY flags"))?;
    let protocol = tokens
        .next()
        .and_then(|t| t.parse::<u8>().ok())
        .ok_or_else(|| KeyLoadError::malformed(path, "invalid DNSKEY protocol"))?;
    let algorithm = tokens
        .next()
        .and_then(|t| t.parse::<DnsSecAlgorithm>().ok())
        .ok_or_else(|| KeyLoadError::malformed(path, "invalid DNSKEY algorithm"))?;

    let encoded: String = tokens.collect();
    if encoded.is_empty() {
        return Err(KeyLoadError::malformed(path, "DNSKEY has no public key"));
    }
    let public_key = STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| KeyLoadError::malformed(path, format!("invalid public key: {}", e)))?;

    let labels = name::parse_name(owner);
    if !name::is_valid_name(&labels) {
        return Err(KeyLoadError::malformed(path, format!("invalid owner name {}", owner)));
    }

    Ok(Dnskey {
        owner: labels,
        ttl: ttl.unwrap_or(DEFAULT_DNSKEY_TTL),
        class: class.unwrap_or(DNSResourceClass::IN),
        flags,
        protocol,
        algorithm,
        public_key,
    })
}

/// Parse a `Private-key-format: v1.x` private key file.
pub fn parse_private_key(text: &str, path: &Path) -> Result<PrivateKeyMaterial, KeyLoadError> {
    let mut entries = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(';'));

    let (key, format) = entries
        .next()
        .and_then(split_entry)
        .ok_or_else(|| KeyLoadError::malformed(path, "empty private key file"))?;
    if key != "Private-key-format" {
        return Err(KeyLoadError::malformed(path, "missing Private-key-format line"));
    }
    let minor = format
        .strip_prefix("v1.")
        .and_then(|minor| minor.parse::<u8>().ok())
        .ok_or_else(|| KeyLoadError::malformed(path, format!("unsupported format {}", format)))?;
    if minor < 2 {
        return Err(KeyLoadError::malformed(path, format!("unsupported format {}", format)));
    }

    let mut fields: HashMap<&str, &str> = HashMap::new();
    for line in entries {
        let (key, value) = split_entry(line)
            .ok_or_else(|| KeyLoadError::malformed(path, format!("unparseable line: {}", line)))?;
        if fields.insert(key, value).is_some() {
            return Err(KeyLoadError::malformed(path, format!("duplicate field {}", key)));
        }
    }

    let algorithm = fields
        .get("Algorithm")
        .and_then(|value| value.split_whitespace().next())
        .and_then(|number| number.parse::<u8>().ok())
        .map(DnsSecAlgorithm::from_u8)
        .ok_or_else(|| KeyLoadError::malformed(path, "missing or invalid Algorithm"))?;

    let decode = |field: &str| -> Result<Vec<u8>, KeyLoadError> {
        let value = fields
            .get(field)
            .ok_or_else(|| KeyLoadError::malformed(path, format!("missing field {}", field)))?;
        STANDARD
            .decode(value.as_bytes())
            .map_err(|e| KeyLoadError::malformed(path, format!("invalid {}: {}", field, e)))
    };

    if algorithm.is_rsa() {
        let fields = RsaPrivateFields {
            modulus: decode("Modulus")?,
            public_exponent: decode("PublicExponent")?,
            private_exponent: decode("PrivateExponent")?,
            prime1: decode("Prime1")?,
            prime2: decode("Prime2")?,
            exponent1: decode("Exponent1")?,
            exponent2: decode("Exponent2")?,
            coefficient: decode("Coefficient")?,
        };
        return Ok(PrivateKeyMaterial::Rsa { algorithm, fields });
    }

    let expected_len = algorithm
        .private_key_len()
        .ok_or(KeyLoadError::UnsupportedAlgorithm(algorithm.to_u8()))?;
    let key = decode("PrivateKey")?;
    if key.len() != expected_len {
        return Err(KeyLoadError::malformed(
            path,
            format!(
                "PrivateKey is {} bytes, {} expects {}",
                key.len(),
                algorithm,
                expected_len
            ),
        ));
    }
    Ok(PrivateKeyMaterial::Raw { algorithm, key })
}

fn split_entry(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    Some((key.trim(), value.trim()))
}

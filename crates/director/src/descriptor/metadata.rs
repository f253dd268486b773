//! Declared content hashes and side affinity, and the checks built on them

use std::fmt;
use std::path::Path;

use md5::Md5;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use crate::platform::Side;

/// Outcome of comparing a file on disk against declared hashes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashOutcome {
    Matched,
    Unmatched,
    /// No usable algorithm was declared or the file could not be read
    Unknown,
}

/// Optional metadata attached to a descriptor
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemoteMetadata {
    /// `(algorithm, expected hex)` pairs in declaration order
    #[serde(default, rename = "hash", deserialize_with = "ordered_pairs")]
    pub hashes: Vec<(String, String)>,
    #[serde(default)]
    pub side: Option<Side>,
}

impl RemoteMetadata {
    pub fn has_hashes(&self) -> bool {
        !self.hashes.is_empty()
    }
}

/// Digest algorithms available for verification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// Accepts names like `SHA-256`, `sha256` or `Sha-1`
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "md5" => Some(HashAlgorithm::Md5),
            "sha1" | "sha" => Some(HashAlgorithm::Sha1),
            "sha224" => Some(HashAlgorithm::Sha224),
            "sha256" => Some(HashAlgorithm::Sha256),
            "sha384" => Some(HashAlgorithm::Sha384),
            "sha512" => Some(HashAlgorithm::Sha512),
            _ => None,
        }
    }

    pub async fn digest_file(self, path: &Path) -> std::io::Result<Vec<u8>> {
        match self {
            HashAlgorithm::Md5 => digest_with::<Md5>(path).await,
            HashAlgorithm::Sha1 => digest_with::<Sha1>(path).await,
            HashAlgorithm::Sha224 => digest_with::<Sha224>(path).await,
            HashAlgorithm::Sha256 => digest_with::<Sha256>(path).await,
            HashAlgorithm::Sha384 => digest_with::<Sha384>(path).await,
            HashAlgorithm::Sha512 => digest_with::<Sha512>(path).await,
        }
    }
}

async fn digest_with<D: Digest>(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut file = fs::File::open(path).await?;
    let mut hasher = D::new();
    let mut buffer = vec![0u8; 64 * 1024];

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hasher.finalize().to_vec())
}

/// Compare `path` against the declared hashes.
///
/// Only the first algorithm this build supports is consulted.
pub async fn check_hashes(path: &Path, metadata: &RemoteMetadata) -> HashOutcome {
    if metadata.hashes.is_empty() {
        return HashOutcome::Unknown;
    }

    for (name, expected) in &metadata.hashes {
        let Some(algorithm) = HashAlgorithm::from_name(name) else {
            warn!("Hash algorithm {} is not supported", name);
            continue;
        };

        let digest = match algorithm.digest_file(path).await {
            Ok(digest) => digest,
            Err(e) => {
                warn!("Failed to open {} for hash calculation: {}", path.display(), e);
                return HashOutcome::Unknown;
            }
        };

        let outcome = if hex_matches(&digest, expected) {
            HashOutcome::Matched
        } else {
            HashOutcome::Unmatched
        };
        debug!("{} hash of {} is {:?}", name, path.display(), outcome);
        return outcome;
    }

    warn!("None of the given hash algorithms are supported");
    HashOutcome::Unknown
}

/// Lower-case comparison; leading zeros may be stripped down to 32 digits
fn hex_matches(digest: &[u8], expected: &str) -> bool {
    let expected = expected.trim().to_ascii_lowercase();
    let full = hex::encode(digest);
    if expected == full {
        return true;
    }

    let stripped = full.trim_start_matches('0');
    let padded = format!("{:0>32}", stripped);
    expected == padded
}

/// Whether a descriptor should be considered on `current` side
pub fn side_matches(metadata: Option<&RemoteMetadata>, current: Side) -> bool {
    match metadata.and_then(|m| m.side) {
        None | Some(Side::Unknown) => true,
        Some(side) => side == current,
    }
}

fn ordered_pairs<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct PairsVisitor;

    impl<'de> Visitor<'de> for PairsVisitor {
        type Value = Vec<(String, String)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of hash algorithm to hex digest")
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((alg, hex)) = map.next_entry::<String, String>()? {
                pairs.push((alg, hex));
            }
            Ok(pairs)
        }
    }

    deserializer.deserialize_any(PairsVisitor)
}

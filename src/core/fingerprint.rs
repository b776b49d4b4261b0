use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

pub type Fingerprint = String;

/// Synthetic fingerprints generated for an identity with no usable images.
pub const PLACEHOLDER_COUNT: usize = 3;
/// Length of the per-identity compatibility vector.
pub const ENCODING_DIM: usize = 128;

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Lowercase hex SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// First 8 hex characters of a content hash read as a base-16 integer.
pub fn seed_from_hash(hash: &str) -> u32 {
    let prefix = hash.get(..8).unwrap_or(hash);
    u32::from_str_radix(prefix, 16).unwrap_or(0)
}

pub fn name_seed(name: &str) -> u32 {
    seed_from_hash(&content_hash(name.as_bytes()))
}

pub fn placeholder_fingerprints(name: &str) -> Vec<Fingerprint> {
    (0..PLACEHOLDER_COUNT)
        .map(|i| content_hash(format!("{}_placeholder_{}", name, i).as_bytes()))
        .collect()
}

/// Vector-style stand-in for a face embedding, seeded from the name only.
pub fn placeholder_encoding(name: &str) -> Vec<f32> {
    let mut rng = ChaCha8Rng::seed_from_u64(name_seed(name) as u64);
    // 24 random mantissa bits in [0, 1)
    (0..ENCODING_DIM)
        .map(|_| (rng.next_u32() >> 8) as f32 / (1u32 << 24) as f32)
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct IdentityPrints {
    pub name: String,
    pub fingerprints: Vec<Fingerprint>,
    /// True when `fingerprints` are synthetic.
    pub placeholder: bool,
    pub encoding: Vec<f32>,
}

/// Fingerprints for every roster identity, in roster order.
#[derive(Debug, Clone, Default)]
pub struct FingerprintStore {
    identities: Vec<IdentityPrints>,
}

impl FingerprintStore {
    /// Builds the store from `reference_dir/{name}/*.{png,jpg,jpeg}`.
    ///
    /// Per-identity folders are created as needed. Unreadable files are
    /// skipped, and an identity left without fingerprints gets the
    /// placeholder set, so every entry is non-empty.
    pub fn load(roster: &[String], reference_dir: &Path) -> Self {
        let mut identities = Vec::with_capacity(roster.len());

        for name in roster {
            let identity_dir = reference_dir.join(name);
            if !identity_dir.exists() {
                match fs::create_dir_all(&identity_dir) {
                    Ok(()) => tracing::info!("Created directory for {}'s photos", name),
                    Err(e) => tracing::warn!(
                        "Failed to create photo directory {:?} for {}: {}", identity_dir, name, e
                    ),
                }
            }

            let mut fingerprints = Vec::new();
            for photo in list_images(&identity_dir) {
                match fs::read(&photo) {
                    Ok(bytes) => fingerprints.push(content_hash(&bytes)),
                    Err(e) => tracing::warn!("Error loading photo {:?} for {}: {}", photo, name, e),
                }
            }

            let placeholder = fingerprints.is_empty();
            if placeholder {
                tracing::warn!("No usable photos found for {}. Using placeholder fingerprints.", name);
                fingerprints = placeholder_fingerprints(name);
            } else {
                tracing::info!("Loaded {} photos for {}", fingerprints.len(), name);
            }

            identities.push(IdentityPrints {
                name: name.clone(),
                fingerprints,
                placeholder,
                encoding: placeholder_encoding(name),
            });
        }

        Self { identities }
    }

    pub fn iter(&self) -> impl Iterator<Item = &IdentityPrints> {
        self.identities.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.identities.iter().map(|i| i.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&IdentityPrints> {
        self.identities.iter().find(|i| i.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Image files directly inside `dir`, sorted by file name.
fn list_images(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Cannot list {:?}: {}", dir, e);
            return Vec::new();
        }
    };

    let mut photos: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_image(path))
        .collect();
    photos.sort();
    photos
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_sha256_hex() {
        assert_eq!(
            content_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn seed_reads_first_eight_hex_chars() {
        assert_eq!(seed_from_hash("ba7816bf8f01"), 0xba7816bf);
        assert_eq!(seed_from_hash("0000000a"), 10);
    }

    #[test]
    fn placeholders_are_three_distinct_hashes() {
        let prints = placeholder_fingerprints("Alice");
        assert_eq!(prints.len(), PLACEHOLDER_COUNT);
        assert_eq!(prints[0], content_hash(b"Alice_placeholder_0"));
        assert_ne!(prints[0], prints[1]);
        assert_ne!(prints[1], prints[2]);
    }

    #[test]
    fn encoding_depends_only_on_name() {
        let a = placeholder_encoding("Alice");
        assert_eq!(a.len(), ENCODING_DIM);
        assert_eq!(a, placeholder_encoding("Alice"));
        assert_ne!(a, placeholder_encoding("Bob"));
        assert!(a.iter().all(|v| (0.0..1.0).contains(v)));
    }

    #[test]
    fn extension_match_ignores_case() {
        assert!(is_image(Path::new("a/b.JPG")));
        assert!(is_image(Path::new("a/b.jpeg")));
        assert!(is_image(Path::new("a/b.Png")));
        assert!(!is_image(Path::new("a/b.gif")));
        assert!(!is_image(Path::new("a/jpg")));
    }

    #[cfg(unix)]
    fn make_unreadable(path: &Path) -> bool {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o000)).unwrap();
        // Root ignores file modes
        fs::read(path).is_err()
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_photo_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let alice = dir.path().join("Alice");
        fs::create_dir_all(&alice).unwrap();
        fs::write(alice.join("a.jpg"), b"locked").unwrap();
        fs::write(alice.join("b.png"), b"readable").unwrap();
        if !make_unreadable(&alice.join("a.jpg")) {
            return;
        }

        let store = FingerprintStore::load(&["Alice".to_string()], dir.path());

        let prints = store.get("Alice").unwrap();
        assert!(!prints.placeholder);
        assert_eq!(prints.fingerprints, vec![content_hash(b"readable")]);
    }

    #[cfg(unix)]
    #[test]
    fn only_photo_unreadable_falls_back_to_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let bob = dir.path().join("Bob");
        fs::create_dir_all(&bob).unwrap();
        fs::write(bob.join("only.jpeg"), b"locked").unwrap();
        if !make_unreadable(&bob.join("only.jpeg")) {
            return;
        }

        let store = FingerprintStore::load(&["Bob".to_string()], dir.path());

        let prints = store.get("Bob").unwrap();
        assert!(prints.placeholder);
        assert_eq!(prints.fingerprints, placeholder_fingerprints("Bob"));
    }
}

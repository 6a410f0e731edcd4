//! Streaming content hashing for staleness detection.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use super::error::CacheError;

/// Bytes read per step while hashing.
const CHUNK_SIZE: usize = 4096;

/// Computes SHA-256 fingerprints of file content.
///
/// Only bytes matter: name, mtime and permissions never influence the digest.
pub struct ContentHasher;

impl ContentHasher {
    /// Hashes the file at `path`, reading it in fixed-size chunks.
    pub fn hash_file(path: &Path) -> Result<String, CacheError> {
        let file = File::open(path).map_err(|e| CacheError::io(path, e))?;
        Self::hash_reader(file).map_err(|e| CacheError::io(path, e))
    }

    /// Hashes everything readable from `reader`.
    pub fn hash_reader<R: Read>(mut reader: R) -> std::io::Result<String> {
        let mut hasher = Sha256::new();
        let mut buf = [0u8; CHUNK_SIZE];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buf[..n]);
        }
        Ok(to_hex(&hasher.finalize()))
    }
}

pub(crate) fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digest_of_empty_input() {
        let h = ContentHasher::hash_reader(&b""[..]).unwrap();
        assert_eq!(
            h,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn same_bytes_different_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("copy_of_a.bin");
        std::fs::write(&a, b"pixels").unwrap();
        std::fs::write(&b, b"pixels").unwrap();
        assert_eq!(
            ContentHasher::hash_file(&a).unwrap(),
            ContentHasher::hash_file(&b).unwrap()
        );
    }

    #[test]
    fn multi_chunk_matches_single_shot() {
        let data: Vec<u8> = (0..CHUNK_SIZE * 3 + 17).map(|i| (i % 251) as u8).collect();
        let streamed = ContentHasher::hash_reader(&data[..]).unwrap();
        assert_eq!(streamed, to_hex(&Sha256::digest(&data)));
    }

    #[test]
    fn content_change_changes_digest() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("img.png");
        std::fs::write(&p, b"B1").unwrap();
        let first = ContentHasher::hash_file(&p).unwrap();
        std::fs::write(&p, b"B2").unwrap();
        assert_ne!(first, ContentHasher::hash_file(&p).unwrap());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ContentHasher::hash_file(Path::new("/nonexistent/image.png")).unwrap_err();
        assert!(err.is_not_found());
    }
}

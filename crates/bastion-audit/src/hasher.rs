// hasher.rs — SHA-256 hashing utilities.
//
// Every artifact digest in a run is SHA-256, encoded as a 64-character
// lowercase hex string. Files are hashed in fixed-size chunks so large
// evidence files never have to fit in memory.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::AuditError;

/// Read size used when streaming a file through the hasher.
pub const HASH_CHUNK_SIZE: usize = 8 * 1024;

/// Hash arbitrary bytes, returning a lowercase hex-encoded SHA-256 string.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Hash a UTF-8 string, returning a lowercase hex-encoded SHA-256 string.
pub fn hash_str(s: &str) -> String {
    hash_bytes(s.as_bytes())
}

/// Hash the contents of a file on disk, streaming it in
/// [`HASH_CHUNK_SIZE`] chunks.
pub fn hash_file(path: &Path) -> Result<String, AuditError> {
    let to_err = |source| AuditError::HashFileFailed {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = BufReader::new(File::open(path).map_err(to_err)?);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; HASH_CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf).map_err(to_err)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

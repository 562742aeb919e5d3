//! Content fingerprints (BLAKE3) used to decide whether two files hold the same bytes.

use std::fmt;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;

/// Default read size when streaming a file through the hasher.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// A 256-bit BLAKE3 digest of a file's full content.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentFingerprint([u8; 32]);

impl ContentFingerprint {
    /// Hash arbitrary bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Stream a file through the hasher `chunk_size` bytes at a time.
    ///
    /// Reads until EOF; any open or read failure is returned as is.
    pub async fn from_file(path: &Path, chunk_size: usize) -> io::Result<Self> {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };

        let mut file = tokio::fs::File::open(path).await?;
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; chunk_size];

        loop {
            let bytes_read = file.read(&mut buffer).await?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(Self(*hasher.finalize().as_bytes()))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "ContentFingerprint({})", &hex[..16])
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

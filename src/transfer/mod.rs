use std::path::{Path, PathBuf};
use std::slice::Chunks;

use crate::crypto::md5_hex;
use crate::error::OtaError;
use crate::protocol::{Mode, CHUNK_SIZE};

/// Everything the user asked for, fixed for the whole session
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub target_host: String,
    pub target_port: u16,
    pub password: Option<String>,
    pub image: PathBuf,
    pub mode: Mode,
}

/// Image bytes plus their size and digest.
///
/// The digest is computed from the same buffer the chunks are cut from, so
/// what the invitation announces is what the device receives.
#[derive(Debug, Clone)]
pub struct Payload {
    data: Vec<u8>,
    digest: String,
}

impl Payload {
    /// Read an image file in one go
    pub async fn load(path: &Path) -> Result<Self, OtaError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|source| OtaError::ImageUnreadable {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::from_bytes(data))
    }

    pub fn from_bytes(data: Vec<u8>) -> Self {
        let digest = md5_hex(&data);
        Self { data, digest }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Hex MD5 of the whole image
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Fixed-size slices of the image, last one possibly shorter
    pub fn chunks(&self) -> Chunks<'_, u8> {
        self.data.chunks(CHUNK_SIZE)
    }

    /// Number of chunks the streaming loop will send
    pub fn chunk_count(&self) -> u64 {
        self.data.len().div_ceil(CHUNK_SIZE) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_load_hashes_file_contents() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(&[0x01, 0x02, 0x03]).unwrap();
        temp_file.flush().unwrap();

        let payload = Payload::load(temp_file.path()).await.unwrap();
        assert_eq!(payload.size(), 3);
        assert_eq!(payload.digest(), "5289df737df57326fcdd22597afb1fac");
        assert_eq!(payload.chunk_count(), 1);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.bin");

        let err = Payload::load(&missing).await.unwrap_err();
        assert!(matches!(err, OtaError::ImageUnreadable { .. }));
    }

    #[test]
    fn test_chunks_cover_payload() {
        let data: Vec<u8> = (0..(CHUNK_SIZE * 2 + 100)).map(|i| i as u8).collect();
        let payload = Payload::from_bytes(data.clone());

        let sizes: Vec<usize> = payload.chunks().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![CHUNK_SIZE, CHUNK_SIZE, 100]);
        assert_eq!(payload.chunk_count(), 3);

        let joined: Vec<u8> = payload.chunks().flatten().copied().collect();
        assert_eq!(joined, data);
        assert_eq!(md5_hex(&joined), payload.digest());
    }

    #[test]
    fn test_empty_payload_has_no_chunks() {
        let payload = Payload::from_bytes(Vec::new());
        assert_eq!(payload.chunks().count(), 0);
        assert_eq!(payload.chunk_count(), 0);
    }
}

use std::path::PathBuf;

/// Blob storage for checkpoints and result exports.
///
/// `put` returns the reference callers persist to find the blob again;
/// references are opaque outside the implementation.
#[async_trait::async_trait]
pub trait Artifacts: Send + Sync {
    async fn put(&self, name: &str, bytes: Vec<u8>) -> std::io::Result<String>;
    async fn get(&self, reference: &str) -> std::io::Result<Vec<u8>>;
}

/// Filesystem-backed artifact store under a configured prefix.
pub struct FsArtifacts {
    prefix: PathBuf,
}

impl FsArtifacts {
    pub fn new(prefix: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

#[async_trait::async_trait]
impl Artifacts for FsArtifacts {
    async fn put(&self, name: &str, bytes: Vec<u8>) -> std::io::Result<String> {
        let path = self.prefix.join(name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(path.to_string_lossy().into_owned())
    }
    async fn get(&self, reference: &str) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(reference).await
    }
}

/// In-memory artifact store for tests.
#[derive(Default)]
pub struct MemoryArtifacts(tokio::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>);

#[async_trait::async_trait]
impl Artifacts for MemoryArtifacts {
    async fn put(&self, name: &str, bytes: Vec<u8>) -> std::io::Result<String> {
        self.0.lock().await.insert(name.to_string(), bytes);
        Ok(name.to_string())
    }
    async fn get(&self, reference: &str) -> std::io::Result<Vec<u8>> {
        self.0
            .lock()
            .await
            .get(reference)
            .cloned()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, reference.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trips() {
        let store = MemoryArtifacts::default();
        let reference = store.put("sim/ck_1.bin", vec![9, 9]).await.unwrap();
        assert_eq!(store.get(&reference).await.unwrap(), vec![9, 9]);
        assert!(store.get("missing").await.is_err());
    }
}

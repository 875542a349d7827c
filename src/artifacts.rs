//! Destinations for run artifacts
//!
//! Every check owns a distinct artifact name, so sinks never see two writers
//! for the same file within one run. Writes overwrite the previous run.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Where artifacts of a run are persisted
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    /// Writes (or overwrites) the named artifact
    async fn write(&self, name: &str, contents: &[u8]) -> std::io::Result<()>;

    /// Human-readable location of an artifact, for logs and CLI output
    fn location(&self, name: &str) -> String;
}

/// Writes artifacts as files in one reports directory
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

#[async_trait]
impl ArtifactSink for DirectorySink {
    async fn write(&self, name: &str, contents: &[u8]) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_of(name);
        tokio::fs::write(&path, contents).await?;
        debug!("Wrote {} bytes to {}", contents.len(), path.display());
        Ok(())
    }

    fn location(&self, name: &str) -> String {
        self.path_of(name).display().to_string()
    }
}

/// Keeps artifacts in memory; clones share the same storage
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        let files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        files.get(name).cloned()
    }

    /// Parses a stored artifact as JSON
    pub fn json(&self, name: &str) -> Option<serde_json::Value> {
        self.get(name)
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
    }

    pub fn names(&self) -> Vec<String> {
        let files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        files.keys().cloned().collect()
    }
}

#[async_trait]
impl ArtifactSink for MemorySink {
    async fn write(&self, name: &str, contents: &[u8]) -> std::io::Result<()> {
        let mut files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        files.insert(name.to_string(), contents.to_vec());
        Ok(())
    }

    fn location(&self, name: &str) -> String {
        format!("memory://{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_sink_overwrites_by_name() {
        let sink = MemorySink::new();
        sink.write("a.json", b"{\"v\":1}").await.expect("write");
        sink.write("a.json", b"{\"v\":2}").await.expect("write");

        assert_eq!(sink.names(), vec!["a.json".to_string()]);
        assert_eq!(sink.json("a.json").expect("json")["v"], 2);
    }

    #[tokio::test]
    async fn directory_sink_creates_missing_directory() {
        let dir = std::env::temp_dir().join(format!("utc-sink-{}", uuid::Uuid::new_v4()));
        let sink = DirectorySink::new(dir.join("reports"));

        sink.write("summary.json", b"{}").await.expect("write");

        let written = std::fs::read(sink.path_of("summary.json")).expect("read back");
        assert_eq!(written, b"{}");
        let _ = std::fs::remove_dir_all(&dir);
    }
}

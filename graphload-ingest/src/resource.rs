//! Loadable resources

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{IngestError, Result};

/// A document the loader can read.
///
/// `Url` supports the `file://` scheme only; remote fetching belongs to the
/// caller, who can download and submit `Bytes`.
#[derive(Clone, Debug)]
pub enum Resource {
    File(PathBuf),
    Url(String),
    Bytes { name: Arc<str>, data: Arc<[u8]> },
}

impl Resource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Resource::File(path.into())
    }

    pub fn url(url: impl Into<String>) -> Self {
        Resource::Url(url.into())
    }

    pub fn bytes(name: impl AsRef<str>, data: impl Into<Vec<u8>>) -> Self {
        Resource::Bytes {
            name: Arc::from(name.as_ref()),
            data: Arc::from(data.into().into_boxed_slice()),
        }
    }

    /// Display name for logs and completion notices
    pub fn name(&self) -> String {
        match self {
            Resource::File(path) => path.display().to_string(),
            Resource::Url(url) => url.clone(),
            Resource::Bytes { name, .. } => name.to_string(),
        }
    }

    /// The filesystem path, when the resource lives on disk.
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Resource::File(path) => Some(path),
            _ => None,
        }
    }

    /// Read the full document.
    pub async fn read(&self) -> Result<Vec<u8>> {
        match self {
            Resource::File(path) => Ok(tokio::fs::read(path).await?),
            Resource::Bytes { data, .. } => Ok(data.to_vec()),
            Resource::Url(url) => match url.strip_prefix("file://") {
                Some(path) => Ok(tokio::fs::read(path).await?),
                None => Err(IngestError::UnsupportedResource(url.clone())),
            },
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_bytes_roundtrip() {
        let r = Resource::bytes("doc-1", b"hello".to_vec());
        assert_eq!(r.read().await.unwrap(), b"hello");
        assert_eq!(r.name(), "doc-1");
        assert!(r.as_path().is_none());
    }

    #[tokio::test]
    async fn test_file_read() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"content").unwrap();
        let r = Resource::file(f.path());
        assert_eq!(r.read().await.unwrap(), b"content");
        assert_eq!(r.as_path(), Some(f.path()));
    }

    #[tokio::test]
    async fn test_file_url() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"content").unwrap();
        let r = Resource::url(format!("file://{}", f.path().display()));
        assert_eq!(r.read().await.unwrap(), b"content");
    }

    #[tokio::test]
    async fn test_remote_url_unsupported() {
        let r = Resource::url("https://example.org/data.nq");
        assert!(matches!(
            r.read().await,
            Err(IngestError::UnsupportedResource(_))
        ));
    }
}

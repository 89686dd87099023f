use std::path::Path;

use crate::error::MemoryError;
use crate::types::Document;

/// Default maximum file size: 50 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Turns plain-text and markdown files into [`Document`]s.
#[derive(Debug, Clone, Copy)]
pub struct TextLoader {
    pub max_file_size: u64,
}

impl Default for TextLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl TextLoader {
    #[must_use]
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    #[must_use]
    pub fn supported_extensions(&self) -> &[&str] {
        &["txt", "md"]
    }

    /// Rejects names whose extension is not `.txt` or `.md` (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::UnsupportedFileType`].
    pub fn check_file_name(&self, file_name: &str) -> Result<(), MemoryError> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if self.supported_extensions().contains(&ext.as_str()) {
            Ok(())
        } else {
            Err(MemoryError::UnsupportedFileType(file_name.to_owned()))
        }
    }

    /// Validate an uploaded payload and wrap it in a fresh [`Document`].
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad extension, oversize, empty or non-UTF-8 payload.
    pub fn decode(&self, file_name: &str, bytes: Vec<u8>) -> Result<Document, MemoryError> {
        self.check_file_name(file_name)?;
        let size = bytes.len() as u64;
        if size > self.max_file_size {
            return Err(MemoryError::FileTooLarge {
                size,
                limit: self.max_file_size,
            });
        }
        let content = String::from_utf8(bytes).map_err(|_| MemoryError::InvalidUtf8)?;
        if content.trim().is_empty() {
            return Err(MemoryError::EmptyDocument);
        }
        Ok(Document::new(file_name, content))
    }

    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or any [`Self::decode`] error.
    pub async fn load(&self, path: &Path) -> Result<Document, MemoryError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_owned();
        self.check_file_name(&file_name)?;

        let meta = tokio::fs::metadata(path).await?;
        if meta.len() > self.max_file_size {
            return Err(MemoryError::FileTooLarge {
                size: meta.len(),
                limit: self.max_file_size,
            });
        }
        let bytes = tokio::fs::read(path).await?;
        self.decode(&file_name, bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, "hello world").unwrap();

        let doc = TextLoader::default().load(&file).await.unwrap();
        assert_eq!(doc.content, "hello world");
        assert_eq!(doc.file_name, "notes.txt");
        assert!(doc.fragments.is_empty());
    }

    #[tokio::test]
    async fn load_nonexistent_file() {
        let result = TextLoader::default()
            .load(Path::new("/nonexistent/file.txt"))
            .await;
        assert!(matches!(result, Err(MemoryError::Io(_))));
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        let loader = TextLoader::default();
        assert!(loader.check_file_name("README.MD").is_ok());
        assert!(loader.check_file_name("a.Txt").is_ok());
        assert!(matches!(
            loader.check_file_name("report.pdf"),
            Err(MemoryError::UnsupportedFileType(_))
        ));
        assert!(loader.check_file_name("noext").is_err());
    }

    #[test]
    fn decode_rejects_empty_and_binary() {
        let loader = TextLoader::default();
        assert!(matches!(
            loader.decode("a.txt", b"  \n ".to_vec()),
            Err(MemoryError::EmptyDocument)
        ));
        assert!(matches!(
            loader.decode("a.txt", vec![0xff, 0xfe, 0x00]),
            Err(MemoryError::InvalidUtf8)
        ));
    }

    #[test]
    fn file_too_large_rejected() {
        let loader = TextLoader::new(4);
        let err = loader.decode("a.md", b"hello".to_vec()).unwrap_err();
        assert!(matches!(err, MemoryError::FileTooLarge { size: 5, limit: 4 }));
        assert!(err.is_validation());
    }
}

use std::io::{self, Read, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::RemixError;

/// Containers accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Mp4,
    QuickTime,
}

impl Container {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "mp4" => Some(Container::Mp4),
            "mov" => Some(Container::QuickTime),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, RemixError> {
        path.extension()
            .and_then(|extension| extension.to_str())
            .and_then(Container::from_extension)
            .ok_or_else(|| RemixError::UnsupportedContainer(path.display().to_string()))
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Container::Mp4 => ".mp4",
            Container::QuickTime => ".mov",
        }
    }
}

/// An uploaded video held in a temporary file for one generation. The
/// underlying [`NamedTempFile`] deletes the file when this value is dropped.
#[derive(Debug)]
pub struct UploadedVideo {
    file: NamedTempFile,
}

impl UploadedVideo {
    pub fn from_reader<R: Read>(mut reader: R, container: Container) -> Result<Self, RemixError> {
        let mut file = tempfile::Builder::new()
            .prefix("soraremix-")
            .suffix(container.suffix())
            .tempfile()?;
        let written = io::copy(&mut reader, &mut file)?;
        file.flush()?;
        debug!(path = %file.path().display(), bytes = written, "stored upload");

        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

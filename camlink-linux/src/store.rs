//! Writes received and processed images into the configured directory.

use std::path::{Path, PathBuf};

use camlink_core::PayloadStore;

pub struct DirStore {
    dir: PathBuf,
}

impl DirStore {
    /// Creates the directory if it does not exist.
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl PayloadStore for DirStore {
    fn store(&self, name: &str, payload: &[u8]) -> std::io::Result<()> {
        // Names come from payload_file_name; refuse anything that could escape the directory.
        if name.contains(['/', '\\']) || name == ".." {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "file name must not contain path separators",
            ));
        }
        std::fs::write(self.dir.join(name), payload)
    }
}

// nand/layout.rs from wadsmith (c) 2025 NinjaCheetah & Contributors
//
// The directory structure of an EmuNAND, and where each part of an installed title lives in it.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("EmuNAND requires the directory `{}`, but a file with that name already exists", .0.display())]
    DirectoryNameConflict(PathBuf),
    #[error("`{0}` is not a valid Title ID, Title IDs must be 16 hexadecimal characters")]
    InvalidTitleId(String),
    #[error("failed to create EmuNAND directory")]
    IO(#[from] std::io::Error),
}

/// The directories that make up the root of an EmuNAND.
pub const ROOT_DIRS: [&str; 9] = ["import", "meta", "shared1", "shared2", "sys", "ticket", "title", "tmp", "wfs"];

/// Parses a Title ID from its 16 character hex representation.
pub fn parse_title_id(title_id: &str) -> Result<[u8; 8], LayoutError> {
    let invalid = || LayoutError::InvalidTitleId(title_id.to_string());
    if title_id.len() != 16 {
        return Err(invalid());
    }
    let bytes = hex::decode(title_id).map_err(|_| invalid())?;
    bytes.try_into().map_err(|_| invalid())
}

/// Creates a directory if it doesn't exist yet, failing if a file is in the way.
pub(crate) fn safe_create_dir(dir: &Path) -> Result<(), LayoutError> {
    if !dir.exists() {
        fs::create_dir(dir)?;
    } else if !dir.is_dir() {
        return Err(LayoutError::DirectoryNameConflict(dir.to_path_buf()));
    }
    Ok(())
}

/// Paths to every file and directory a single title uses in an EmuNAND.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitlePaths {
    /// First half of the Title ID as lowercase hex (the title type).
    pub high: String,
    /// Second half of the Title ID as lowercase hex.
    pub low: String,
    pub ticket_dir: PathBuf,
    pub ticket: PathBuf,
    pub title_dir: PathBuf,
    pub content_dir: PathBuf,
    pub tmd: PathBuf,
    pub data_dir: PathBuf,
    pub meta_dir: PathBuf,
    pub meta: PathBuf,
}

impl TitlePaths {
    pub fn new(root: &Path, title_id: [u8; 8]) -> Self {
        let high = hex::encode(&title_id[0..4]);
        let low = hex::encode(&title_id[4..8]);
        let ticket_dir = root.join("ticket").join(&high);
        let title_dir = root.join("title").join(&high).join(&low);
        let content_dir = title_dir.join("content");
        let meta_dir = root.join("meta").join(&high).join(&low);
        TitlePaths {
            ticket: ticket_dir.join(format!("{low}.tik")),
            ticket_dir,
            tmd: content_dir.join("title.tmd"),
            content_dir,
            data_dir: title_dir.join("data"),
            title_dir,
            meta: meta_dir.join("title.met"),
            meta_dir,
            high,
            low,
        }
    }

    /// Gets the path of a non-shared content, named after its Content ID.
    pub fn content_file(&self, content_id: u32) -> PathBuf {
        self.content_dir.join(format!("{content_id:08x}.app"))
    }

    /// Creates `title/<high>/<low>/` and `meta/<high>/<low>/`-style parents one level at a time
    /// so that a file squatting on any of them is reported.
    pub(crate) fn create_nested(base: &Path, high: &str, low: &str) -> Result<PathBuf, LayoutError> {
        let high_dir = base.join(high);
        safe_create_dir(&high_dir)?;
        let low_dir = high_dir.join(low);
        safe_create_dir(&low_dir)?;
        Ok(low_dir)
    }
}

/// The root of an EmuNAND. Nothing is created on disk until [`NandLayout::ensure_skeleton`] is
/// called.
#[derive(Debug, Clone)]
pub struct NandLayout {
    root: PathBuf,
}

impl NandLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        NandLayout { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Gets the path to one of the directories in the root of the EmuNAND.
    pub fn dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Creates the EmuNAND root and all of its top level directories. Safe to call on an
    /// EmuNAND that already exists.
    pub fn ensure_skeleton(&self) -> Result<(), LayoutError> {
        if self.root.exists() && !self.root.is_dir() {
            return Err(LayoutError::DirectoryNameConflict(self.root.clone()));
        }
        fs::create_dir_all(&self.root)?;
        for dir in ROOT_DIRS {
            safe_create_dir(&self.dir(dir))?;
        }
        Ok(())
    }

    pub fn title(&self, title_id: [u8; 8]) -> TitlePaths {
        TitlePaths::new(&self.root, title_id)
    }

    pub fn content_map(&self) -> PathBuf {
        self.dir("shared1").join("content.map")
    }

    /// Gets the path of a shared content, named after its shared ID.
    pub fn shared_content(&self, shared_id: u32) -> PathBuf {
        self.dir("shared1").join(format!("{shared_id:08x}.app"))
    }

    pub fn uid_sys(&self) -> PathBuf {
        self.dir("sys").join("uid.sys")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_paths() {
        let paths = TitlePaths::new(Path::new("/nand"), [0x00, 0x01, 0x00, 0x02, 0x48, 0x41, 0x42, 0x41]);
        assert_eq!(paths.high, "00010002");
        assert_eq!(paths.low, "48414241");
        assert_eq!(paths.ticket, PathBuf::from("/nand/ticket/00010002/48414241.tik"));
        assert_eq!(paths.tmd, PathBuf::from("/nand/title/00010002/48414241/content/title.tmd"));
        assert_eq!(paths.data_dir, PathBuf::from("/nand/title/00010002/48414241/data"));
        assert_eq!(paths.meta, PathBuf::from("/nand/meta/00010002/48414241/title.met"));
        assert_eq!(paths.content_file(0xAB), PathBuf::from("/nand/title/00010002/48414241/content/000000ab.app"));
    }

    #[test]
    fn test_parse_title_id() {
        assert_eq!(parse_title_id("0001000248414241").unwrap(), [0x00, 0x01, 0x00, 0x02, 0x48, 0x41, 0x42, 0x41]);
        assert_eq!(parse_title_id("000000010000003A").unwrap(), [0, 0, 0, 1, 0, 0, 0, 0x3A]);
        assert!(matches!(parse_title_id("00010002484142"), Err(LayoutError::InvalidTitleId(_))));
        assert!(matches!(parse_title_id("000100024841424G"), Err(LayoutError::InvalidTitleId(_))));
    }

    #[test]
    fn test_ensure_skeleton() {
        let dir = tempfile::tempdir().unwrap();
        let layout = NandLayout::new(dir.path().join("emunand"));
        layout.ensure_skeleton().unwrap();
        layout.ensure_skeleton().unwrap();
        for name in ROOT_DIRS {
            assert!(layout.dir(name).is_dir());
        }
    }

    #[test]
    fn test_directory_name_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let layout = NandLayout::new(dir.path());
        fs::write(layout.dir("ticket"), b"squatter").unwrap();
        assert!(matches!(layout.ensure_skeleton(), Err(LayoutError::DirectoryNameConflict(path)) if path.ends_with("ticket")));
        let file_root = dir.path().join("file");
        fs::write(&file_root, b"").unwrap();
        assert!(matches!(NandLayout::new(&file_root).ensure_skeleton(), Err(LayoutError::DirectoryNameConflict(_))));
    }
}

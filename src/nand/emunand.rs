// nand/emunand.rs from wadsmith (c) 2025 NinjaCheetah & Contributors
//
// Implements installing titles to and uninstalling titles from an EmuNAND.

use std::fs;
use std::path::{Path, PathBuf};
use glob::{glob_with, MatchOptions, Pattern};
use log::{debug, info, warn};
use thiserror::Error;
use crate::nand::content_map::{ContentMapError, SharedContentMap};
use crate::nand::layout::{parse_title_id, safe_create_dir, LayoutError, NandLayout, TitlePaths};
use crate::nand::sys::{UidSys, UidSysError};
use crate::title::{Title, TitleError};
use crate::title::content::ContentError;
use crate::title::tmd::{self, ContentType};

#[derive(Debug, Error)]
pub enum EmuNANDError {
    #[error("the input path `{}` does not exist", .0.display())]
    InputNotFound(PathBuf),
    #[error("no WAD files were found in `{}`", .0.display())]
    NoPackagesFound(PathBuf),
    #[error("invalid search pattern")]
    Pattern(#[from] glob::PatternError),
    #[error("EmuNAND layout error")]
    Layout(#[from] LayoutError),
    #[error("content.map processing error")]
    ContentMap(#[from] ContentMapError),
    #[error("uid.sys processing error")]
    UidSys(#[from] UidSysError),
    #[error("title processing error")]
    Title(#[from] TitleError),
    #[error("content processing error")]
    Content(#[from] ContentError),
    #[error("TMD processing error")]
    TMD(#[from] tmd::TMDError),
    #[error("io error occurred during EmuNAND operation")]
    IO(#[from] std::io::Error),
}

/// Options that change how a title is installed.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    /// Don't check decrypted contents against the hashes in the TMD.
    pub skip_hash: bool,
    /// Install the content at index 0 as title.met instead of the title's meta/footer.
    pub override_meta: bool,
}

/// A package from a batch install that could not be installed.
#[derive(Debug)]
pub struct BatchFailure {
    pub path: PathBuf,
    pub error: EmuNANDError,
}

/// The results of installing every package found at a path.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub attempted: usize,
    pub installed: usize,
    pub failures: Vec<BatchFailure>,
}

/// What happened to a title's directory when it was uninstalled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleRemoval {
    /// The whole title directory was removed.
    Full,
    /// Save data exists, so only the content directory was removed.
    ContentOnly,
    /// There was no title directory to remove.
    NotInstalled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UninstallReport {
    pub ticket_removed: bool,
    pub title: TitleRemoval,
    pub meta_removed: bool,
}

fn is_empty_dir(dir: &Path) -> Result<bool, std::io::Error> {
    Ok(fs::read_dir(dir)?.next().is_none())
}

/// An EmuNAND that titles can be installed to and uninstalled from.
#[derive(Debug, Clone)]
pub struct EmuNAND {
    layout: NandLayout,
}

impl EmuNAND {
    /// Opens an EmuNAND at the given root. The directory structure isn't created until a title
    /// is installed.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        EmuNAND { layout: NandLayout::new(root) }
    }

    pub fn layout(&self) -> &NandLayout {
        &self.layout
    }

    /// Installs a title to the EmuNAND, mimicking a WAD installation performed by ES, and returns
    /// the UID the title was given in uid.sys.
    pub fn install_title(&self, title: &Title, options: InstallOptions) -> Result<u32, EmuNANDError> {
        let title_id = title.title_id();
        let paths = self.layout.title(title_id);
        let verify = !options.skip_hash;
        // Decrypt everything first, so that a bad content doesn't leave a half installed title.
        let mut normal: Vec<(u32, Vec<u8>)> = Vec::new();
        let mut shared: Vec<([u8; 20], Vec<u8>)> = Vec::new();
        for (i, record) in title.tmd.content_records().iter().enumerate() {
            match record.content_type {
                ContentType::Normal => normal.push((record.content_id, title.get_content_by_index(i, verify)?)),
                ContentType::Shared => shared.push((record.content_hash, title.get_content_by_index(i, verify)?)),
                _ => debug!("skipping content {:08X} with type {}", record.content_id, record.content_type),
            }
        }
        let meta = if options.override_meta {
            title.get_content_by_index(0, verify)?
        } else {
            title.meta().to_vec()
        };

        self.layout.ensure_skeleton()?;
        // Tickets are installed to /ticket/<tid_high>/<tid_low>.tik.
        safe_create_dir(&paths.ticket_dir)?;
        fs::write(&paths.ticket, title.ticket.to_bytes()?)?;
        // The TMD and normal contents go to /title/<tid_high>/<tid_low>/content/. Anything
        // already there is from an older install and gets cleared out.
        TitlePaths::create_nested(&self.layout.dir("title"), &paths.high, &paths.low)?;
        if paths.content_dir.exists() {
            fs::remove_dir_all(&paths.content_dir)?;
        }
        fs::create_dir(&paths.content_dir)?;
        fs::write(&paths.tmd, title.tmd.to_bytes()?)?;
        for (content_id, data) in &normal {
            fs::write(paths.content_file(*content_id), data)?;
        }
        // Shared contents go to /shared1/, named by their entry in content.map. Contents that
        // are already in the map are already installed.
        let content_map_path = self.layout.content_map();
        let mut content_map = if content_map_path.exists() {
            SharedContentMap::from_bytes(&fs::read(&content_map_path)?)?
        } else {
            SharedContentMap::new()
        };
        for (hash, data) in &shared {
            let assignment = content_map.assign(hash)?;
            if assignment.newly_assigned {
                debug!("installing shared content {:08x}", assignment.shared_id);
                fs::write(self.layout.shared_content(assignment.shared_id), data)?;
            }
        }
        fs::write(&content_map_path, content_map.to_bytes()?)?;
        safe_create_dir(&paths.data_dir)?;
        if !meta.is_empty() {
            TitlePaths::create_nested(&self.layout.dir("meta"), &paths.high, &paths.low)?;
            fs::write(&paths.meta, &meta)?;
        }
        // Every title that has ever been installed gets a UID in uid.sys.
        let uid_sys_path = self.layout.uid_sys();
        let mut uid_sys = if uid_sys_path.exists() {
            UidSys::from_bytes(&fs::read(&uid_sys_path)?)?
        } else {
            UidSys::new()
        };
        let uid = uid_sys.register(title_id)?;
        fs::write(&uid_sys_path, uid_sys.to_bytes()?)?;
        info!("installed {} (UID {:#X})", hex::encode(title_id), uid);
        Ok(uid)
    }

    /// Loads and installs a single WAD file.
    pub fn install_file(&self, path: &Path, options: InstallOptions) -> Result<u32, EmuNANDError> {
        let title = Title::from_bytes(&fs::read(path)?)?;
        self.install_title(&title, options)
    }

    /// Installs the WAD at `path`, or every WAD directly inside it if it's a directory. When
    /// installing a directory, a WAD that fails is recorded in the report and the rest are
    /// still installed.
    pub fn install_path(&self, path: &Path, options: InstallOptions) -> Result<BatchReport, EmuNANDError> {
        if !path.exists() {
            return Err(EmuNANDError::InputNotFound(path.to_path_buf()));
        }
        if !path.is_dir() {
            self.install_file(path, options)?;
            return Ok(BatchReport { attempted: 1, installed: 1, failures: Vec::new() });
        }
        let match_options = MatchOptions { case_sensitive: false, ..MatchOptions::new() };
        let wad_files: Vec<PathBuf> = glob_with(&wad_pattern(path), match_options)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.is_file())
            .collect();
        debug!("found {} WAD files in {}", wad_files.len(), path.display());
        if wad_files.is_empty() {
            return Err(EmuNANDError::NoPackagesFound(path.to_path_buf()));
        }
        let mut report = BatchReport::default();
        for wad in wad_files {
            report.attempted += 1;
            match self.install_file(&wad, options) {
                Ok(_) => report.installed += 1,
                Err(error) => {
                    warn!("WAD {} could not be installed: {}", wad.display(), error);
                    report.failures.push(BatchFailure { path: wad, error });
                }
            }
        }
        Ok(report)
    }

    /// Uninstalls a title from the EmuNAND. Save data is kept if the title has any, and shared
    /// contents and uid.sys are never touched.
    pub fn uninstall_title(&self, title_id: [u8; 8]) -> Result<UninstallReport, EmuNANDError> {
        let paths = self.layout.title(title_id);
        let ticket_removed = paths.ticket.exists();
        if ticket_removed {
            fs::remove_file(&paths.ticket)?;
        }
        let title = if !paths.title_dir.exists() {
            warn!("title {} does not appear to be installed", hex::encode(title_id));
            TitleRemoval::NotInstalled
        } else if paths.data_dir.is_dir() && !is_empty_dir(&paths.data_dir)? {
            if paths.content_dir.exists() {
                fs::remove_dir_all(&paths.content_dir)?;
            }
            TitleRemoval::ContentOnly
        } else {
            fs::remove_dir_all(&paths.title_dir)?;
            TitleRemoval::Full
        };
        let meta_removed = paths.meta.exists();
        if meta_removed {
            fs::remove_dir_all(&paths.meta_dir)?;
        }
        info!("uninstalled {} ({:?})", hex::encode(title_id), title);
        Ok(UninstallReport { ticket_removed, title, meta_removed })
    }

    /// Scans the EmuNAND for installed titles, which are any with a TMD at
    /// /title/<tid_high>/<tid_low>/content/title.tmd.
    pub fn installed_titles(&self) -> Result<Vec<[u8; 8]>, EmuNANDError> {
        let pattern = format!("{}/*/*/content/title.tmd", Pattern::escape(&self.layout.dir("title").to_string_lossy()));
        let mut titles: Vec<[u8; 8]> = glob_with(&pattern, MatchOptions::new())?
            .filter_map(|entry| entry.ok())
            .filter_map(|tmd_path| {
                let low_dir = tmd_path.parent()?.parent()?;
                let low = low_dir.file_name()?.to_str()?;
                let high = low_dir.parent()?.file_name()?.to_str()?;
                parse_title_id(&format!("{high}{low}")).ok()
            })
            .collect();
        titles.sort();
        Ok(titles)
    }

    /// Gets the TMD of a title installed to the EmuNAND, or None if it isn't installed.
    pub fn get_title_tmd(&self, title_id: [u8; 8]) -> Result<Option<tmd::TMD>, EmuNANDError> {
        let tmd_path = self.layout.title(title_id).tmd;
        if !tmd_path.exists() {
            return Ok(None);
        }
        Ok(Some(tmd::TMD::from_bytes(&fs::read(&tmd_path)?)?))
    }
}

fn wad_pattern(dir: &Path) -> String {
    format!("{}/*.wad", Pattern::escape(&dir.to_string_lossy()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha1::{Digest, Sha1};
    use tempfile::TempDir;
    use crate::title::fixtures;

    const TID: [u8; 8] = [0x00, 0x01, 0x00, 0x02, 0x48, 0x41, 0x42, 0x41];
    const OTHER_TID: [u8; 8] = [0x00, 0x01, 0x00, 0x01, 0x48, 0x41, 0x43, 0x41];

    fn channel(title_id: [u8; 8]) -> Title {
        let mut title = fixtures::title(title_id, 2, &[
            (0x0, ContentType::Normal, b"banner"),
            (0x1, ContentType::Normal, b"main dol"),
            (0x2, ContentType::Shared, b"shared library"),
        ]);
        title.set_meta(b"footer");
        title
    }

    fn emunand() -> (TempDir, EmuNAND) {
        let dir = tempfile::tempdir().unwrap();
        let emunand = EmuNAND::new(dir.path().join("nand"));
        (dir, emunand)
    }

    #[test]
    fn test_install_title() {
        let (_dir, emunand) = emunand();
        let uid = emunand.install_title(&channel(TID), InstallOptions::default()).unwrap();
        assert_eq!(uid, 0x1001);
        let root = emunand.layout().root().to_path_buf();
        assert!(root.join("ticket/00010002/48414241.tik").is_file());
        assert!(root.join("title/00010002/48414241/content/title.tmd").is_file());
        assert_eq!(fs::read(root.join("title/00010002/48414241/content/00000000.app")).unwrap(), b"banner");
        assert_eq!(fs::read(root.join("title/00010002/48414241/content/00000001.app")).unwrap(), b"main dol");
        assert!(!root.join("title/00010002/48414241/content/00000002.app").exists());
        assert!(root.join("title/00010002/48414241/data").is_dir());
        assert_eq!(fs::read(root.join("shared1/00000000.app")).unwrap(), b"shared library");
        let mut map = b"00000000".to_vec();
        map.extend_from_slice(&Sha1::digest(b"shared library"));
        assert_eq!(fs::read(root.join("shared1/content.map")).unwrap(), map);
        assert_eq!(fs::read(root.join("meta/00010002/48414241/title.met")).unwrap(), b"footer");
        let uid_sys = UidSys::from_bytes(&fs::read(root.join("sys/uid.sys")).unwrap()).unwrap();
        assert_eq!(uid_sys.entries().len(), 2);
        assert_eq!(uid_sys.uid(TID), Some(0x1001));
        assert_eq!(emunand.installed_titles().unwrap(), vec![TID]);
        assert_eq!(emunand.get_title_tmd(TID).unwrap().unwrap().title_version(), 2);
    }

    #[test]
    fn test_reinstall_replaces_content() {
        let (_dir, emunand) = emunand();
        emunand.install_title(&channel(TID), InstallOptions::default()).unwrap();
        let paths = emunand.layout().title(TID);
        fs::write(paths.content_dir.join("deadbeef.app"), b"stale").unwrap();
        fs::write(paths.data_dir.join("save.bin"), b"save").unwrap();
        assert_eq!(emunand.install_title(&channel(TID), InstallOptions::default()).unwrap(), 0x1001);
        assert!(!paths.content_dir.join("deadbeef.app").exists());
        assert!(paths.data_dir.join("save.bin").exists());
        assert_eq!(fs::read(emunand.layout().content_map()).unwrap().len(), 28);
        assert_eq!(fs::read(emunand.layout().uid_sys()).unwrap().len(), 24);
    }

    #[test]
    fn test_shared_content_is_deduplicated() {
        let (_dir, emunand) = emunand();
        emunand.install_title(&channel(TID), InstallOptions::default()).unwrap();
        assert_eq!(emunand.install_title(&channel(OTHER_TID), InstallOptions::default()).unwrap(), 0x1002);
        assert_eq!(fs::read(emunand.layout().content_map()).unwrap().len(), 28);
        assert!(!emunand.layout().shared_content(1).exists());
        assert_eq!(emunand.installed_titles().unwrap(), vec![OTHER_TID, TID]);
    }

    #[test]
    fn test_override_meta() {
        let (_dir, emunand) = emunand();
        let options = InstallOptions { override_meta: true, ..InstallOptions::default() };
        emunand.install_title(&channel(TID), options).unwrap();
        assert_eq!(fs::read(emunand.layout().title(TID).meta).unwrap(), b"banner");
    }

    #[test]
    fn test_uninstall_without_save_data() {
        let (_dir, emunand) = emunand();
        emunand.install_title(&channel(TID), InstallOptions::default()).unwrap();
        let report = emunand.uninstall_title(TID).unwrap();
        assert_eq!(report, UninstallReport { ticket_removed: true, title: TitleRemoval::Full, meta_removed: true });
        let paths = emunand.layout().title(TID);
        assert!(!paths.title_dir.exists());
        assert!(!paths.ticket.exists());
        assert!(!paths.meta_dir.exists());
        // Shared content and uid.sys outlive the title.
        assert!(emunand.layout().shared_content(0).exists());
        assert_eq!(fs::read(emunand.layout().uid_sys()).unwrap().len(), 24);
        assert!(emunand.installed_titles().unwrap().is_empty());
    }

    #[test]
    fn test_uninstall_with_save_data() {
        let (_dir, emunand) = emunand();
        emunand.install_title(&channel(TID), InstallOptions::default()).unwrap();
        let paths = emunand.layout().title(TID);
        fs::write(paths.data_dir.join("banner.bin"), b"save").unwrap();
        let report = emunand.uninstall_title(TID).unwrap();
        assert_eq!(report.title, TitleRemoval::ContentOnly);
        assert!(!paths.content_dir.exists());
        assert_eq!(fs::read(paths.data_dir.join("banner.bin")).unwrap(), b"save");
    }

    #[test]
    fn test_uninstall_not_installed() {
        let (_dir, emunand) = emunand();
        let report = emunand.uninstall_title(TID).unwrap();
        assert_eq!(report, UninstallReport { ticket_removed: false, title: TitleRemoval::NotInstalled, meta_removed: false });
    }

    #[test]
    fn test_install_directory() {
        let (dir, emunand) = emunand();
        let wads = dir.path().join("wads");
        fs::create_dir(&wads).unwrap();
        fs::write(wads.join("channel.wad"), channel(TID).to_bytes().unwrap()).unwrap();
        fs::write(wads.join("OTHER.WAD"), channel(OTHER_TID).to_bytes().unwrap()).unwrap();
        fs::write(wads.join("broken.wad"), b"not a wad").unwrap();
        fs::write(wads.join("readme.txt"), b"ignored").unwrap();
        let report = emunand.install_path(&wads, InstallOptions::default()).unwrap();
        assert_eq!(report.attempted, 3);
        assert_eq!(report.installed, 2);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].path.ends_with("broken.wad"));
        assert_eq!(emunand.installed_titles().unwrap().len(), 2);
    }

    #[test]
    fn test_install_path_errors() {
        let (dir, emunand) = emunand();
        let empty = dir.path().join("empty");
        fs::create_dir(&empty).unwrap();
        assert!(matches!(emunand.install_path(&empty, InstallOptions::default()), Err(EmuNANDError::NoPackagesFound(_))));
        let missing = dir.path().join("missing.wad");
        assert!(matches!(emunand.install_path(&missing, InstallOptions::default()), Err(EmuNANDError::InputNotFound(_))));
        let broken = dir.path().join("broken.wad");
        fs::write(&broken, b"not a wad").unwrap();
        assert!(matches!(emunand.install_path(&broken, InstallOptions::default()), Err(EmuNANDError::Title(_))));
    }
}

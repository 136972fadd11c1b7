// Session state - Folder bookkeeping and ranges for every known source

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::domain::errors::DomainError;
use crate::domain::ranges::RangeStore;

/// Video container extensions picked up by a folder scan
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv"];

/// One entry in the list of videos shown for a folder.
///
/// Several entries can share a source path; duplicates differ by display name.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoEntry {
    pub original_path: PathBuf,
    pub display_name: String,
    pub copy_number: u32,
    pub export_enabled: bool,
}

impl VideoEntry {
    pub fn new(original_path: impl Into<PathBuf>, display_name: impl Into<String>) -> Self {
        Self {
            original_path: original_path.into(),
            display_name: display_name.into(),
            copy_number: 0,
            export_enabled: false,
        }
    }
}

/// Everything persisted between runs
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub folder_path: Option<PathBuf>,
    pub video_files: Vec<VideoEntry>,
    pub folder_sessions: BTreeMap<PathBuf, Vec<VideoEntry>>,
    pub ranges: RangeStore,
    pub longest_edge: Option<u32>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a file name carries one of the supported video extensions
    pub fn is_video_file(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                VIDEO_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            })
            .unwrap_or(false)
    }

    /// Make `folder` current using the file names found in it.
    ///
    /// Entries saved earlier for the folder keep their flags; saved entries whose
    /// names are no longer listed (duplicates) are kept after the scanned files.
    pub fn merge_folder_scan(&mut self, folder: &Path, file_names: &[String]) -> &[VideoEntry] {
        let previous = self
            .folder_sessions
            .get(folder)
            .cloned()
            .unwrap_or_default();

        let mut merged: Vec<VideoEntry> = file_names
            .iter()
            .map(|name| {
                previous
                    .iter()
                    .find(|entry| &entry.display_name == name)
                    .cloned()
                    .unwrap_or_else(|| VideoEntry::new(folder.join(name), name.clone()))
            })
            .collect();

        merged.extend(
            previous
                .into_iter()
                .filter(|entry| !file_names.contains(&entry.display_name)),
        );

        self.folder_path = Some(folder.to_path_buf());
        self.folder_sessions
            .insert(folder.to_path_buf(), merged.clone());
        self.video_files = merged;
        &self.video_files
    }

    /// Duplicate an entry as `<stem>_<n><ext>` with the first free `n`
    pub fn duplicate_entry(&mut self, display_name: &str) -> Result<&VideoEntry, DomainError> {
        let original = self.entry(display_name)?.clone();
        let as_path = Path::new(&original.display_name);
        let stem = as_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| original.display_name.clone());
        let ext = as_path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut copy_number = original.copy_number + 1;
        let mut name = format!("{}_{}{}", stem, copy_number, ext);
        while self.video_files.iter().any(|entry| entry.display_name == name) {
            copy_number += 1;
            name = format!("{}_{}{}", stem, copy_number, ext);
        }

        self.video_files.push(VideoEntry {
            original_path: original.original_path,
            display_name: name,
            copy_number,
            export_enabled: original.export_enabled,
        });
        self.sync_current_folder();
        let last = self.video_files.len() - 1;
        Ok(&self.video_files[last])
    }

    /// Toggle whether an entry takes part in exports
    pub fn set_export_enabled(&mut self, display_name: &str, enabled: bool) -> Result<(), DomainError> {
        let entry = self
            .video_files
            .iter_mut()
            .find(|entry| entry.display_name == display_name)
            .ok_or_else(|| DomainError::Validation(format!("No video named '{}'", display_name)))?;
        entry.export_enabled = enabled;
        self.sync_current_folder();
        Ok(())
    }

    pub fn entry(&self, display_name: &str) -> Result<&VideoEntry, DomainError> {
        self.video_files
            .iter()
            .find(|entry| entry.display_name == display_name)
            .ok_or_else(|| DomainError::Validation(format!("No video named '{}'", display_name)))
    }

    /// Entries to export; with `include_all` every entry is selected
    pub fn export_selection(&self, include_all: bool) -> Vec<VideoEntry> {
        self.video_files
            .iter()
            .filter(|entry| include_all || entry.export_enabled)
            .cloned()
            .collect()
    }

    fn sync_current_folder(&mut self) {
        if let Some(folder) = &self.folder_path {
            self.folder_sessions
                .insert(folder.clone(), self.video_files.clone());
        }
    }
}

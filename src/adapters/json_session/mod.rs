// JSON session adapter - Session persistence in a single JSON document

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::domain::session::*;
use crate::error::RangeCropResult;
use crate::ports::*;

/// Session file adapter
pub struct JsonSessionAdapter {
    path: PathBuf,
}

impl JsonSessionAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse a session document
    pub fn decode(content: &str) -> RangeCropResult<SessionState> {
        let document: SessionDocument = serde_json::from_str(content)?;
        Ok(document.into_state())
    }

    /// Render a session document
    pub fn encode(state: &SessionState) -> RangeCropResult<String> {
        Ok(serde_json::to_string_pretty(&SessionDocument::from_state(state))?)
    }

    /// Write to a temporary sibling, then rename over the target
    fn write_atomically(&self, content: &str) -> RangeCropResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;
        let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
        temp.write_all(content.as_bytes())?;
        temp.flush()?;
        temp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[async_trait]
impl SessionPort for JsonSessionAdapter {
    async fn load(&self) -> SessionState {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No session file, starting empty");
                return SessionState::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), "Could not read session file, starting empty: {}", e);
                return SessionState::default();
            }
        };

        match Self::decode(&content) {
            Ok(state) => {
                info!(path = %self.path.display(), entries = state.video_files.len(), "Session loaded");
                state
            }
            Err(e) => {
                warn!(path = %self.path.display(), "Session file is corrupt, starting empty: {}", e);
                SessionState::default()
            }
        }
    }

    async fn save(&self, state: &SessionState) -> Result<(), DomainError> {
        let content = Self::encode(state).map_err(DomainError::from)?;
        self.write_atomically(&content).map_err(|e| {
            DomainError::Persistence(format!("{}: {}", self.path.display(), e))
        })?;
        debug!(path = %self.path.display(), "Session saved");
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct SessionDocument {
    folder_path: String,
    video_files: Vec<EntryRecord>,
    folder_sessions: BTreeMap<String, Vec<EntryRecord>>,
    video_data: BTreeMap<String, VideoRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    longest_edge: Option<u32>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct EntryRecord {
    original_path: String,
    display_name: String,
    copy_number: u32,
    export_enabled: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct VideoRecord {
    ranges: Vec<RangeRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RangeRecord {
    id: String,
    start: i64,
    end: i64,
    #[serde(default)]
    crop: Option<[i64; 4]>,
    #[serde(default)]
    index: u32,
}

impl EntryRecord {
    fn into_entry(self) -> VideoEntry {
        VideoEntry {
            original_path: PathBuf::from(self.original_path),
            display_name: self.display_name,
            copy_number: self.copy_number,
            export_enabled: self.export_enabled,
        }
    }

    fn from_entry(entry: &VideoEntry) -> Self {
        Self {
            original_path: entry.original_path.to_string_lossy().to_string(),
            display_name: entry.display_name.clone(),
            copy_number: entry.copy_number,
            export_enabled: entry.export_enabled,
        }
    }
}

impl RangeRecord {
    /// Convert to a range, dropping records that cannot satisfy range invariants
    fn into_range(self, source: &str) -> Option<Range> {
        if self.start < 0 || self.end <= self.start {
            warn!(source, id = %self.id, start = self.start, end = self.end, "Dropping invalid stored range");
            return None;
        }
        let crop = self.crop.and_then(|[x, y, w, h]| {
            if x < 0 || y < 0 || w <= 0 || h <= 0 {
                warn!(source, id = %self.id, "Dropping invalid stored crop");
                return None;
            }
            Some(CropRect::new(x as u32, y as u32, w as u32, h as u32))
        });
        let id = if self.id.trim().is_empty() {
            RangeId::generate()
        } else {
            RangeId::from(self.id)
        };
        Some(Range {
            id,
            start: self.start as u64,
            end: self.end as u64,
            crop,
            ordinal: self.index,
        })
    }

    fn from_range(range: &Range) -> Self {
        Self {
            id: range.id.to_string(),
            start: range.start as i64,
            end: range.end as i64,
            crop: range
                .crop
                .map(|c| [c.x as i64, c.y as i64, c.width as i64, c.height as i64]),
            index: range.ordinal,
        }
    }
}

impl SessionDocument {
    fn into_state(self) -> SessionState {
        let mut state = SessionState {
            folder_path: Some(PathBuf::from(self.folder_path)).filter(|p| !p.as_os_str().is_empty()),
            video_files: self
                .video_files
                .into_iter()
                .map(EntryRecord::into_entry)
                .collect(),
            folder_sessions: self
                .folder_sessions
                .into_iter()
                .map(|(folder, entries)| {
                    (
                        PathBuf::from(folder),
                        entries.into_iter().map(EntryRecord::into_entry).collect(),
                    )
                })
                .collect(),
            longest_edge: self.longest_edge.filter(|edge| *edge > 0),
            ..SessionState::default()
        };

        for (source, record) in self.video_data {
            let mut ranges: Vec<Range> = record
                .ranges
                .into_iter()
                .filter_map(|r| r.into_range(&source))
                .collect();
            ranges.sort_by_key(|r| r.ordinal);
            state.ranges.replace_for_source(PathBuf::from(source), ranges);
        }
        state
    }

    fn from_state(state: &SessionState) -> Self {
        let video_data = state
            .ranges
            .sources()
            .map(|source| {
                let ranges = state
                    .ranges
                    .list_for_source(source)
                    .iter()
                    .map(RangeRecord::from_range)
                    .collect();
                (
                    source.to_string_lossy().to_string(),
                    VideoRecord { ranges },
                )
            })
            .collect();

        Self {
            folder_path: state
                .folder_path
                .as_ref()
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_default(),
            video_files: state.video_files.iter().map(EntryRecord::from_entry).collect(),
            folder_sessions: state
                .folder_sessions
                .iter()
                .map(|(folder, entries)| {
                    (
                        folder.to_string_lossy().to_string(),
                        entries.iter().map(EntryRecord::from_entry).collect(),
                    )
                })
                .collect(),
            video_data,
            longest_edge: state.longest_edge,
        }
    }
}

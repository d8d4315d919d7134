//! Packages task outputs into a single zip archive.
//!
//! Layouts:
//! - `flat`: `{id8}_{file}` at the root
//! - `by_file`: `{display name}/{file}`, with `_{id8}` appended to the folder
//!   when another task already claimed the same name
//! - `by_format`: `{ext}/{file}`, `bin` when the file has no extension
//!
//! Missing files are skipped; an archive with no entries is still written.

use anyhow::{Context, Result};
use mediaconv_common::{FolderStructure, TaskId};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use zip::write::{FileOptions, ZipWriter};
use zip::CompressionMethod;

/// Maximum length of a sanitized folder name, in characters.
pub const MAX_FOLDER_NAME: usize = 64;

/// Outputs of one task, as handed to the assembler.
#[derive(Debug, Clone)]
pub struct ArchiveMember {
    pub task_id: TaskId,
    /// Source filename used as the `by_file` folder name.
    pub display_name: Option<String>,
    pub paths: Vec<PathBuf>,
}

/// Keep alphanumerics and `._- `, trim, map empty to `"file"`.
fn clean(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '.' | '_' | '-' | ' '))
        .collect();
    let trimmed = kept.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Folder-safe version of a display name, at most 64 characters.
pub fn sanitize_name(name: &str) -> String {
    let cleaned = clean(name);
    let truncated: String = cleaned.chars().take(MAX_FOLDER_NAME).collect();
    let trimmed = truncated.trim();
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `{base}_{id8}`, with `base` shortened so the result stays within
/// [`MAX_FOLDER_NAME`] characters.
fn with_id_suffix(base: &str, id8: &str) -> String {
    let room = MAX_FOLDER_NAME.saturating_sub(id8.chars().count() + 1);
    let head: String = base.chars().take(room).collect();
    format!("{}_{}", head.trim_end(), id8)
}

/// Parse a layout name, falling back to `flat` with a warning.
pub fn parse_folder_structure(s: &str) -> FolderStructure {
    s.parse().unwrap_or_else(|_| {
        tracing::warn!("Unknown folder structure {:?}, using flat", s);
        FolderStructure::Flat
    })
}

fn entry_file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| clean(&n.to_string_lossy()))
        .unwrap_or_else(|| "file".to_string())
}

fn extension_folder(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .filter(|e| !e.is_empty())
        .map(|e| clean(&e))
        .unwrap_or_else(|| "bin".to_string())
}

/// Writes archives into one directory.
#[derive(Debug, Clone)]
pub struct ArchiveAssembler {
    archive_dir: PathBuf,
    output_dir: PathBuf,
}

impl ArchiveAssembler {
    /// `output_dir` resolves relative output paths.
    pub fn new(archive_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            archive_dir,
            output_dir,
        }
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    pub fn archive_path(&self, archive_name: &str) -> PathBuf {
        self.archive_dir.join(archive_name)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.output_dir.join(path.file_name().unwrap_or(path.as_os_str()))
        }
    }

    /// Compute the `by_file` folder for each task.
    fn folders(members: &[ArchiveMember]) -> HashMap<TaskId, String> {
        let mut owners: HashMap<String, TaskId> = HashMap::new();
        let mut folders = HashMap::new();

        for member in members {
            if folders.contains_key(&member.task_id) {
                continue;
            }
            let id8 = member.task_id.short();
            let base = sanitize_name(member.display_name.as_deref().unwrap_or(&id8));

            let folder = match owners.get(&base) {
                Some(owner) if *owner != member.task_id => with_id_suffix(&base, &id8),
                _ => base,
            };
            owners.entry(folder.clone()).or_insert(member.task_id);
            folders.insert(member.task_id, folder);
        }
        folders
    }

    /// Entry name of one output file under `layout`.
    fn entry_name(layout: FolderStructure, member: &ArchiveMember, folder: &str, path: &Path) -> String {
        let file = entry_file_name(path);
        match layout {
            FolderStructure::Flat => format!("{}_{}", member.task_id.short(), file),
            FolderStructure::ByFile => format!("{}/{}", folder, file),
            FolderStructure::ByFormat => format!("{}/{}", extension_folder(path), file),
        }
    }

    /// Write `archive_name` into the archive directory and return its name.
    ///
    /// Blocking. A partially written archive is removed on error.
    pub fn assemble(
        &self,
        archive_name: &str,
        members: &[ArchiveMember],
        layout: FolderStructure,
    ) -> Result<String> {
        std::fs::create_dir_all(&self.archive_dir)
            .with_context(|| format!("Failed to create archive directory: {:?}", self.archive_dir))?;

        let archive_path = self.archive_path(archive_name);
        let result = self.write_archive(&archive_path, members, layout);

        match result {
            Ok(entries) => {
                tracing::info!(
                    "Created archive {} with {} entries from {} tasks (layout={})",
                    archive_name,
                    entries,
                    members.len(),
                    layout
                );
                Ok(archive_name.to_string())
            }
            Err(e) => {
                let _ = std::fs::remove_file(&archive_path);
                Err(e)
            }
        }
    }

    fn write_archive(
        &self,
        archive_path: &Path,
        members: &[ArchiveMember],
        layout: FolderStructure,
    ) -> Result<usize> {
        let file = File::create(archive_path)
            .with_context(|| format!("Failed to create archive: {:?}", archive_path))?;
        let mut zip = ZipWriter::new(file);
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);

        let folders = Self::folders(members);
        let mut written: HashSet<String> = HashSet::new();

        for member in members {
            let folder = folders
                .get(&member.task_id)
                .map(String::as_str)
                .unwrap_or_default();

            for raw in &member.paths {
                let path = self.resolve(raw);
                if !path.is_file() {
                    tracing::warn!(task_id = %member.task_id, "Skipping missing output {:?}", path);
                    continue;
                }

                let name = Self::entry_name(layout, member, folder, &path);
                if !written.insert(name.clone()) {
                    tracing::debug!("Skipping duplicate archive entry {}", name);
                    continue;
                }

                let mut reader = BufReader::new(
                    File::open(&path).with_context(|| format!("Failed to open {:?}", path))?,
                );
                zip.start_file(name.as_str(), options)
                    .with_context(|| format!("Failed to add file to ZIP: {}", name))?;
                std::io::copy(&mut reader, &mut zip)
                    .with_context(|| format!("Failed to write file data to ZIP: {}", name))?;
            }
        }

        let mut file = zip.finish().context("Failed to finalize ZIP archive")?;
        file.flush()?;
        Ok(written.len())
    }
}

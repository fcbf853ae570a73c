//! Renumbering entries into a new rank order.
//!
//! Each entry is a markdown document `<name>.md`, a directory `<name>`, or
//! both. Entry `name` at rank `r` becomes `<rr>-<title>`, where `title` is
//! `name` without any leading `\d+-` prefix.
//!
//! Renames happen in two phases so any permutation is safe: every affected
//! path first moves to `<path>.tmp-<rank>`, and only then does each temp path
//! move to its final name. A preflight pass rejects the request before any
//! rename when a final or temp path is held by something outside the reorder.

use std::collections::HashSet;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use storyme_core::{ManifestError, SceneOrderEntry, entries_for, write_manifest};
use storyme_types::{
    InvalidSegment, ProjectLayout, TargetError, normalize_episode_name, sanitize_segment,
};
use storyme_utils::Filesystem;

const TEMP_MARKER: &str = ".tmp-";

#[derive(Debug, Error)]
pub enum ReorderError {
    #[error(transparent)]
    InvalidName(#[from] InvalidSegment),
    #[error(transparent)]
    Episode(#[from] TargetError),
    #[error("{name:?} appears more than once in the new order")]
    DuplicateEntry { name: String },
    #[error("{} is occupied by an entry outside the reorder", path.display())]
    PathOccupied { path: PathBuf },
    #[error("failed to rename {} to {}: {source}", from.display(), to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderReport {
    pub manifest_path: PathBuf,
    pub manifest: Vec<SceneOrderEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PlannedRename {
    from: PathBuf,
    temp: PathBuf,
    to: PathBuf,
}

/// Digits used for rank prefixes: at least two, more for long lists.
fn rank_width(len: usize) -> usize {
    len.to_string().len().max(2)
}

/// `name` without a leading `\d+-` rank prefix.
fn strip_rank_prefix(name: &str) -> &str {
    let digits = name.bytes().take_while(u8::is_ascii_digit).count();
    match name[digits..].strip_prefix('-') {
        Some(title) if digits > 0 && !title.is_empty() => title,
        _ => name,
    }
}

/// Canonical name of `name` at 1-based `rank`.
#[must_use]
pub fn renumbered_name(name: &str, rank: usize, width: usize) -> String {
    format!("{rank:0width$}-{}", strip_rank_prefix(name))
}

fn temp_path(path: &Path, rank: usize) -> PathBuf {
    let mut raw = OsString::from(path.as_os_str());
    raw.push(format!("{TEMP_MARKER}{rank}"));
    PathBuf::from(raw)
}

fn plan<F: Filesystem + ?Sized>(
    fs: &F,
    dir: &Path,
    names: &[String],
) -> (Vec<PlannedRename>, Vec<String>) {
    let width = rank_width(names.len());
    let mut renames = Vec::new();
    let mut finals = Vec::with_capacity(names.len());

    for (index, name) in names.iter().enumerate() {
        let rank = index + 1;
        let next = renumbered_name(name, rank, width);
        if *name != next {
            for (from, to) in [
                (dir.join(format!("{name}.md")), dir.join(format!("{next}.md"))),
                (dir.join(name), dir.join(&next)),
            ] {
                if fs.exists(&from) {
                    renames.push(PlannedRename {
                        temp: temp_path(&from, rank),
                        from,
                        to,
                    });
                }
            }
        }
        finals.push(next);
    }
    (renames, finals)
}

fn preflight<F: Filesystem + ?Sized>(fs: &F, renames: &[PlannedRename]) -> Result<(), ReorderError> {
    let sources: HashSet<&Path> = renames.iter().map(|r| r.from.as_path()).collect();
    for rename in renames {
        if fs.exists(&rename.temp) {
            return Err(ReorderError::PathOccupied {
                path: rename.temp.clone(),
            });
        }
        if fs.exists(&rename.to) && !sources.contains(rename.to.as_path()) {
            return Err(ReorderError::PathOccupied {
                path: rename.to.clone(),
            });
        }
    }
    Ok(())
}

/// Renames performed so far, for rollback.
struct RenameJournal<'a, F: Filesystem + ?Sized> {
    fs: &'a F,
    done: Vec<(PathBuf, PathBuf)>,
}

impl<'a, F: Filesystem + ?Sized> RenameJournal<'a, F> {
    fn new(fs: &'a F) -> Self {
        Self {
            fs,
            done: Vec::new(),
        }
    }

    fn rename(&mut self, from: &Path, to: &Path) -> Result<(), ReorderError> {
        match self.fs.rename(from, to) {
            Ok(()) => {
                self.done.push((from.to_path_buf(), to.to_path_buf()));
                Ok(())
            }
            Err(err) => {
                let err = ReorderError::Rename {
                    from: from.to_path_buf(),
                    to: to.to_path_buf(),
                    source: err.into_io(),
                };
                self.rollback();
                Err(err)
            }
        }
    }

    fn rollback(&mut self) {
        while let Some((from, to)) = self.done.pop() {
            if let Err(e) = self.fs.rename(&to, &from) {
                warn!(
                    from = %to.display(),
                    to = %from.display(),
                    "Failed to revert rename during reorder rollback: {e}"
                );
            }
        }
    }
}

/// Renumber the entries of `dir` into `ordered_names` order and persist the
/// scene order manifest there.
pub fn reorder_entries<F, S>(
    fs: &F,
    dir: &Path,
    ordered_names: &[S],
) -> Result<ReorderReport, ReorderError>
where
    F: Filesystem + ?Sized,
    S: AsRef<str>,
{
    let mut names = Vec::with_capacity(ordered_names.len());
    let mut seen = HashSet::new();
    for raw in ordered_names {
        let name = sanitize_segment(raw.as_ref())?;
        if !seen.insert(name.clone()) {
            return Err(ReorderError::DuplicateEntry { name });
        }
        names.push(name);
    }

    let (renames, finals) = plan(fs, dir, &names);
    preflight(fs, &renames)?;

    let mut journal = RenameJournal::new(fs);
    for rename in &renames {
        journal.rename(&rename.from, &rename.temp)?;
    }
    for rename in &renames {
        journal.rename(&rename.temp, &rename.to)?;
        debug!(from = %rename.from.display(), to = %rename.to.display(), "Renumbered entry");
    }

    let manifest = entries_for(&finals);
    let manifest_path = write_manifest(fs, dir, &manifest)?;
    info!(
        dir = %dir.display(),
        entries = manifest.len(),
        renamed = renames.len(),
        "Reordered entries"
    );
    Ok(ReorderReport {
        manifest_path,
        manifest,
    })
}

/// [`reorder_entries`] on an episode's scenes directory.
pub fn reorder_scenes<F, S>(
    fs: &F,
    project_root: &Path,
    layout: &ProjectLayout,
    episode: &str,
    ordered_names: &[S],
) -> Result<ReorderReport, ReorderError>
where
    F: Filesystem + ?Sized,
    S: AsRef<str>,
{
    let episode = normalize_episode_name(episode)?;
    let scenes_dir = layout.episode_scenes_dir(project_root, &episode);
    reorder_entries(fs, &scenes_dir, ordered_names)
}

//! Path helpers for links and sidecars.

use std::path::{Component, Path, PathBuf};

/// Express `target` relative to the directory `from_dir`.
///
/// Both paths are compared component-wise without touching the filesystem.
/// When they share no common root (different drives, or one relative and one
/// absolute), `target` is returned unchanged.
///
/// ```
/// use std::path::Path;
/// use storyme_utils::relative_path;
///
/// let rel = relative_path(Path::new("/p/script/EP01/scenes"), Path::new("/p/script/EP01/scenes/01/media/a.png"));
/// assert_eq!(rel, Path::new("01/media/a.png"));
/// ```
#[must_use]
pub fn relative_path(from_dir: &Path, target: &Path) -> PathBuf {
    if from_dir.is_absolute() != target.is_absolute() {
        return target.to_path_buf();
    }

    let from: Vec<Component<'_>> = from_dir
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    let to: Vec<Component<'_>> = target
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();

    let common = from
        .iter()
        .zip(&to)
        .take_while(|(a, b)| a == b)
        .count();
    if common == 0 && from_dir.is_absolute() {
        return target.to_path_buf();
    }

    let mut out = PathBuf::new();
    for _ in &from[common..] {
        out.push("..");
    }
    for component in &to[common..] {
        out.push(component.as_os_str());
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Render a relative path with `/` separators on every platform.
///
/// Absolute paths are rendered as-is.
#[must_use]
pub fn to_slash_string(path: &Path) -> String {
    if path.is_absolute() {
        return path.to_string_lossy().into_owned();
    }
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

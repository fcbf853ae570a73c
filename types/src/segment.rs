//! Path segment sanitization and deterministic name deduplication.
//!
//! Every name the engine writes to disk (bucket filenames, scene names, asset
//! folders) passes through [`sanitize_segment`] first. Uniqueness helpers then
//! pick a free name against a caller-supplied listing. The listing is a
//! snapshot: nothing here locks the directory, so two processes racing on the
//! same folder can still collide.

use std::collections::HashSet;

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

/// Characters that are illegal in a path segment on at least one supported platform.
const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Replacement used for every illegal character.
const REPLACEMENT: char = '-';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid path segment {raw:?}")]
pub struct InvalidSegment {
    raw: String,
}

impl InvalidSegment {
    fn new(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
        }
    }

    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// Canonical Unicode composition (NFC) of `value`.
#[must_use]
pub fn normalize_unicode(value: &str) -> String {
    value.nfc().collect()
}

/// Sanitize a single path segment.
///
/// - Unicode is composed to NFC and surrounding whitespace is trimmed.
/// - `<>:"/\|?*` and control characters become `-`.
/// - Runs of whitespace collapse to a single space.
///
/// The result is never empty, `.`, or `..`, and sanitizing it again returns
/// it unchanged.
///
/// # Examples
///
/// ```
/// use storyme_types::sanitize_segment;
///
/// assert_eq!(sanitize_segment("  a/b  c ").unwrap(), "a-b c");
/// assert!(sanitize_segment("..").is_err());
/// ```
pub fn sanitize_segment(raw: &str) -> Result<String, InvalidSegment> {
    let normalized = normalize_unicode(raw);

    let mut out = String::with_capacity(normalized.len());
    let mut pending_space = false;
    for c in normalized.chars() {
        let c = if ILLEGAL_CHARS.contains(&c) || c.is_control() {
            REPLACEMENT
        } else {
            c
        };
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }

    if out.is_empty() || out == "." || out == ".." {
        return Err(InvalidSegment::new(raw));
    }
    Ok(out)
}

fn normalized_set<I, S>(existing: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    existing
        .into_iter()
        .map(|name| normalize_unicode(name.as_ref()))
        .collect()
}

/// Pick a free name for `base`, appending `-2`, `-3`, ... on collision.
pub fn unique_name<I, S>(base: &str, existing: I) -> Result<String, InvalidSegment>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let base = sanitize_segment(base)?;
    let taken = normalized_set(existing);
    if !taken.contains(&base) {
        return Ok(base);
    }

    let mut attempt: u64 = 2;
    loop {
        let candidate = format!("{base}-{attempt}");
        if !taken.contains(&candidate) {
            return Ok(candidate);
        }
        attempt += 1;
    }
}

/// Split `name` into stem and extension (including the leading dot).
///
/// The extension is the text after the last `.`, as long as that dot is
/// neither the first nor the last character: `.env` and `notes.` have none.
#[must_use]
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(dot) if dot > 0 && dot < name.len() - 1 => name.split_at(dot),
        _ => (name, ""),
    }
}

/// Like [`unique_name`], but keeps the extension last: `photo.png` becomes
/// `photo-2.png`.
pub fn unique_filename<I, S>(name: &str, existing: I) -> Result<String, InvalidSegment>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let name = sanitize_segment(name)?;
    let taken = normalized_set(existing);
    if !taken.contains(&name) {
        return Ok(name);
    }

    let (stem, ext) = split_extension(&name);
    let mut attempt: u64 = 2;
    loop {
        let candidate = format!("{stem}-{attempt}{ext}");
        if !taken.contains(&candidate) {
            return Ok(candidate);
        }
        attempt += 1;
    }
}

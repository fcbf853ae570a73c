//! `---` delimited key/value headers at the top of markdown documents.
//!
//! Values that look like JSON (objects, arrays, quoted strings, booleans,
//! `null`, numbers) are decoded as JSON; anything else is kept as a raw
//! string. Key order is preserved across a parse/render cycle.

use serde_json::Value;

const FENCE: &str = "---\n";
const CLOSING_FENCE: &str = "\n---\n";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    entries: Vec<(String, Value)>,
}

impl Frontmatter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Integral value of `key`; floats and strings yield `None`.
    #[must_use]
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    /// Replace `key` in place, or append it when absent.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Render as a fenced header block, ending with a newline.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::from(FENCE);
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(&render_scalar(value));
            out.push('\n');
        }
        out.push_str(FENCE);
        out
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Frontmatter {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut fm = Frontmatter::new();
        for (k, v) in iter {
            fm.set(k, v);
        }
        fm
    }
}

/// Split a document into its header and body.
///
/// Documents without a well-formed header yield an empty [`Frontmatter`] and
/// the whole input as body.
#[must_use]
pub fn split_frontmatter(markdown: &str) -> (Frontmatter, &str) {
    let Some(rest) = markdown.strip_prefix(FENCE) else {
        return (Frontmatter::new(), markdown);
    };
    if let Some(body) = rest.strip_prefix(FENCE) {
        return (Frontmatter::new(), body);
    }
    let Some(end) = rest.find(CLOSING_FENCE) else {
        return (Frontmatter::new(), markdown);
    };

    let header = &rest[..end];
    let body = &rest[end + CLOSING_FENCE.len()..];
    let mut fm = Frontmatter::new();
    for line in header.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        fm.set(key.trim(), parse_scalar(value));
    }
    (fm, body)
}

/// Render `frontmatter` followed by `body`.
#[must_use]
pub fn join_frontmatter(frontmatter: &Frontmatter, body: &str) -> String {
    let mut out = frontmatter.render();
    out.push_str(body);
    out
}

fn parse_scalar(value: &str) -> Value {
    let raw = value.trim();
    if raw.is_empty() {
        return Value::String(String::new());
    }
    if looks_like_json(raw)
        && let Ok(parsed) = serde_json::from_str::<Value>(raw)
    {
        return parsed;
    }
    Value::String(raw.to_string())
}

fn looks_like_json(raw: &str) -> bool {
    raw.starts_with('{')
        || raw.starts_with('[')
        || raw.starts_with('"')
        || matches!(raw, "true" | "false" | "null")
        || is_plain_number(raw)
}

/// `-?\d+(\.\d+)?`
fn is_plain_number(raw: &str) -> bool {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    let (int, frac) = match digits.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (digits, None),
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    all_digits(int) && frac.is_none_or(all_digits)
}

fn render_scalar(value: &Value) -> String {
    if value.is_null() {
        "\"\"".to_string()
    } else {
        value.to_string()
    }
}

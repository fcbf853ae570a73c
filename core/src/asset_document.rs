//! Asset documents: markdown files whose frontmatter carries asset metadata.
//!
//! ```text
//! ---
//! schema_version: 1
//! asset_id: "5d0c..."
//! type: "character"
//! updated_at: "2026-03-01T10:00:00.000Z"
//! updated_by: "local-user"
//! rev: 1
//! name: "Mira"
//! image: ""
//! custom_fields: {}
//! ---
//! ## Description
//! ...
//! ```
//!
//! Documents written by older tools may lack some metadata fields;
//! [`migrate_metadata`] fills them in and reports what it touched.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::frontmatter::{Frontmatter, join_frontmatter, split_frontmatter};
use crate::ids::IdSource;

pub const ASSET_SCHEMA_VERSION: i64 = 1;
pub const DEFAULT_AUTHOR: &str = "local-user";
pub const DEFAULT_ASSET_TYPE: &str = "asset";

pub const REQUIRED_METADATA_FIELDS: [&str; 6] = [
    "schema_version",
    "asset_id",
    "type",
    "updated_at",
    "updated_by",
    "rev",
];

const DESCRIPTION_HEADING: &str = "## Description\n";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetDocumentError {
    #[error("invalid asset metadata: {}", .0.join("; "))]
    InvalidMetadata(Vec<String>),
}

/// Validated metadata of an asset document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetMetadata {
    pub schema_version: i64,
    pub asset_id: String,
    #[serde(rename = "type")]
    pub asset_type: String,
    pub updated_at: String,
    pub updated_by: String,
    pub rev: i64,
}

impl AssetMetadata {
    pub fn from_frontmatter(fm: &Frontmatter) -> Result<Self, AssetDocumentError> {
        let errors = validate_metadata(fm);
        if !errors.is_empty() {
            return Err(AssetDocumentError::InvalidMetadata(errors));
        }
        let text = |key: &str| fm.get_str(key).unwrap_or_default().to_string();
        Ok(Self {
            schema_version: fm.get_int("schema_version").unwrap_or(ASSET_SCHEMA_VERSION),
            asset_id: text("asset_id"),
            asset_type: text("type"),
            updated_at: text("updated_at"),
            updated_by: text("updated_by"),
            rev: fm.get_int("rev").unwrap_or(1),
        })
    }
}

/// Knobs for [`migrate_metadata`].
pub struct MigrateOptions<'a> {
    /// Type recorded when the metadata has none.
    pub asset_type: Option<&'a str>,
    /// Author recorded when the metadata has none.
    pub updated_by: Option<&'a str>,
    pub now: DateTime<Utc>,
    pub ids: &'a dyn IdSource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetadataMigration {
    pub metadata: Frontmatter,
    pub migrated_fields: Vec<&'static str>,
    pub errors: Vec<String>,
}

impl MetadataMigration {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// User-facing fields of an asset document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetFields {
    pub name: String,
    pub image: String,
    pub description: String,
    pub custom_fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAssetDocument {
    /// Only the required metadata keys that are present.
    pub metadata: Frontmatter,
    pub fields: AssetFields,
    pub raw_frontmatter: Frontmatter,
}

/// Input for [`create_asset_document`].
#[derive(Debug, Clone, Default)]
pub struct NewAssetDocument {
    pub asset_type: String,
    pub fields: AssetFields,
    pub metadata: Frontmatter,
}

#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

fn non_blank_str(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty())
}

fn is_timestamp(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_str)
        .is_some_and(|s| DateTime::parse_from_rfc3339(s).is_ok())
}

/// Every problem with `fm` as asset metadata; empty when valid.
#[must_use]
pub fn validate_metadata(fm: &Frontmatter) -> Vec<String> {
    let mut errors = Vec::new();
    for key in REQUIRED_METADATA_FIELDS {
        if is_blank(fm.get(key)) {
            errors.push(format!("missing required metadata field: {key}"));
        }
    }
    if !fm.get_int("schema_version").is_some_and(|v| v >= 1) {
        errors.push("schema_version must be an integer >= 1".to_string());
    }
    if !fm.get_int("rev").is_some_and(|v| v >= 1) {
        errors.push("rev must be an integer >= 1".to_string());
    }
    if !non_blank_str(fm.get("type")) {
        errors.push("type must be a non-empty string".to_string());
    }
    if !non_blank_str(fm.get("asset_id")) {
        errors.push("asset_id must be a non-empty string".to_string());
    }
    if !non_blank_str(fm.get("updated_by")) {
        errors.push("updated_by must be a non-empty string".to_string());
    }
    if !is_timestamp(fm.get("updated_at")) {
        errors.push("updated_at must be an RFC 3339 timestamp".to_string());
    }
    errors
}

/// Fill in missing or malformed metadata fields, then validate.
#[must_use]
pub fn migrate_metadata(fm: &Frontmatter, options: &MigrateOptions<'_>) -> MetadataMigration {
    let mut metadata = fm.clone();
    let mut migrated_fields = Vec::new();

    if metadata.get_int("schema_version").is_none() {
        metadata.set("schema_version", ASSET_SCHEMA_VERSION);
        migrated_fields.push("schema_version");
    }
    if is_blank(metadata.get("asset_id")) {
        metadata.set("asset_id", options.ids.next_id());
        migrated_fields.push("asset_id");
    }
    if is_blank(metadata.get("type")) {
        metadata.set("type", options.asset_type.unwrap_or(DEFAULT_ASSET_TYPE));
        migrated_fields.push("type");
    }
    if !is_timestamp(metadata.get("updated_at")) {
        metadata.set("updated_at", format_timestamp(options.now));
        migrated_fields.push("updated_at");
    }
    if is_blank(metadata.get("updated_by")) {
        metadata.set("updated_by", options.updated_by.unwrap_or(DEFAULT_AUTHOR));
        migrated_fields.push("updated_by");
    }
    if !metadata.get_int("rev").is_some_and(|v| v >= 1) {
        metadata.set("rev", 1);
        migrated_fields.push("rev");
    }

    let errors = validate_metadata(&metadata);
    MetadataMigration {
        metadata,
        migrated_fields,
        errors,
    }
}

/// Render a new asset document.
pub fn create_asset_document(
    input: &NewAssetDocument,
    options: &MigrateOptions<'_>,
) -> Result<String, AssetDocumentError> {
    let asset_type = (!input.asset_type.trim().is_empty()).then_some(input.asset_type.as_str());
    let migration = migrate_metadata(
        &input.metadata,
        &MigrateOptions {
            asset_type: asset_type.or(options.asset_type),
            updated_by: options.updated_by,
            now: options.now,
            ids: options.ids,
        },
    );
    if !migration.is_valid() {
        return Err(AssetDocumentError::InvalidMetadata(migration.errors));
    }

    let mut fm = migration.metadata;
    fm.set("name", input.fields.name.as_str());
    fm.set("image", input.fields.image.as_str());
    fm.set("custom_fields", Value::Object(input.fields.custom_fields.clone()));

    let body = format!("{DESCRIPTION_HEADING}{}\n", input.fields.description);
    Ok(join_frontmatter(&fm, &body))
}

#[must_use]
pub fn parse_asset_document(markdown: &str) -> ParsedAssetDocument {
    let (raw_frontmatter, body) = split_frontmatter(markdown);

    let metadata: Frontmatter = REQUIRED_METADATA_FIELDS
        .iter()
        .filter_map(|key| raw_frontmatter.get(key).map(|v| (*key, v.clone())))
        .collect();

    let text = |key: &str| match raw_frontmatter.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    let custom_fields = match raw_frontmatter.get("custom_fields") {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };

    let fields = AssetFields {
        name: text("name"),
        image: text("image"),
        description: extract_description(body),
        custom_fields,
    };

    ParsedAssetDocument {
        metadata,
        fields,
        raw_frontmatter,
    }
}

/// Re-render `markdown` with `rev + 1` and a fresh `updated_at`.
///
/// `options.updated_by`, when given, replaces the recorded author.
pub fn bump_asset_revision(
    markdown: &str,
    options: &MigrateOptions<'_>,
) -> Result<String, AssetDocumentError> {
    let parsed = parse_asset_document(markdown);
    let recorded_type = parsed.metadata.get_str("type").map(str::to_string);
    let migration = migrate_metadata(
        &parsed.metadata,
        &MigrateOptions {
            asset_type: recorded_type.as_deref().or(options.asset_type),
            updated_by: options.updated_by,
            now: options.now,
            ids: options.ids,
        },
    );

    let mut next = migration.metadata;
    let rev = next.get_int("rev").unwrap_or(1);
    next.set("rev", rev + 1);
    next.set("updated_at", format_timestamp(options.now));
    if let Some(author) = options.updated_by {
        next.set("updated_by", author);
    }

    let asset_type = next.get_str("type").unwrap_or(DEFAULT_ASSET_TYPE).to_string();
    create_asset_document(
        &NewAssetDocument {
            asset_type,
            fields: parsed.fields,
            metadata: next,
        },
        options,
    )
}

fn extract_description(body: &str) -> String {
    match body.find(DESCRIPTION_HEADING) {
        Some(idx) => body[idx + DESCRIPTION_HEADING.len()..].trim().to_string(),
        None => body.trim().to_string(),
    }
}

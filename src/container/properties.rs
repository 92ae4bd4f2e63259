use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::error::{DsffError, Result};
use super::Sheet;

/// Names of the document properties, as spelled in the workbook core part
pub const DOCUMENT_PROPERTY_NAMES: [&str; 15] = [
    "title",
    "subject",
    "creator",
    "keywords",
    "description",
    "lastModifiedBy",
    "revision",
    "created",
    "modified",
    "category",
    "identifier",
    "language",
    "version",
    "contentStatus",
    "lastPrinted",
];

/// Value of a document property
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Free-text property
    Text(String),
    /// Timestamp property (`created`, `modified`, `lastPrinted`)
    Timestamp(DateTime<Utc>),
}

impl PropertyValue {
    /// Render as JSON (timestamps as RFC 3339 strings)
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(s) => Value::String(s.clone()),
            Self::Timestamp(t) => Value::String(t.to_rfc3339()),
        }
    }
}

/// Document-level properties of the container workbook
#[derive(Debug, Clone, Default, PartialEq)]
#[allow(missing_docs)]
pub struct DocumentProperties {
    pub title: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub keywords: Option<String>,
    /// Holds the JSON-encoded metadata mapping
    pub description: Option<String>,
    pub last_modified_by: Option<String>,
    pub revision: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub category: Option<String>,
    pub identifier: Option<String>,
    pub language: Option<String>,
    pub version: Option<String>,
    pub content_status: Option<String>,
    pub last_printed: Option<DateTime<Utc>>,
}

/// Map snake_case aliases onto the canonical property names
fn canonical(name: &str) -> Option<&'static str> {
    let name = match name {
        "last_modified_by" => "lastModifiedBy",
        "content_status" => "contentStatus",
        "last_printed" => "lastPrinted",
        other => other,
    };
    DOCUMENT_PROPERTY_NAMES.iter().copied().find(|n| *n == name)
}

impl DocumentProperties {
    /// Whether `name` designates a document property
    pub fn is_known(name: &str) -> bool {
        canonical(name).is_some()
    }

    fn text_slot(&mut self, name: &str) -> Option<&mut Option<String>> {
        Some(match canonical(name)? {
            "title" => &mut self.title,
            "subject" => &mut self.subject,
            "creator" => &mut self.creator,
            "keywords" => &mut self.keywords,
            "description" => &mut self.description,
            "lastModifiedBy" => &mut self.last_modified_by,
            "revision" => &mut self.revision,
            "category" => &mut self.category,
            "identifier" => &mut self.identifier,
            "language" => &mut self.language,
            "version" => &mut self.version,
            "contentStatus" => &mut self.content_status,
            _ => return None,
        })
    }

    fn time_slot(&mut self, name: &str) -> Option<&mut Option<DateTime<Utc>>> {
        Some(match canonical(name)? {
            "created" => &mut self.created,
            "modified" => &mut self.modified,
            "lastPrinted" => &mut self.last_printed,
            _ => return None,
        })
    }

    /// Value of a property; `None` when unknown or unset
    pub fn get(&self, name: &str) -> Option<PropertyValue> {
        let text = |v: &Option<String>| v.clone().map(PropertyValue::Text);
        let time = |v: &Option<DateTime<Utc>>| v.map(PropertyValue::Timestamp);
        match canonical(name)? {
            "title" => text(&self.title),
            "subject" => text(&self.subject),
            "creator" => text(&self.creator),
            "keywords" => text(&self.keywords),
            "description" => text(&self.description),
            "lastModifiedBy" => text(&self.last_modified_by),
            "revision" => text(&self.revision),
            "category" => text(&self.category),
            "identifier" => text(&self.identifier),
            "language" => text(&self.language),
            "version" => text(&self.version),
            "contentStatus" => text(&self.content_status),
            "created" => time(&self.created),
            "modified" => time(&self.modified),
            "lastPrinted" => time(&self.last_printed),
            _ => None,
        }
    }

    /// Set a property from a JSON value; returns `false` when `name` is unknown
    ///
    /// Timestamps must be ISO 8601 strings. Non-string values of text
    /// properties are stored as their JSON rendering; `null` unsets.
    pub fn set(&mut self, name: &str, value: &Value) -> Result<bool> {
        if let Some(slot) = self.text_slot(name) {
            *slot = match value {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            };
            return Ok(true);
        }
        if let Some(slot) = self.time_slot(name) {
            *slot = match value {
                Value::Null => None,
                Value::String(s) => Some(parse_timestamp(s).ok_or_else(|| {
                    DsffError::BadInputData(format!("'{}' is not an ISO 8601 timestamp: '{}'", name, s))
                })?),
                other => {
                    return Err(DsffError::BadInputData(format!(
                        "'{}' expects an ISO 8601 timestamp, got {}",
                        name, other
                    )))
                }
            };
            return Ok(true);
        }
        Ok(false)
    }
}

/// Parse an ISO 8601 timestamp
///
/// Accepts RFC 3339, a date and time without offset (taken as UTC, `T` or
/// space separated) and a bare date (midnight UTC).
pub(crate) fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|t| t.and_utc())
}

/// Result of a container property lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Property<'a> {
    /// One of the two worksheets
    Sheet(&'a Sheet),
    /// A document property
    Document(PropertyValue),
    /// A value of the metadata mapping
    Metadata(Value),
}

impl<'a> Property<'a> {
    /// The worksheet, for `data`/`features`
    pub fn as_sheet(&self) -> Option<&'a Sheet> {
        match self {
            Self::Sheet(s) => Some(s),
            _ => None,
        }
    }

    /// Text of a text document property or a string metadata value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Document(PropertyValue::Text(s)) => Some(s),
            Self::Metadata(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Timestamp of a timestamp document property
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Document(PropertyValue::Timestamp(t)) => Some(*t),
            _ => None,
        }
    }

    /// Render as JSON; worksheets become their rows of cells
    pub fn to_json(&self) -> Value {
        match self {
            Self::Sheet(s) => Value::Array(
                s.rows()
                    .iter()
                    .map(|r| Value::Array(r.iter().map(|c| c.to_json()).collect()))
                    .collect(),
            ),
            Self::Document(p) => p.to_json(),
            Self::Metadata(v) => v.clone(),
        }
    }
}

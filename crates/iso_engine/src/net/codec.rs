//! Fixed-precision delta encoding
//!
//! An update string is the entity id followed by one designator-prefixed
//! payload per section, in section order:
//!
//! ```text
//! e7¬10,20,0,1,1,1,0,0,1.57,¬0.50,
//! ```
//!
//! Every value is written to a fixed number of decimals and followed by a
//! comma. A value whose fraction is all zeros drops it (`1.00` -> `1`) and
//! negative zero is written as `0`, so unchanged state encodes identically
//! from tick to tick.

use crate::scene::EntityId;

/// Stream encode/decode errors
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    /// Payload held the wrong number of values
    #[error("Expected {expected} values, found {found}")]
    ValueCount {
        /// Values the section needs
        expected: usize,
        /// Values present
        found: usize,
    },

    /// A field was not a number
    #[error("Invalid number: '{0}'")]
    InvalidNumber(String),

    /// Message referenced an entity that does not exist
    #[error("Unknown entity: {0}")]
    UnknownEntity(EntityId),

    /// Create message named a parent that does not exist
    #[error("Unknown parent {parent} for entity {id}")]
    UnknownParent {
        /// Entity being created
        id: EntityId,
        /// Missing parent
        parent: EntityId,
    },

    /// Update string could not be split into id and sections
    #[error("Malformed update: {0}")]
    MalformedUpdate(String),

    /// Section name not recognised by the receiver
    #[error("Unknown section: {0}")]
    UnknownSection(String),
}

/// Format one value to `precision` decimals
pub fn format_value(value: f32, precision: u8) -> String {
    if !value.is_finite() {
        log::warn!("Encoding non-finite value {} as 0", value);
        return "0".to_string();
    }

    let mut text = format!("{:.*}", precision as usize, value);
    if let Some(dot) = text.find('.') {
        if text[dot + 1..].bytes().all(|b| b == b'0') {
            text.truncate(dot);
        }
    }
    if text == "-0" {
        text.remove(0);
    }
    text
}

/// Encode values as `v,v,v,`
pub fn encode_values(values: &[f32], precision: u8) -> String {
    let mut out = String::with_capacity(values.len() * 6);
    for value in values {
        out.push_str(&format_value(*value, precision));
        out.push(',');
    }
    out
}

/// Decode a comma-terminated list of any length
pub fn decode_list(payload: &str) -> Result<Vec<f32>, StreamError> {
    let payload = payload.strip_suffix(',').unwrap_or(payload);
    if payload.is_empty() {
        return Ok(Vec::new());
    }
    payload
        .split(',')
        .map(|field| {
            field
                .trim()
                .parse::<f32>()
                .map_err(|_| StreamError::InvalidNumber(field.to_string()))
        })
        .collect()
}

/// Decode exactly `N` values
pub fn decode_values<const N: usize>(payload: &str) -> Result<[f32; N], StreamError> {
    let values = decode_list(payload)?;
    let found = values.len();
    values
        .try_into()
        .map_err(|_| StreamError::ValueCount { expected: N, found })
}

/// Join an id and section payloads into an update string
pub fn encode_update<S: AsRef<str>>(id: &EntityId, sections: &[S], designator: char) -> String {
    let mut out = String::from(id.as_str());
    for section in sections {
        out.push(designator);
        out.push_str(section.as_ref());
    }
    out
}

/// Split an update string into its id and section payloads
pub fn split_update(data: &str, designator: char) -> Result<(EntityId, Vec<&str>), StreamError> {
    let mut parts = data.split(designator);
    let id = match parts.next() {
        Some(id) if !id.is_empty() => EntityId::from(id),
        _ => return Err(StreamError::MalformedUpdate(data.to_string())),
    };
    Ok((id, parts.collect()))
}

/// Split a section-only payload (no id prefix) into section payloads
pub fn split_sections(data: &str, designator: char) -> Vec<&str> {
    match data.strip_prefix(designator) {
        Some(rest) => rest.split(designator).collect(),
        None if data.is_empty() => Vec::new(),
        None => data.split(designator).collect(),
    }
}

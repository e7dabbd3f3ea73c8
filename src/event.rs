//! Object-created notification payloads.
//!
//! Only the first record is acted on; the bucket name and URL-encoded object
//! key are pulled out of `Records[0].s3`.

use percent_encoding::percent_decode_str;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EventError {
    #[error("notification is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("notification contains no records")]
    NoRecords,

    #[error("object key is not valid percent-encoded UTF-8: {0}")]
    KeyEncoding(String),
}

#[derive(Debug, Deserialize)]
struct Notification {
    #[serde(rename = "Records", default)]
    records: Vec<NotificationRecord>,
}

#[derive(Debug, Deserialize)]
struct NotificationRecord {
    s3: S3Entity,
}

#[derive(Debug, Deserialize)]
struct S3Entity {
    bucket: BucketEntity,
    object: ObjectEntity,
}

#[derive(Debug, Deserialize)]
struct BucketEntity {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ObjectEntity {
    key: String,
}

/// The object a notification refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadEvent {
    pub bucket: String,
    pub key: String,
}

impl UploadEvent {
    pub fn from_json(payload: &str) -> Result<Self, EventError> {
        let notification: Notification = serde_json::from_str(payload)?;
        let record = notification
            .records
            .into_iter()
            .next()
            .ok_or(EventError::NoRecords)?;
        Ok(Self {
            bucket: record.s3.bucket.name,
            key: decode_key(&record.s3.object.key)?,
        })
    }
}

/// Form-style decoding: `+` is a space, `%XX` a byte. Escapes that are not
/// valid hex are kept as written; the decoded bytes must be UTF-8.
pub fn decode_key(encoded: &str) -> Result<String, EventError> {
    let spaced = encoded.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|key| key.into_owned())
        .map_err(|_| EventError::KeyEncoding(encoded.to_string()))
}

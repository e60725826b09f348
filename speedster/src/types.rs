use mongodb::bson::DateTime;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// A persisted record of one page-performance audit, including the raw
/// report payloads. Records are immutable once created; they are only ever
/// read or deleted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scan {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub url: String,
    pub json: String,
    pub html: String,
    pub created_at: DateTime,
}

impl Scan {
    /// The id is generated by the caller before the audit runs, so it can
    /// double as the audit's artifact name. The timestamp is assigned here.
    pub fn new(id: ObjectId, url: String, json: String, html: String) -> Self {
        Scan {
            id,
            url,
            json,
            html,
            created_at: DateTime::now(),
        }
    }
}

use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::dao::models::{GameStateEntity, SectionEntity};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Game document as stored in MongoDB.
pub struct MongoGameDocument {
    #[serde(rename = "_id")]
    /// Document id (the game id).
    pub id: String,
    /// Embedded data URL or link to the photo.
    pub image_url: Option<String>,
    #[serde(default)]
    /// Cells in grid order.
    pub sections: Vec<SectionEntity>,
    /// Last write time.
    pub updated_at: Option<DateTime>,
}

impl From<(String, GameStateEntity)> for MongoGameDocument {
    fn from((id, value): (String, GameStateEntity)) -> Self {
        Self {
            id,
            image_url: value.image_url,
            sections: value.sections,
            updated_at: value.updated_at.map(to_bson_datetime),
        }
    }
}

impl From<MongoGameDocument> for GameStateEntity {
    fn from(value: MongoGameDocument) -> Self {
        Self {
            image_url: value.image_url,
            sections: value.sections,
            updated_at: value
                .updated_at
                .map(|stamp| OffsetDateTime::from(stamp.to_system_time())),
        }
    }
}

/// Convert a timestamp for storage.
pub fn to_bson_datetime(value: OffsetDateTime) -> DateTime {
    DateTime::from_system_time(value.into())
}

/// Filter matching the document `id`.
pub fn doc_id(id: &str) -> Document {
    doc! {"_id": id}
}

/// Filter matching the game document only while `index` still carries `code`.
pub fn section_filter(id: &str, index: usize, code: &str) -> Document {
    let mut filter = doc_id(id);
    filter.insert(format!("sections.{index}.code"), code);
    filter
}

/// Partial update flipping a single section flag.
pub fn unlock_update(index: usize, updated_at: OffsetDateTime) -> Document {
    let mut set = doc! {"updatedAt": to_bson_datetime(updated_at)};
    set.insert(format!("sections.{index}.isUnlocked"), true);
    doc! {"$set": set}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlock_update_targets_single_section_flag() {
        let update = unlock_update(5, OffsetDateTime::UNIX_EPOCH);
        let set = update.get_document("$set").unwrap();
        assert!(set.get_bool("sections.5.isUnlocked").unwrap());
        assert!(set.contains_key("updatedAt"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn section_filter_pins_code_at_index() {
        let filter = section_filter("photo_reveal", 2, "WED-QWERT");
        assert_eq!(filter.get_str("_id").unwrap(), "photo_reveal");
        assert_eq!(filter.get_str("sections.2.code").unwrap(), "WED-QWERT");
    }
}

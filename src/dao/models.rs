use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Grid cell persisted inside the game document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SectionEntity {
    /// Position of the section in the grid, also its stable identity.
    pub id: u32,
    /// Secret token printed on the QR card for this section.
    pub code: String,
    /// Whether a guest already revealed this section.
    pub is_unlocked: bool,
    /// Grid row (`id / size`).
    pub row: u32,
    /// Grid column (`id % size`).
    pub col: u32,
}

/// Singleton game document shared by every view of a game instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameStateEntity {
    /// Embedded data URL or link to the photo, absent until an upload happened.
    pub image_url: Option<String>,
    /// Sections in index order.
    #[serde(default)]
    pub sections: Vec<SectionEntity>,
    /// Last time the document was written, when the backend records it.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub updated_at: Option<OffsetDateTime>,
}

impl GameStateEntity {
    /// Flag the section at `index` as unlocked if it still carries `code`.
    ///
    /// Returns `false` and leaves the document untouched otherwise.
    pub fn unlock_at(&mut self, index: usize, code: &str, updated_at: OffsetDateTime) -> bool {
        match self.sections.get_mut(index) {
            Some(section) if section.code == code => {
                section.is_unlocked = true;
                self.updated_at = Some(updated_at);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn document_uses_camel_case_field_names() {
        let entity = GameStateEntity {
            image_url: Some("data:image/png;base64,AAAA".into()),
            sections: vec![SectionEntity {
                id: 0,
                code: "WED-AB12C".into(),
                is_unlocked: false,
                row: 0,
                col: 0,
            }],
            updated_at: None,
        };

        let value = serde_json::to_value(&entity).unwrap();
        assert_eq!(
            value,
            json!({
                "imageUrl": "data:image/png;base64,AAAA",
                "sections": [
                    {"id": 0, "code": "WED-AB12C", "isUnlocked": false, "row": 0, "col": 0}
                ]
            })
        );
    }

    #[test]
    fn unlock_at_requires_matching_code() {
        let mut entity = GameStateEntity {
            image_url: None,
            sections: vec![SectionEntity {
                id: 0,
                code: "WED-AAAAA".into(),
                is_unlocked: false,
                row: 0,
                col: 0,
            }],
            updated_at: None,
        };
        let now = OffsetDateTime::now_utc();

        assert!(!entity.unlock_at(0, "WED-BBBBB", now));
        assert!(!entity.unlock_at(3, "WED-AAAAA", now));
        assert!(!entity.sections[0].is_unlocked);
        assert!(entity.updated_at.is_none());

        assert!(entity.unlock_at(0, "WED-AAAAA", now));
        assert!(entity.sections[0].is_unlocked);
        assert_eq!(entity.updated_at, Some(now));
    }

    #[test]
    fn missing_sections_decode_as_empty() {
        let entity: GameStateEntity = serde_json::from_value(json!({"imageUrl": null})).unwrap();
        assert!(entity.image_url.is_none());
        assert!(entity.sections.is_empty());
    }
}

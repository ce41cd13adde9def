use serde::{Deserialize, Serialize};

use crate::dao::models::GameStateEntity;

/// Prefix of game document ids.
pub const GAME_PREFIX: &str = "game::";

#[derive(Debug, Clone, Serialize, Deserialize)]
/// Game document as stored in CouchDB.
pub struct CouchGameDocument {
    #[serde(rename = "_id")]
    /// Document id.
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    /// Revision, absent before the first write.
    pub rev: Option<String>,
    #[serde(flatten)]
    /// Stored game.
    pub game: GameStateEntity,
}

impl From<(String, GameStateEntity, Option<String>)> for CouchGameDocument {
    fn from((id, game, rev): (String, GameStateEntity, Option<String>)) -> Self {
        Self { id, rev, game }
    }
}

impl From<CouchGameDocument> for GameStateEntity {
    fn from(doc: CouchGameDocument) -> Self {
        doc.game
    }
}

/// Document id of `game_id`.
pub fn game_doc_id(game_id: &str) -> String {
    format!("{}{}", GAME_PREFIX, game_id)
}

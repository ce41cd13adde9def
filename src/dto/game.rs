use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    dto::{
        format_timestamp,
        validation::{validate_base_url, validate_image_ref},
    },
    services::artifacts::ShareableArtifact,
    state::game::{GameState, Section, UnlockOutcome},
};

/// Public view of one grid cell. Codes never leave the server here.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SectionView {
    /// Position in the grid.
    pub id: u32,
    /// Zero-based row.
    pub row: u32,
    /// Zero-based column.
    pub col: u32,
    /// Whether the cell is revealed.
    pub is_unlocked: bool,
}

impl From<&Section> for SectionView {
    fn from(section: &Section) -> Self {
        Self {
            id: section.id,
            row: section.row,
            col: section.col,
            is_unlocked: section.is_unlocked,
        }
    }
}

/// Everything a guest view needs to render the photo and its progress.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameView {
    /// Embedded data URL or link to the photo.
    pub image_url: Option<String>,
    /// Side length of the grid.
    pub grid_size: u32,
    /// Cells in grid order.
    pub sections: Vec<SectionView>,
    /// Revealed cells.
    pub unlocked_count: usize,
    /// All cells.
    pub total: usize,
    /// Every cell revealed.
    pub is_complete: bool,
    /// RFC 3339 timestamp of the last write, when the backend records it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl From<&GameState> for GameView {
    fn from(game: &GameState) -> Self {
        Self {
            image_url: game.image_url.clone(),
            grid_size: game.grid_size(),
            sections: game.sections.iter().map(SectionView::from).collect(),
            unlocked_count: game.unlocked_count(),
            total: game.total(),
            is_complete: game.is_complete(),
            updated_at: game.updated_at.map(format_timestamp),
        }
    }
}

/// Admin view of one grid cell including its secret code.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminSectionView {
    /// Position in the grid.
    pub id: u32,
    /// Secret unlock code printed on the card.
    pub code: String,
    /// Zero-based row.
    pub row: u32,
    /// Zero-based column.
    pub col: u32,
    /// Whether the cell is revealed.
    pub is_unlocked: bool,
}

/// Admin view of the board.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminGameView {
    /// Embedded data URL or link to the photo.
    pub image_url: Option<String>,
    /// Side length of the grid.
    pub grid_size: u32,
    /// Cells in grid order, with codes.
    pub sections: Vec<AdminSectionView>,
    /// Revealed cells.
    pub unlocked_count: usize,
    /// All cells.
    pub total: usize,
    /// Every cell revealed.
    pub is_complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// RFC 3339 timestamp of the last write.
    pub updated_at: Option<String>,
}

impl From<&GameState> for AdminGameView {
    fn from(game: &GameState) -> Self {
        Self {
            image_url: game.image_url.clone(),
            grid_size: game.grid_size(),
            sections: game
                .sections
                .iter()
                .map(|section| AdminSectionView {
                    id: section.id,
                    code: section.code.clone(),
                    row: section.row,
                    col: section.col,
                    is_unlocked: section.is_unlocked,
                })
                .collect(),
            unlocked_count: game.unlocked_count(),
            total: game.total(),
            is_complete: game.is_complete(),
            updated_at: game.updated_at.map(format_timestamp),
        }
    }
}

/// Upload a new photo and regenerate the board.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UploadPhotoRequest {
    /// `data:image/...` URL or an http(s) link to the photo.
    #[validate(custom(function = "validate_image_ref"))]
    pub image_url: String,
    /// Grid side; the configured default applies when omitted.
    #[validate(range(min = 1, max = 12))]
    #[serde(default)]
    pub grid_size: Option<u32>,
    /// URL printed in the QR codes; the configured public URL applies when omitted.
    #[validate(custom(function = "validate_base_url"))]
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Result of an upload: the new board and, when a base URL is known, its QR cards.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadPhotoResponse {
    /// Freshly generated board.
    pub game: AdminGameView,
    /// QR cards; empty when no base URL is known.
    pub artifacts: Vec<ArtifactView>,
}

/// One printable QR card.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactView {
    /// Section the card reveals.
    pub section_id: u32,
    /// Human label printed under the QR image.
    pub label: String,
    /// Unlock code carried by the card.
    pub code: String,
    /// URL encoded in the QR image.
    pub target_url: String,
    /// Standalone SVG document.
    pub svg: String,
}

impl From<ShareableArtifact> for ArtifactView {
    fn from(artifact: ShareableArtifact) -> Self {
        Self {
            label: format!("Piece #{}", artifact.section_id + 1),
            section_id: artifact.section_id,
            code: artifact.code,
            target_url: artifact.target_url,
            svg: artifact.svg,
        }
    }
}

/// Query string of the artifact routes.
#[derive(Debug, Deserialize, IntoParams, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactsQuery {
    /// URL printed in the QR codes; the configured public URL applies when omitted.
    #[validate(custom(function = "validate_base_url"))]
    pub base_url: Option<String>,
}

/// Code typed in by a guest.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UnlockRequest {
    #[validate(length(min = 1, max = 64))]
    /// Code as typed; surrounding whitespace is ignored.
    pub code: String,
}

/// Non-error outcome of an unlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UnlockStatus {
    /// The section was locked and is now revealed.
    NewlyUnlocked,
    /// The section had been revealed before.
    AlreadyUnlocked,
}

/// Response to a successful unlock request.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnlockResponse {
    /// Whether this request revealed the section.
    pub status: UnlockStatus,
    /// Section the code belongs to.
    pub section_id: u32,
    /// Text to show the guest.
    pub message: String,
    /// Board after the unlock.
    pub game: Option<GameView>,
}

/// Destructive reset; `confirm` must be `true`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetRequest {
    #[serde(default)]
    /// Must be `true` for the reset to run.
    pub confirm: bool,
}

/// Generic acknowledgement.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    /// Human readable result.
    pub message: String,
}

impl ActionResponse {
    /// Acknowledge with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Notice shown to a visitor after an entry URL was resolved.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisitNotice {
    /// Kind of outcome.
    pub outcome: NoticeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Section involved, absent for an invalid code.
    pub section_id: Option<u32>,
    /// Notice heading.
    pub title: String,
    /// Notice body.
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
/// Outcome kinds a visit notice can report.
pub enum NoticeKind {
    /// The scanned card revealed its section.
    NewlyUnlocked,
    /// The scanned card had been used before.
    AlreadyUnlocked,
    /// The code matches no section of the current photo.
    InvalidCode,
}

impl From<UnlockOutcome> for VisitNotice {
    fn from(outcome: UnlockOutcome) -> Self {
        match outcome {
            UnlockOutcome::NewlyUnlocked(id) => Self {
                outcome: NoticeKind::NewlyUnlocked,
                section_id: Some(id),
                title: "You Unlocked a Memory".into(),
                message: format!("You have successfully revealed Piece #{}.", id + 1),
            },
            UnlockOutcome::AlreadyUnlocked(id) => Self {
                outcome: NoticeKind::AlreadyUnlocked,
                section_id: Some(id),
                title: "Memory Already Found".into(),
                message: format!(
                    "Piece #{} has already been added to the collection. Go check the full picture!",
                    id + 1
                ),
            },
            UnlockOutcome::NotFound => Self {
                outcome: NoticeKind::InvalidCode,
                section_id: None,
                title: "Invalid QR Code".into(),
                message: "This code does not match any piece of the current photo.".into(),
            },
        }
    }
}

/// Phase of the visitor's dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DashboardPhase {
    /// Plain dashboard.
    Idle,
    /// A scanned code was checked; the notice is pending.
    Resolved,
}

/// Landing page payload.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    /// Whether a notice is pending.
    pub phase: DashboardPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Pending notice, if any.
    pub notice: Option<VisitNotice>,
    /// `None` until a photo is uploaded.
    pub game: Option<GameView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game() -> GameState {
        GameState {
            image_url: Some("https://example.com/p.jpg".into()),
            sections: (0..4)
                .map(|id| Section {
                    id,
                    code: format!("WED-SECR{id}"),
                    is_unlocked: id == 2,
                    row: id / 2,
                    col: id % 2,
                })
                .collect(),
            updated_at: None,
        }
    }

    #[test]
    fn public_view_never_serializes_codes() {
        let json = serde_json::to_string(&GameView::from(&game())).unwrap();
        assert!(!json.contains("WED-SECR"));
        assert!(!json.contains("\"code\""));
        assert!(json.contains("\"unlockedCount\":1"));
        assert!(json.contains("\"gridSize\":2"));
    }

    #[test]
    fn admin_view_includes_codes() {
        let view = AdminGameView::from(&game());
        assert_eq!(view.sections[3].code, "WED-SECR3");
    }

    #[test]
    fn upload_request_validation() {
        let ok = UploadPhotoRequest {
            image_url: "data:image/png;base64,AAAA".into(),
            grid_size: Some(4),
            base_url: None,
        };
        assert!(ok.validate().is_ok());

        let bad_grid = UploadPhotoRequest {
            grid_size: Some(13),
            ..ok
        };
        assert!(bad_grid.validate().is_err());

        let bad_image = UploadPhotoRequest {
            image_url: "javascript:alert(1)".into(),
            grid_size: None,
            base_url: None,
        };
        assert!(bad_image.validate().is_err());
    }

    #[test]
    fn artifact_label_counts_from_one() {
        let view = ArtifactView::from(ShareableArtifact {
            section_id: 0,
            code: "WED-AAAAA".into(),
            target_url: "http://localhost/?code=WED-AAAAA".into(),
            svg: "<svg/>".into(),
        });
        assert_eq!(view.label, "Piece #1");
    }
}

//! Runtime representation of the shared game document and its derived values.

use std::collections::HashSet;

use rand::Rng;
use time::OffsetDateTime;

use crate::dao::models::{GameStateEntity, SectionEntity};

/// Number of random characters following the code prefix.
pub const CODE_SUFFIX_LEN: usize = 5;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// One grid cell of the photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Position in the grid; equals the index in [`GameState::sections`].
    pub id: u32,
    /// Secret unlock credential printed on the QR card.
    pub code: String,
    /// Monotonic flag, only reset by a new upload or a reset.
    pub is_unlocked: bool,
    /// Zero-based row.
    pub row: u32,
    /// Zero-based column.
    pub col: u32,
}

/// The singleton document every view renders.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GameState {
    /// Embedded data URL or link to the photo.
    pub image_url: Option<String>,
    /// Cells in grid order.
    pub sections: Vec<Section>,
    /// Last write time when the backend records it.
    pub updated_at: Option<OffsetDateTime>,
}

/// Result of submitting a code to the unlock resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// The section with this id was locked and is now revealed.
    NewlyUnlocked(u32),
    /// The section with this id had been revealed before; nothing was written.
    AlreadyUnlocked(u32),
    /// No section carries the submitted code.
    NotFound,
}

impl GameState {
    /// True once every section is revealed. An empty board is never complete.
    pub fn is_complete(&self) -> bool {
        !self.sections.is_empty() && self.sections.iter().all(|section| section.is_unlocked)
    }

    /// Number of revealed sections.
    pub fn unlocked_count(&self) -> usize {
        self.sections
            .iter()
            .filter(|section| section.is_unlocked)
            .count()
    }

    /// Number of sections.
    pub fn total(&self) -> usize {
        self.sections.len()
    }

    /// Side length of the square grid.
    pub fn grid_size(&self) -> u32 {
        self.sections.len().isqrt() as u32
    }

    /// True when `self` is the same board as `previous` but with a section
    /// locked that `previous` had unlocked.
    pub fn rolls_back(&self, previous: &GameState) -> bool {
        self.image_url == previous.image_url
            && self.sections.len() == previous.sections.len()
            && self
                .sections
                .iter()
                .zip(&previous.sections)
                .all(|(next, prev)| next.code == prev.code)
            && self
                .sections
                .iter()
                .zip(&previous.sections)
                .any(|(next, prev)| prev.is_unlocked && !next.is_unlocked)
    }

    /// Whether a photo was uploaded and the board generated.
    pub fn is_configured(&self) -> bool {
        self.image_url.is_some() && !self.sections.is_empty()
    }
}

/// Build `grid_size²` locked sections with fresh codes unique within the board.
pub fn generate_sections(grid_size: u32, prefix: &str, rng: &mut impl Rng) -> Vec<Section> {
    let total = grid_size * grid_size;
    let mut issued = HashSet::with_capacity(total as usize);

    (0..total)
        .map(|id| {
            let code = loop {
                let candidate = generate_code(prefix, rng);
                if issued.insert(candidate.clone()) {
                    break candidate;
                }
            };
            Section {
                id,
                code,
                is_unlocked: false,
                row: id / grid_size,
                col: id % grid_size,
            }
        })
        .collect()
}

/// `<PREFIX>-XXXXX` with an uppercase alphanumeric suffix (36^5 combinations).
pub fn generate_code(prefix: &str, rng: &mut impl Rng) -> String {
    let suffix: String = (0..CODE_SUFFIX_LEN)
        .map(|_| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
        .collect();
    format!("{prefix}-{suffix}")
}

impl From<SectionEntity> for Section {
    fn from(value: SectionEntity) -> Self {
        Self {
            id: value.id,
            code: value.code,
            is_unlocked: value.is_unlocked,
            row: value.row,
            col: value.col,
        }
    }
}

impl From<Section> for SectionEntity {
    fn from(value: Section) -> Self {
        Self {
            id: value.id,
            code: value.code,
            is_unlocked: value.is_unlocked,
            row: value.row,
            col: value.col,
        }
    }
}

impl From<GameStateEntity> for GameState {
    fn from(value: GameStateEntity) -> Self {
        Self {
            image_url: value.image_url,
            sections: value.sections.into_iter().map(Into::into).collect(),
            updated_at: value.updated_at,
        }
    }
}

impl From<GameState> for GameStateEntity {
    fn from(value: GameState) -> Self {
        Self {
            image_url: value.image_url,
            sections: value.sections.into_iter().map(Into::into).collect(),
            updated_at: value.updated_at,
        }
    }
}

use tracing::{debug, info};

use crate::{
    error::ServiceError,
    state::{
        game::{GameState, Section, UnlockOutcome},
        store::StateStore,
    },
};

/// Where a submitted code lands on the current board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeMatch {
    /// No section carries the code.
    Missing,
    /// The section with this id is already revealed.
    Unlocked(u32),
    /// The section at this index is still hidden.
    Locked(usize),
}

/// Match `candidate` against the board. Surrounding whitespace is ignored,
/// the comparison is otherwise exact and case-sensitive.
pub fn resolve_code(candidate: &str, sections: &[Section]) -> CodeMatch {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return CodeMatch::Missing;
    }

    match sections
        .iter()
        .enumerate()
        .find(|(_, section)| section.code == candidate)
    {
        None => CodeMatch::Missing,
        Some((_, section)) if section.is_unlocked => CodeMatch::Unlocked(section.id),
        Some((index, _)) => CodeMatch::Locked(index),
    }
}

/// Unlock the section carrying `code`, writing at most once per section.
pub async fn unlock_by_code(store: &StateStore, code: &str) -> Result<UnlockOutcome, ServiceError> {
    store
        .run_exclusive(|| async move {
            let current = store.current().await?.unwrap_or_default();
            match resolve_code(code, &current.sections) {
                CodeMatch::Missing => {
                    debug!("submitted code matches no section");
                    Ok(UnlockOutcome::NotFound)
                }
                CodeMatch::Unlocked(id) => Ok(UnlockOutcome::AlreadyUnlocked(id)),
                CodeMatch::Locked(index) => apply(store, index, &current).await,
            }
        })
        .await
}

/// Admin bypass: unlock by grid position instead of by code.
pub async fn unlock_by_index(
    store: &StateStore,
    index: usize,
) -> Result<UnlockOutcome, ServiceError> {
    store
        .run_exclusive(|| async move {
            let current = store
                .current()
                .await?
                .ok_or(ServiceError::NoPhotoConfigured)?;
            let section = current
                .sections
                .get(index)
                .ok_or_else(|| ServiceError::NotFound(format!("section {index}")))?;

            if section.is_unlocked {
                return Ok(UnlockOutcome::AlreadyUnlocked(section.id));
            }
            apply(store, index, &current).await
        })
        .await
}

async fn apply(
    store: &StateStore,
    index: usize,
    current: &GameState,
) -> Result<UnlockOutcome, ServiceError> {
    match store.apply_unlock(index, &current.sections).await? {
        Some(updated) => {
            let id = current.sections[index].id;
            info!(
                section = id,
                unlocked = updated.unlocked_count(),
                total = updated.total(),
                "section unlocked"
            );
            Ok(UnlockOutcome::NewlyUnlocked(id))
        }
        // The board was replaced between read and write.
        None => Ok(UnlockOutcome::NotFound),
    }
}

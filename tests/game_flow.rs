//! Store, resolver and admin flows driven through the library API.

use std::{path::PathBuf, sync::Arc, time::Duration};

use photo_reveal_back::{
    config::AppConfig,
    dao::game_store::local::LocalGameStore,
    dto::game::UploadPhotoRequest,
    error::ServiceError,
    services::{admin_service, game_service, public_service},
    state::{AppState, SharedState, game::UnlockOutcome},
};
use uuid::Uuid;

const PHOTO: &str = "data:image/png;base64,iVBORw0KGgo=";

fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!("photo-reveal-flow-{}", Uuid::new_v4()))
}

async fn app_at(dir: &PathBuf) -> SharedState {
    let backend = LocalGameStore::open(dir).await.unwrap();
    AppState::with_backend(AppConfig::default(), Arc::new(backend))
}

async fn upload(state: &SharedState, grid_size: u32) -> Vec<String> {
    let response = admin_service::upload_photo(
        state,
        UploadPhotoRequest {
            image_url: PHOTO.into(),
            grid_size: Some(grid_size),
            base_url: None,
        },
    )
    .await
    .unwrap();
    response
        .game
        .sections
        .into_iter()
        .map(|section| section.code)
        .collect()
}

#[tokio::test]
async fn concurrent_scans_of_one_card_unlock_it_once() {
    let state = app_at(&scratch_dir()).await;
    let codes = upload(&state, 3).await;
    let code = codes[4].clone();

    let attempts = (0..8).map(|_| {
        let state = state.clone();
        let code = code.clone();
        tokio::spawn(async move { game_service::unlock_by_code(state.store(), &code).await })
    });
    let outcomes: Vec<UnlockOutcome> = futures::future::join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let newly = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, UnlockOutcome::NewlyUnlocked(4)))
        .count();
    assert_eq!(newly, 1);
    assert!(
        outcomes
            .iter()
            .all(|outcome| matches!(
                outcome,
                UnlockOutcome::NewlyUnlocked(4) | UnlockOutcome::AlreadyUnlocked(4)
            ))
    );

    let view = public_service::game_view(&state).await.unwrap();
    assert_eq!(view.unlocked_count, 1);
}

#[tokio::test]
async fn new_upload_invalidates_printed_cards() {
    let state = app_at(&scratch_dir()).await;
    let old_codes = upload(&state, 2).await;
    game_service::unlock_by_code(state.store(), &old_codes[0])
        .await
        .unwrap();

    let new_codes = upload(&state, 2).await;
    let view = public_service::game_view(&state).await.unwrap();
    assert_eq!(view.unlocked_count, 0);

    for code in &old_codes {
        if !new_codes.contains(code) {
            assert_eq!(
                game_service::unlock_by_code(state.store(), code)
                    .await
                    .unwrap(),
                UnlockOutcome::NotFound
            );
        }
    }
}

#[tokio::test]
async fn progress_survives_restart() {
    let dir = scratch_dir();
    let codes = {
        let state = app_at(&dir).await;
        let codes = upload(&state, 2).await;
        for code in &codes {
            game_service::unlock_by_code(state.store(), code)
                .await
                .unwrap();
        }
        codes
    };

    let state = app_at(&dir).await;
    let view = public_service::game_view(&state).await.unwrap();
    assert!(view.is_complete);
    assert_eq!(view.total, codes.len());
    assert_eq!(
        game_service::unlock_by_code(state.store(), &codes[1])
            .await
            .unwrap(),
        UnlockOutcome::AlreadyUnlocked(1)
    );
}

#[tokio::test]
async fn subscribers_follow_unlocks_until_reset() {
    let state = app_at(&scratch_dir()).await;
    let codes = upload(&state, 2).await;
    let mut subscription = state.store().subscribe().await.unwrap();

    let initial = subscription.next().await.unwrap().unwrap();
    assert_eq!(initial.unlocked_count(), 0);

    game_service::unlock_by_code(state.store(), &codes[2])
        .await
        .unwrap();
    let after_unlock = tokio::time::timeout(Duration::from_secs(2), subscription.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(after_unlock.sections[2].is_unlocked);

    admin_service::reset_game(&state, true).await.unwrap();
    let after_reset = tokio::time::timeout(Duration::from_secs(2), subscription.next())
        .await
        .unwrap()
        .unwrap();
    assert!(after_reset.is_none());

    assert!(matches!(
        public_service::game_view(&state).await,
        Err(ServiceError::NoPhotoConfigured)
    ));
}

#[tokio::test]
async fn detached_store_reports_degraded() {
    let state = AppState::new(AppConfig::default());
    assert!(state.is_degraded().await);
    assert!(matches!(
        game_service::unlock_by_code(state.store(), "WED-AAAAA").await,
        Err(ServiceError::Degraded)
    ));
    assert!(matches!(
        public_service::game_view(&state).await,
        Err(ServiceError::Degraded)
    ));
}

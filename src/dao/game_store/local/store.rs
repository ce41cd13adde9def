use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::{fs, sync::Mutex};

use super::error::{LocalDaoError, LocalResult};
use crate::dao::{
    game_store::GameStore,
    models::{GameStateEntity, SectionEntity},
    storage::StorageResult,
};

/// Fixed key (file stem) under which the game document is stored.
pub const LOCAL_STORAGE_KEY: &str = "photo_reveal_data";

/// On-disk shape: the local key only holds the image and the sections.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocalDocument {
    image_url: Option<String>,
    #[serde(default)]
    sections: Vec<SectionEntity>,
}

impl From<GameStateEntity> for LocalDocument {
    fn from(value: GameStateEntity) -> Self {
        Self {
            image_url: value.image_url,
            sections: value.sections,
        }
    }
}

impl From<LocalDocument> for GameStateEntity {
    fn from(value: LocalDocument) -> Self {
        Self {
            image_url: value.image_url,
            sections: value.sections,
            updated_at: None,
        }
    }
}

/// Single-device backend persisting the game document as one JSON file.
#[derive(Clone)]
pub struct LocalGameStore {
    path: Arc<PathBuf>,
    // Serialises read-modify-write cycles on the file.
    lock: Arc<Mutex<()>>,
}

impl LocalGameStore {
    /// Open (and create if needed) the data directory holding the game file.
    pub async fn open(data_dir: impl AsRef<Path>) -> LocalResult<Self> {
        let dir = data_dir.as_ref();
        fs::create_dir_all(dir)
            .await
            .map_err(|source| LocalDaoError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;

        Ok(Self {
            path: Arc::new(dir.join(format!("{LOCAL_STORAGE_KEY}.json"))),
            lock: Arc::new(Mutex::new(())),
        })
    }

    /// Location of the game file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> LocalResult<Option<GameStateEntity>> {
        let raw = match fs::read(self.path.as_path()).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(LocalDaoError::Read {
                    path: self.path.to_path_buf(),
                    source,
                });
            }
        };

        let document: LocalDocument =
            serde_json::from_slice(&raw).map_err(|source| LocalDaoError::Decode {
                path: self.path.to_path_buf(),
                source,
            })?;
        Ok(Some(document.into()))
    }

    /// Write through a sibling temp file so readers never observe a torn document.
    async fn write(&self, game: GameStateEntity) -> LocalResult<()> {
        let payload = serde_json::to_vec(&LocalDocument::from(game))
            .map_err(|source| LocalDaoError::Encode { source })?;
        let tmp = self.path.with_extension("json.tmp");

        fs::write(&tmp, payload)
            .await
            .map_err(|source| LocalDaoError::Write {
                path: tmp.clone(),
                source,
            })?;
        fs::rename(&tmp, self.path.as_path())
            .await
            .map_err(|source| LocalDaoError::Write {
                path: self.path.to_path_buf(),
                source,
            })
    }

    async fn load(&self) -> LocalResult<Option<GameStateEntity>> {
        let _guard = self.lock.lock().await;
        self.read().await
    }

    async fn save(&self, game: GameStateEntity) -> LocalResult<()> {
        let _guard = self.lock.lock().await;
        self.write(game).await
    }

    async fn unlock_section(
        &self,
        index: usize,
        code: &str,
        updated_at: OffsetDateTime,
    ) -> LocalResult<Option<GameStateEntity>> {
        let _guard = self.lock.lock().await;
        let Some(mut game) = self.read().await? else {
            return Ok(None);
        };
        if !game.unlock_at(index, code, updated_at) {
            return Ok(None);
        }
        self.write(game.clone()).await?;
        Ok(Some(game))
    }

    async fn clear(&self) -> LocalResult<()> {
        let _guard = self.lock.lock().await;
        match fs::remove_file(self.path.as_path()).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(LocalDaoError::Remove {
                path: self.path.to_path_buf(),
                source,
            }),
        }
    }

    async fn ensure_dir(&self) -> LocalResult<()> {
        let Some(dir) = self.path.parent() else {
            return Ok(());
        };
        fs::create_dir_all(dir)
            .await
            .map_err(|source| LocalDaoError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })
    }
}

impl GameStore for LocalGameStore {
    fn load(&self) -> BoxFuture<'static, StorageResult<Option<GameStateEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.load().await.map_err(Into::into) })
    }

    fn save(&self, game: GameStateEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save(game).await.map_err(Into::into) })
    }

    fn unlock_section(
        &self,
        index: usize,
        code: String,
        updated_at: OffsetDateTime,
    ) -> BoxFuture<'static, StorageResult<Option<GameStateEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .unlock_section(index, &code, updated_at)
                .await
                .map_err(Into::into)
        })
    }

    fn clear(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.clear().await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.load().await.map(|_| ()).map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_dir().await.map_err(Into::into) })
    }

    fn is_shared(&self) -> bool {
        false
    }
}

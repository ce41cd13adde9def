use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use mongodb::{
    Client, Collection, Database,
    bson::doc,
    options::{ClientOptions, ReturnDocument},
};
use time::OffsetDateTime;
use tokio::{sync::RwLock, time::sleep};
use tracing::debug;

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
    models::{MongoGameDocument, doc_id, section_filter, unlock_update},
};
use crate::dao::{game_store::GameStore, models::GameStateEntity, storage::StorageResult};

const GAME_COLLECTION_NAME: &str = "games";
const MAX_PING_ATTEMPTS: u32 = 10;
const INITIAL_PING_DELAY: Duration = Duration::from_millis(250);
const MAX_PING_DELAY: Duration = Duration::from_secs(5);

#[derive(Clone)]
/// Game store backed by a MongoDB collection.
pub struct MongoGameStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
    game_id: String,
}

struct MongoState {
    // Kept so the connection pool lives as long as the database handle.
    _client: Client,
    database: Database,
}

/// Build a client and wait until the server answers a ping.
async fn establish_connection(
    options: &ClientOptions,
    database_name: &str,
) -> MongoResult<MongoState> {
    let client = Client::with_options(options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(database_name);

    let mut attempts = 0;
    let mut delay = INITIAL_PING_DELAY;
    loop {
        match database.run_command(doc! { "ping": 1 }).await {
            Ok(_) => break,
            Err(source) => {
                attempts += 1;
                if attempts >= MAX_PING_ATTEMPTS {
                    return Err(MongoDaoError::InitialPing { attempts, source });
                }
                debug!(attempts, "MongoDB not answering ping yet");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_PING_DELAY);
            }
        }
    }

    Ok(MongoState {
        _client: client,
        database,
    })
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = self.state.read().await.database.clone();

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let fresh = establish_connection(&self.config.options, &self.config.database_name).await?;
        *self.state.write().await = fresh;
        Ok(())
    }
}

impl MongoGameStore {
    /// Establish a connection to MongoDB for the given game instance.
    pub async fn connect(config: MongoConfig, game_id: &str) -> MongoResult<Self> {
        let state = establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(state),
            config,
            game_id: game_id.to_owned(),
        });

        Ok(Self { inner })
    }

    fn game_id(&self) -> &str {
        &self.inner.game_id
    }

    async fn collection(&self) -> Collection<MongoGameDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoGameDocument>(GAME_COLLECTION_NAME)
    }

    async fn load(&self) -> MongoResult<Option<GameStateEntity>> {
        let collection = self.collection().await;
        let document = collection
            .find_one(doc_id(self.game_id()))
            .await
            .map_err(|source| MongoDaoError::LoadGame {
                id: self.game_id().to_owned(),
                source,
            })?;

        Ok(document.map(Into::into))
    }

    async fn save(&self, game: GameStateEntity) -> MongoResult<()> {
        let document = MongoGameDocument::from((self.game_id().to_owned(), game));
        let collection = self.collection().await;
        collection
            .replace_one(doc_id(self.game_id()), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveGame {
                id: self.game_id().to_owned(),
                source,
            })?;

        Ok(())
    }

    /// Flip one section flag in place; the filter pins the code so a replaced
    /// board is never touched.
    async fn unlock_section(
        &self,
        index: usize,
        code: &str,
        updated_at: OffsetDateTime,
    ) -> MongoResult<Option<GameStateEntity>> {
        let collection = self.collection().await;
        let document = collection
            .find_one_and_update(
                section_filter(self.game_id(), index, code),
                unlock_update(index, updated_at),
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::UnlockSection {
                id: self.game_id().to_owned(),
                index,
                source,
            })?;

        Ok(document.map(Into::into))
    }

    async fn clear(&self) -> MongoResult<()> {
        let collection = self.collection().await;
        collection
            .delete_one(doc_id(self.game_id()))
            .await
            .map_err(|source| MongoDaoError::DeleteGame {
                id: self.game_id().to_owned(),
                source,
            })?;
        Ok(())
    }
}

impl GameStore for MongoGameStore {
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
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }

    fn is_shared(&self) -> bool {
        true
    }
}

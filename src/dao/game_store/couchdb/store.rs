use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use time::OffsetDateTime;
use tracing::debug;

use crate::dao::{game_store::GameStore, models::GameStateEntity, storage::StorageResult};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{CouchGameDocument, game_doc_id},
};

const MAX_CONFLICT_ATTEMPTS: u32 = 3;

#[derive(Clone)]
/// Game store backed by a CouchDB database.
pub struct CouchGameStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
    doc_id: Arc<str>,
}

impl CouchGameStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig, game_id: &str) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
            doc_id: Arc::<str>::from(game_doc_id(game_id)),
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, self.database, path);
        self.authorize(self.client.request(method, url))
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = format!("{}/{}", self.base_url, self.database);

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .authorize(self.client.put(&url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<()>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, doc_id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: response.status(),
            })
        }
    }

    async fn delete_document(&self, doc_id: &str, rev: &str) -> CouchResult<()> {
        let response = self
            .request(Method::DELETE, doc_id)
            .query(&[("rev", rev)])
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => Ok(()),
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn load(&self) -> CouchResult<Option<GameStateEntity>> {
        let doc = self.get_document::<CouchGameDocument>(&self.doc_id).await?;
        Ok(doc.map(Into::into))
    }

    /// Replace the document, carrying over the current revision; retried when
    /// another writer bumps the revision in between.
    async fn save(&self, game: GameStateEntity) -> CouchResult<()> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let rev = self
                .get_document::<CouchGameDocument>(&self.doc_id)
                .await?
                .and_then(|existing| existing.rev);
            let doc = CouchGameDocument::from((self.doc_id.to_string(), game.clone(), rev));
            match self.put_document(&self.doc_id, &doc).await {
                Err(err) if err.is_conflict() && attempts < MAX_CONFLICT_ATTEMPTS => {
                    debug!(attempts, "CouchDB save conflicted; retrying");
                }
                Err(err) if err.is_conflict() => {
                    return Err(CouchDaoError::Conflict {
                        path: self.doc_id.to_string(),
                        attempts,
                    });
                }
                other => return other,
            }
        }
    }

    async fn unlock_section(
        &self,
        index: usize,
        code: &str,
        updated_at: OffsetDateTime,
    ) -> CouchResult<Option<GameStateEntity>> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let Some(mut doc) = self
                .get_document::<CouchGameDocument>(&self.doc_id)
                .await?
            else {
                return Ok(None);
            };

            if !doc.game.unlock_at(index, code, updated_at) {
                return Ok(None);
            }

            match self.put_document(&self.doc_id, &doc).await {
                Ok(()) => return Ok(Some(doc.into())),
                Err(err) if err.is_conflict() && attempts < MAX_CONFLICT_ATTEMPTS => {
                    debug!(attempts, index, "CouchDB unlock conflicted; retrying");
                }
                Err(err) if err.is_conflict() => {
                    return Err(CouchDaoError::Conflict {
                        path: self.doc_id.to_string(),
                        attempts,
                    });
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn clear(&self) -> CouchResult<()> {
        let existing = self.get_document::<CouchGameDocument>(&self.doc_id).await?;
        match existing.and_then(|doc| doc.rev) {
            Some(rev) => self.delete_document(&self.doc_id, &rev).await,
            None => Ok(()),
        }
    }

    async fn ping(&self) -> CouchResult<()> {
        let url = format!("{}/{}", self.base_url, self.database);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: url.clone(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path: url,
                status: response.status(),
            })
        }
    }
}

impl GameStore for CouchGameStore {
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
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }

    fn is_shared(&self) -> bool {
        true
    }
}

//! Cliente do Registry
//!
//! O Registry é o backend REST que guarda pacientes, cuidadores e consultas.
//! Todas as requisições enviam `Content-type: application/json` e nenhuma
//! credencial: a sessão existe apenas localmente.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::models::EntityId;
use crate::RegistryConfig;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Coleções expostas pelo Registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Patients,
    Caregivers,
    Appointments,
}

impl Collection {
    /// Segmento de caminho usado pelo Registry
    pub fn path(&self) -> &'static str {
        match self {
            Collection::Patients => "pacientes",
            Collection::Caregivers => "cuidador",
            Collection::Appointments => "consultasHC",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Operações oferecidas pelo Registry
///
/// `replace` e `delete` de um id inexistente não têm efeito e não são erro.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Registry: Send + Sync {
    /// Busca a coleção inteira, na ordem devolvida pelo servidor
    async fn fetch_all(&self, collection: Collection) -> RegistryResult<Vec<Value>>;

    async fn create(&self, collection: Collection, body: Value) -> RegistryResult<()>;

    async fn replace(&self, collection: Collection, id: EntityId, body: Value)
        -> RegistryResult<()>;

    async fn delete(&self, collection: Collection, id: EntityId) -> RegistryResult<()>;
}

/// Registry acessado por HTTP
#[derive(Debug, Clone)]
pub struct HttpRegistry {
    client: Client,
    base_url: String,
}

impl HttpRegistry {
    pub fn new(config: &RegistryConfig) -> RegistryResult<Self> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn collection_path(collection: Collection) -> String {
        format!("/{}", collection.path())
    }

    fn record_path(collection: Collection, id: &EntityId) -> String {
        format!("/{}/{}", collection.path(), id)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn encode(body: &Value) -> RegistryResult<Vec<u8>> {
        serde_json::to_vec(body).map_err(RegistryError::Serialization)
    }

    /// Sucesso para 2xx; 404 em escrita por id é o caso "registro inexistente" e vira no-op
    fn check(
        method: &'static str,
        path: String,
        response: &Response,
        missing_is_noop: bool,
    ) -> RegistryResult<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        if missing_is_noop && status == StatusCode::NOT_FOUND {
            warn!("{} {} sem efeito: registro não existe no Registry", method, path);
            return Ok(());
        }

        Err(RegistryError::Status {
            method,
            path,
            status: status.as_u16(),
        })
    }
}

#[async_trait]
impl Registry for HttpRegistry {
    async fn fetch_all(&self, collection: Collection) -> RegistryResult<Vec<Value>> {
        let path = Self::collection_path(collection);
        debug!("GET {}", path);

        let response = self
            .client
            .get(self.url(&path))
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .send()
            .await?;
        Self::check("GET", path, &response, false)?;

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|source| RegistryError::Decode { collection, source })
    }

    async fn create(&self, collection: Collection, body: Value) -> RegistryResult<()> {
        let path = Self::collection_path(collection);
        debug!("POST {}", path);

        let response = self
            .client
            .post(self.url(&path))
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(Self::encode(&body)?)
            .send()
            .await?;
        Self::check("POST", path, &response, false)
    }

    async fn replace(
        &self,
        collection: Collection,
        id: EntityId,
        body: Value,
    ) -> RegistryResult<()> {
        let path = Self::record_path(collection, &id);
        debug!("PUT {}", path);

        let response = self
            .client
            .put(self.url(&path))
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(Self::encode(&body)?)
            .send()
            .await?;
        Self::check("PUT", path, &response, true)
    }

    async fn delete(&self, collection: Collection, id: EntityId) -> RegistryResult<()> {
        let path = Self::record_path(collection, &id);
        debug!("DELETE {}", path);

        let response = self
            .client
            .delete(self.url(&path))
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .send()
            .await?;
        Self::check("DELETE", path, &response, true)
    }
}

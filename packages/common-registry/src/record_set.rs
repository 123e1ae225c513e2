//! Cópia local de uma coleção do Registry
//!
//! Toda escrita é enviada ao Registry e seguida de uma nova leitura completa da
//! coleção: o cache só reflete o que o servidor confirmou. Leituras do cache são
//! síncronas e podem estar defasadas em relação a escritas de outras sessões.
//! Registros que não seguem o formato esperado são descartados da cópia local,
//! sem impedir a carga dos demais.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::{PoisonError, RwLock, RwLockReadGuard};
use tracing::{debug, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::models::EntityId;
use crate::registry::{Collection, Registry};

/// Registro pertencente a uma coleção do Registry
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync {
    const COLLECTION: Collection;

    fn id(&self) -> &EntityId;

    fn set_id(&mut self, id: EntityId);
}

#[derive(Debug)]
pub struct RecordSet<T> {
    items: RwLock<Vec<T>>,
}

impl<T> Default for RecordSet<T> {
    fn default() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
        }
    }
}

impl<T: Record> RecordSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cópia do cache na ordem devolvida pelo servidor
    pub fn snapshot(&self) -> Vec<T> {
        self.read().clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.read().len()
    }

    pub fn any(&self, predicate: impl Fn(&T) -> bool) -> bool {
        self.read().iter().any(predicate)
    }

    pub fn find(&self, predicate: impl Fn(&T) -> bool) -> Option<T> {
        self.read().iter().find(|item| predicate(item)).cloned()
    }

    pub fn filter(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        self.read()
            .iter()
            .filter(|item| predicate(item))
            .cloned()
            .collect()
    }

    /// Substitui o cache pelo conteúdo atual do Registry
    pub async fn refresh<R: Registry + ?Sized>(&self, registry: &R) -> RegistryResult<()> {
        let raw = registry.fetch_all(T::COLLECTION).await?;
        let mut items = Vec::with_capacity(raw.len());
        for value in raw {
            let id = value.get("id").cloned().unwrap_or(Value::Null);
            match serde_json::from_value::<T>(value) {
                Ok(item) => items.push(item),
                Err(e) => warn!(
                    "/{} registro {} ignorado, formato inválido: {}",
                    T::COLLECTION,
                    id,
                    e
                ),
            }
        }

        debug!("/{} recarregada: {} registros", T::COLLECTION, items.len());
        *self.items.write().unwrap_or_else(PoisonError::into_inner) = items;
        Ok(())
    }

    /// Cria o registro (gerando um id se necessário) e recarrega a coleção
    pub async fn insert<R: Registry + ?Sized>(
        &self,
        registry: &R,
        mut record: T,
    ) -> RegistryResult<T> {
        if record.id().is_empty() {
            record.set_id(EntityId::generate());
        }
        let body = serde_json::to_value(&record).map_err(RegistryError::Serialization)?;
        registry.create(T::COLLECTION, body).await?;
        self.refresh(registry).await?;
        Ok(record)
    }

    /// Substitui o registro de mesmo id e recarrega a coleção
    pub async fn replace<R: Registry + ?Sized>(&self, registry: &R, record: &T) -> RegistryResult<()> {
        let body = serde_json::to_value(record).map_err(RegistryError::Serialization)?;
        registry
            .replace(T::COLLECTION, record.id().clone(), body)
            .await?;
        self.refresh(registry).await
    }

    pub async fn remove<R: Registry + ?Sized>(&self, registry: &R, id: &EntityId) -> RegistryResult<()> {
        registry.delete(T::COLLECTION, id.clone()).await?;
        self.refresh(registry).await
    }
}

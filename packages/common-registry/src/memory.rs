//! Registry em memória para testes e demonstrações
//!
//! Mantém a ordem de inserção, atribui ids numéricos quando o registro chega sem id
//! e trata `replace`/`delete` de ids inexistentes como no-op, como o Registry real.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{RegistryError, RegistryResult};
use crate::models::EntityId;
use crate::record_set::Record;
use crate::registry::{Collection, Registry};

/// Requisição recebida pelo [`MemoryRegistry`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub collection: Collection,
    pub id: Option<EntityId>,
    pub body: Option<Value>,
}

#[derive(Debug, Default)]
struct MemoryState {
    collections: HashMap<Collection, Vec<Value>>,
    next_id: u64,
    failing: bool,
    requests: Vec<RecordedRequest>,
}

#[derive(Debug, Default)]
pub struct MemoryRegistry {
    state: Mutex<MemoryState>,
}

fn id_of(record: &Value) -> Option<String> {
    match record.get("id")? {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insere registros diretamente, sem passar pelo log de requisições
    pub fn seed<T: Record>(&self, records: &[T]) -> RegistryResult<()> {
        let mut state = self.lock();
        let entries = state.collections.entry(T::COLLECTION).or_default();
        for record in records {
            entries.push(serde_json::to_value(record).map_err(RegistryError::Serialization)?);
        }
        Ok(())
    }

    /// Simula queda do Registry: toda requisição passa a falhar
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// Conteúdo atual de uma coleção, como o servidor o guarda
    pub fn stored(&self, collection: Collection) -> Vec<Value> {
        self.lock()
            .collections
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    fn record(
        &self,
        method: &'static str,
        collection: Collection,
        id: Option<EntityId>,
        body: Option<Value>,
    ) -> RegistryResult<MutexGuard<'_, MemoryState>> {
        let path = match &id {
            Some(id) => format!("/{}/{}", collection, id),
            None => format!("/{}", collection),
        };
        let mut state = self.lock();
        state.requests.push(RecordedRequest {
            method,
            collection,
            id,
            body,
        });
        if state.failing {
            return Err(RegistryError::Status {
                method,
                path,
                status: 503,
            });
        }
        Ok(state)
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn fetch_all(&self, collection: Collection) -> RegistryResult<Vec<Value>> {
        let state = self.record("GET", collection, None, None)?;
        Ok(state
            .collections
            .get(&collection)
            .cloned()
            .unwrap_or_default())
    }

    async fn create(&self, collection: Collection, body: Value) -> RegistryResult<()> {
        let mut state = self.record("POST", collection, None, Some(body.clone()))?;
        let mut body = body;
        if id_of(&body).is_none() {
            state.next_id += 1;
            let id = state.next_id.to_string();
            if let Value::Object(fields) = &mut body {
                fields.insert("id".to_string(), Value::String(id));
            }
        }
        state.collections.entry(collection).or_default().push(body);
        Ok(())
    }

    async fn replace(
        &self,
        collection: Collection,
        id: EntityId,
        body: Value,
    ) -> RegistryResult<()> {
        let mut state = self.record("PUT", collection, Some(id.clone()), Some(body.clone()))?;
        let entries = state.collections.entry(collection).or_default();
        if let Some(slot) = entries
            .iter_mut()
            .find(|entry| id_of(entry).as_deref() == Some(id.as_str()))
        {
            let mut body = body;
            if let Value::Object(fields) = &mut body {
                fields.insert("id".to_string(), Value::String(id.to_string()));
            }
            *slot = body;
        }
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: EntityId) -> RegistryResult<()> {
        let mut state = self.record("DELETE", collection, Some(id.clone()), None)?;
        if let Some(entries) = state.collections.get_mut(&collection) {
            entries.retain(|entry| id_of(entry).as_deref() != Some(id.as_str()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_assigns_missing_id() -> anyhow::Result<()> {
        let registry = MemoryRegistry::new();
        registry
            .create(Collection::Patients, json!({"nome": "Ana"}))
            .await?;
        registry
            .create(Collection::Patients, json!({"id": "abc", "nome": "Bia"}))
            .await?;

        let stored = registry.fetch_all(Collection::Patients).await?;
        assert_eq!(stored[0]["id"], "1");
        assert_eq!(stored[1]["id"], "abc");
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_id_is_noop() -> anyhow::Result<()> {
        let registry = MemoryRegistry::new();
        registry
            .create(Collection::Appointments, json!({"id": "c1"}))
            .await?;

        registry
            .replace(Collection::Appointments, EntityId::from("c2"), json!({"x": 1}))
            .await?;
        registry
            .delete(Collection::Appointments, EntityId::from("c3"))
            .await?;

        assert_eq!(
            registry.stored(Collection::Appointments),
            vec![json!({"id": "c1"})]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_failing_registry_still_logs_request() {
        let registry = MemoryRegistry::new();
        registry.set_failing(true);

        let result = registry.fetch_all(Collection::Caregivers).await;

        assert!(matches!(
            result,
            Err(RegistryError::Status { status: 503, ref path, .. }) if path == "/cuidador"
        ));
        assert_eq!(registry.requests().len(), 1);
    }
}

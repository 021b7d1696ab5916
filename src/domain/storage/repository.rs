//! Storage trait definition

use async_trait::async_trait;

use crate::domain::DomainError;

use super::entity::{StorageEntity, StorageKey};

/// Generic storage trait for CRUD operations on any entity type
#[async_trait]
pub trait Storage<E>: Send + Sync + std::fmt::Debug
where
    E: StorageEntity + 'static,
{
    /// Retrieves an entity by its key
    async fn get(&self, key: &E::Key) -> Result<Option<E>, DomainError>;

    /// Retrieves all entities
    async fn list(&self) -> Result<Vec<E>, DomainError>;

    /// Retrieves the entities whose top-level `field` serializes to the string `value`
    async fn find_by(&self, field: &str, value: &str) -> Result<Vec<E>, DomainError> {
        let entities = self.list().await?;
        let mut matching = Vec::new();

        for entity in entities {
            if field_matches(&entity, field, value)? {
                matching.push(entity);
            }
        }

        Ok(matching)
    }

    /// Creates a new entity, returns error if already exists
    async fn create(&self, entity: E) -> Result<E, DomainError>;

    /// Updates an existing entity, returns error if not found
    async fn update(&self, entity: E) -> Result<E, DomainError>;

    /// Saves an entity (creates if not exists, updates if exists)
    async fn save(&self, entity: E) -> Result<E, DomainError> {
        if self.exists(entity.key()).await? {
            self.update(entity).await
        } else {
            self.create(entity).await
        }
    }

    /// Deletes an entity by its key, returns true if deleted
    async fn delete(&self, key: &E::Key) -> Result<bool, DomainError>;

    /// Checks if an entity exists by its key
    async fn exists(&self, key: &E::Key) -> Result<bool, DomainError> {
        Ok(self.get(key).await?.is_some())
    }

    /// Returns the count of entities
    async fn count(&self) -> Result<usize, DomainError> {
        Ok(self.list().await?.len())
    }

    /// Clears all entities
    async fn clear(&self) -> Result<(), DomainError>;
}

/// Compares a serialized top-level field of `entity` with `value`
pub fn field_matches<E: StorageEntity>(
    entity: &E,
    field: &str,
    value: &str,
) -> Result<bool, DomainError> {
    let json = serde_json::to_value(entity)
        .map_err(|e| DomainError::storage(format!("Failed to serialize entity: {}", e)))?;

    Ok(match json.get(field) {
        Some(serde_json::Value::String(s)) => s == value,
        Some(serde_json::Value::Bool(b)) => b.to_string() == value,
        Some(serde_json::Value::Number(n)) => n.to_string() == value,
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::InMemoryStorage;

    crate::entity_id!(WidgetId);

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    struct Widget {
        id: WidgetId,
        owner: String,
        active: bool,
    }

    impl StorageEntity for Widget {
        type Key = WidgetId;

        fn key(&self) -> &Self::Key {
            &self.id
        }
    }

    /// Fails every call
    #[derive(Debug)]
    struct Unavailable;

    #[async_trait]
    impl Storage<Widget> for Unavailable {
        async fn get(&self, _key: &WidgetId) -> Result<Option<Widget>, DomainError> {
            Err(DomainError::storage("unavailable"))
        }

        async fn list(&self) -> Result<Vec<Widget>, DomainError> {
            Err(DomainError::storage("unavailable"))
        }

        async fn create(&self, _entity: Widget) -> Result<Widget, DomainError> {
            Err(DomainError::storage("unavailable"))
        }

        async fn update(&self, _entity: Widget) -> Result<Widget, DomainError> {
            Err(DomainError::storage("unavailable"))
        }

        async fn delete(&self, _key: &WidgetId) -> Result<bool, DomainError> {
            Err(DomainError::storage("unavailable"))
        }

        async fn clear(&self) -> Result<(), DomainError> {
            Err(DomainError::storage("unavailable"))
        }
    }

    async fn seeded(widgets: Vec<Widget>) -> InMemoryStorage<Widget> {
        let storage = InMemoryStorage::new();
        for w in widgets {
            storage.create(w).await.unwrap();
        }
        storage
    }

    fn widget(id: &str, owner: &str, active: bool) -> Widget {
        Widget {
            id: WidgetId::new(id),
            owner: owner.to_string(),
            active,
        }
    }

    #[tokio::test]
    async fn test_find_by_string_field() {
        let storage = seeded(vec![
            widget("1", "alice", true),
            widget("2", "bob", true),
            widget("3", "alice", false),
        ])
        .await;

        let mut found = storage.find_by("owner", "alice").await.unwrap();
        found.sort_by(|a, b| a.id.cmp(&b.id));

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id.as_str(), "1");
        assert_eq!(found[1].id.as_str(), "3");
    }

    #[tokio::test]
    async fn test_find_by_bool_field() {
        let storage = seeded(vec![widget("1", "alice", true), widget("2", "bob", false)]).await;

        let found = storage.find_by("active", "false").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].owner, "bob");
    }

    #[tokio::test]
    async fn test_find_by_unknown_field() {
        let storage = seeded(vec![widget("1", "alice", true)]).await;
        assert!(storage.find_by("missing", "x").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_creates_then_updates() {
        let storage: InMemoryStorage<Widget> = InMemoryStorage::new();

        storage.save(widget("1", "alice", true)).await.unwrap();
        storage.save(widget("1", "carol", true)).await.unwrap();

        assert_eq!(storage.count().await.unwrap(), 1);
        let stored = storage.get(&WidgetId::new("1")).await.unwrap().unwrap();
        assert_eq!(stored.owner, "carol");
    }

    #[tokio::test]
    async fn test_errors_propagate() {
        assert!(matches!(
            Unavailable.find_by("owner", "alice").await,
            Err(DomainError::Storage { .. })
        ));
    }
}

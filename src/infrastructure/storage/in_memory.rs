//! In-memory storage implementation

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::domain::storage::{Storage, StorageEntity, StorageKey};
use crate::domain::DomainError;

#[derive(Debug)]
struct Slot<E> {
    sequence: u64,
    entity: E,
}

#[derive(Debug)]
struct Inner<E> {
    next_sequence: u64,
    slots: HashMap<String, Slot<E>>,
}

/// Thread-safe in-memory storage
///
/// `list` returns entities in insertion order, like the Postgres backend's
/// `ORDER BY created_at`. Data is lost when the process terminates.
#[derive(Debug)]
pub struct InMemoryStorage<E>
where
    E: StorageEntity,
{
    inner: RwLock<Inner<E>>,
}

impl<E> Default for InMemoryStorage<E>
where
    E: StorageEntity,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> InMemoryStorage<E>
where
    E: StorageEntity,
{
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                next_sequence: 0,
                slots: HashMap::new(),
            }),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner<E>>, DomainError> {
        self.inner
            .read()
            .map_err(|e| DomainError::storage(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner<E>>, DomainError> {
        self.inner
            .write()
            .map_err(|e| DomainError::storage(format!("Failed to acquire write lock: {}", e)))
    }
}

#[async_trait]
impl<E> Storage<E> for InMemoryStorage<E>
where
    E: StorageEntity + 'static,
{
    async fn get(&self, key: &E::Key) -> Result<Option<E>, DomainError> {
        Ok(self
            .read()?
            .slots
            .get(key.as_str())
            .map(|slot| slot.entity.clone()))
    }

    async fn list(&self) -> Result<Vec<E>, DomainError> {
        let inner = self.read()?;
        let mut slots: Vec<&Slot<E>> = inner.slots.values().collect();
        slots.sort_by_key(|slot| slot.sequence);

        Ok(slots.into_iter().map(|slot| slot.entity.clone()).collect())
    }

    async fn create(&self, entity: E) -> Result<E, DomainError> {
        let key = entity.key().as_str().to_string();
        let mut inner = self.write()?;

        if inner.slots.contains_key(&key) {
            return Err(DomainError::conflict(format!(
                "Entity with key '{}' already exists",
                key
            )));
        }

        let sequence = inner.next_sequence;
        inner.next_sequence += 1;
        inner.slots.insert(
            key,
            Slot {
                sequence,
                entity: entity.clone(),
            },
        );

        Ok(entity)
    }

    async fn update(&self, entity: E) -> Result<E, DomainError> {
        let key = entity.key().as_str().to_string();
        let mut inner = self.write()?;

        match inner.slots.get_mut(&key) {
            Some(slot) => {
                slot.entity = entity.clone();
                Ok(entity)
            }
            None => Err(DomainError::not_found("Entity", key)),
        }
    }

    async fn delete(&self, key: &E::Key) -> Result<bool, DomainError> {
        Ok(self.write()?.slots.remove(key.as_str()).is_some())
    }

    async fn clear(&self) -> Result<(), DomainError> {
        self.write()?.slots.clear();
        Ok(())
    }

    async fn count(&self) -> Result<usize, DomainError> {
        Ok(self.read()?.slots.len())
    }

    async fn exists(&self, key: &E::Key) -> Result<bool, DomainError> {
        Ok(self.read()?.slots.contains_key(key.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::group::{Group, GroupId};

    fn group(id: &str, name: &str) -> Group {
        Group::new("DEFAULT", name).with_id(GroupId::new(id))
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let storage = InMemoryStorage::new();
        storage.create(group("g1", "Developers")).await.unwrap();

        let found = storage.get(&GroupId::new("g1")).await.unwrap().unwrap();
        assert_eq!(found.name(), "Developers");
        assert!(storage.get(&GroupId::new("g2")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_conflict() {
        let storage = InMemoryStorage::new();
        storage.create(group("g1", "Developers")).await.unwrap();

        let result = storage.create(group("g1", "Testers")).await;
        assert!(matches!(result, Err(DomainError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_update_missing() {
        let storage: InMemoryStorage<Group> = InMemoryStorage::new();

        let result = storage.update(group("g1", "Developers")).await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_keeps_insertion_order() {
        let storage = InMemoryStorage::new();
        for (id, name) in [("z", "Last"), ("a", "First"), ("m", "Middle")] {
            storage.create(group(id, name)).await.unwrap();
        }

        let mut updated = group("z", "Renamed");
        updated.set_name("Renamed");
        storage.update(updated).await.unwrap();

        let names: Vec<_> = storage
            .list()
            .await
            .unwrap()
            .iter()
            .map(|g| g.name().to_string())
            .collect();
        assert_eq!(names, vec!["Renamed", "First", "Middle"]);
    }

    #[tokio::test]
    async fn test_delete_count_clear() {
        let storage = InMemoryStorage::new();
        storage.create(group("g1", "A")).await.unwrap();
        storage.create(group("g2", "B")).await.unwrap();

        assert!(storage.delete(&GroupId::new("g1")).await.unwrap());
        assert!(!storage.delete(&GroupId::new("g1")).await.unwrap());
        assert_eq!(storage.count().await.unwrap(), 1);

        storage.clear().await.unwrap();
        assert_eq!(storage.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_find_by_field() {
        let storage = InMemoryStorage::new();
        storage.create(group("g1", "A")).await.unwrap();
        storage
            .create(Group::new("OTHER", "B").with_id(GroupId::new("g2")))
            .await
            .unwrap();

        let found = storage.find_by("environment_id", "OTHER").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name(), "B");
    }
}

use std::time::Duration;

use moka::future::Cache;

use crate::auth::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::store::ClassroomStore;

/// batch id => owning teacher id
///
/// Every teacher request checks ownership before touching a batch, so the
/// answer is kept in memory. Ownership never changes; entries only go stale
/// when a batch is deleted, which calls [`BatchOwnerCache::forget`].
#[derive(Clone)]
pub struct BatchOwnerCache {
    owners: Cache<u64, u64>,
}

impl BatchOwnerCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            owners: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn owner_of(
        &self,
        store: &dyn ClassroomStore,
        batch_id: u64,
    ) -> AppResult<Option<u64>> {
        if let Some(owner) = self.owners.get(&batch_id).await {
            return Ok(Some(owner));
        }

        let owner = store.get_batch(batch_id).await?.map(|b| b.teacher_id);
        if let Some(owner) = owner {
            self.owners.insert(batch_id, owner).await;
        }
        Ok(owner)
    }

    /// Teacher-only guard. Batches belonging to someone else look missing.
    pub async fn ensure_owner(
        &self,
        store: &dyn ClassroomStore,
        auth: &AuthUser,
        batch_id: u64,
    ) -> AppResult<()> {
        auth.require_teacher()?;
        match self.owner_of(store, batch_id).await? {
            Some(owner) if owner == auth.user_id => Ok(()),
            _ => Err(AppError::not_found("Batch")),
        }
    }

    pub async fn remember(&self, batch_id: u64, teacher_id: u64) {
        self.owners.insert(batch_id, teacher_id).await;
    }

    pub async fn forget(&self, batch_id: u64) {
        self.owners.invalidate(&batch_id).await;
    }
}

impl Default for BatchOwnerCache {
    fn default() -> Self {
        Self::new(100_000, Duration::from_secs(3600))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{batch::NewBatch, role::Role};
    use crate::store::MemoryStore;

    fn teacher(user_id: u64) -> AuthUser {
        AuthUser {
            user_id,
            username: format!("t{user_id}"),
            role: Role::Teacher,
            student_id: None,
        }
    }

    #[tokio::test]
    async fn only_the_owner_passes() {
        let store = MemoryStore::new();
        let batch = store
            .create_batch(NewBatch {
                teacher_id: 1,
                name: "Morning".into(),
                subject: "Chemistry".into(),
                description: None,
            })
            .await
            .unwrap();
        let cache = BatchOwnerCache::default();

        assert!(cache.ensure_owner(&store, &teacher(1), batch.id).await.is_ok());
        assert!(matches!(
            cache.ensure_owner(&store, &teacher(2), batch.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            cache.ensure_owner(&store, &teacher(1), 999).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn forgotten_batches_are_looked_up_again() {
        let store = MemoryStore::new();
        let cache = BatchOwnerCache::default();
        cache.remember(5, 1).await;
        assert_eq!(cache.owner_of(&store, 5).await.unwrap(), Some(1));

        cache.forget(5).await;
        assert_eq!(cache.owner_of(&store, 5).await.unwrap(), None);
    }
}

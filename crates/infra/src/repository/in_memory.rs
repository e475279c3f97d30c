use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use warden_auth::{StoreError, Tenant, TenantRepository, User, UserRepository};
use warden_core::{TenantId, UserId};

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

/// In-memory user store for tests/dev.
///
/// Emails are unique across all tenants, as in the persistent schema.
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    inner: RwLock<HashMap<UserId, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new user. Fails on a duplicate id or email.
    pub fn insert(&self, user: User) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        if map.contains_key(&user.id) {
            return Err(StoreError::Backend(format!("user {} already exists", user.id)));
        }
        ensure_email_free(&map, &user)?;
        map.insert(user.id, user);
        Ok(())
    }

    /// Next unused user id.
    pub fn next_id(&self) -> Result<UserId, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        let max = map.keys().map(UserId::get).max().unwrap_or(0);
        Ok(UserId::new(max + 1))
    }
}

fn ensure_email_free(map: &HashMap<UserId, User>, user: &User) -> Result<(), StoreError> {
    if map.values().any(|u| u.id != user.id && u.email == user.email) {
        return Err(StoreError::DuplicateEmail(user.email.clone()));
    }
    Ok(())
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.values().find(|u| u.email == email).cloned())
    }

    async fn get_by_id(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> Result<Option<User>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map
            .get(&user_id)
            .filter(|u| u.tenant_id == tenant_id)
            .cloned())
    }

    async fn get_by_reset_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map
            .values()
            .find(|u| u.reset_password_token.as_deref() == Some(token))
            .cloned())
    }

    async fn redeem_reset_token(
        &self,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let Some(user) = map.values_mut().find(|u| {
            u.reset_password_token.as_deref() == Some(token) && u.reset_token_live(now)
        }) else {
            return Ok(false);
        };
        user.complete_password_reset(password_hash.to_string(), now);
        Ok(true)
    }

    async fn get_all(&self, tenant_id: TenantId) -> Result<Vec<User>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        let mut users: Vec<User> = map
            .values()
            .filter(|u| u.tenant_id == tenant_id)
            .cloned()
            .collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        match map.get(&user.id) {
            Some(existing) if existing.tenant_id == user.tenant_id => {}
            _ => return Err(StoreError::Missing),
        }
        ensure_email_free(&map, user)?;
        map.insert(user.id, user.clone());
        Ok(())
    }

    async fn delete(&self, tenant_id: TenantId, user_id: UserId) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        match map.get(&user_id) {
            Some(u) if u.tenant_id == tenant_id => {
                map.remove(&user_id);
                Ok(())
            }
            _ => Err(StoreError::Missing),
        }
    }
}

/// In-memory tenant directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryTenantRepository {
    inner: RwLock<HashMap<TenantId, Tenant>>,
}

impl InMemoryTenantRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, tenant: Tenant) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        map.insert(tenant.id, tenant);
        Ok(())
    }
}

#[async_trait]
impl TenantRepository for InMemoryTenantRepository {
    async fn get_tenant_by_id(&self, tenant_id: TenantId) -> Result<Option<Tenant>, StoreError> {
        let map = self.inner.read().map_err(|_| poisoned())?;
        Ok(map.get(&tenant_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use chrono::Duration;
    use warden_auth::Role;

    fn user(id: u64, tenant: u64, email: &str) -> User {
        User::new(
            UserId::new(id),
            TenantId::new(tenant),
            email,
            "$argon2id$stub",
            Role::TenantUser,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn lookups_are_tenant_isolated() {
        let repo = InMemoryUserRepository::new();
        repo.insert(user(1, 1, "a@one.test")).unwrap();
        repo.insert(user(2, 2, "b@two.test")).unwrap();

        assert!(repo.get_by_id(TenantId::new(1), UserId::new(1)).await.unwrap().is_some());
        assert!(repo.get_by_id(TenantId::new(1), UserId::new(2)).await.unwrap().is_none());

        let all = repo.get_all(TenantId::new(2)).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].email, "b@two.test");
    }

    #[tokio::test]
    async fn update_enforces_email_uniqueness_and_tenant() {
        let repo = InMemoryUserRepository::new();
        repo.insert(user(1, 1, "a@one.test")).unwrap();
        repo.insert(user(2, 1, "b@one.test")).unwrap();

        let mut b = repo.get_by_id(TenantId::new(1), UserId::new(2)).await.unwrap().unwrap();
        b.email = "a@one.test".to_string();
        assert_eq!(
            repo.update(&b).await,
            Err(StoreError::DuplicateEmail("a@one.test".to_string()))
        );

        b.email = "b@one.test".to_string();
        b.tenant_id = TenantId::new(9);
        assert_eq!(repo.update(&b).await, Err(StoreError::Missing));
    }

    #[tokio::test]
    async fn reset_token_lookup_and_delete() {
        let repo = InMemoryUserRepository::new();
        let mut u = user(1, 1, "a@one.test");
        u.reset_password_token = Some("tok".to_string());
        repo.insert(u).unwrap();

        let found = repo.get_by_reset_token("tok").await.unwrap().unwrap();
        assert_eq!(found.id, UserId::new(1));
        assert!(repo.get_by_reset_token("other").await.unwrap().is_none());

        assert_eq!(
            repo.delete(TenantId::new(2), UserId::new(1)).await,
            Err(StoreError::Missing)
        );
        repo.delete(TenantId::new(1), UserId::new(1)).await.unwrap();
        assert!(repo.get_by_email("a@one.test").await.unwrap().is_none());
        assert_eq!(repo.next_id().unwrap(), UserId::new(1));
    }

    #[tokio::test]
    async fn reset_token_redeems_once_and_not_after_expiry() {
        let repo = InMemoryUserRepository::new();
        let t0 = Utc::now();
        let mut u = user(1, 1, "a@one.test");
        u.set_reset_token("tok", t0 + Duration::hours(1), t0);
        repo.insert(u).unwrap();

        let late = t0 + Duration::hours(2);
        assert!(!repo.redeem_reset_token("tok", "$argon2id$late", late).await.unwrap());
        assert!(!repo.redeem_reset_token("other", "$argon2id$x", t0).await.unwrap());

        assert!(repo.redeem_reset_token("tok", "$argon2id$new", t0).await.unwrap());
        assert!(!repo.redeem_reset_token("tok", "$argon2id$again", t0).await.unwrap());

        let stored = repo.get_by_id(TenantId::new(1), UserId::new(1)).await.unwrap().unwrap();
        assert_eq!(stored.password_hash, "$argon2id$new");
        assert!(stored.reset_password_token.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_redemptions_have_one_winner() {
        let repo = Arc::new(InMemoryUserRepository::new());
        let t0 = Utc::now();
        let mut u = user(1, 1, "a@one.test");
        u.set_reset_token("tok", t0 + Duration::hours(1), t0);
        repo.insert(u).unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let repo = repo.clone();
                tokio::spawn(async move {
                    repo.redeem_reset_token("tok", &format!("$argon2id${i}"), t0).await.unwrap()
                })
            })
            .collect();
        let mut won = 0;
        for task in tasks {
            if task.await.unwrap() {
                won += 1;
            }
        }
        assert_eq!(won, 1);
    }

    #[tokio::test]
    async fn tenants_round_trip() {
        let repo = InMemoryTenantRepository::new();
        repo.insert(Tenant {
            id: TenantId::new(3),
            name: "acme".to_string(),
            created_at: Utc::now(),
        })
        .unwrap();
        assert_eq!(
            repo.get_tenant_by_id(TenantId::new(3)).await.unwrap().unwrap().name,
            "acme"
        );
        assert!(repo.get_tenant_by_id(TenantId::new(4)).await.unwrap().is_none());
    }
}

//! In-memory directory used by unit tests.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;

use super::directory::{
    AccountDirectory, DirectoryError, DirectoryResult, Page, Pagination, SortKey, SortOrder,
};
use super::repo_types::{NewUser, User};

#[derive(Default)]
pub struct MemoryDirectory {
    inner: Mutex<Inner>,
    latency: Option<Duration>,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    users: BTreeMap<i64, User>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `find_by_id` sleeps for `latency` before answering.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Inserts a record with a caller-chosen id.
    pub fn insert(&self, user: User) {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id = inner.next_id.max(user.id);
        inner.users.insert(user.id, user);
    }

    fn email_taken(inner: &Inner, email: &str, except: Option<i64>) -> bool {
        inner
            .users
            .values()
            .any(|u| u.email == email && Some(u.id) != except)
    }
}

#[async_trait]
impl AccountDirectory for MemoryDirectory {
    async fn find_by_id(&self, id: i64) -> DirectoryResult<User> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let inner = self.inner.lock().unwrap();
        inner.users.get(&id).cloned().ok_or(DirectoryError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> DirectoryResult<User> {
        let inner = self.inner.lock().unwrap();
        inner
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(DirectoryError::NotFound)
    }

    async fn create(&self, user: NewUser) -> DirectoryResult<User> {
        let mut inner = self.inner.lock().unwrap();
        if Self::email_taken(&inner, &user.email, None) {
            return Err(DirectoryError::Conflict);
        }
        inner.next_id += 1;
        let created = User {
            id: inner.next_id,
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            roles: user.roles,
            is_active: user.is_active,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn save(&self, user: &User) -> DirectoryResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.users.contains_key(&user.id) {
            return Err(DirectoryError::NotFound);
        }
        if Self::email_taken(&inner, &user.email, Some(user.id)) {
            return Err(DirectoryError::Conflict);
        }
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn set_active(&self, id: i64, active: bool) -> DirectoryResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let user = inner.users.get_mut(&id).ok_or(DirectoryError::NotFound)?;
        user.is_active = active;
        Ok(())
    }

    async fn delete(&self, id: i64) -> DirectoryResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .users
            .remove(&id)
            .map(|_| ())
            .ok_or(DirectoryError::NotFound)
    }

    async fn list(&self, pagination: Pagination) -> DirectoryResult<Page<User>> {
        let p = pagination.normalized();
        let inner = self.inner.lock().unwrap();
        let mut all: Vec<User> = inner.users.values().cloned().collect();
        all.sort_by(|a, b| {
            let ord = match p.sort_by {
                SortKey::Id => a.id.cmp(&b.id),
                SortKey::Email => a.email.cmp(&b.email),
                SortKey::FirstName => a.first_name.cmp(&b.first_name),
                SortKey::LastName => a.last_name.cmp(&b.last_name),
                SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            };
            let ord = match p.sort_order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            };
            ord.then(a.id.cmp(&b.id))
        });
        let total = all.len() as i64;
        let items = all
            .into_iter()
            .skip(usize::try_from(p.offset()).unwrap_or(usize::MAX))
            .take(p.limit as usize)
            .collect();
        Ok(Page {
            total,
            page: p.page,
            limit: p.limit,
            items,
        })
    }

    async fn count_with_role(&self, role: &str) -> DirectoryResult<i64> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.users.values().filter(|u| u.has_role(role)).count() as i64)
    }
}

/// Builds a user record with a placeholder digest.
pub fn sample_user(id: i64, email: &str, roles: &[&str], is_active: bool) -> User {
    User {
        id,
        email: email.into(),
        password_hash: "$argon2id$placeholder".into(),
        first_name: "Test".into(),
        last_name: "User".into(),
        roles: roles.iter().map(|r| r.to_string()).collect(),
        is_active,
        created_at: OffsetDateTime::UNIX_EPOCH,
    }
}

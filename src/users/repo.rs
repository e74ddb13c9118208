use async_trait::async_trait;
use sqlx::PgPool;

use super::directory::{AccountDirectory, DirectoryError, DirectoryResult, Page, Pagination};
use super::repo_types::{NewUser, User};

const USER_COLUMNS: &str =
    "id, email, password_hash, first_name, last_name, roles, is_active, created_at";

/// Postgres-backed account directory.
#[derive(Clone)]
pub struct PgDirectory {
    db: PgPool,
}

impl PgDirectory {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_write_error(e: sqlx::Error) -> DirectoryError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            DirectoryError::Conflict
        }
        sqlx::Error::RowNotFound => DirectoryError::NotFound,
        other => DirectoryError::Storage(other),
    }
}

#[async_trait]
impl AccountDirectory for PgDirectory {
    async fn find_by_id(&self, id: i64) -> DirectoryResult<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(DirectoryError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> DirectoryResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?
        .ok_or(DirectoryError::NotFound)
    }

    async fn create(&self, user: NewUser) -> DirectoryResult<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name, roles, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.roles)
        .bind(user.is_active)
        .fetch_one(&self.db)
        .await
        .map_err(map_write_error)
    }

    async fn save(&self, user: &User) -> DirectoryResult<()> {
        let done = sqlx::query(
            r#"
            UPDATE users
               SET email = $2, password_hash = $3, first_name = $4,
                   last_name = $5, roles = $6, is_active = $7
             WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.roles)
        .bind(user.is_active)
        .execute(&self.db)
        .await
        .map_err(map_write_error)?;

        if done.rows_affected() == 0 {
            return Err(DirectoryError::NotFound);
        }
        Ok(())
    }

    async fn set_active(&self, id: i64, active: bool) -> DirectoryResult<()> {
        let done = sqlx::query("UPDATE users SET is_active = $2 WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(&self.db)
            .await?;
        if done.rows_affected() == 0 {
            return Err(DirectoryError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> DirectoryResult<()> {
        let done = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if done.rows_affected() == 0 {
            return Err(DirectoryError::NotFound);
        }
        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> DirectoryResult<Page<User>> {
        let p = pagination.normalized();
        // Column and direction come from closed enums, never from raw input.
        let items = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY {} {}, id ASC LIMIT $1 OFFSET $2",
            p.sort_by.column(),
            p.sort_order.keyword(),
        ))
        .bind(p.limit)
        .bind(p.offset())
        .fetch_all(&self.db)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await?;

        Ok(Page {
            total,
            page: p.page,
            limit: p.limit,
            items,
        })
    }

    async fn count_with_role(&self, role: &str) -> DirectoryResult<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE $1 = ANY(roles)")
            .bind(role)
            .fetch_one(&self.db)
            .await?;
        Ok(n)
    }
}

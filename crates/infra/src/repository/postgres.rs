//! Postgres-backed user and tenant repositories.
//!
//! ## Error Mapping
//!
//! | SQLx error | Postgres code | StoreError |
//! |------------|---------------|------------|
//! | Database (unique violation on `users.email`) | `23505` | `DuplicateEmail` |
//! | Database (other) | any | `Backend` |
//! | Pool / IO / decode | n/a | `Backend` |
//!
//! Identifiers are `BIGINT` columns; values outside `1..=i64::MAX` are
//! rejected as backend errors rather than silently wrapped.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::instrument;

use warden_auth::{Role, StoreError, Tenant, TenantRepository, User, UserRepository};
use warden_core::{TenantId, UserId};

const SCHEMA: &str = include_str!("../../migrations/0001_identity.sql");

const USER_COLUMNS: &str = r#"
    id,
    tenant_id,
    email,
    first_name,
    last_name,
    password_hash,
    role,
    is_active,
    is_email_verified,
    failed_login_attempts,
    last_login_at,
    last_login_ip,
    reset_password_token,
    reset_password_expires_at,
    email_verification_token,
    created_at,
    updated_at
"#;

/// Apply the identity schema (idempotent).
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    #[instrument(skip_all, err)]
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_by_email", e))?;
        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE tenant_id = $1 AND id = $2");
        let row = sqlx::query(&sql)
            .bind(to_db_id(tenant_id.get())?)
            .bind(to_db_id(user_id.get())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_by_id", e))?;
        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip_all, err)]
    async fn get_by_reset_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE reset_password_token = $1");
        let row = sqlx::query(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_by_reset_token", e))?;
        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip_all, err)]
    async fn redeem_reset_token(
        &self,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                password_hash = $2,
                reset_password_token = NULL,
                reset_password_expires_at = NULL,
                updated_at = $3
            WHERE reset_password_token = $1 AND reset_password_expires_at > $3
            "#,
        )
        .bind(token)
        .bind(password_hash)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("redeem_reset_token", e))?;
        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self), err)]
    async fn get_all(&self, tenant_id: TenantId) -> Result<Vec<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE tenant_id = $1 ORDER BY id ASC");
        let rows = sqlx::query(&sql)
            .bind(to_db_id(tenant_id.get())?)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_all", e))?;
        rows.iter().map(user_from_row).collect()
    }

    #[instrument(skip_all, fields(user_id = %user.id, tenant_id = %user.tenant_id), err)]
    async fn update(&self, user: &User) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                email = $3,
                first_name = $4,
                last_name = $5,
                password_hash = $6,
                role = $7,
                is_active = $8,
                is_email_verified = $9,
                failed_login_attempts = $10,
                last_login_at = $11,
                last_login_ip = $12,
                reset_password_token = $13,
                reset_password_expires_at = $14,
                email_verification_token = $15,
                updated_at = $16
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(to_db_id(user.tenant_id.get())?)
        .bind(to_db_id(user.id.get())?)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(user.is_email_verified)
        .bind(i32::try_from(user.failed_login_attempts).unwrap_or(i32::MAX))
        .bind(user.last_login_at)
        .bind(&user.last_login_ip)
        .bind(&user.reset_password_token)
        .bind(user.reset_password_expires_at)
        .bind(&user.email_verification_token)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing);
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn delete(&self, tenant_id: TenantId, user_id: UserId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE tenant_id = $1 AND id = $2")
            .bind(to_db_id(tenant_id.get())?)
            .bind(to_db_id(user_id.get())?)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PostgresTenantRepository {
    pool: PgPool,
}

impl PostgresTenantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantRepository for PostgresTenantRepository {
    #[instrument(skip(self), err)]
    async fn get_tenant_by_id(&self, tenant_id: TenantId) -> Result<Option<Tenant>, StoreError> {
        let row = sqlx::query("SELECT id, name, created_at FROM tenants WHERE id = $1")
            .bind(to_db_id(tenant_id.get())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_tenant_by_id", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(Tenant {
            id: TenantId::new(from_db_id(get(&row, "id")?)?),
            name: get(&row, "name")?,
            created_at: get(&row, "created_at")?,
        }))
    }
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    let role: String = get(row, "role")?;
    let role: Role = role
        .parse()
        .map_err(|e: warden_auth::UnknownRole| StoreError::Backend(e.to_string()))?;
    let attempts: i32 = get(row, "failed_login_attempts")?;

    Ok(User {
        id: UserId::new(from_db_id(get(row, "id")?)?),
        tenant_id: TenantId::new(from_db_id(get(row, "tenant_id")?)?),
        email: get(row, "email")?,
        first_name: get(row, "first_name")?,
        last_name: get(row, "last_name")?,
        password_hash: get(row, "password_hash")?,
        role,
        is_active: get(row, "is_active")?,
        is_email_verified: get(row, "is_email_verified")?,
        failed_login_attempts: u32::try_from(attempts).unwrap_or(0),
        last_login_at: get(row, "last_login_at")?,
        last_login_ip: get(row, "last_login_ip")?,
        reset_password_token: get(row, "reset_password_token")?,
        reset_password_expires_at: get(row, "reset_password_expires_at")?,
        email_verification_token: get(row, "email_verification_token")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
    })
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Backend(format!("failed to decode column {column}: {e}")))
}

fn to_db_id(id: u64) -> Result<i64, StoreError> {
    i64::try_from(id).map_err(|_| StoreError::Backend(format!("id {id} out of range")))
}

fn from_db_id(id: i64) -> Result<u64, StoreError> {
    u64::try_from(id)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| StoreError::Backend(format!("invalid stored id {id}")))
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") if db_err.constraint() == Some("users_email_key") => {
                    StoreError::DuplicateEmail(msg)
                }
                _ => StoreError::Backend(msg),
            }
        }
        other => StoreError::Backend(format!("{operation}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_must_fit_bigint_and_be_positive() {
        assert_eq!(to_db_id(5).unwrap(), 5);
        assert!(to_db_id(u64::MAX).is_err());
        assert_eq!(from_db_id(9).unwrap(), 9);
        assert!(from_db_id(0).is_err());
        assert!(from_db_id(-3).is_err());
    }

    #[test]
    fn schema_declares_unique_email() {
        assert!(SCHEMA.contains("CREATE TABLE IF NOT EXISTS users"));
        assert!(SCHEMA.contains("CONSTRAINT users_email_key UNIQUE (email)"));
    }
}

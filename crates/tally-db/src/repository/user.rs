//! # User Repository
//!
//! Users and their password credentials.
//!
//! Password hashes are argon2 PHC strings. They are written and verified
//! here and never loaded into [`User`].

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use tally_core::{Role, User};

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Creates a user with a freshly hashed password.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - email already registered
    pub async fn create(
        &self,
        email: &str,
        name: &str,
        role: Role,
        password: &str,
    ) -> DbResult<User> {
        let email = email.trim().to_lowercase();
        debug!(email = %email, role = %role, "Creating user");

        let password_hash = hash_password(password)?;
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            email,
            name: name.to_string(),
            role,
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO users (id, email, name, role, password_hash, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.role)
        .bind(&password_hash)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &user.email),
            other => other,
        })?;

        Ok(user)
    }

    /// Gets a user by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, name, role, created_at FROM users WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Gets a user by email (case-insensitive).
    pub async fn get_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, name, role, created_at FROM users WHERE email = ?1",
        )
        .bind(email.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Checks an email/password pair.
    ///
    /// ## Returns
    /// * `Ok(Some(User))` - credentials match
    /// * `Ok(None)` - unknown email or wrong password (indistinguishable)
    pub async fn verify_credentials(&self, email: &str, password: &str) -> DbResult<Option<User>> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT id, password_hash FROM users WHERE email = ?1")
                .bind(email.trim().to_lowercase())
                .fetch_optional(&self.pool)
                .await?;

        let Some((id, password_hash)) = row else {
            debug!("Login attempt for unknown email");
            return Ok(None);
        };

        if !verify_password(password, &password_hash) {
            warn!(user_id = %id, "Password verification failed");
            return Ok(None);
        }

        self.get_by_id(&id).await
    }

    /// Lists all users with a role, by name.
    pub async fn list_by_role(&self, role: Role) -> DbResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, email, name, role, created_at FROM users WHERE role = ?1 ORDER BY name",
        )
        .bind(role)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Counts users (for diagnostics and the seed binary).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Hashes a password for storage.
pub fn hash_password(password: &str) -> DbResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| DbError::Internal(format!("Failed to hash password: {}", e)))?;

    Ok(hash.to_string())
}

/// Verifies a password against a stored PHC string. Malformed hashes fail.
fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

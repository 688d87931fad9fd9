use anyhow::Context;
use axum::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::password::hash_password;
use super::repo_types::{NewUser, PublicUser, User};

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// First user whose username or email matches. `username` must already
    /// be lower-cased, the form it is stored in.
    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> anyhow::Result<Option<User>>;

    /// Insert a user; the password is hashed before it is stored.
    async fn create(&self, new_user: NewUser) -> anyhow::Result<User>;

    /// Read a user back without credential columns.
    async fn find_public_by_id(&self, id: Uuid) -> anyhow::Result<Option<PublicUser>>;
}

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, full_name, email, username, password_hash, avatar, cover_image,
                   created_at, updated_at
            FROM users
            WHERE username = $1 OR email = $2
            LIMIT 1
            "#,
        )
        .bind(username)
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by username or email")?;
        Ok(user)
    }

    async fn create(&self, new_user: NewUser) -> anyhow::Result<User> {
        let password_hash = hash_password(&new_user.password)?;
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (full_name, email, username, password_hash, avatar, cover_image)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, full_name, email, username, password_hash, avatar, cover_image,
                      created_at, updated_at
            "#,
        )
        .bind(&new_user.full_name)
        .bind(&new_user.email)
        .bind(&new_user.username)
        .bind(&password_hash)
        .bind(&new_user.avatar)
        .bind(&new_user.cover_image)
        .fetch_one(&self.db)
        .await
        .context("insert user")?;
        Ok(user)
    }

    async fn find_public_by_id(&self, id: Uuid) -> anyhow::Result<Option<PublicUser>> {
        let user = sqlx::query_as::<_, PublicUser>(
            r#"
            SELECT id, full_name, email, username, avatar, cover_image, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }
}

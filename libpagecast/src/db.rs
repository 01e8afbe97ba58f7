//! Database operations for Pagecast
//!
//! `PostStore` is the narrow contract the publishing pipeline needs: read the
//! due records and apply a status-guarded update. `Database` implements it on
//! SQLite and also carries the authoring operations used by `page-queue`.

use async_trait::async_trait;
use secrecy::SecretString;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;

use crate::error::{DbError, PagecastError, Result};
use crate::types::{Destination, Post, PostRecord, PostStatus, StatusChange, Template};

/// Storage contract used by the publishing pipeline.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// All `scheduled` records with `scheduled_at <= now`, images in stored order.
    async fn due_posts(&self, now: i64) -> Result<Vec<PostRecord>>;

    /// Apply `change` only if the post is still in `expected` status.
    ///
    /// Returns `Ok(false)` when the status no longer matches; that is a no-op,
    /// not an error.
    async fn update_if_status(
        &self,
        post_id: &str,
        expected: PostStatus,
        change: &StatusChange,
    ) -> Result<bool>;
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(db_path: &str) -> Result<Self> {
        // Expand path and create parent directories
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
        }

        // mode=rwc creates the file on first use
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        // The files hold page access tokens: owner read/write only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            for suffix in ["", "-wal", "-shm"] {
                let file = format!("{}{}", expanded_path, suffix);
                if Path::new(&file).exists() {
                    let perms = std::fs::Permissions::from_mode(0o600);
                    std::fs::set_permissions(&file, perms).map_err(DbError::IoError)?;
                }
            }
        }

        Self::from_pool(pool).await
    }

    /// Single-connection in-memory database, mainly for tests.
    pub async fn in_memory() -> Result<Self> {
        // Every connection to sqlite::memory: is a separate database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(DbError::SqlxError)?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ------------------------------------------------------------------
    // Destinations
    // ------------------------------------------------------------------

    pub async fn create_destination(&self, destination: &Destination) -> Result<()> {
        use secrecy::ExposeSecret;

        sqlx::query(
            r#"
            INSERT INTO destinations (id, external_id, name, access_token, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&destination.id)
        .bind(&destination.external_id)
        .bind(&destination.name)
        .bind(destination.access_token.expose_secret())
        .bind(destination.created_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Look a destination up by internal id, falling back to the external page id.
    pub async fn get_destination(&self, id_or_external: &str) -> Result<Option<Destination>> {
        const LOOKUPS: [&str; 2] = [
            "SELECT id, external_id, name, access_token, created_at FROM destinations WHERE id = ?",
            "SELECT id, external_id, name, access_token, created_at FROM destinations WHERE external_id = ?",
        ];

        for sql in LOOKUPS {
            let row = sqlx::query(sql)
                .bind(id_or_external)
                .fetch_optional(&self.pool)
                .await
                .map_err(DbError::SqlxError)?;

            if let Some(r) = row {
                return destination_from_row(&r, "").map(Some);
            }
        }

        Ok(None)
    }

    pub async fn list_destinations(&self) -> Result<Vec<Destination>> {
        let rows = sqlx::query(
            r#"
            SELECT id, external_id, name, access_token, created_at
            FROM destinations ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(|r| destination_from_row(r, "")).collect()
    }

    // ------------------------------------------------------------------
    // Posts
    // ------------------------------------------------------------------

    /// Insert a post with its ordered images in one transaction
    pub async fn create_post(&self, post: &Post, images: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(DbError::SqlxError)?;

        sqlx::query(
            r#"
            INSERT INTO posts (id, content, destination_id, status, created_at, scheduled_at,
                               published_at, external_post_id, error_message)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(&post.content)
        .bind(&post.destination_id)
        .bind(post.status.as_str())
        .bind(post.created_at)
        .bind(post.scheduled_at)
        .bind(post.published_at)
        .bind(&post.external_post_id)
        .bind(&post.error_message)
        .execute(&mut *tx)
        .await
        .map_err(DbError::SqlxError)?;

        for (position, url) in images.iter().enumerate() {
            sqlx::query("INSERT INTO post_images (post_id, position, url) VALUES (?, ?, ?)")
                .bind(&post.id)
                .bind(position as i64)
                .bind(url)
                .execute(&mut *tx)
                .await
                .map_err(DbError::SqlxError)?;
        }

        tx.commit().await.map_err(DbError::SqlxError)?;
        Ok(())
    }

    /// Get a post by ID
    pub async fn get_post(&self, post_id: &str) -> Result<Option<Post>> {
        let row = sqlx::query(
            r#"
            SELECT id, content, destination_id, status, created_at, scheduled_at,
                   published_at, external_post_id, error_message
            FROM posts WHERE id = ?
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        row.map(|r| post_from_row(&r)).transpose()
    }

    /// Image URLs of a post in publish order
    pub async fn get_post_images(&self, post_id: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT url FROM post_images WHERE post_id = ? ORDER BY position ASC",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter()
            .map(|r| {
                r.try_get::<String, _>("url")
                    .map_err(|e| PagecastError::from(DbError::SqlxError(e)))
            })
            .collect()
    }

    /// Posts filtered by status, most recent first
    pub async fn list_posts(&self, status: Option<PostStatus>) -> Result<Vec<Post>> {
        let mut query_str = String::from(
            r#"
            SELECT id, content, destination_id, status, created_at, scheduled_at,
                   published_at, external_post_id, error_message
            FROM posts
            "#,
        );
        if status.is_some() {
            query_str.push_str(" WHERE status = ?");
        }
        query_str.push_str(" ORDER BY COALESCE(scheduled_at, created_at) DESC, id ASC");

        let mut query = sqlx::query(&query_str);
        if let Some(s) = status {
            query = query.bind(s.as_str());
        }

        let rows = query.fetch_all(&self.pool).await.map_err(DbError::SqlxError)?;
        rows.iter().map(post_from_row).collect()
    }

    /// Move a post back into `scheduled` as a fresh attempt.
    ///
    /// Allowed from draft, scheduled and failed. The previous failure reason
    /// is cleared so that only failed posts carry an error message.
    /// Returns `false` if the post does not exist or is already published.
    pub async fn reschedule_post(&self, post_id: &str, scheduled_at: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE posts
            SET status = 'scheduled', scheduled_at = ?, error_message = NULL
            WHERE id = ? AND status IN ('draft', 'scheduled', 'failed')
            "#,
        )
        .bind(scheduled_at)
        .bind(post_id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }

    /// Number of posts in each status (statuses with no posts are omitted)
    pub async fn count_by_status(&self) -> Result<Vec<(PostStatus, i64)>> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM posts GROUP BY status")
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        rows.iter()
            .map(|r| -> Result<(PostStatus, i64)> {
                let raw: String = r.try_get("status").map_err(DbError::SqlxError)?;
                let status = parse_status(&raw)?;
                let count: i64 = r.try_get("n").map_err(DbError::SqlxError)?;
                Ok((status, count))
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Templates
    // ------------------------------------------------------------------

    /// Insert a template with its ordered images in one transaction
    pub async fn create_template(&self, template: &Template, images: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(DbError::SqlxError)?;

        sqlx::query("INSERT INTO templates (id, name, content, created_at) VALUES (?, ?, ?, ?)")
            .bind(&template.id)
            .bind(&template.name)
            .bind(&template.content)
            .bind(template.created_at)
            .execute(&mut *tx)
            .await
            .map_err(DbError::SqlxError)?;

        for (position, url) in images.iter().enumerate() {
            sqlx::query("INSERT INTO template_images (template_id, position, url) VALUES (?, ?, ?)")
                .bind(&template.id)
                .bind(position as i64)
                .bind(url)
                .execute(&mut *tx)
                .await
                .map_err(DbError::SqlxError)?;
        }

        tx.commit().await.map_err(DbError::SqlxError)?;
        Ok(())
    }

    pub async fn get_template(&self, template_id: &str) -> Result<Option<Template>> {
        let row = sqlx::query("SELECT id, name, content, created_at FROM templates WHERE id = ?")
            .bind(template_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        row.map(|r| template_from_row(&r)).transpose()
    }

    /// Image URLs of a template in display order
    pub async fn get_template_images(&self, template_id: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(
            "SELECT url FROM template_images WHERE template_id = ? ORDER BY position ASC",
        )
        .bind(template_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter()
            .map(|r| {
                r.try_get::<String, _>("url")
                    .map_err(|e| PagecastError::from(DbError::SqlxError(e)))
            })
            .collect()
    }

    pub async fn list_templates(&self) -> Result<Vec<Template>> {
        let rows = sqlx::query(
            "SELECT id, name, content, created_at FROM templates ORDER BY name ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(template_from_row).collect()
    }

    /// Returns `false` if no template has this id.
    /// Posts created from the template keep their own copy of its content.
    pub async fn delete_template(&self, template_id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(DbError::SqlxError)?;

        sqlx::query("DELETE FROM template_images WHERE template_id = ?")
            .bind(template_id)
            .execute(&mut *tx)
            .await
            .map_err(DbError::SqlxError)?;

        let result = sqlx::query("DELETE FROM templates WHERE id = ?")
            .bind(template_id)
            .execute(&mut *tx)
            .await
            .map_err(DbError::SqlxError)?;

        tx.commit().await.map_err(DbError::SqlxError)?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl PostStore for Database {
    async fn due_posts(&self, now: i64) -> Result<Vec<PostRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.content, p.destination_id, p.status, p.created_at, p.scheduled_at,
                   p.published_at, p.external_post_id, p.error_message,
                   d.id AS d_id, d.external_id AS d_external_id, d.name AS d_name,
                   d.access_token AS d_access_token, d.created_at AS d_created_at
            FROM posts p
            JOIN destinations d ON d.id = p.destination_id
            WHERE p.status = 'scheduled'
              AND p.scheduled_at IS NOT NULL
              AND p.scheduled_at <= ?
            ORDER BY p.scheduled_at ASC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let post = post_from_row(row)?;
            let destination = destination_from_row(row, "d_")?;
            let images = self.get_post_images(&post.id).await?;
            records.push(PostRecord {
                post,
                images,
                destination,
            });
        }

        Ok(records)
    }

    async fn update_if_status(
        &self,
        post_id: &str,
        expected: PostStatus,
        change: &StatusChange,
    ) -> Result<bool> {
        let result = match change {
            StatusChange::Published {
                external_post_id,
                published_at,
            } => {
                sqlx::query(
                    r#"
                    UPDATE posts
                    SET status = 'published', published_at = ?, external_post_id = ?
                    WHERE id = ? AND status = ?
                    "#,
                )
                .bind(*published_at)
                .bind(external_post_id)
                .bind(post_id)
                .bind(expected.as_str())
                .execute(&self.pool)
                .await
            }
            StatusChange::Failed { error_message } => {
                sqlx::query(
                    r#"
                    UPDATE posts
                    SET status = 'failed', error_message = ?
                    WHERE id = ? AND status = ?
                    "#,
                )
                .bind(error_message)
                .bind(post_id)
                .bind(expected.as_str())
                .execute(&self.pool)
                .await
            }
        }
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() == 1)
    }
}

fn parse_status(raw: &str) -> Result<PostStatus> {
    raw.parse::<PostStatus>()
        .map_err(|_| DbError::CorruptRow(format!("unknown status '{}'", raw)).into())
}

fn post_from_row(r: &SqliteRow) -> Result<Post> {
    let get_err = DbError::SqlxError;
    Ok(Post {
        id: r.try_get("id").map_err(get_err)?,
        content: r.try_get("content").map_err(get_err)?,
        destination_id: r.try_get("destination_id").map_err(get_err)?,
        status: parse_status(&r.try_get::<String, _>("status").map_err(get_err)?)?,
        created_at: r.try_get("created_at").map_err(get_err)?,
        scheduled_at: r.try_get("scheduled_at").map_err(get_err)?,
        published_at: r.try_get("published_at").map_err(get_err)?,
        external_post_id: r.try_get("external_post_id").map_err(get_err)?,
        error_message: r.try_get("error_message").map_err(get_err)?,
    })
}

fn template_from_row(r: &SqliteRow) -> Result<Template> {
    let get_err = DbError::SqlxError;
    Ok(Template {
        id: r.try_get("id").map_err(get_err)?,
        name: r.try_get("name").map_err(get_err)?,
        content: r.try_get("content").map_err(get_err)?,
        created_at: r.try_get("created_at").map_err(get_err)?,
    })
}

/// Columns may carry a prefix when selected alongside a post.
fn destination_from_row(r: &SqliteRow, prefix: &str) -> Result<Destination> {
    let col = |name: &str| format!("{}{}", prefix, name);
    let get_err = DbError::SqlxError;
    let token: String = r.try_get(col("access_token").as_str()).map_err(get_err)?;

    Ok(Destination {
        id: r.try_get(col("id").as_str()).map_err(get_err)?,
        external_id: r.try_get(col("external_id").as_str()).map_err(get_err)?,
        name: r.try_get(col("name").as_str()).map_err(get_err)?,
        access_token: SecretString::from(token),
        created_at: r.try_get(col("created_at").as_str()).map_err(get_err)?,
    })
}

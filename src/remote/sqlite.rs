//! SQLite-backed implementation of the remote data client.
//!
//! Stands in for the hosted backend: admin accounts, sessions, leads and
//! articles. Passwords are stored as salted PBKDF2-HMAC-SHA256 digests.

use std::num::NonZeroU32;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use ring::{digest, pbkdf2};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use tokio::sync::{broadcast, Mutex};

use super::RemoteDataClient;
use crate::errors::RemoteError;
use crate::models::{Article, ArticlePatch, AuthEvent, Lead, LeadStatus, NewArticle, NewLead, Session};

static PASSWORD_ALGORITHM: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;
const PASSWORD_ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;
const INVALID_CREDENTIALS: &str = "Invalid login credentials";

const ARTICLE_COLUMNS: &str = "id, title, slug, content, preview_text, preview_image, tags, \
     published, created_at, updated_at, meta_title, meta_description, og_image, no_index";

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS admin_users (
            email TEXT PRIMARY KEY,
            password_hash TEXT NOT NULL,
            salt TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS leads (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            phone TEXT NOT NULL,
            email TEXT,
            message TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'new'
                CHECK (status IN ('new', 'in_progress', 'completed', 'cancelled')),
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS articles (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            content TEXT NOT NULL DEFAULT '',
            preview_text TEXT NOT NULL DEFAULT '',
            preview_image TEXT,
            tags TEXT NOT NULL DEFAULT '[]',
            published INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            meta_title TEXT,
            meta_description TEXT,
            og_image TEXT,
            no_index INTEGER NOT NULL DEFAULT 0
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_leads_created_at ON leads(created_at);
        CREATE INDEX IF NOT EXISTS idx_articles_created_at ON articles(created_at);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Hosted-backend stand-in on a SQLite pool.
#[derive(Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
    session: Arc<Mutex<Option<Session>>>,
    events: broadcast::Sender<AuthEvent>,
    session_ttl: Duration,
}

impl SqliteBackend {
    pub fn new(pool: SqlitePool, session_ttl: Duration) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            pool,
            session: Arc::new(Mutex::new(None)),
            events,
            session_ttl,
        }
    }

    /// Create the admin account, or reset its password if it exists.
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<(), RemoteError> {
        let mut salt = [0u8; SALT_LEN];
        SystemRandom::new()
            .fill(&mut salt)
            .map_err(|_| RemoteError::Query("Failed to generate password salt".to_string()))?;
        let hash = hash_password(password, &salt);

        sqlx::query(
            "INSERT INTO admin_users (email, password_hash, salt, created_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(email) DO UPDATE SET password_hash = excluded.password_hash, salt = excluded.salt",
        )
        .bind(normalize_email(email))
        .bind(hex::encode(hash))
        .bind(hex::encode(salt))
        .bind(timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_article(&self, id: &str) -> Result<Option<Article>, RemoteError> {
        let row = sqlx::query(&format!("SELECT {} FROM articles WHERE id = ?", ARTICLE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(article_from_row).transpose()
    }

    /// Clear the session after its TTL unless it was replaced meanwhile.
    fn schedule_expiry(&self, token: String) {
        let session = Arc::clone(&self.session);
        let events = self.events.clone();
        let ttl = self.session_ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let mut current = session.lock().await;
            if current.as_ref().map(|s| s.access_token.as_str()) == Some(token.as_str()) {
                *current = None;
                tracing::info!("Admin session expired");
                let _ = events.send(AuthEvent::SessionExpired);
            }
        });
    }
}

#[async_trait]
impl RemoteDataClient for SqliteBackend {
    fn backend_tag(&self) -> &'static str {
        "sqlite"
    }

    async fn get_session(&self) -> Result<Option<Session>, RemoteError> {
        let mut current = self.session.lock().await;
        if current.as_ref().is_some_and(|s| s.is_expired(Utc::now())) {
            *current = None;
            let _ = self.events.send(AuthEvent::SessionExpired);
        }
        Ok(current.clone())
    }

    fn subscribe_auth(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, RemoteError> {
        let email = normalize_email(email);
        let row = sqlx::query("SELECT password_hash, salt FROM admin_users WHERE email = ?")
            .bind(&email)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Err(RemoteError::Auth(INVALID_CREDENTIALS.to_string()));
        };

        let stored_hash: String = row.try_get("password_hash")?;
        let salt: String = row.try_get("salt")?;
        if !verify_password(password, &salt, &stored_hash) {
            return Err(RemoteError::Auth(INVALID_CREDENTIALS.to_string()));
        }

        let ttl = chrono::Duration::from_std(self.session_ttl)
            .unwrap_or_else(|_| chrono::Duration::hours(1));
        let session = Session {
            access_token: uuid::Uuid::new_v4().to_string(),
            email,
            expires_at: Utc::now() + ttl,
        };

        *self.session.lock().await = Some(session.clone());
        self.schedule_expiry(session.access_token.clone());
        let _ = self.events.send(AuthEvent::SignedIn(session.clone()));
        tracing::info!(email = %session.email, "Admin signed in");

        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), RemoteError> {
        let previous = self.session.lock().await.take();
        if previous.is_some() {
            let _ = self.events.send(AuthEvent::SignedOut);
        }
        Ok(())
    }

    async fn select_leads(&self) -> Result<Vec<Lead>, RemoteError> {
        let rows = sqlx::query(
            "SELECT id, name, phone, email, message, status, created_at FROM leads \
             ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(lead_from_row).collect()
    }

    async fn insert_lead(&self, lead: &NewLead) -> Result<Lead, RemoteError> {
        let record = Lead {
            id: uuid::Uuid::new_v4().to_string(),
            name: lead.name.trim().to_string(),
            phone: lead.phone.trim().to_string(),
            email: lead.normalized_email(),
            message: lead.message.trim().to_string(),
            status: LeadStatus::New,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO leads (id, name, phone, email, message, status, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(&record.phone)
        .bind(&record.email)
        .bind(&record.message)
        .bind(record.status.as_str())
        .bind(timestamp(record.created_at))
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    async fn update_lead_status(&self, id: &str, status: LeadStatus) -> Result<(), RemoteError> {
        sqlx::query("UPDATE leads SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_lead(&self, id: &str) -> Result<(), RemoteError> {
        sqlx::query("DELETE FROM leads WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn select_articles(&self) -> Result<Vec<Article>, RemoteError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM articles ORDER BY created_at DESC, rowid DESC",
            ARTICLE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(article_from_row).collect()
    }

    async fn insert_article(&self, article: &NewArticle) -> Result<Article, RemoteError> {
        let now = Utc::now();
        let record = Article {
            id: uuid::Uuid::new_v4().to_string(),
            title: article.title.clone(),
            slug: article.slug.clone().unwrap_or_default(),
            content: article.content.clone(),
            preview_text: article.preview_text.clone(),
            preview_image: article.preview_image.clone(),
            tags: article.tags.clone(),
            published: article.published,
            created_at: now,
            updated_at: now,
            meta_title: article.meta_title.clone(),
            meta_description: article.meta_description.clone(),
            og_image: article.og_image.clone(),
            no_index: article.no_index,
        };

        sqlx::query(&format!(
            "INSERT INTO articles ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            ARTICLE_COLUMNS
        ))
        .bind(&record.id)
        .bind(&record.title)
        .bind(&record.slug)
        .bind(&record.content)
        .bind(&record.preview_text)
        .bind(&record.preview_image)
        .bind(serde_json::to_string(&record.tags).unwrap_or_default())
        .bind(record.published as i32)
        .bind(timestamp(record.created_at))
        .bind(timestamp(record.updated_at))
        .bind(&record.meta_title)
        .bind(&record.meta_description)
        .bind(&record.og_image)
        .bind(record.no_index as i32)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    async fn update_article(
        &self,
        id: &str,
        patch: &ArticlePatch,
    ) -> Result<Article, RemoteError> {
        let mut query = QueryBuilder::<Sqlite>::new("UPDATE articles SET ");
        let mut set = query.separated(", ");
        if let Some(title) = &patch.title {
            set.push("title = ").push_bind_unseparated(title.clone());
        }
        if let Some(slug) = &patch.slug {
            set.push("slug = ").push_bind_unseparated(slug.clone());
        }
        if let Some(content) = &patch.content {
            set.push("content = ").push_bind_unseparated(content.clone());
        }
        if let Some(preview_text) = &patch.preview_text {
            set.push("preview_text = ")
                .push_bind_unseparated(preview_text.clone());
        }
        if let Some(preview_image) = &patch.preview_image {
            set.push("preview_image = ")
                .push_bind_unseparated(preview_image.clone());
        }
        if let Some(tags) = &patch.tags {
            set.push("tags = ")
                .push_bind_unseparated(serde_json::to_string(tags).unwrap_or_default());
        }
        if let Some(published) = patch.published {
            set.push("published = ").push_bind_unseparated(published as i32);
        }
        if let Some(meta_title) = &patch.meta_title {
            set.push("meta_title = ").push_bind_unseparated(meta_title.clone());
        }
        if let Some(meta_description) = &patch.meta_description {
            set.push("meta_description = ")
                .push_bind_unseparated(meta_description.clone());
        }
        if let Some(og_image) = &patch.og_image {
            set.push("og_image = ").push_bind_unseparated(og_image.clone());
        }
        if let Some(no_index) = patch.no_index {
            set.push("no_index = ").push_bind_unseparated(no_index as i32);
        }
        set.push("updated_at = ")
            .push_bind_unseparated(timestamp(Utc::now()));

        query.push(" WHERE id = ").push_bind(id.to_string());

        let result = query.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(RemoteError::NotFound(format!("Article {} not found", id)));
        }

        self.get_article(id)
            .await?
            .ok_or_else(|| RemoteError::NotFound(format!("Article {} not found", id)))
    }

    async fn delete_article(&self, id: &str) -> Result<(), RemoteError> {
        let result = sqlx::query("DELETE FROM articles WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(id, "Delete matched no article");
        }
        Ok(())
    }
}

// Helper functions for row conversion

/// Fixed-width RFC 3339 so text ordering matches time ordering.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>, RemoteError> {
    let raw: String = row.try_get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| RemoteError::Query(format!("Bad timestamp in {}: {}", column, e)))
}

fn lead_from_row(row: &SqliteRow) -> Result<Lead, RemoteError> {
    let status: String = row.try_get("status")?;
    Ok(Lead {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        email: row.try_get("email")?,
        message: row.try_get("message")?,
        status: status.parse().map_err(RemoteError::Query)?,
        created_at: parse_timestamp(row, "created_at")?,
    })
}

fn article_from_row(row: &SqliteRow) -> Result<Article, RemoteError> {
    let tags: String = row.try_get("tags")?;
    let published: i32 = row.try_get("published")?;
    let no_index: i32 = row.try_get("no_index")?;
    Ok(Article {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        content: row.try_get("content")?,
        preview_text: row.try_get("preview_text")?,
        preview_image: row.try_get("preview_image")?,
        tags: parse_json_array(&tags),
        published: published != 0,
        created_at: parse_timestamp(row, "created_at")?,
        updated_at: parse_timestamp(row, "updated_at")?,
        meta_title: row.try_get("meta_title")?,
        meta_description: row.try_get("meta_description")?,
        og_image: row.try_get("og_image")?,
        no_index: no_index != 0,
    })
}

fn parse_json_array(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn iterations() -> NonZeroU32 {
    NonZeroU32::new(PASSWORD_ITERATIONS).unwrap_or(NonZeroU32::MIN)
}

fn hash_password(password: &str, salt: &[u8]) -> [u8; digest::SHA256_OUTPUT_LEN] {
    let mut out = [0u8; digest::SHA256_OUTPUT_LEN];
    pbkdf2::derive(
        PASSWORD_ALGORITHM,
        iterations(),
        salt,
        password.as_bytes(),
        &mut out,
    );
    out
}

fn verify_password(password: &str, salt_hex: &str, hash_hex: &str) -> bool {
    let (Ok(salt), Ok(hash)) = (hex::decode(salt_hex), hex::decode(hash_hex)) else {
        return false;
    };
    pbkdf2::verify(
        PASSWORD_ALGORITHM,
        iterations(),
        &salt,
        password.as_bytes(),
        &hash,
    )
    .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn backend(ttl: Duration) -> (SqliteBackend, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = init_database(&temp_dir.path().join("test.sqlite"))
            .await
            .unwrap();
        let backend = SqliteBackend::new(pool, ttl);
        backend
            .ensure_admin("Admin@Example.com", "s3cret-pass")
            .await
            .unwrap();
        (backend, temp_dir)
    }

    fn new_article(title: &str, slug: &str) -> NewArticle {
        NewArticle {
            title: title.to_string(),
            slug: Some(slug.to_string()),
            content: "Body".to_string(),
            preview_text: "Preview".to_string(),
            ..NewArticle::default()
        }
    }

    #[test]
    fn test_password_hash_round_trip() {
        let salt = [7u8; SALT_LEN];
        let hash = hex::encode(hash_password("pa55", &salt));
        assert!(verify_password("pa55", &hex::encode(salt), &hash));
        assert!(!verify_password("pa56", &hex::encode(salt), &hash));
        assert!(!verify_password("pa55", "zz", &hash));
    }

    #[tokio::test]
    async fn test_sign_in_and_out() {
        let (backend, _dir) = backend(Duration::from_secs(60)).await;
        let mut events = backend.subscribe_auth();

        let err = backend
            .sign_in_with_password("admin@example.com", "wrong")
            .await
            .unwrap_err();
        assert_eq!(err, RemoteError::Auth(INVALID_CREDENTIALS.to_string()));

        let session = backend
            .sign_in_with_password(" ADMIN@example.com ", "s3cret-pass")
            .await
            .unwrap();
        assert_eq!(session.email, "admin@example.com");
        assert_eq!(backend.get_session().await.unwrap(), Some(session.clone()));
        assert_eq!(events.recv().await.unwrap(), AuthEvent::SignedIn(session));

        backend.sign_out().await.unwrap();
        assert_eq!(backend.get_session().await.unwrap(), None);
        assert_eq!(events.recv().await.unwrap(), AuthEvent::SignedOut);
    }

    #[tokio::test]
    async fn test_session_expiry_notifies() {
        let (backend, _dir) = backend(Duration::from_millis(50)).await;
        let mut events = backend.subscribe_auth();

        backend
            .sign_in_with_password("admin@example.com", "s3cret-pass")
            .await
            .unwrap();
        assert!(matches!(events.recv().await.unwrap(), AuthEvent::SignedIn(_)));

        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event, AuthEvent::SessionExpired);
        assert_eq!(backend.get_session().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_lead_rows() {
        let (backend, _dir) = backend(Duration::from_secs(60)).await;

        let first = backend
            .insert_lead(&NewLead {
                name: " Anna ".to_string(),
                phone: "+7 900 000 00 01".to_string(),
                email: Some("".to_string()),
                message: "Container to Vladivostok".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(first.name, "Anna");
        assert_eq!(first.status, LeadStatus::New);
        assert!(first.email.is_none());

        let second = backend
            .insert_lead(&NewLead {
                name: "Boris".to_string(),
                phone: "+7 900 000 00 02".to_string(),
                email: None,
                message: "LTL to Kazan".to_string(),
            })
            .await
            .unwrap();

        let leads = backend.select_leads().await.unwrap();
        assert_eq!(leads.len(), 2);
        assert_eq!(leads[0].id, second.id);

        backend
            .update_lead_status(&first.id, LeadStatus::Completed)
            .await
            .unwrap();
        backend.update_lead_status("missing", LeadStatus::Cancelled).await.unwrap();
        let leads = backend.select_leads().await.unwrap();
        assert_eq!(leads[1].status, LeadStatus::Completed);

        backend.delete_lead(&second.id).await.unwrap();
        backend.delete_lead("missing").await.unwrap();
        assert_eq!(backend.select_leads().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_article_patch_writes_present_fields() {
        let (backend, _dir) = backend(Duration::from_secs(60)).await;

        let mut draft = new_article("Sea freight", "sea-freight");
        draft.preview_image = Some("/img/sea.jpg".to_string());
        draft.tags = vec!["sea".to_string()];
        let created = backend.insert_article(&draft).await.unwrap();
        assert!(!created.published);

        let patch = ArticlePatch {
            published: Some(true),
            preview_image: Some(None),
            ..ArticlePatch::default()
        };
        let updated = backend.update_article(&created.id, &patch).await.unwrap();
        assert!(updated.published);
        assert!(updated.preview_image.is_none());
        assert_eq!(updated.title, "Sea freight");
        assert_eq!(updated.tags, vec!["sea".to_string()]);
        assert!(updated.updated_at >= created.updated_at);

        let err = backend
            .update_article("missing", &patch)
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_article_slug_is_unique() {
        let (backend, _dir) = backend(Duration::from_secs(60)).await;

        backend
            .insert_article(&new_article("Air freight", "air-freight"))
            .await
            .unwrap();
        let err = backend
            .insert_article(&new_article("Air freight again", "air-freight"))
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_article_listing_and_delete() {
        let (backend, _dir) = backend(Duration::from_secs(60)).await;

        let older = backend
            .insert_article(&new_article("Older", "older"))
            .await
            .unwrap();
        let newer = backend
            .insert_article(&new_article("Newer", "newer"))
            .await
            .unwrap();

        let articles = backend.select_articles().await.unwrap();
        assert_eq!(articles[0].id, newer.id);
        assert_eq!(articles[1].id, older.id);

        backend.delete_article(&older.id).await.unwrap();
        // A second delete matches nothing and still succeeds
        backend.delete_article(&older.id).await.unwrap();
        assert_eq!(backend.select_articles().await.unwrap().len(), 1);
    }
}

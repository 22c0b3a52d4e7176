//! Application state store.
//!
//! Single owner of the in-memory lead and article collections and of the
//! admin authentication state. Mutations go to the remote backend first and
//! are mirrored locally once it answers; without a backend they are applied
//! locally only. Locks are never held across a remote call, so concurrent
//! writes to the same record race and the last response to arrive wins.

mod loading;


use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;

use crate::config::AppEnv;
use crate::errors::StoreError;
use crate::fallback::{demo_articles, PrerenderSnapshot};
use crate::models::{
    Article, ArticlePatch, AuthState, Lead, LeadStatus, NewArticle, NewLead, Session,
};
use crate::remote::RemoteDataClient;
use crate::slug::{generate_slug, is_valid_slug};

use loading::LoadingGuard;

/// Where the current article list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleSource {
    Remote,
    Snapshot,
    Demo,
    Empty,
}

/// How the store was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeMode {
    pub env: AppEnv,
    pub prerender: bool,
}

impl Default for RuntimeMode {
    fn default() -> Self {
        Self {
            env: AppEnv::Development,
            prerender: false,
        }
    }
}

/// A contact-form lead and whether the backend stored it.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedLead {
    pub lead: Lead,
    pub persisted: bool,
}

/// Keeps the auth listener alive; dropping it unsubscribes.
pub struct AuthSubscription {
    task: Option<JoinHandle<()>>,
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

pub struct ContentStore {
    remote: Option<Arc<dyn RemoteDataClient>>,
    mode: RuntimeMode,
    snapshot: Option<PrerenderSnapshot>,
    leads: RwLock<Vec<Lead>>,
    articles: RwLock<Vec<Article>>,
    auth: watch::Sender<AuthState>,
    applications_loading: AtomicBool,
    news_loading: AtomicBool,
    auth_loading: AtomicBool,
    last_local_id: AtomicI64,
}

impl ContentStore {
    /// `remote: None` means the backend is unconfigured.
    pub fn new(
        remote: Option<Arc<dyn RemoteDataClient>>,
        mode: RuntimeMode,
        snapshot: Option<PrerenderSnapshot>,
    ) -> Self {
        let (auth, _) = watch::channel(AuthState::Unknown);
        Self {
            remote,
            mode,
            snapshot,
            leads: RwLock::new(Vec::new()),
            articles: RwLock::new(Vec::new()),
            auth,
            applications_loading: AtomicBool::new(false),
            news_loading: AtomicBool::new(false),
            auth_loading: AtomicBool::new(false),
            last_local_id: AtomicI64::new(0),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.remote.is_some()
    }

    /// Millisecond timestamp, bumped past the previous one so ids stay unique.
    fn local_id(&self, now: DateTime<Utc>) -> String {
        let millis = now.timestamp_millis();
        let previous = self
            .last_local_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(millis.max(last + 1))
            })
            .unwrap_or(millis);
        millis.max(previous + 1).to_string()
    }

    // ==================== AUTH ====================

    /// Resolve the initial session and follow remote session changes until
    /// the returned subscription is dropped.
    pub async fn init_auth(self: &Arc<Self>) -> AuthSubscription {
        let Some(remote) = self.remote.clone() else {
            self.auth.send_replace(AuthState::Unauthenticated);
            return AuthSubscription { task: None };
        };

        // Subscribe before the one-shot check so no change slips between them.
        let mut events = remote.subscribe_auth();
        tracing::debug!(backend = remote.backend_tag(), "Following session changes");
        {
            let _loading = LoadingGuard::raise(&self.auth_loading);
            let state = match remote.get_session().await {
                Ok(Some(session)) => AuthState::Authenticated(session),
                Ok(None) => AuthState::Unauthenticated,
                Err(e) => {
                    tracing::warn!("Session check failed: {}", e);
                    AuthState::Unauthenticated
                }
            };
            self.auth.send_replace(state);
        }

        let store = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Auth listener skipped {} events", skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let Some(store) = store.upgrade() else {
                    break;
                };
                tracing::debug!(?event, "Auth state change");
                store.auth.send_modify(|state| *state = state.on_event(&event));
            }
        });

        AuthSubscription { task: Some(task) }
    }

    pub fn auth_state(&self) -> AuthState {
        self.auth.borrow().clone()
    }

    pub fn watch_auth(&self) -> watch::Receiver<AuthState> {
        self.auth.subscribe()
    }

    /// Access token of the signed-in admin, if any.
    pub fn session_token(&self) -> Option<String> {
        self.auth
            .borrow()
            .session()
            .map(|session| session.access_token.clone())
    }

    /// Sign in. The error's `Display` is suitable for showing to the user.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, StoreError> {
        let remote = self.remote.as_ref().ok_or(StoreError::BackendUnconfigured)?;
        let _loading = LoadingGuard::raise(&self.auth_loading);

        match remote.sign_in_with_password(email, password).await {
            Ok(session) => {
                self.auth
                    .send_replace(AuthState::Authenticated(session.clone()));
                Ok(session)
            }
            Err(e) => {
                tracing::warn!("Login failed: {}", e);
                Err(e.into())
            }
        }
    }

    /// Marks the session as signed out locally whatever the remote says.
    pub async fn logout(&self) -> Result<(), StoreError> {
        self.auth.send_replace(AuthState::Unauthenticated);

        let remote = self.remote.as_ref().ok_or(StoreError::BackendUnconfigured)?;
        remote.sign_out().await.map_err(|e| {
            tracing::warn!("Remote sign-out failed: {}", e);
            StoreError::from(e)
        })
    }

    // ==================== LEADS ====================

    /// Reload leads from the backend, newest first. On failure the current
    /// list is kept. Skipped while prerendering.
    pub async fn refresh_leads(&self) -> Result<(), StoreError> {
        if self.mode.prerender {
            return Ok(());
        }
        let remote = self.remote.as_ref().ok_or(StoreError::BackendUnconfigured)?;
        let _loading = LoadingGuard::raise(&self.applications_loading);

        match remote.select_leads().await {
            Ok(leads) => {
                tracing::debug!(count = leads.len(), "Leads refreshed");
                *self.leads.write().await = leads;
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to fetch leads: {}", e);
                Err(e.into())
            }
        }
    }

    /// Local-only: prepend a new lead without touching the backend.
    pub async fn add_lead(&self, fields: NewLead) -> Lead {
        let now = Utc::now();
        let lead = Lead {
            id: self.local_id(now),
            email: fields.normalized_email(),
            name: fields.name,
            phone: fields.phone,
            message: fields.message,
            status: LeadStatus::New,
            created_at: now,
        };
        self.leads.write().await.insert(0, lead.clone());
        lead
    }

    /// Contact-form submission: validate, store remotely, mirror locally.
    /// Without a backend the lead is kept locally and returned with
    /// `persisted` unset.
    pub async fn submit_lead(&self, fields: NewLead) -> Result<SubmittedLead, StoreError> {
        fields.validate().map_err(StoreError::Validation)?;

        let Some(remote) = self.remote.as_ref() else {
            let lead = self.add_lead(fields).await;
            tracing::warn!(id = %lead.id, "Lead kept in memory only: backend not configured");
            return Ok(SubmittedLead {
                lead,
                persisted: false,
            });
        };

        match remote.insert_lead(&fields).await {
            Ok(lead) => {
                self.leads.write().await.insert(0, lead.clone());
                tracing::info!(id = %lead.id, "Lead submitted");
                Ok(SubmittedLead {
                    lead,
                    persisted: true,
                })
            }
            Err(e) => {
                tracing::warn!("Failed to submit lead: {}", e);
                Err(e.into())
            }
        }
    }

    /// Unknown ids are a no-op. Without a backend the status is changed
    /// locally and `BackendUnconfigured` is returned.
    pub async fn update_lead_status(&self, id: &str, status: LeadStatus) -> Result<(), StoreError> {
        let outcome = match self.remote.as_ref() {
            Some(remote) => match remote.update_lead_status(id, status).await {
                Ok(()) => Ok(()),
                Err(e) => {
                    tracing::warn!(id, "Failed to update lead status: {}", e);
                    return Err(e.into());
                }
            },
            None => Err(StoreError::BackendUnconfigured),
        };

        if let Some(lead) = self.leads.write().await.iter_mut().find(|l| l.id == id) {
            lead.status = status;
        }
        outcome
    }

    /// Same policy as [`ContentStore::update_lead_status`].
    pub async fn delete_lead(&self, id: &str) -> Result<(), StoreError> {
        let outcome = match self.remote.as_ref() {
            Some(remote) => match remote.delete_lead(id).await {
                Ok(()) => Ok(()),
                Err(e) => {
                    tracing::warn!(id, "Failed to delete lead: {}", e);
                    return Err(e.into());
                }
            },
            None => Err(StoreError::BackendUnconfigured),
        };

        self.leads.write().await.retain(|l| l.id != id);
        outcome
    }

    pub async fn leads(&self) -> Vec<Lead> {
        self.leads.read().await.clone()
    }

    // ==================== ARTICLES ====================

    /// Reload articles. While prerendering the snapshot is used. Without a
    /// backend, or when the fetch fails, development falls back to demo
    /// articles and production to an empty list; a failed fetch still
    /// returns the error after substituting.
    pub async fn refresh_articles(&self) -> Result<ArticleSource, StoreError> {
        let _loading = LoadingGuard::raise(&self.news_loading);

        if self.mode.prerender {
            let articles = self
                .snapshot
                .as_ref()
                .map(|s| s.articles.clone())
                .unwrap_or_default();
            *self.articles.write().await = articles;
            return Ok(ArticleSource::Snapshot);
        }

        let Some(remote) = self.remote.as_ref() else {
            return Ok(self.substitute_articles().await);
        };

        match remote.select_articles().await {
            Ok(articles) => {
                tracing::debug!(count = articles.len(), "Articles refreshed");
                *self.articles.write().await = articles;
                Ok(ArticleSource::Remote)
            }
            Err(e) => {
                let source = self.substitute_articles().await;
                tracing::warn!(?source, "Failed to fetch articles: {}", e);
                Err(e.into())
            }
        }
    }

    async fn substitute_articles(&self) -> ArticleSource {
        let (articles, source) = match self.mode.env {
            AppEnv::Development => (demo_articles(), ArticleSource::Demo),
            AppEnv::Production => (Vec::new(), ArticleSource::Empty),
        };
        *self.articles.write().await = articles;
        source
    }

    /// Create an article; the slug is derived from the title unless given.
    pub async fn add_article(&self, mut fields: NewArticle) -> Result<Article, StoreError> {
        let slug = match fields.slug.as_deref() {
            Some(explicit) if !explicit.trim().is_empty() => resolve_slug(explicit)?,
            _ => resolve_slug(&fields.title)?,
        };
        fields.slug = Some(slug.clone());

        let Some(remote) = self.remote.as_ref() else {
            // Check and insert under one lock so equal titles cannot both pass.
            let mut articles = self.articles.write().await;
            ensure_slug_free(&articles, &slug, None)?;
            let now = Utc::now();
            let article = Article {
                id: self.local_id(now),
                title: fields.title,
                slug,
                content: fields.content,
                preview_text: fields.preview_text,
                preview_image: fields.preview_image,
                tags: fields.tags,
                published: fields.published,
                created_at: now,
                updated_at: now,
                meta_title: fields.meta_title,
                meta_description: fields.meta_description,
                og_image: fields.og_image,
                no_index: fields.no_index,
            };
            articles.insert(0, article.clone());
            tracing::info!(id = %article.id, slug = %article.slug, "Article created locally");
            return Ok(article);
        };

        ensure_slug_free(&self.articles.read().await, &slug, None)?;
        let article = remote.insert_article(&fields).await.map_err(|e| {
            tracing::warn!(slug = %slug, "Failed to create article: {}", e);
            StoreError::from(e)
        })?;

        self.articles.write().await.insert(0, article.clone());
        tracing::info!(id = %article.id, slug = %article.slug, "Article created");
        Ok(article)
    }

    /// Apply the fields present in `patch`.
    pub async fn update_article(
        &self,
        id: &str,
        mut patch: ArticlePatch,
    ) -> Result<Article, StoreError> {
        if let Some(slug) = patch.slug.take() {
            patch.slug = Some(resolve_slug(&slug)?);
        }

        let Some(remote) = self.remote.as_ref() else {
            let mut articles = self.articles.write().await;
            if let Some(slug) = patch.slug.as_deref() {
                ensure_slug_free(&articles, slug, Some(id))?;
            }
            let article = articles
                .iter_mut()
                .find(|a| a.id == id)
                .ok_or_else(|| StoreError::NotFound(format!("Article {} not found", id)))?;
            patch.apply_to(article);
            article.updated_at = Utc::now();
            return Ok(article.clone());
        };

        if let Some(slug) = patch.slug.as_deref() {
            ensure_slug_free(&self.articles.read().await, slug, Some(id))?;
        }
        let updated = remote.update_article(id, &patch).await.map_err(|e| {
            tracing::warn!(id, "Failed to update article: {}", e);
            StoreError::from(e)
        })?;

        if let Some(article) = self.articles.write().await.iter_mut().find(|a| a.id == id) {
            *article = updated.clone();
        }
        Ok(updated)
    }

    /// Articles the backend no longer has are still dropped locally.
    pub async fn delete_article(&self, id: &str) -> Result<(), StoreError> {
        if let Some(remote) = self.remote.as_ref() {
            remote.delete_article(id).await.map_err(|e| {
                tracing::warn!(id, "Failed to delete article: {}", e);
                StoreError::from(e)
            })?;
        }
        self.articles.write().await.retain(|a| a.id != id);
        Ok(())
    }

    /// Every article, drafts included, in list order.
    pub async fn articles(&self) -> Vec<Article> {
        self.articles.read().await.clone()
    }

    /// Published articles, newest first.
    pub async fn published_articles(&self) -> Vec<Article> {
        let mut published: Vec<Article> = self
            .articles
            .read()
            .await
            .iter()
            .filter(|a| a.published)
            .cloned()
            .collect();
        published.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        published
    }

    /// First published article with this slug. Drafts are never returned.
    pub async fn article_by_slug(&self, slug: &str) -> Option<Article> {
        self.articles
            .read()
            .await
            .iter()
            .find(|a| a.slug == slug && a.published)
            .cloned()
    }

    pub async fn snapshot(&self) -> PrerenderSnapshot {
        PrerenderSnapshot::capture(self.published_articles().await)
    }

    // ==================== LOADING FLAGS ====================

    pub fn applications_loading(&self) -> bool {
        self.applications_loading.load(Ordering::SeqCst)
    }

    pub fn news_loading(&self) -> bool {
        self.news_loading.load(Ordering::SeqCst)
    }

    pub fn is_auth_loading(&self) -> bool {
        self.auth_loading.load(Ordering::SeqCst)
    }
}

/// Normalize `source` into a slug; symbol-only input has none.
fn resolve_slug(source: &str) -> Result<String, StoreError> {
    let slug = generate_slug(source);
    if !is_valid_slug(&slug) {
        return Err(StoreError::Validation(format!(
            "'{}' does not produce a usable slug",
            source.trim()
        )));
    }
    Ok(slug)
}

/// Rejects a slug already used by a different article.
fn ensure_slug_free(
    articles: &[Article],
    slug: &str,
    except_id: Option<&str>,
) -> Result<(), StoreError> {
    let taken = articles
        .iter()
        .any(|a| a.slug == slug && Some(a.id.as_str()) != except_id);
    if taken {
        return Err(StoreError::SlugConflict(slug.to_string()));
    }
    Ok(())
}

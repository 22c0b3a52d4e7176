//! In-memory remote client for store tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, Mutex};

use super::RemoteDataClient;
use crate::errors::RemoteError;
use crate::models::{Article, ArticlePatch, AuthEvent, Lead, LeadStatus, NewArticle, NewLead, Session};

pub struct FakeRemote {
    pub leads: Mutex<Vec<Lead>>,
    pub articles: Mutex<Vec<Article>>,
    pub session: Mutex<Option<Session>>,
    pub password: String,
    pub events: broadcast::Sender<AuthEvent>,
    /// Every call fails with `RemoteError::Query` while set
    pub failing: AtomicBool,
    /// Per-call latencies for `update_article`, consumed front to back
    pub update_delays: Mutex<VecDeque<Duration>>,
    pub calls: AtomicU64,
    next_id: AtomicU64,
}

impl Default for FakeRemote {
    fn default() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            leads: Mutex::new(Vec::new()),
            articles: Mutex::new(Vec::new()),
            session: Mutex::new(None),
            password: "secret".to_string(),
            events,
            failing: AtomicBool::new(false),
            update_delays: Mutex::new(VecDeque::new()),
            calls: AtomicU64::new(0),
            next_id: AtomicU64::new(1),
        }
    }
}

impl FakeRemote {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), RemoteError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteError::Query("connection refused".to_string()));
        }
        Ok(())
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

#[async_trait]
impl RemoteDataClient for FakeRemote {
    fn backend_tag(&self) -> &'static str {
        "fake"
    }

    async fn get_session(&self) -> Result<Option<Session>, RemoteError> {
        self.check()?;
        Ok(self.session.lock().await.clone())
    }

    fn subscribe_auth(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, RemoteError> {
        self.check()?;
        if password != self.password {
            return Err(RemoteError::Auth("Invalid login credentials".to_string()));
        }
        let session = Session {
            access_token: self.next_id("token"),
            email: email.to_string(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        };
        *self.session.lock().await = Some(session.clone());
        let _ = self.events.send(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), RemoteError> {
        self.check()?;
        *self.session.lock().await = None;
        let _ = self.events.send(AuthEvent::SignedOut);
        Ok(())
    }

    async fn select_leads(&self) -> Result<Vec<Lead>, RemoteError> {
        self.check()?;
        Ok(self.leads.lock().await.clone())
    }

    async fn insert_lead(&self, lead: &NewLead) -> Result<Lead, RemoteError> {
        self.check()?;
        let record = Lead {
            id: self.next_id("lead"),
            name: lead.name.clone(),
            phone: lead.phone.clone(),
            email: lead.normalized_email(),
            message: lead.message.clone(),
            status: LeadStatus::New,
            created_at: Utc::now(),
        };
        self.leads.lock().await.insert(0, record.clone());
        Ok(record)
    }

    async fn update_lead_status(&self, id: &str, status: LeadStatus) -> Result<(), RemoteError> {
        self.check()?;
        if let Some(lead) = self.leads.lock().await.iter_mut().find(|l| l.id == id) {
            lead.status = status;
        }
        Ok(())
    }

    async fn delete_lead(&self, id: &str) -> Result<(), RemoteError> {
        self.check()?;
        self.leads.lock().await.retain(|l| l.id != id);
        Ok(())
    }

    async fn select_articles(&self) -> Result<Vec<Article>, RemoteError> {
        self.check()?;
        Ok(self.articles.lock().await.clone())
    }

    async fn insert_article(&self, article: &NewArticle) -> Result<Article, RemoteError> {
        self.check()?;
        let now = Utc::now();
        let record = Article {
            id: self.next_id("article"),
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
        self.articles.lock().await.insert(0, record.clone());
        Ok(record)
    }

    async fn update_article(
        &self,
        id: &str,
        patch: &ArticlePatch,
    ) -> Result<Article, RemoteError> {
        self.check()?;
        let delay = self.update_delays.lock().await.pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut articles = self.articles.lock().await;
        let article = articles
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| RemoteError::NotFound(format!("Article {} not found", id)))?;
        patch.apply_to(article);
        article.updated_at = Utc::now();
        Ok(article.clone())
    }

    async fn delete_article(&self, id: &str) -> Result<(), RemoteError> {
        self.check()?;
        self.articles.lock().await.retain(|a| a.id != id);
        Ok(())
    }
}

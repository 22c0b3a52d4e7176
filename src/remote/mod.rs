//! Remote data client seam.
//!
//! The content store talks to the hosted backend (authentication plus the
//! `leads` and `articles` tables) only through [`RemoteDataClient`].

mod sqlite;

#[cfg(test)]
pub mod fake;

pub use sqlite::*;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::errors::RemoteError;
use crate::models::{Article, ArticlePatch, AuthEvent, Lead, LeadStatus, NewArticle, NewLead, Session};

/// Authenticated CRUD over leads and articles plus session management.
///
/// List calls return rows newest-first by creation time.
#[async_trait]
pub trait RemoteDataClient: Send + Sync {
    /// Short backend name used in logs.
    fn backend_tag(&self) -> &'static str;

    async fn get_session(&self) -> Result<Option<Session>, RemoteError>;

    /// Session change notifications. Dropping the receiver unsubscribes.
    fn subscribe_auth(&self) -> broadcast::Receiver<AuthEvent>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, RemoteError>;

    async fn sign_out(&self) -> Result<(), RemoteError>;

    async fn select_leads(&self) -> Result<Vec<Lead>, RemoteError>;

    async fn insert_lead(&self, lead: &NewLead) -> Result<Lead, RemoteError>;

    /// Unknown ids are not an error.
    async fn update_lead_status(&self, id: &str, status: LeadStatus) -> Result<(), RemoteError>;

    /// Unknown ids are not an error.
    async fn delete_lead(&self, id: &str) -> Result<(), RemoteError>;

    async fn select_articles(&self) -> Result<Vec<Article>, RemoteError>;

    /// `article.slug` is already resolved by the caller.
    async fn insert_article(&self, article: &NewArticle) -> Result<Article, RemoteError>;

    /// Writes only the fields present in `patch` and returns the stored row.
    async fn update_article(&self, id: &str, patch: &ArticlePatch)
        -> Result<Article, RemoteError>;

    /// Unknown ids are not an error.
    async fn delete_article(&self, id: &str) -> Result<(), RemoteError>;
}

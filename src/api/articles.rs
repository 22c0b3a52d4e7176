//! Article API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use super::{success, success_local, ApiResult};
use crate::errors::AppError;
use crate::fallback::PrerenderSnapshot;
use crate::models::{Article, ArticlePatch, NewArticle};
use crate::AppState;

/// GET /api/news - Published articles, newest first.
pub async fn list_news(State(state): State<AppState>) -> ApiResult<Vec<Article>> {
    success(state.store.published_articles().await)
}

/// GET /api/news/:slug - A single published article.
pub async fn get_news(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Article> {
    match state.store.article_by_slug(&slug).await {
        Some(article) => success(article),
        None => Err(AppError::NotFound(format!("Article {} not found", slug))),
    }
}

/// Admin view of the article list.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleList {
    pub articles: Vec<Article>,
    pub loading: bool,
}

/// GET /api/admin/articles - All articles, drafts included.
pub async fn list_articles(State(state): State<AppState>) -> ApiResult<ArticleList> {
    success(ArticleList {
        articles: state.store.articles().await,
        loading: state.store.news_loading(),
    })
}

/// POST /api/admin/articles/refresh - Reload articles from their source.
pub async fn refresh_articles(State(state): State<AppState>) -> ApiResult<ArticleList> {
    let source = state.store.refresh_articles().await?;
    tracing::debug!(?source, "Articles reloaded");
    list_articles(State(state)).await
}

/// POST /api/admin/articles - Create an article.
pub async fn create_article(
    State(state): State<AppState>,
    Json(request): Json<NewArticle>,
) -> ApiResult<Article> {
    // Validate required fields
    if request.title.trim().is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }

    let article = state.store.add_article(request).await?;
    if state.store.is_configured() {
        success(article)
    } else {
        success_local(article)
    }
}

/// PUT /api/admin/articles/:id - Update the provided fields of an article.
pub async fn update_article(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<ArticlePatch>,
) -> ApiResult<Article> {
    if patch.is_empty() {
        return Err(AppError::Validation("No fields to update".to_string()));
    }
    if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(AppError::Validation("Title cannot be empty".to_string()));
    }

    let article = state.store.update_article(&id, patch).await?;
    if state.store.is_configured() {
        success(article)
    } else {
        success_local(article)
    }
}

/// DELETE /api/admin/articles/:id - Delete an article.
pub async fn delete_article(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.store.delete_article(&id).await?;
    if state.store.is_configured() {
        success(())
    } else {
        success_local(())
    }
}

/// GET /api/admin/snapshot - Capture published articles for prerendering.
pub async fn get_snapshot(State(state): State<AppState>) -> ApiResult<PrerenderSnapshot> {
    success(state.store.snapshot().await)
}

/// POST /api/admin/snapshot - Write the snapshot to the configured path.
pub async fn save_snapshot(State(state): State<AppState>) -> ApiResult<PrerenderSnapshot> {
    let snapshot = state.store.snapshot().await;
    snapshot.save(&state.config.snapshot_path).await?;
    tracing::info!(
        "Saved prerender snapshot with {} articles to {:?}",
        snapshot.articles.len(),
        state.config.snapshot_path
    );
    success(snapshot)
}

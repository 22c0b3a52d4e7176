//! Fallback data sources used when the remote backend is not consulted.
//!
//! Demo articles fill the news section in development when the backend is
//! unavailable. A prerender snapshot replaces network reads while static
//! pages are being generated.

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::Article;

fn fixed(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 9, 0, 0)
        .single()
        .unwrap_or_default()
}

fn demo(
    id: &str,
    title: &str,
    slug: &str,
    preview_text: &str,
    content: &str,
    tags: &[&str],
    created_at: DateTime<Utc>,
) -> Article {
    Article {
        id: id.to_string(),
        title: title.to_string(),
        slug: slug.to_string(),
        content: content.to_string(),
        preview_text: preview_text.to_string(),
        preview_image: None,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        published: true,
        created_at,
        updated_at: created_at,
        meta_title: None,
        meta_description: None,
        og_image: None,
        no_index: false,
    }
}

/// Fixed sample news, newest first.
pub fn demo_articles() -> Vec<Article> {
    vec![
        demo(
            "demo-3",
            "Открытие нового маршрута Москва — Алматы",
            "otkrytie-novogo-marshruta-moskva-almaty",
            "Запускаем регулярные отправки сборных грузов в Казахстан.",
            "## Новый маршрут\n\nС понедельника отправляем сборные грузы в Алматы два раза в неделю. Срок доставки от 7 дней.",
            &["маршруты", "казахстан"],
            fixed(2024, 9, 2),
        ),
        demo(
            "demo-2",
            "Расширение автопарка",
            "rasshirenie-avtoparka",
            "В парк поступили 15 новых тягачей с рефрижераторными полуприцепами.",
            "## Автопарк\n\nНовые машины позволяют перевозить грузы с температурным режимом от -20 до +20 °C.",
            &["автопарк"],
            fixed(2024, 7, 15),
        ),
        demo(
            "demo-1",
            "Таможенное оформление под ключ",
            "tamozhennoe-oformlenie-pod-klyuch",
            "Берём на себя декларирование и сертификацию импортных грузов.",
            "## Таможня\n\nБрокеры компании подготовят документы и сопроводят груз на всех этапах оформления.",
            &["таможня", "услуги"],
            fixed(2024, 5, 20),
        ),
    ]
}

/// Article data captured for static page generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrerenderSnapshot {
    pub generated_at: DateTime<Utc>,
    pub articles: Vec<Article>,
}

impl PrerenderSnapshot {
    pub fn capture(articles: Vec<Article>) -> Self {
        Self {
            generated_at: Utc::now(),
            articles,
        }
    }

    pub async fn load(path: &Path) -> Result<Self, AppError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            AppError::Config(format!(
                "Failed to read prerender snapshot {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub async fn save(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

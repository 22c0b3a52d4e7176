//! Article model for the public news section.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A news item; visible to the public only when `published` is set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub preview_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_image: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_image: Option<String>,
    #[serde(default)]
    pub no_index: bool,
}

/// Request body for creating an article.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewArticle {
    pub title: String,
    /// Derived from the title when absent
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub preview_text: String,
    #[serde(default)]
    pub preview_image: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    #[serde(default)]
    pub og_image: Option<String>,
    #[serde(default)]
    pub no_index: bool,
}

/// Partial update. `None` means "not provided"; for nullable columns
/// `Some(None)` clears the value.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArticlePatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub preview_text: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub preview_image: Option<Option<String>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub published: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    pub meta_title: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub meta_description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub og_image: Option<Option<String>>,
    #[serde(default)]
    pub no_index: Option<bool>,
}

/// A key that is present deserializes to `Some`, even when its value is null.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl ArticlePatch {
    pub fn is_empty(&self) -> bool {
        *self == ArticlePatch::default()
    }

    /// Merge the provided fields into `article`. Timestamps are left alone.
    pub fn apply_to(&self, article: &mut Article) {
        if let Some(title) = &self.title {
            article.title = title.clone();
        }
        if let Some(slug) = &self.slug {
            article.slug = slug.clone();
        }
        if let Some(content) = &self.content {
            article.content = content.clone();
        }
        if let Some(preview_text) = &self.preview_text {
            article.preview_text = preview_text.clone();
        }
        if let Some(preview_image) = &self.preview_image {
            article.preview_image = preview_image.clone();
        }
        if let Some(tags) = &self.tags {
            article.tags = tags.clone();
        }
        if let Some(published) = self.published {
            article.published = published;
        }
        if let Some(meta_title) = &self.meta_title {
            article.meta_title = meta_title.clone();
        }
        if let Some(meta_description) = &self.meta_description {
            article.meta_description = meta_description.clone();
        }
        if let Some(og_image) = &self.og_image {
            article.og_image = og_image.clone();
        }
        if let Some(no_index) = self.no_index {
            article.no_index = no_index;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article() -> Article {
        let now = Utc::now();
        Article {
            id: "a1".to_string(),
            title: "Rail freight to China".to_string(),
            slug: "rail-freight-to-china".to_string(),
            content: "Body".to_string(),
            preview_text: "Preview".to_string(),
            preview_image: Some("/img/rail.jpg".to_string()),
            tags: vec!["rail".to_string()],
            published: false,
            created_at: now,
            updated_at: now,
            meta_title: Some("Rail".to_string()),
            meta_description: None,
            og_image: None,
            no_index: false,
        }
    }

    #[test]
    fn test_patch_distinguishes_null_from_absent() {
        let patch: ArticlePatch =
            serde_json::from_value(serde_json::json!({ "previewImage": null })).unwrap();
        assert_eq!(patch.preview_image, Some(None));
        assert_eq!(patch.meta_title, None);

        let mut a = article();
        patch.apply_to(&mut a);
        assert!(a.preview_image.is_none());
        assert_eq!(a.meta_title.as_deref(), Some("Rail"));
    }

    #[test]
    fn test_patch_applies_only_present_fields() {
        let patch: ArticlePatch = serde_json::from_value(serde_json::json!({
            "published": true,
            "tags": []
        }))
        .unwrap();

        let mut a = article();
        patch.apply_to(&mut a);
        assert!(a.published);
        assert!(a.tags.is_empty());
        assert_eq!(a.title, "Rail freight to China");
        assert_eq!(a.preview_image.as_deref(), Some("/img/rail.jpg"));
    }

    #[test]
    fn test_empty_patch() {
        let patch: ArticlePatch = serde_json::from_str("{}").unwrap();
        assert!(patch.is_empty());
    }
}

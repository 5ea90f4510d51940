use serde::{Deserialize, Serialize};

use super::{deserialize_id, null_as_default, set, set_opt, Flag, Record, Table};

/// Blog post row (`blog_posts` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogPost {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub excerpt: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub author: String,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub featured: bool,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub read_time: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub views: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub likes: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub slug: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BlogPostPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_time: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

impl Record for BlogPost {
    type Patch = BlogPostPatch;

    const TABLE: Table = Table::BlogPosts;

    fn id(&self) -> &str {
        &self.id
    }

    fn merge(&mut self, patch: &BlogPostPatch) {
        set(&mut self.title, &patch.title);
        set(&mut self.excerpt, &patch.excerpt);
        set(&mut self.content, &patch.content);
        set(&mut self.author, &patch.author);
        set_opt(&mut self.published_at, &patch.published_at);
        set(&mut self.category, &patch.category);
        set(&mut self.tags, &patch.tags);
        set(&mut self.featured, &patch.featured);
        set_opt(&mut self.image, &patch.image);
        set_opt(&mut self.read_time, &patch.read_time);
        set(&mut self.slug, &patch.slug);
    }

    fn flag(&self, flag: Flag) -> Option<bool> {
        match flag {
            Flag::Featured => Some(self.featured),
        }
    }

    fn flag_patch(flag: Flag, value: bool) -> Option<BlogPostPatch> {
        match flag {
            Flag::Featured => Some(BlogPostPatch {
                featured: Some(value),
                ..Default::default()
            }),
        }
    }
}

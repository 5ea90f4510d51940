use std::fmt;

use serde::Serialize;
use serde_json::Value;

use super::{
    BlogPost, BlogPostPatch, ContactPatch, PersonalInfoPatch, Project, ProjectPatch, Skill,
    SkillPatch, Table,
};

/// Boolean row fields that can be toggled from the admin list views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    Featured,
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flag::Featured => f.write_str("featured"),
        }
    }
}

/// An editable content row, one variant per content table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentItem {
    Project(Project),
    Skill(Skill),
    BlogPost(BlogPost),
}

impl ContentItem {
    pub fn table(&self) -> Table {
        match self {
            ContentItem::Project(_) => Table::Projects,
            ContentItem::Skill(_) => Table::Skills,
            ContentItem::BlogPost(_) => Table::BlogPosts,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ContentItem::Project(p) => &p.id,
            ContentItem::Skill(s) => &s.id,
            ContentItem::BlogPost(b) => &b.id,
        }
    }

    /// Title for projects and posts, name for skills.
    pub fn title(&self) -> &str {
        match self {
            ContentItem::Project(p) => &p.title,
            ContentItem::Skill(s) => &s.name,
            ContentItem::BlogPost(b) => &b.title,
        }
    }
}

/// A partial edit. The variant decides which table the edit goes to.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPatch {
    Project(ProjectPatch),
    Skill(SkillPatch),
    BlogPost(BlogPostPatch),
    Contact(ContactPatch),
    PersonalInfo(PersonalInfoPatch),
}

impl ContentPatch {
    pub fn table(&self) -> Table {
        match self {
            ContentPatch::Project(_) => Table::Projects,
            ContentPatch::Skill(_) => Table::Skills,
            ContentPatch::BlogPost(_) => Table::BlogPosts,
            ContentPatch::Contact(_) => Table::ContactSubmissions,
            ContentPatch::PersonalInfo(_) => Table::PersonalInfo,
        }
    }

    /// Wire body containing only the fields that are set.
    pub fn to_json(&self) -> serde_json::Result<Value> {
        match self {
            ContentPatch::Project(p) => serde_json::to_value(p),
            ContentPatch::Skill(p) => serde_json::to_value(p),
            ContentPatch::BlogPost(p) => serde_json::to_value(p),
            ContentPatch::Contact(p) => serde_json::to_value(p),
            ContentPatch::PersonalInfo(p) => serde_json::to_value(p),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContactStatus;
    use serde_json::json;

    #[test]
    fn test_patch_routes_to_table() {
        let patch = ContentPatch::Contact(ContactPatch {
            status: Some(ContactStatus::Replied),
        });
        assert_eq!(patch.table(), Table::ContactSubmissions);
        assert_eq!(patch.to_json().unwrap(), json!({"status": "replied"}));

        let patch = ContentPatch::Skill(SkillPatch::default());
        assert_eq!(patch.table(), Table::Skills);
        assert_eq!(patch.to_json().unwrap(), json!({}));
    }
}

use serde::{Deserialize, Serialize};

use super::{deserialize_id, null_as_default, set, set_opt, Flag, Record, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
    Completed,
    InProgress,
    Planned,
}

/// Portfolio project row (`projects` table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default)]
    pub long_description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub github_url: Option<String>,
    #[serde(default)]
    pub live_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub featured: bool,
    #[serde(default)]
    pub status: Option<ProjectStatus>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProjectPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technologies: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProjectStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

impl Record for Project {
    type Patch = ProjectPatch;

    const TABLE: Table = Table::Projects;

    fn id(&self) -> &str {
        &self.id
    }

    fn merge(&mut self, patch: &ProjectPatch) {
        set(&mut self.title, &patch.title);
        set(&mut self.description, &patch.description);
        set_opt(&mut self.long_description, &patch.long_description);
        set_opt(&mut self.image, &patch.image);
        set(&mut self.technologies, &patch.technologies);
        set_opt(&mut self.category, &patch.category);
        set_opt(&mut self.github_url, &patch.github_url);
        set_opt(&mut self.live_url, &patch.live_url);
        set(&mut self.featured, &patch.featured);
        set_opt(&mut self.status, &patch.status);
        set_opt(&mut self.start_date, &patch.start_date);
        set_opt(&mut self.end_date, &patch.end_date);
    }

    fn flag(&self, flag: Flag) -> Option<bool> {
        match flag {
            Flag::Featured => Some(self.featured),
        }
    }

    fn flag_patch(flag: Flag, value: bool) -> Option<ProjectPatch> {
        match flag {
            Flag::Featured => Some(ProjectPatch {
                featured: Some(value),
                ..Default::default()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_tolerates_nulls_and_extra_columns() {
        let project: Project = serde_json::from_value(json!({
            "id": 3,
            "title": "Task Management App",
            "description": null,
            "technologies": null,
            "featured": null,
            "status": "in-progress",
            "owner_id": "ignored"
        }))
        .unwrap();
        assert_eq!(project.id, "3");
        assert_eq!(project.description, "");
        assert!(project.technologies.is_empty());
        assert!(!project.featured);
        assert_eq!(project.status, Some(ProjectStatus::InProgress));
    }

    #[test]
    fn test_patch_serializes_only_set_fields() {
        let patch = ProjectPatch {
            title: Some("Renamed".to_string()),
            featured: Some(false),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({"title": "Renamed", "featured": false})
        );
    }
}

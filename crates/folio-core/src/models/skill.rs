use serde::{Deserialize, Serialize};

use super::{deserialize_id, null_as_default, set, set_opt, Record, Table};

/// Skill row (`skills` table). Skills have no boolean flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    /// Proficiency, 0-100.
    #[serde(default, deserialize_with = "null_as_default")]
    pub level: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub years_experience: Option<u32>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SkillPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub years_experience: Option<u32>,
}

impl Record for Skill {
    type Patch = SkillPatch;

    const TABLE: Table = Table::Skills;

    fn id(&self) -> &str {
        &self.id
    }

    fn merge(&mut self, patch: &SkillPatch) {
        set(&mut self.name, &patch.name);
        set(&mut self.level, &patch.level);
        set(&mut self.category, &patch.category);
        set_opt(&mut self.icon, &patch.icon);
        set_opt(&mut self.description, &patch.description);
        set_opt(&mut self.years_experience, &patch.years_experience);
    }
}

use serde::{Deserialize, Serialize};

use super::{deserialize_id, null_as_default, set, set_opt, Record, Table};

/// The single `personal_info` row shown on the about/contact pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalInfo {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bio: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub resume_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PersonalInfoPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resume_url: Option<String>,
}

impl Record for PersonalInfo {
    type Patch = PersonalInfoPatch;

    const TABLE: Table = Table::PersonalInfo;

    fn id(&self) -> &str {
        &self.id
    }

    fn merge(&mut self, patch: &PersonalInfoPatch) {
        set(&mut self.name, &patch.name);
        set(&mut self.title, &patch.title);
        set(&mut self.bio, &patch.bio);
        set(&mut self.email, &patch.email);
        set_opt(&mut self.phone, &patch.phone);
        set_opt(&mut self.location, &patch.location);
        set_opt(&mut self.avatar, &patch.avatar);
        set_opt(&mut self.resume_url, &patch.resume_url);
    }
}

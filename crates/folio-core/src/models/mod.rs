pub mod activity;
pub mod blog_post;
pub mod change;
pub mod contact;
pub mod content;
pub mod personal_info;
pub mod project;
pub mod skill;

pub use activity::{ActivityItem, ActivityKind, ActivityMetadata};
pub use blog_post::{BlogPost, BlogPostPatch};
pub use change::{ChangeEvent, Operation, OperationFilter, Table};
pub use contact::{ContactPatch, ContactStatus, ContactSubmission};
pub use content::{ContentItem, ContentPatch, Flag};
pub use personal_info::{PersonalInfo, PersonalInfoPatch};
pub use project::{Project, ProjectPatch, ProjectStatus};
pub use skill::{Skill, SkillPatch};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A row type mirrored from one remote table.
pub trait Record: DeserializeOwned + Clone + PartialEq + Send + Sync + 'static {
    /// Partial update for this row type. Only set fields are serialized.
    type Patch: Serialize + Clone + Send + Sync;

    const TABLE: Table;

    fn id(&self) -> &str;

    /// Field-level merge: fields set in `patch` overwrite, everything else is kept.
    fn merge(&mut self, patch: &Self::Patch);

    /// Current value of a boolean flag, if this row type has it.
    fn flag(&self, _flag: Flag) -> Option<bool> {
        None
    }

    /// Patch that sets a boolean flag, if this row type has it.
    fn flag_patch(_flag: Flag, _value: bool) -> Option<Self::Patch> {
        None
    }
}

/// Row ids are uuids on some tables and bigints on others.
pub(crate) fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    id_from_value(&value).ok_or_else(|| serde::de::Error::custom("row id must be a string or a number"))
}

/// Nullable columns that the admin views treat as plain values.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

pub(crate) fn set<T: Clone>(slot: &mut T, value: &Option<T>) {
    if let Some(v) = value {
        *slot = v.clone();
    }
}

pub(crate) fn set_opt<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if let Some(v) = value {
        *slot = Some(v.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_from_value() {
        assert_eq!(id_from_value(&json!("abc")), Some("abc".to_string()));
        assert_eq!(id_from_value(&json!(42)), Some("42".to_string()));
        assert_eq!(id_from_value(&json!(null)), None);
        assert_eq!(id_from_value(&json!({"id": 1})), None);
    }
}

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{deserialize_id, null_as_default, set, Record, Table};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactStatus {
    /// The public contact form writes "unread" for new submissions.
    #[default]
    #[serde(alias = "unread")]
    New,
    Read,
    Replied,
}

impl ContactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactStatus::New => "new",
            ContactStatus::Read => "read",
            ContactStatus::Replied => "replied",
        }
    }
}

impl fmt::Display for ContactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContactStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" | "unread" => Ok(ContactStatus::New),
            "read" => Ok(ContactStatus::Read),
            "replied" => Ok(ContactStatus::Replied),
            _ => Err(format!("unknown contact status: {}", s)),
        }
    }
}

/// Message sent through the public contact form (`contact_submissions` table).
/// The admin side only ever changes `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactSubmission {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subject: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: ContactStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContactPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ContactStatus>,
}

impl Record for ContactSubmission {
    type Patch = ContactPatch;

    const TABLE: Table = Table::ContactSubmissions;

    fn id(&self) -> &str {
        &self.id
    }

    fn merge(&mut self, patch: &ContactPatch) {
        set(&mut self.status, &patch.status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unread_is_new() {
        let contact: ContactSubmission = serde_json::from_value(json!({
            "id": "c1",
            "name": "Jane Doe",
            "email": "jane@example.com",
            "subject": "Hello",
            "message": "Hi there",
            "status": "unread",
            "created_at": "2024-03-01T10:15:00.123456+00:00"
        }))
        .unwrap();
        assert_eq!(contact.status, ContactStatus::New);
        assert!(contact.created_at.is_some());
        assert_eq!("unread".parse::<ContactStatus>(), Ok(ContactStatus::New));
        assert_eq!(serde_json::to_value(ContactStatus::New).unwrap(), json!("new"));
    }
}

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::mirror::{Mirror, SyncState};
use crate::backend::{Backend, Query};
use crate::error::{BackendError, SyncError};
use crate::models::{
    BlogPost, ChangeEvent, ContactPatch, ContactStatus, ContactSubmission, ContentItem,
    ContentPatch, Flag, PersonalInfo, Project, Record, Skill, Table,
};

/// Live mirror of the portfolio tables for the admin views.
///
/// Slices are only ever replaced whole by a fetch or patched by id after a
/// confirmed remote write. Nothing is written locally before the remote
/// accepts it.
pub struct ContentStore {
    backend: Arc<dyn Backend>,
    contact_limit: Option<usize>,
    projects: Mirror<Project>,
    skills: Mirror<Skill>,
    blog_posts: Mirror<BlogPost>,
    contacts: Mirror<ContactSubmission>,
    personal_info: Mirror<PersonalInfo>,
}

impl ContentStore {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            contact_limit: None,
            projects: Mirror::new(),
            skills: Mirror::new(),
            blog_posts: Mirror::new(),
            contacts: Mirror::new(),
            personal_info: Mirror::new(),
        }
    }

    pub fn with_contact_limit(mut self, limit: Option<usize>) -> Self {
        self.contact_limit = limit;
        self
    }

    pub fn clear(&mut self) {
        self.projects.clear();
        self.skills.clear();
        self.blog_posts.clear();
        self.contacts.clear();
        self.personal_info.clear();
    }

    fn query(&self, table: Table) -> Query {
        let query = Query::for_table(table);
        match table {
            Table::ContactSubmissions => query.limit(self.contact_limit),
            _ => query,
        }
    }

    // ===== Getters =====

    pub fn projects(&self) -> &Mirror<Project> {
        &self.projects
    }

    pub fn skills(&self) -> &Mirror<Skill> {
        &self.skills
    }

    pub fn blog_posts(&self) -> &Mirror<BlogPost> {
        &self.blog_posts
    }

    pub fn contacts(&self) -> &Mirror<ContactSubmission> {
        &self.contacts
    }

    pub fn personal_info(&self) -> Option<&PersonalInfo> {
        self.personal_info.rows().first()
    }

    /// An editable content row by table and id.
    pub fn item(&self, table: Table, id: &str) -> Option<ContentItem> {
        match table {
            Table::Projects => self.projects.get(id).cloned().map(ContentItem::Project),
            Table::Skills => self.skills.get(id).cloned().map(ContentItem::Skill),
            Table::BlogPosts => self.blog_posts.get(id).cloned().map(ContentItem::BlogPost),
            Table::ContactSubmissions | Table::PersonalInfo => None,
        }
    }

    pub fn state(&self, table: Table, id: &str) -> SyncState {
        match table {
            Table::Projects => self.projects.state(id),
            Table::Skills => self.skills.state(id),
            Table::BlogPosts => self.blog_posts.state(id),
            Table::ContactSubmissions => self.contacts.state(id),
            Table::PersonalInfo => self.personal_info.state(id),
        }
    }

    /// Mirrored rows of one table as JSON, in display order.
    pub fn table_json(&self, table: Table) -> serde_json::Result<Value> {
        match table {
            Table::Projects => serde_json::to_value(self.projects.rows()),
            Table::Skills => serde_json::to_value(self.skills.rows()),
            Table::BlogPosts => serde_json::to_value(self.blog_posts.rows()),
            Table::ContactSubmissions => serde_json::to_value(self.contacts.rows()),
            Table::PersonalInfo => serde_json::to_value(self.personal_info.rows()),
        }
    }

    /// One mirrored row as JSON.
    pub fn row_json(&self, table: Table, id: &str) -> serde_json::Result<Option<Value>> {
        match table {
            Table::Projects => self.projects.get(id).map(serde_json::to_value).transpose(),
            Table::Skills => self.skills.get(id).map(serde_json::to_value).transpose(),
            Table::BlogPosts => self.blog_posts.get(id).map(serde_json::to_value).transpose(),
            Table::ContactSubmissions => self.contacts.get(id).map(serde_json::to_value).transpose(),
            Table::PersonalInfo => self
                .personal_info
                .get(id)
                .map(serde_json::to_value)
                .transpose(),
        }
    }

    // ===== Loading =====

    /// Fetch every table in parallel and replace each slice that loaded.
    /// Slices whose fetch failed keep their previous contents.
    pub async fn load_all(&mut self) -> Result<(), SyncError> {
        let queries = Table::ALL.map(|table| self.query(table));
        let [projects_q, skills_q, blog_q, contacts_q, personal_q] = queries;
        let backend = self.backend.as_ref();

        let (projects, skills, blog_posts, contacts, personal_info) = futures::join!(
            fetch_slice::<Project>(backend, projects_q),
            fetch_slice::<Skill>(backend, skills_q),
            fetch_slice::<BlogPost>(backend, blog_q),
            fetch_slice::<ContactSubmission>(backend, contacts_q),
            fetch_slice::<PersonalInfo>(backend, personal_q),
        );

        let mut failures = Vec::new();
        install(&mut self.projects, projects, &mut failures);
        install(&mut self.skills, skills, &mut failures);
        install(&mut self.blog_posts, blog_posts, &mut failures);
        install(&mut self.contacts, contacts, &mut failures);
        install(&mut self.personal_info, personal_info, &mut failures);

        if failures.is_empty() {
            debug!("loaded all tables");
            Ok(())
        } else {
            Err(SyncError::LoadFailed(failures))
        }
    }

    /// Re-fetch one table and replace its slice. On failure the stale slice stays.
    pub async fn refresh_table(&mut self, table: Table) -> Result<(), SyncError> {
        let query = self.query(table);
        let backend = self.backend.as_ref();
        match table {
            Table::Projects => self.projects.replace(fetch_slice(backend, query).await?),
            Table::Skills => self.skills.replace(fetch_slice(backend, query).await?),
            Table::BlogPosts => self.blog_posts.replace(fetch_slice(backend, query).await?),
            Table::ContactSubmissions => self.contacts.replace(fetch_slice(backend, query).await?),
            Table::PersonalInfo => self.personal_info.replace(fetch_slice(backend, query).await?),
        }
        debug!(table = %table, "table re-fetched");
        Ok(())
    }

    /// A remote change was observed: re-fetch the affected table only.
    pub async fn on_change_event(&mut self, event: &ChangeEvent) -> Result<Table, SyncError> {
        self.refresh_table(event.table).await?;
        Ok(event.table)
    }

    // ===== Mutations =====

    /// Write a partial edit; merge it locally once the remote accepted it.
    pub async fn apply_edit(&mut self, id: &str, patch: ContentPatch) -> Result<(), SyncError> {
        let backend = self.backend.as_ref();
        match patch {
            ContentPatch::Project(p) => edit(backend, &mut self.projects, id, &p).await,
            ContentPatch::Skill(p) => edit(backend, &mut self.skills, id, &p).await,
            ContentPatch::BlogPost(p) => edit(backend, &mut self.blog_posts, id, &p).await,
            ContentPatch::Contact(p) => edit(backend, &mut self.contacts, id, &p).await,
            ContentPatch::PersonalInfo(p) => edit(backend, &mut self.personal_info, id, &p).await,
        }
    }

    /// Delete remotely, then drop the row locally. Never removes first.
    pub async fn apply_delete(&mut self, table: Table, id: &str) -> Result<(), SyncError> {
        let backend = self.backend.as_ref();
        match table {
            Table::Projects => delete(backend, &mut self.projects, id).await,
            Table::Skills => delete(backend, &mut self.skills, id).await,
            Table::BlogPosts => delete(backend, &mut self.blog_posts, id).await,
            Table::ContactSubmissions => delete(backend, &mut self.contacts, id).await,
            Table::PersonalInfo => delete(backend, &mut self.personal_info, id).await,
        }
    }

    /// Flip a boolean flag using the mirrored value. Returns the new value.
    pub async fn toggle_flag(&mut self, table: Table, id: &str, flag: Flag) -> Result<bool, SyncError> {
        let backend = self.backend.as_ref();
        match table {
            Table::Projects => toggle(backend, &mut self.projects, id, flag).await,
            Table::Skills => toggle(backend, &mut self.skills, id, flag).await,
            Table::BlogPosts => toggle(backend, &mut self.blog_posts, id, flag).await,
            Table::ContactSubmissions | Table::PersonalInfo => {
                Err(SyncError::UnsupportedFlag { table, flag })
            }
        }
    }

    pub async fn set_contact_status(&mut self, id: &str, status: ContactStatus) -> Result<(), SyncError> {
        self.apply_edit(
            id,
            ContentPatch::Contact(ContactPatch {
                status: Some(status),
            }),
        )
        .await
    }
}

/// Fetch and decode one table. Rows that fail to decode are skipped.
async fn fetch_slice<T: Record>(backend: &dyn Backend, query: Query) -> Result<Vec<T>, SyncError> {
    let rows = backend
        .fetch(T::TABLE, &query)
        .await
        .map_err(|source| SyncError::ReadFailed {
            table: T::TABLE,
            source,
        })?;

    Ok(rows
        .into_iter()
        .filter_map(|row| match serde_json::from_value::<T>(row) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(table = %T::TABLE, "Skipping malformed row: {}", err);
                None
            }
        })
        .collect())
}

fn install<T: Record>(mirror: &mut Mirror<T>, result: Result<Vec<T>, SyncError>, failures: &mut Vec<SyncError>) {
    match result {
        Ok(rows) => mirror.replace(rows),
        Err(err) => {
            warn!("{}", err);
            failures.push(err);
        }
    }
}

async fn edit<T: Record>(
    backend: &dyn Backend,
    mirror: &mut Mirror<T>,
    id: &str,
    patch: &T::Patch,
) -> Result<(), SyncError> {
    if !mirror.contains(id) {
        return Err(SyncError::unknown_row(T::TABLE, id));
    }
    let body = serde_json::to_value(patch)
        .map_err(|err| SyncError::update_failed(T::TABLE, id, BackendError::Decode(err)))?;

    mirror.begin(id, SyncState::PendingWrite);
    let result = backend.update(T::TABLE, id, &body).await;
    mirror.settle(id);

    match result {
        Ok(()) => {
            mirror.merge(id, patch);
            debug!(table = %T::TABLE, id = %id, "edit applied");
            Ok(())
        }
        Err(source) => {
            warn!(table = %T::TABLE, id = %id, "Update rejected: {}", source);
            Err(SyncError::update_failed(T::TABLE, id, source))
        }
    }
}

async fn delete<T: Record>(backend: &dyn Backend, mirror: &mut Mirror<T>, id: &str) -> Result<(), SyncError> {
    if !mirror.contains(id) {
        return Err(SyncError::unknown_row(T::TABLE, id));
    }

    mirror.begin(id, SyncState::PendingDelete);
    let result = backend.delete(T::TABLE, id).await;
    mirror.settle(id);

    match result {
        Ok(()) => {
            mirror.remove(id);
            debug!(table = %T::TABLE, id = %id, "row deleted");
            Ok(())
        }
        Err(source) => {
            warn!(table = %T::TABLE, id = %id, "Delete rejected: {}", source);
            Err(SyncError::delete_failed(T::TABLE, id, source))
        }
    }
}

async fn toggle<T: Record>(
    backend: &dyn Backend,
    mirror: &mut Mirror<T>,
    id: &str,
    flag: Flag,
) -> Result<bool, SyncError> {
    let unsupported = || SyncError::UnsupportedFlag {
        table: T::TABLE,
        flag,
    };
    let current = mirror
        .get(id)
        .ok_or_else(|| SyncError::unknown_row(T::TABLE, id))?
        .flag(flag)
        .ok_or_else(unsupported)?;
    let patch = T::flag_patch(flag, !current).ok_or_else(unsupported)?;
    edit(backend, mirror, id, &patch).await?;
    Ok(!current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Call, MemoryBackend};
    use crate::models::ProjectPatch;
    use serde_json::json;

    fn backend() -> Arc<MemoryBackend> {
        let backend = MemoryBackend::new();
        backend.seed(
            Table::Projects,
            vec![
                json!({"id": "p1", "title": "Alpha", "description": "first", "featured": false, "created_at": "2024-01-01T00:00:00Z"}),
                json!({"id": "p2", "title": "Beta", "description": "second", "featured": true, "created_at": "2024-02-01T00:00:00Z"}),
            ],
        );
        backend.seed(
            Table::Skills,
            vec![json!({"id": "s1", "name": "Rust", "level": 80, "category": "Backend"})],
        );
        backend.seed(
            Table::PersonalInfo,
            vec![json!({"id": "me", "name": "Alex Johnson", "email": "alex@example.com"})],
        );
        Arc::new(backend)
    }

    #[tokio::test]
    async fn test_load_all_orders_slices() {
        let backend = backend();
        let mut store = ContentStore::new(backend.clone());
        store.load_all().await.unwrap();

        let ids: Vec<_> = store.projects().rows().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p1"]);
        assert_eq!(store.personal_info().map(|p| p.name.as_str()), Some("Alex Johnson"));
        assert!(store.contacts().is_loaded());
        assert!(store.contacts().is_empty());
    }

    #[tokio::test]
    async fn test_load_all_keeps_stale_slice_on_failure() {
        let backend = backend();
        let mut store = ContentStore::new(backend.clone());
        store.load_all().await.unwrap();

        backend.modify(Table::Skills, "s1", &json!({"level": 99}));
        backend.fail_next(Call::Fetch, Table::Projects);
        let err = store.load_all().await.unwrap_err();
        match err {
            SyncError::LoadFailed(failures) => {
                assert_eq!(failures.len(), 1);
                assert!(matches!(failures[0], SyncError::ReadFailed { table: Table::Projects, .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.projects().len(), 2);
        assert_eq!(store.skills().get("s1").unwrap().level, 99);
    }

    #[tokio::test]
    async fn test_edit_unknown_row_is_rejected_without_remote_call() {
        let backend = backend();
        let mut store = ContentStore::new(backend.clone());
        store.load_all().await.unwrap();

        let err = store
            .apply_edit("nope", ContentPatch::Project(ProjectPatch::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::UnknownRow { .. }));
        assert_eq!(backend.calls(Call::Update, Table::Projects), 0);
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_row() {
        let backend = backend();
        let mut store = ContentStore::new(backend.clone());
        store.load_all().await.unwrap();
        let before = store.projects().clone();

        backend.fail_next(Call::Delete, Table::Projects);
        let err = store.apply_delete(Table::Projects, "p1").await.unwrap_err();
        assert!(matches!(err, SyncError::DeleteFailed { .. }));
        assert_eq!(store.projects(), &before);

        store.apply_delete(Table::Projects, "p1").await.unwrap();
        assert!(!store.projects().contains("p1"));
        assert_eq!(store.state(Table::Projects, "p1"), SyncState::Synced);
    }

    #[tokio::test]
    async fn test_toggle_on_table_without_flag() {
        let backend = backend();
        let mut store = ContentStore::new(backend.clone());
        store.load_all().await.unwrap();

        let err = store
            .toggle_flag(Table::Skills, "s1", Flag::Featured)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::UnsupportedFlag { table: Table::Skills, .. }));
        let err = store
            .toggle_flag(Table::ContactSubmissions, "c1", Flag::Featured)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::UnsupportedFlag { .. }));
    }

    #[tokio::test]
    async fn test_auth_expired_write() {
        let backend = backend();
        let mut store = ContentStore::new(backend.clone());
        store.load_all().await.unwrap();

        backend.fail_next_with(Call::Update, Table::PersonalInfo, BackendError::AuthExpired);
        let err = store
            .apply_edit(
                "me",
                ContentPatch::PersonalInfo(crate::models::PersonalInfoPatch {
                    bio: Some("new bio".to_string()),
                    ..Default::default()
                }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::AuthExpired { table: Table::PersonalInfo, .. }));
        assert_eq!(store.personal_info().unwrap().bio, "");
    }

    #[tokio::test]
    async fn test_contact_limit_caps_mirror() {
        let backend = backend();
        backend.seed(
            Table::ContactSubmissions,
            (1..=4)
                .map(|i| json!({"id": format!("c{i}"), "name": "X", "created_at": format!("2024-03-0{i}T00:00:00Z")}))
                .collect(),
        );
        let mut store = ContentStore::new(backend.clone()).with_contact_limit(Some(2));
        store.load_all().await.unwrap();
        let ids: Vec<_> = store.contacts().rows().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c4", "c3"]);
    }
}

//! Draft persistence: a single durable slot holding the in-progress answers.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;

use super::model::OnboardingDraft;
use crate::error::StoreError;

/// Default file name of the persisted draft.
pub const DRAFT_FILE_NAME: &str = "onboarding-progress.json";

/// Durable slot for the onboarding draft.
#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Load the persisted draft. Missing or corrupt data yields an empty draft.
    async fn load(&self) -> OnboardingDraft;

    /// Overwrite the persisted draft.
    async fn save(&self, draft: &OnboardingDraft) -> Result<(), StoreError>;

    /// Remove the persisted draft.
    async fn clear(&self) -> Result<(), StoreError>;
}

/// JSON file on local disk.
#[derive(Debug, Clone)]
pub struct FileDraftStore {
    path: PathBuf,
}

impl FileDraftStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DraftStore for FileDraftStore {
    async fn load(&self) -> OnboardingDraft {
        match fs::read_to_string(&self.path).await {
            Ok(raw) => OnboardingDraft::from_json_lenient(&raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => OnboardingDraft::default(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Failed to read onboarding draft: {}", e);
                OnboardingDraft::default()
            }
        }
    }

    async fn save(&self, draft: &OnboardingDraft) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(draft)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        // Sibling write + rename: readers never observe a partial file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory slot holding the serialized JSON, for tests and offline runs.
#[derive(Debug, Default)]
pub struct InMemoryDraftStore {
    raw: RwLock<Option<String>>,
}

impl InMemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the slot with raw content, as if written by an earlier session.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: RwLock::new(Some(raw.into())),
        }
    }

    /// The raw persisted JSON, if any.
    pub async fn raw(&self) -> Option<String> {
        self.raw.read().await.clone()
    }
}

#[async_trait]
impl DraftStore for InMemoryDraftStore {
    async fn load(&self) -> OnboardingDraft {
        match self.raw.read().await.as_deref() {
            Some(raw) => OnboardingDraft::from_json_lenient(raw),
            None => OnboardingDraft::default(),
        }
    }

    async fn save(&self, draft: &OnboardingDraft) -> Result<(), StoreError> {
        let json = serde_json::to_string(draft)?;
        *self.raw.write().await = Some(json);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.raw.write().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::model::{DurationBucket, ProductType};

    fn sample_draft() -> OnboardingDraft {
        let mut draft = OnboardingDraft {
            product_type: Some(ProductType::Cigarettes),
            daily_usage: 2.0,
            unit_cost: 8.0,
            duration_bucket: Some(DurationBucket::FiveToTenYears),
            ..Default::default()
        };
        draft.identity.email = "sam@example.com".into();
        draft
    }

    #[tokio::test]
    async fn file_store_missing_file_is_empty_draft() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDraftStore::new(dir.path().join(DRAFT_FILE_NAME));
        assert_eq!(store.load().await, OnboardingDraft::default());
    }

    #[tokio::test]
    async fn file_store_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDraftStore::new(dir.path().join("nested").join(DRAFT_FILE_NAME));
        let draft = sample_draft();

        store.save(&draft).await.unwrap();
        assert_eq!(store.load().await, draft);

        // A second store on the same path sees the same draft (reload).
        let reopened = FileDraftStore::new(store.path().to_path_buf());
        assert_eq!(reopened.load().await, draft);
    }

    #[tokio::test]
    async fn file_store_corrupt_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DRAFT_FILE_NAME);
        tokio::fs::write(&path, "{\"productType\": \"dip\", trailing garbage")
            .await
            .unwrap();

        let store = FileDraftStore::new(&path);
        assert_eq!(store.load().await, OnboardingDraft::default());
    }

    #[tokio::test]
    async fn file_store_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDraftStore::new(dir.path().join(DRAFT_FILE_NAME));
        store.save(&sample_draft()).await.unwrap();

        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert!(!store.path().exists());
        assert_eq!(store.load().await, OnboardingDraft::default());
    }

    #[tokio::test]
    async fn memory_store_partial_raw_restores_present_fields() {
        let store = InMemoryDraftStore::with_raw(r#"{"unitCost": 9, "identity": {"firstName": "Jo"}}"#);
        let draft = store.load().await;
        assert_eq!(draft.unit_cost, 9.0);
        assert_eq!(draft.identity.first_name, "Jo");
        assert_eq!(draft.product_type, None);
    }

    #[tokio::test]
    async fn memory_store_save_overwrites() {
        let store = InMemoryDraftStore::new();
        assert!(store.raw().await.is_none());

        store.save(&sample_draft()).await.unwrap();
        let raw = store.raw().await.unwrap();
        assert!(raw.contains("\"productType\":\"cigarettes\""));

        store.clear().await.unwrap();
        assert!(store.raw().await.is_none());
    }
}

//! Profile lookups for conversation display, plus avatar upload.

use crate::backend::{
    from_row, to_row, AuthProvider, BackendError, BackendResult, Filter, ObjectStore,
    RecordStore, PROFILES,
};
use agora_messaging::{Profile, UserId};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Memoizes profile rows per user id so message events do not refetch them.
#[derive(Clone)]
pub struct ProfileCache {
    records: Arc<dyn RecordStore>,
    entries: Arc<RwLock<HashMap<UserId, Profile>>>,
}

impl ProfileCache {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self {
            records,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Cached profile, fetching it on a miss. Lookup failures are logged and
    /// treated as "no profile" so a conversation still renders without one.
    pub async fn lookup(&self, id: &UserId) -> Option<Profile> {
        if let Some(profile) = self.cached(id).await {
            return Some(profile);
        }
        match self.fetch(id).await {
            Ok(Some(profile)) => {
                self.entries
                    .write()
                    .await
                    .insert(id.clone(), profile.clone());
                Some(profile)
            }
            Ok(None) => {
                debug!(user = %id, "no profile row");
                None
            }
            Err(err) => {
                warn!(%err, user = %id, "profile lookup failed");
                None
            }
        }
    }

    pub async fn fetch(&self, id: &UserId) -> BackendResult<Option<Profile>> {
        let rows = self
            .records
            .query(PROFILES, &Filter::eq("id", id.as_str()), None)
            .await?;
        rows.into_iter().next().map(from_row).transpose()
    }

    pub async fn cached(&self, id: &UserId) -> Option<Profile> {
        self.entries.read().await.get(id).cloned()
    }

    pub async fn invalidate(&self, id: &UserId) {
        self.entries.write().await.remove(id);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("no valid session")]
    NotAuthenticated,
    #[error("upload must not be empty")]
    EmptyUpload,
    #[error("upload failed: {0}")]
    Upload(BackendError),
    #[error("persistence failed: {0}")]
    Persistence(BackendError),
    #[error("no profile for {0}")]
    NotFound(UserId),
}

#[derive(Serialize)]
struct AvatarPatch<'a> {
    avatar_url: &'a str,
}

/// Profile mutations for the signed-in user.
#[derive(Clone)]
pub struct Profiles {
    records: Arc<dyn RecordStore>,
    objects: Arc<dyn ObjectStore>,
    auth: Arc<dyn AuthProvider>,
    cache: ProfileCache,
}

impl Profiles {
    pub fn new(
        records: Arc<dyn RecordStore>,
        objects: Arc<dyn ObjectStore>,
        auth: Arc<dyn AuthProvider>,
        cache: ProfileCache,
    ) -> Self {
        Self {
            records,
            objects,
            auth,
            cache,
        }
    }

    /// Uploads a new avatar, points the profile at it and refetches the profile.
    /// Nothing is uploaded unless the signed-in user already has a profile row.
    pub async fn update_avatar(
        &self,
        bytes: Vec<u8>,
        extension: &str,
    ) -> Result<Profile, ProfileError> {
        let user = self.auth.current_user().ok_or(ProfileError::NotAuthenticated)?;
        if bytes.is_empty() {
            return Err(ProfileError::EmptyUpload);
        }
        if self
            .cache
            .fetch(&user)
            .await
            .map_err(ProfileError::Persistence)?
            .is_none()
        {
            return Err(ProfileError::NotFound(user));
        }

        let extension = extension.trim_start_matches('.');
        let path = format!("avatars/{user}/{}.{extension}", Uuid::new_v4());
        let url = self
            .objects
            .upload(&path, bytes)
            .await
            .map_err(ProfileError::Upload)?;

        let patch = to_row(&AvatarPatch { avatar_url: &url }).map_err(ProfileError::Persistence)?;
        let updated = self
            .records
            .update(PROFILES, &Filter::eq("id", user.as_str()), patch)
            .await
            .map_err(ProfileError::Persistence)?;
        if updated.is_empty() {
            return Err(ProfileError::NotFound(user));
        }

        self.cache.invalidate(&user).await;
        let profile = self
            .cache
            .fetch(&user)
            .await
            .map_err(ProfileError::Persistence)?
            .ok_or_else(|| ProfileError::NotFound(user.clone()))?;
        info!(%user, %url, "avatar updated");
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, StaticAuth};
    use serde_json::json;

    fn profile_row(id: &str, name: &str) -> crate::backend::Row {
        match json!({"id": id, "full_name": name, "avatar_url": null, "bio": "ignored"}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn lookups_are_memoized() {
        let backend = MemoryBackend::new();
        backend.seed(PROFILES, profile_row("bob", "Bob")).await;
        let cache = ProfileCache::new(Arc::new(backend.clone()));

        let first = cache.lookup(&"bob".into()).await.unwrap();
        assert_eq!(first.full_name.as_deref(), Some("Bob"));
        let calls = backend.call_count();

        let second = cache.lookup(&"bob".into()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.call_count(), calls);
    }

    #[tokio::test]
    async fn missing_or_failing_lookups_yield_none() {
        let backend = MemoryBackend::new();
        let cache = ProfileCache::new(Arc::new(backend.clone()));
        assert!(cache.lookup(&"ghost".into()).await.is_none());

        backend.seed(PROFILES, profile_row("bob", "Bob")).await;
        backend.set_fail_reads(true);
        assert!(cache.lookup(&"bob".into()).await.is_none());
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn avatar_update_refreshes_cache() {
        let backend = MemoryBackend::new();
        backend.seed(PROFILES, profile_row("alice", "Alice")).await;
        let records: Arc<dyn RecordStore> = Arc::new(backend.clone());
        let cache = ProfileCache::new(records.clone());
        cache.lookup(&"alice".into()).await;

        let profiles = Profiles::new(
            records,
            Arc::new(backend.clone()),
            Arc::new(StaticAuth::signed_in("alice")),
            cache.clone(),
        );
        let profile = profiles.update_avatar(vec![0xFF, 0xD8], ".jpg").await.unwrap();

        let url = profile.avatar_url.clone().unwrap();
        assert!(url.starts_with("memory://objects/avatars/alice/"));
        assert!(url.ends_with(".jpg"));
        assert!(cache.cached(&"alice".into()).await.is_none());
        assert_eq!(
            cache.lookup(&"alice".into()).await.unwrap().avatar_url,
            Some(url)
        );
    }

    #[tokio::test]
    async fn avatar_update_requires_session_and_bytes() {
        let backend = MemoryBackend::new();
        let records: Arc<dyn RecordStore> = Arc::new(backend.clone());
        let cache = ProfileCache::new(records.clone());

        let signed_out = Profiles::new(
            records.clone(),
            Arc::new(backend.clone()),
            Arc::new(StaticAuth::signed_out()),
            cache.clone(),
        );
        assert!(matches!(
            signed_out.update_avatar(vec![1], "png").await,
            Err(ProfileError::NotAuthenticated)
        ));

        let signed_in = Profiles::new(
            records,
            Arc::new(backend.clone()),
            Arc::new(StaticAuth::signed_in("alice")),
            cache,
        );
        assert!(matches!(
            signed_in.update_avatar(Vec::new(), "png").await,
            Err(ProfileError::EmptyUpload)
        ));
        assert!(matches!(
            signed_in.update_avatar(vec![1], "png").await,
            Err(ProfileError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn missing_profile_uploads_nothing() {
        let backend = MemoryBackend::new();
        let records: Arc<dyn RecordStore> = Arc::new(backend.clone());
        let profiles = Profiles::new(
            records.clone(),
            Arc::new(backend.clone()),
            Arc::new(StaticAuth::signed_in("ghost")),
            ProfileCache::new(records),
        );

        let err = profiles.update_avatar(vec![0xFF, 0xD8], "jpg").await.unwrap_err();
        assert!(matches!(err, ProfileError::NotFound(user) if user.as_str() == "ghost"));
        assert_eq!(backend.object_count().await, 0);
    }
}

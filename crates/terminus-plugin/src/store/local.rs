//! Local directory implementation of [`ObjectStore`].

use std::collections::BTreeSet;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::TimeDelta;
use futures::TryStreamExt;
use object_store::local::LocalFileSystem;
use object_store::{ObjectMeta, ObjectStoreExt, PutPayload};

use super::keys::{self, ObjectKey};
use super::{ObjectStore, StoreError, StoreResult};
use crate::archive::{ArchiveRewriter, RewriteRules};
use crate::config::{self, ConfigMap, PluginConfig};

/// Object store backed by a directory tree, `{root}/{bucket}/{key}`.
///
/// When a rewriter is attached, backup content archives are passed through
/// it on [`get_object`](ObjectStore::get_object).
pub struct LocalObjectStore {
    root: PathBuf,
    inner: Arc<dyn object_store::ObjectStore>,
    rewriter: Option<Arc<ArchiveRewriter>>,
}

impl LocalObjectStore {
    /// Open a store at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| StoreError::Io {
            message: format!("failed to create store directory {}: {}", root.display(), e),
        })?;
        let inner = LocalFileSystem::new_with_prefix(&root).map_err(|e| StoreError::Io {
            message: format!("failed to create local store at {}: {}", root.display(), e),
        })?;
        Ok(Self {
            root,
            inner: Arc::new(inner),
            rewriter: None,
        })
    }

    /// Open a store as described by the plugin config.
    pub fn from_config(config: &PluginConfig) -> StoreResult<Self> {
        let store = Self::new(&config.root)?;
        if !config.rewrite_backup_archives {
            return Ok(store);
        }
        let rules = RewriteRules::persistent_volumes().with_newline(config.newline_mode);
        let rewriter = ArchiveRewriter::new(&config.workspace, rules).map_err(|e| StoreError::Io {
            message: format!("failed to set up archive rewriter: {}", e),
        })?;
        Ok(store.with_rewriter(rewriter))
    }

    pub fn with_rewriter(mut self, rewriter: ArchiveRewriter) -> Self {
        self.rewriter = Some(Arc::new(rewriter));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn list_keys(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<String>> {
        let root = keys::listing_root(bucket, prefix)?;
        let entries: Vec<ObjectMeta> = self
            .inner
            .list(Some(&root))
            .try_collect()
            .await
            .map_err(|e| StoreError::Io {
                message: format!("failed to list {}: {}", root, e),
            })?;

        let mut found: Vec<String> = entries
            .iter()
            .filter_map(|meta| keys::key_in_bucket(bucket, &meta.location))
            .filter(|key| key.starts_with(prefix))
            .collect();
        found.sort();
        Ok(found)
    }

    async fn rewrite_archive(
        &self,
        rewriter: Arc<ArchiveRewriter>,
        key: &ObjectKey,
        body: Bytes,
    ) -> StoreResult<Bytes> {
        let size = body.len();
        let rewritten = tokio::task::spawn_blocking(move || rewriter.rewrite(Cursor::new(body)))
            .await
            .map_err(|e| StoreError::Io {
                message: format!("rewrite task failed: {}", e),
            })?
            .map_err(|source| StoreError::Rewrite {
                key: key.key().to_string(),
                source,
            })?;

        tracing::info!(
            bucket = key.bucket(),
            key = key.key(),
            size,
            files_rewritten = rewritten.files_rewritten,
            lines_rewritten = rewritten.lines_rewritten,
            "converted backup archive"
        );
        Ok(Bytes::from(rewritten.archive))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn init(&mut self, config: &ConfigMap) -> StoreResult<()> {
        config::validate_object_store_config_keys(config)?;

        let mut dir = self.root.clone();
        for key in [config::BUCKET_KEY, config::PREFIX_KEY] {
            if let Some(part) = config.get(key) {
                dir.extend(part.split('/').filter(|s| !s.is_empty()));
            }
        }
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::Io {
                message: format!("failed to create {}: {}", dir.display(), e),
            })?;

        tracing::info!(root = %self.root.display(), dir = %dir.display(), "object store initialized");
        Ok(())
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> StoreResult<()> {
        let object = ObjectKey::new(bucket, key)?;
        let size = body.len();
        self.inner
            .put(&object.location(), PutPayload::from_bytes(body))
            .await
            .map_err(|e| StoreError::from_object_store(e, bucket, key))?;

        tracing::info!(bucket, key, size, "put object");
        Ok(())
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> StoreResult<bool> {
        let object = ObjectKey::new(bucket, key)?;
        match self.inner.head(&object.location()).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(StoreError::Io {
                message: format!("failed to check {}/{}: {}", bucket, key, e),
            }),
        }
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Bytes> {
        let object = ObjectKey::new(bucket, key)?;
        let result = self
            .inner
            .get(&object.location())
            .await
            .map_err(|e| StoreError::from_object_store(e, bucket, key))?;
        let body = result.bytes().await.map_err(|e| StoreError::Io {
            message: format!("failed to read {}/{}: {}", bucket, key, e),
        })?;

        tracing::debug!(bucket, key, size = body.len(), "get object");

        match &self.rewriter {
            Some(rewriter) if object.is_backup_archive() => {
                self.rewrite_archive(Arc::clone(rewriter), &object, body).await
            }
            _ => Ok(body),
        }
    }

    async fn list_common_prefixes(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: &str,
    ) -> StoreResult<Vec<String>> {
        let prefixes: BTreeSet<String> = self
            .list_keys(bucket, prefix)
            .await?
            .iter()
            .filter_map(|key| keys::common_prefix(key, prefix, delimiter))
            .collect();

        tracing::debug!(bucket, prefix, delimiter, count = prefixes.len(), "listed common prefixes");
        Ok(prefixes.into_iter().collect())
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<String>> {
        let found = self.list_keys(bucket, prefix).await?;
        tracing::debug!(bucket, prefix, count = found.len(), "listed objects");
        Ok(found)
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()> {
        let object = ObjectKey::new(bucket, key)?;
        let location = object.location();

        if self.inner.head(&location).await.is_ok() {
            self.inner
                .delete(&location)
                .await
                .map_err(|e| StoreError::from_object_store(e, bucket, key))?;
            tracing::info!(bucket, key, "deleted object");
            return Ok(());
        }

        let dir = object.local_path(&self.root);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                tracing::info!(bucket, key, "deleted object tree");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io {
                message: format!("failed to delete {}: {}", dir.display(), e),
            }),
        }
    }

    async fn create_signed_url(
        &self,
        bucket: &str,
        key: &str,
        ttl: TimeDelta,
    ) -> StoreResult<String> {
        let object = ObjectKey::new(bucket, key)?;
        if ttl < TimeDelta::zero() {
            return Err(StoreError::Expired {
                bucket: bucket.to_string(),
                key: key.to_string(),
                ttl_secs: ttl.num_seconds(),
            });
        }
        let url = object.local_path(&self.root).display().to_string();
        tracing::info!(bucket, key, url = %url, "created signed url");
        Ok(url)
    }
}

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

use specforge_utils::atomic_write::write_file_atomic;
use specforge_utils::canonicalization::emit_jcs;
use specforge_utils::error::StoreError;

use crate::model::{ProjectDocument, slugify};
use crate::store::DocumentBackend;

/// Directory under the state dir holding one JSON document per project.
pub const PROJECTS_DIR: &str = "projects";

/// One JSON document per project under `{state_dir}/projects/{id}.json`.
///
/// Documents are written in canonical JSON through a temp file and rename,
/// so a crash never leaves a half-written project. Writes from one store are
/// serialized; cross-process exclusion is the lock manager's job.
#[derive(Debug)]
pub struct FileStore {
    root: Utf8PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(state_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: state_dir.into().join(PROJECTS_DIR),
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn projects_dir(&self) -> &Utf8Path {
        &self.root
    }

    /// Ids are slugs; anything else can't name a stored project.
    fn document_path(&self, project_id: &str) -> Option<Utf8PathBuf> {
        (!project_id.is_empty() && slugify(project_id) == project_id)
            .then(|| self.root.join(format!("{project_id}.json")))
    }

    async fn read(&self, path: &Utf8Path) -> Result<Option<ProjectDocument>, StoreError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::Io {
                    path: path.to_string(),
                    reason: e.to_string(),
                });
            }
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StoreError::Corrupted {
                path: path.to_string(),
                reason: e.to_string(),
            })
    }

    async fn write(&self, path: Utf8PathBuf, document: &ProjectDocument) -> Result<(), StoreError> {
        let content = emit_jcs(document).map_err(|e| StoreError::Io {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        let target = path.clone();
        tokio::task::spawn_blocking(move || write_file_atomic(&target, &content))
            .await
            .map_err(|e| StoreError::Io {
                path: path.to_string(),
                reason: e.to_string(),
            })?
            .map_err(|e| StoreError::Io {
                path: path.to_string(),
                reason: format!("{e:#}"),
            })?;
        debug!(path = %path, "Wrote project document");
        Ok(())
    }
}

#[async_trait]
impl DocumentBackend for FileStore {
    async fn load(&self, project_id: &str) -> Result<Option<ProjectDocument>, StoreError> {
        match self.document_path(project_id) {
            Some(path) => self.read(&path).await,
            None => Ok(None),
        }
    }

    async fn load_all(&self) -> Result<Vec<ProjectDocument>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::Io {
                    path: self.root.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let mut documents = Vec::new();
        loop {
            let entry = entries.next_entry().await.map_err(|e| StoreError::Io {
                path: self.root.to_string(),
                reason: e.to_string(),
            })?;
            let Some(entry) = entry else { break };
            if let Ok(path) = Utf8PathBuf::from_path_buf(entry.path())
                && path.extension() == Some("json")
                && let Some(document) = self.read(&path).await?
            {
                documents.push(document);
            }
        }
        Ok(documents)
    }

    async fn insert(&self, document: ProjectDocument) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let project = &document.project;
        let duplicate = || StoreError::DuplicateProject {
            slug: project.slug.clone(),
        };

        let path = self.document_path(&project.id).ok_or_else(duplicate)?;
        if tokio::fs::try_exists(&path).await.unwrap_or(false)
            || self
                .load_all()
                .await?
                .iter()
                .any(|d| d.project.slug == project.slug)
        {
            return Err(duplicate());
        }
        self.write(path, &document).await
    }

    async fn update<F, R>(&self, project_id: &str, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut ProjectDocument) -> R + Send,
        R: Send,
    {
        let not_found = || StoreError::ProjectNotFound {
            project_id: project_id.to_string(),
        };
        let _guard = self.write_lock.lock().await;
        let path = self.document_path(project_id).ok_or_else(not_found)?;
        let mut document = self.read(&path).await?.ok_or_else(not_found)?;
        let result = f(&mut document);
        self.write(path, &document).await?;
        Ok(result)
    }

    async fn remove(&self, project_id: &str) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let Some(path) = self.document_path(project_id) else {
            return Ok(false);
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::Io {
                path: path.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

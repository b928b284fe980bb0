use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use specforge_utils::error::StoreError;

use crate::model::ProjectDocument;
use crate::store::DocumentBackend;

/// In-process store. State lives as long as the value.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<String, ProjectDocument>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentBackend for MemoryStore {
    async fn load(&self, project_id: &str) -> Result<Option<ProjectDocument>, StoreError> {
        Ok(self.documents.read().await.get(project_id).cloned())
    }

    async fn load_all(&self) -> Result<Vec<ProjectDocument>, StoreError> {
        Ok(self.documents.read().await.values().cloned().collect())
    }

    async fn insert(&self, document: ProjectDocument) -> Result<(), StoreError> {
        let mut documents = self.documents.write().await;
        let project = &document.project;
        if documents.contains_key(&project.id)
            || documents.values().any(|d| d.project.slug == project.slug)
        {
            return Err(StoreError::DuplicateProject {
                slug: project.slug.clone(),
            });
        }
        documents.insert(project.id.clone(), document);
        Ok(())
    }

    async fn update<F, R>(&self, project_id: &str, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut ProjectDocument) -> R + Send,
        R: Send,
    {
        let mut documents = self.documents.write().await;
        let document = documents
            .get_mut(project_id)
            .ok_or_else(|| StoreError::ProjectNotFound {
                project_id: project_id.to_string(),
            })?;
        Ok(f(document))
    }

    async fn remove(&self, project_id: &str) -> Result<bool, StoreError> {
        Ok(self.documents.write().await.remove(project_id).is_some())
    }
}

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;
use uuid::Uuid;

/// A finished recording held in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub data: Bytes,
    pub mime_type: String,
}

impl Blob {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Revocable reference to a blob, resolvable while it stays registered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewHandle {
    pub id: Uuid,
    pub url: String,
}

#[derive(Clone, Default)]
pub struct PreviewRegistry {
    blobs: Arc<RwLock<HashMap<Uuid, Blob>>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, blob: Blob) -> PreviewHandle {
        let id = Uuid::new_v4();
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, blob);
        PreviewHandle {
            id,
            url: format!("blob:screenrec/{id}"),
        }
    }

    pub fn resolve(&self, handle: &PreviewHandle) -> Option<Blob> {
        self.blobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&handle.id)
            .cloned()
    }

    /// Returns whether the handle was still registered
    pub fn revoke(&self, handle: &PreviewHandle) -> bool {
        self.blobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle.id)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

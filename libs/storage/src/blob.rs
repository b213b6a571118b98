use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use chrono::Utc;
use opendal::{Operator, Writer};
use tracing::{debug, info, warn};

use crate::name::{stored_name, validate_name};
use crate::{Result, StorageError, StorageConfig};

/// Outcome of a completed write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub name: String,
    pub size: u64,
}

/// Names handed to writers that have not finished yet
type Reserved = Arc<Mutex<HashSet<String>>>;

/// Flat directory of immutable blobs addressed by generated name
#[derive(Clone)]
pub struct BlobStore {
    op: Operator,
    reserved: Reserved,
}

impl BlobStore {
    pub fn new(op: Operator) -> Self {
        Self {
            op,
            reserved: Arc::default(),
        }
    }

    pub async fn open(config: &StorageConfig) -> Result<Self> {
        Ok(Self::new(crate::init_operator(config).await?))
    }

    /// Reserve a fresh name derived from `suggested` and open a writer on it.
    ///
    /// The timestamp prefix is bumped until the name is neither stored nor
    /// held by another unfinished writer.
    pub async fn create(&self, suggested: Option<&str>) -> Result<BlobWriter> {
        let mut ts = Utc::now().timestamp_millis();
        let name = loop {
            let name = stored_name(ts, suggested);
            ts += 1;
            if !lock(&self.reserved).insert(name.clone()) {
                continue;
            }
            match self.exists(&name).await {
                Ok(false) => break name,
                Ok(true) => {
                    lock(&self.reserved).remove(&name);
                }
                Err(e) => {
                    lock(&self.reserved).remove(&name);
                    return Err(e);
                }
            }
        };

        debug!("Opening blob writer: {}", name);
        let writer = match self.op.writer(&name).await {
            Ok(writer) => writer,
            Err(e) => {
                lock(&self.reserved).remove(&name);
                return Err(StorageError::from_backend(&name, e));
            }
        };
        Ok(BlobWriter {
            op: self.op.clone(),
            reserved: self.reserved.clone(),
            writer: Some(writer),
            name,
            size: 0,
        })
    }

    /// Store a payload that is already fully in memory
    pub async fn put(&self, suggested: Option<&str>, data: Bytes) -> Result<StoredBlob> {
        let mut writer = self.create(suggested).await?;
        if let Err(e) = writer.write(data).await {
            writer.abort().await;
            return Err(e);
        }
        writer.finish().await
    }

    pub async fn exists(&self, name: &str) -> Result<bool> {
        match self.op.stat(name).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete(&self, name: &str) -> Result<()> {
        check_name(name)?;
        self.op.delete(name).await?;
        info!("Deleted blob: {}", name);
        Ok(())
    }
}

fn lock(reserved: &Reserved) -> std::sync::MutexGuard<'_, HashSet<String>> {
    reserved.lock().unwrap_or_else(PoisonError::into_inner)
}

fn check_name(name: &str) -> Result<()> {
    if validate_name(name) {
        Ok(())
    } else {
        Err(StorageError::InvalidName(name.to_string()))
    }
}

/// Incremental writer for a blob whose name is already reserved
pub struct BlobWriter {
    op: Operator,
    reserved: Reserved,
    writer: Option<Writer>,
    name: String,
    size: u64,
}

impl BlobWriter {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub async fn write(&mut self, chunk: Bytes) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(StorageError::InvalidName(self.name.clone()));
        };
        let len = chunk.len() as u64;
        writer.write(chunk).await?;
        self.size += len;
        Ok(())
    }

    pub async fn finish(mut self) -> Result<StoredBlob> {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.close().await {
                self.discard().await;
                return Err(e.into());
            }
        }
        info!("Stored blob {} ({} bytes)", self.name, self.size);
        Ok(StoredBlob {
            name: self.name.clone(),
            size: self.size,
        })
    }

    /// Drop whatever was written so far
    pub async fn abort(mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.abort().await {
                debug!("Abort of blob writer {} failed: {}", self.name, e);
            }
        }
        self.discard().await;
    }

    async fn discard(&self) {
        if let Err(e) = self.op.delete(&self.name).await {
            warn!("Failed to remove partial blob {}: {}", self.name, e);
        }
    }
}

impl Drop for BlobWriter {
    fn drop(&mut self) {
        lock(&self.reserved).remove(&self.name);
    }
}

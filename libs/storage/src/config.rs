use serde::{Deserialize, Serialize};

/// Where uploaded blobs live on the local filesystem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for stored blobs
    #[serde(default = "default_fs_root")]
    pub root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_fs_root(),
        }
    }
}

fn default_fs_root() -> String {
    "./uploads".to_string()
}

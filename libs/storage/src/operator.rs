use crate::config::StorageConfig;
use crate::Result;
use opendal::services;
use opendal::Operator;

/// Create the filesystem operator backing the blob store
pub fn create_operator(config: &StorageConfig) -> Result<Operator> {
    tracing::info!("Configuring filesystem storage with root: {}", config.root);
    let builder = services::Fs::default().root(&config.root);
    let op = Operator::new(builder)?.finish();
    tracing::debug!("Filesystem storage operator created successfully");
    Ok(op)
}

/// Create the operator and make sure the root is usable
pub async fn init_operator(config: &StorageConfig) -> Result<Operator> {
    std::fs::create_dir_all(&config.root)?;
    let operator = create_operator(config)?;

    match operator.check().await {
        Ok(_) => tracing::info!("Storage backend initialized and verified: {:?}", config),
        Err(e) => tracing::warn!(
            "Storage backend initialized but connection test failed: {}, continuing anyway",
            e
        ),
    }

    Ok(operator)
}

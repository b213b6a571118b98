use anyhow::Result;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, QueryOrder, Set};
use tracing::debug;

use crate::entity::recordings::{self, Entity as Recordings};

/// Insert-only record store; rows are never updated or deleted
#[derive(Clone)]
pub struct RecordingsService;

impl RecordingsService {
    pub async fn insert(
        db: &DatabaseConnection,
        filename: &str,
        size: i64,
    ) -> Result<recordings::Model> {
        let am = recordings::ActiveModel {
            filename: Set(filename.to_string()),
            size: Set(size),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        let model = am.insert(db).await?;
        debug!("Inserted recording {} -> {}", model.id, model.filename);
        Ok(model)
    }

    /// Newest first; `id` breaks ties between rows created in the same instant
    pub async fn list_all(db: &DatabaseConnection) -> Result<Vec<recordings::Model>> {
        Ok(Recordings::find()
            .order_by_desc(recordings::Column::CreatedAt)
            .order_by_desc(recordings::Column::Id)
            .all(db)
            .await?)
    }

    pub async fn get_by_id(db: &DatabaseConnection, id: i64) -> Result<Option<recordings::Model>> {
        Ok(Recordings::find_by_id(id).one(db).await?)
    }
}

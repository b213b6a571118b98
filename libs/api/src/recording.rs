use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored recording as returned by the list, get and upload endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    pub id: i64,
    /// Server generated name of the blob under `/uploads`
    pub filename: String,
    /// Byte length of the stored blob
    pub size: i64,
    pub created_at: DateTime<Utc>,
    pub url: String,
}

impl Recording {
    pub fn new(id: i64, filename: String, size: i64, created_at: DateTime<Utc>) -> Self {
        let url = crate::path::upload(&filename);
        Self {
            id,
            filename,
            size,
            created_at,
            url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_json_shape() {
        let created_at = DateTime::parse_from_rfc3339("2024-01-15T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let r = Recording::new(3, "1705320000000-rec.webm".to_string(), 1536, created_at);

        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["id"], 3);
        assert_eq!(v["filename"], "1705320000000-rec.webm");
        assert_eq!(v["size"], 1536);
        assert_eq!(v["url"], "/uploads/1705320000000-rec.webm");
        assert!(v["createdAt"].as_str().unwrap().starts_with("2024-01-15T12:00:00"));
    }
}

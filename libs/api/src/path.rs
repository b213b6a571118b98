pub const RECORDINGS: &str = "/api/recordings";
pub const UPLOADS: &str = "/uploads";

/// Multipart field carrying the recording payload
pub const UPLOAD_FIELD: &str = "file";

pub fn recording(id: i64) -> String {
    format!("/api/recordings/{}", id)
}

/// Derived retrieval URL of a stored blob, never persisted
pub fn upload(filename: &str) -> String {
    format!("/uploads/{}", filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        assert_eq!(recording(7), "/api/recordings/7");
        assert_eq!(upload("1700-a.webm"), "/uploads/1700-a.webm");
        assert!(upload("x").starts_with(UPLOADS));
        assert!(recording(1).starts_with(RECORDINGS));
    }
}

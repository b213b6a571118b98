use crate::error::AppError;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

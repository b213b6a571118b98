pub mod database;
pub mod recordings;

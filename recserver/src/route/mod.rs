pub mod blob;
pub mod recording;

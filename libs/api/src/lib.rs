pub mod path;
pub mod recording;
pub mod response;

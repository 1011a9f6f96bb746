pub mod datasets;
pub mod format;

pub use format::{deserialize, Area, Resource, Team};

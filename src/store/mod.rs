//! Durable document stores

pub mod json_dir;

pub use json_dir::JsonDirStore;

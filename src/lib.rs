pub mod access;
pub mod cache;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod model;
pub mod output;
pub mod scan;

pub use access::{AccessBroker, AccessPrompt};
pub use cache::ResultCache;
pub use config::Config;
pub use model::{Category, CategoryItem};
pub use scan::{ScanOptions, ScanOrchestrator, SizeProbe};

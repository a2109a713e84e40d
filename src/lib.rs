pub mod config;
pub mod extractor;
pub mod fetcher;
pub mod monitor;
pub mod notifier;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;

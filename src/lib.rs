pub mod auth;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod forum;
pub mod http;
pub mod marketplace;
pub mod messages;
pub mod models;
pub mod notifications;
pub mod session;
pub mod storage; // durable token / snapshot storage

// Re-export commonly used items for tests / external users
pub use client::ForumClient;
pub use config::ClientConfig;
pub use envelope::{normalize_item, normalize_list, unwrap_list, Resource};
pub use error::{ApiError, ApiResult, Recovery};
pub use session::{Session, SessionState, SubscriptionId};

//! Omnicast - multi-platform social publishing for tenant workspaces
//!
//! This library is the core of a tenant-scoped publishing and
//! credential-management engine: a uniform abstraction over six social
//! platform APIs exposing connect, test, publish, and fetch-engagement,
//! plus the OAuth connection flow and the analytics reconciliation job.

pub mod audit;
pub mod config;
pub mod credentials;
pub mod error;
pub mod kv;
pub mod logging;
pub mod oauth;
pub mod platforms;
pub mod service;
pub mod store;
pub mod sync;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use credentials::Credentials;
pub use error::{OmnicastError, PlatformError, Result};
pub use kv::{KvStore, SqliteKv};
pub use types::{
    EngagementMetrics, PublishRecord, PublishStatus, SocialConnection, SocialPlatform,
};

//! Service layer tying stores and adapters together
//!
//! One service per concern, each over `Arc`-shared stores and the adapter
//! factory, so the HTTP surface stays a thin dispatch layer.

mod connections;
mod publishing;

pub use connections::{ConnectionService, ConnectionUpsert};
pub use publishing::{PublishRequest, PublishService};

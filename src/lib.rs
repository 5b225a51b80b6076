//src/lib.rs

// Declaração dos nossos módulos
pub mod common;
pub mod config;
pub mod models;
pub mod remote;
pub mod router;
pub mod storage;
pub mod stores;

// Re-exportações principais
pub use crate::common::error::ApiError;
pub use crate::config::{AppState, Config};
pub use crate::models::auth::{Role, User};
pub use crate::models::task::{Task, TaskStatus, TaskWithDetails};
pub use crate::remote::{ApiClient, Transport};
pub use crate::router::guard::{Guard, Verdict};
pub use crate::router::RouteTable;
pub use crate::stores::auth::AuthStore;
pub use crate::stores::tasks::TaskStore;

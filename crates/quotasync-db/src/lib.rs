//! Quotasync DB - Database abstractions
//!
//! SQLx-based persistence for users, plans, orders and subscriptions.
//!
//! # Example
//!
//! ```rust,ignore
//! use quotasync_db::{create_pool, run_migrations, Repositories};
//!
//! let pool = create_pool("postgres://localhost/quotasync").await?;
//! run_migrations(&pool).await?;
//! let repos = Repositories::new(pool);
//!
//! let active = repos.subscriptions.list_active().await?;
//! ```

pub mod error;
pub mod models;
pub mod pg;
pub mod pool;
pub mod repo;

pub use error::{DbError, DbResult};
pub use models::*;
pub use pg::Repositories;
pub use pool::{create_pool, run_migrations, DbPool};
pub use repo::*;

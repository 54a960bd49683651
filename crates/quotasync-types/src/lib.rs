//! Quotasync Types - Shared domain types
//!
//! This crate contains domain types used across quotasync crates:
//! - Users and their binding to an external gateway account
//! - Purchasable plans and their pricing
//! - Orders and subscriptions with the plan snapshot taken at purchase

pub mod error;
pub mod ids;
pub mod order;
pub mod plan;
pub mod subscription;
pub mod user;

pub use error::*;
pub use ids::*;
pub use order::*;
pub use plan::*;
pub use subscription::*;
pub use user::*;

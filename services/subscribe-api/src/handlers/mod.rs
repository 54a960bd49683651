//! REST API handlers

pub mod admin;
pub mod health;
pub mod payment;
pub mod users;

pub use admin::*;
pub use health::*;
pub use payment::*;
pub use users::*;

//! Quotasync Gateway - External quota service client
//!
//! Talks to the AI-gateway control API that holds the authoritative quota
//! balance for each external account.
//!
//! # Example
//!
//! ```rust,ignore
//! use quotasync_gateway::{GatewayConfig, NewApiClient, QuotaGateway};
//!
//! let config = GatewayConfig::new("https://gateway.example.com", "root", "secret")
//!     .with_admin_id("1");
//! let client = NewApiClient::new(config)?;
//!
//! let account = client.fetch_account(ExternalAccountId(42)).await?;
//! client.update_account(account.id, 1500, "vip").await?;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
mod session;

pub use client::NewApiClient;
pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use gateway::QuotaGateway;
pub use models::{ExternalAccount, UsageEvent};

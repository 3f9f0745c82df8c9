//! Adapters - Implementations of port interfaces.
//!
//! - `auth` - Access token validation
//! - `http` - Axum routers, DTOs and auth middleware
//! - `memory` - In-memory stores for tests and local runs
//! - `postgres` - sqlx-backed stores
//! - `stripe` - Payment processor and identity provider

pub mod auth;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod stripe;

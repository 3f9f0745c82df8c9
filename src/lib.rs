//! Membership Engine - membership lifecycle and payment reconciliation
//!
//! Members buy a plan through a purchase intent. Payment arrives from a
//! hosted checkout (or a gift card), identity is verified with a hosted
//! provider, and an activation guard turns the intent active only once
//! every precondition holds. Processor webhooks and client polling both
//! drive the same idempotent steps.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

//! Third-Party Ingestion Gateway
//!
//! Authenticated ingestion endpoint for the missing-persons registry.
//! External systems submit create/update/read operations over a single
//! POST route; every request passes through a fixed pipeline of gates
//! before touching the data store.
//!
//! # Architecture Overview
//!
//! ```text
//!  Inbound request
//!      │
//!      ▼
//!  ┌──────────┐   ┌───────────┐   ┌────────────┐   ┌────────────┐
//!  │ feature  │──▶│ signature │──▶│ rate limit │──▶│  envelope  │
//!  │   flag   │   │  (HMAC)   │   │  (bucket)  │   │   schema   │
//!  └──────────┘   └───────────┘   └────────────┘   └─────┬──────┘
//!                                                        │
//!      ┌─────────────────────────────────────────────────┘
//!      ▼
//!  ┌─────────────┐   ┌────────────┐   ┌────────────┐   ┌───────┐
//!  │ idempotency │──▶│ allowlist  │──▶│ data store │──▶│ audit │
//!  │   lookup    │   │  + typed   │   │   (trait)  │   │ event │
//!  └─────────────┘   │   patch    │   └────────────┘   └───────┘
//!                    └────────────┘
//! ```
//!
//! Each gate is a hard stop: once a check fails no later check executes
//! and no side effect occurs beyond the error log.

// Core pipeline
pub mod http;
pub mod security;
pub mod validate;

// Shared caches
pub mod idempotency;

// Collaborator interfaces
pub mod audit;
pub mod store;

// Cross-cutting concerns
pub mod config;
pub mod observability;

pub use config::schema::GatewayConfig;
pub use http::GatewayServer;

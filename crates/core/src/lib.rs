//! Bookshelf Core - Shared types library.
//!
//! This crate provides common types used across all Bookshelf components:
//! - `server` - The catalog web service (library + binary)
//! - `cli` - Command-line tools for migrations, accounts and seeding
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP. Anything that validates user input into a domain value lives
//! here so the server, the CLI and the tests agree on the rules.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, ratings, verification status and
//!   field-level validation errors

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;

//! Business logic services.
//!
//! # Services
//!
//! - `catalog` - Book listing, lookup and mutation for the acting account
//! - `accounts` - Registration, login, profile changes and administration
//!
//! Services borrow a [`Store`](crate::db::Store) and hold no state of their
//! own, so handlers build one per request.

pub mod accounts;
pub mod catalog;

pub use accounts::{AccountError, AccountService, ProfileUpdate, Registration};
pub use catalog::{CatalogError, CatalogService};

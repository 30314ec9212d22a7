//! Domain models for the catalog.

pub mod account;
pub mod book;
pub mod session;

pub use account::{Account, NewAccount, Owner};
pub use book::{Book, BookChanges, BookFields, BookInput, BookRecord, NewBook};
pub use session::{CurrentAccount, keys as session_keys};

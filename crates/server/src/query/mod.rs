//! List querying: filters and pagination.

pub mod filter;
pub mod pagination;

pub use filter::{
    AccountFilter, AccountFilterParams, AccountPredicate, BookFilter, BookFilterParams,
    BookPredicate, Filter, Predicate,
};
pub use pagination::{Page, PageLink, PageLinks, PageMeta, PageRequest};

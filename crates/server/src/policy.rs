//! Book ownership rules.
//!
//! Pure decisions over account identifiers: no I/O and no session access.
//! Callers pass the acting account explicitly.

use bookshelf_core::AccountId;

use crate::models::Book;

/// Something an account may try to do with books.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookAction {
    ViewAny,
    View,
    Create,
    Update,
    Delete,
    Restore,
    ForceDelete,
}

impl BookAction {
    /// Whether the action needs the principal to own the target.
    #[must_use]
    pub const fn requires_ownership(self) -> bool {
        matches!(
            self,
            Self::Update | Self::Delete | Self::Restore | Self::ForceDelete
        )
    }
}

/// Decide whether `principal` may perform `action` on a book owned by `owner`.
///
/// Anonymous callers are always refused. Listing, viewing and creating only
/// need a signed-in account; mutating actions also need `owner` to be that
/// account, and are refused when no target is given.
#[must_use]
pub fn authorize(principal: Option<AccountId>, action: BookAction, owner: Option<AccountId>) -> bool {
    let Some(principal) = principal else {
        return false;
    };

    if action.requires_ownership() {
        owner == Some(principal)
    } else {
        true
    }
}

/// Book-shaped convenience wrappers around [`authorize`].
pub struct BookPolicy;

impl BookPolicy {
    #[must_use]
    pub fn view_any(principal: Option<AccountId>) -> bool {
        authorize(principal, BookAction::ViewAny, None)
    }

    #[must_use]
    pub fn view(principal: Option<AccountId>, book: &Book) -> bool {
        authorize(principal, BookAction::View, Some(book.owner_id))
    }

    #[must_use]
    pub fn create(principal: Option<AccountId>) -> bool {
        authorize(principal, BookAction::Create, None)
    }

    #[must_use]
    pub fn update(principal: Option<AccountId>, book: &Book) -> bool {
        authorize(principal, BookAction::Update, Some(book.owner_id))
    }

    #[must_use]
    pub fn delete(principal: Option<AccountId>, book: &Book) -> bool {
        authorize(principal, BookAction::Delete, Some(book.owner_id))
    }
}

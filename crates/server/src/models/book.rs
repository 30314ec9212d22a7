//! Book domain model and input validation.

use chrono::{DateTime, Utc};

use bookshelf_core::{AccountId, BookId, Rating, ValidationErrors};

use super::account::Owner;

/// Maximum characters in a title or author name.
pub const MAX_NAME_LENGTH: usize = 255;

/// Maximum characters in a description.
pub const MAX_DESCRIPTION_LENGTH: usize = 2000;

/// A book in someone's catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub id: BookId,
    /// Fixed at creation.
    pub owner_id: AccountId,
    pub title: String,
    pub author: String,
    pub description: String,
    pub rating: Rating,
    /// Path relative to the thumbnail storage root.
    pub thumbnail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A book together with the owner details shown next to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookRecord {
    pub book: Book,
    pub owner: Owner,
}

/// Validated book fields shared by create and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookFields {
    pub title: String,
    pub author: String,
    pub description: String,
    pub rating: Rating,
}

/// Data for inserting a new book.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub owner_id: AccountId,
    pub fields: BookFields,
    pub thumbnail: Option<String>,
}

/// Replacement values for an existing book.
///
/// `thumbnail: None` keeps the stored reference untouched.
#[derive(Debug, Clone)]
pub struct BookChanges {
    pub fields: BookFields,
    pub thumbnail: Option<String>,
}

/// Raw book fields as submitted by a client.
///
/// Values are trimmed and blank strings count as missing.
#[derive(Debug, Clone, Default)]
pub struct BookInput {
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub rating: Option<String>,
}

impl BookInput {
    /// Check every field and collect all failures.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationErrors`] keyed by field name when any rule fails.
    pub fn validate(&self) -> Result<BookFields, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let title = required_text(&mut errors, "title", self.title.as_deref(), MAX_NAME_LENGTH);
        let author = required_text(
            &mut errors,
            "author",
            self.author.as_deref(),
            MAX_NAME_LENGTH,
        );
        let description = required_text(
            &mut errors,
            "description",
            self.description.as_deref(),
            MAX_DESCRIPTION_LENGTH,
        );
        let rating = required_rating(&mut errors, self.rating.as_deref());

        match (title, author, description, rating) {
            (Some(title), Some(author), Some(description), Some(rating)) if errors.is_empty() => {
                Ok(BookFields {
                    title,
                    author,
                    description,
                    rating,
                })
            }
            _ => Err(errors),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn required_text(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&str>,
    max: usize,
) -> Option<String> {
    let Some(value) = non_blank(value) else {
        errors.add(field, format!("The {field} field is required."));
        return None;
    };

    if value.chars().count() > max {
        errors.add(
            field,
            format!("The {field} field must not be greater than {max} characters."),
        );
        return None;
    }

    Some(value.to_owned())
}

fn required_rating(errors: &mut ValidationErrors, value: Option<&str>) -> Option<Rating> {
    let Some(value) = non_blank(value) else {
        errors.add("rating", "The rating field is required.");
        return None;
    };

    let Ok(number) = value.parse::<i64>() else {
        errors.add("rating", "The rating field must be an integer.");
        return None;
    };

    Rating::new(number)
        .map_err(|_| {
            errors.add(
                "rating",
                format!(
                    "The rating field must be between {} and {}.",
                    Rating::MIN,
                    Rating::MAX
                ),
            );
        })
        .ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input(title: &str, author: &str, description: &str, rating: &str) -> BookInput {
        BookInput {
            title: Some(title.to_owned()),
            author: Some(author.to_owned()),
            description: Some(description.to_owned()),
            rating: Some(rating.to_owned()),
        }
    }

    #[test]
    fn test_valid_input_is_trimmed() {
        let fields = input("  Dune ", "Frank Herbert", "Spice.", " 5 ")
            .validate()
            .unwrap();
        assert_eq!(fields.title, "Dune");
        assert_eq!(fields.rating.get(), 5);
    }

    #[test]
    fn test_missing_fields_are_all_reported() {
        let errors = BookInput::default().validate().unwrap_err();
        for field in ["title", "author", "description", "rating"] {
            assert!(errors.has(field), "expected error for {field}");
        }
    }

    #[test]
    fn test_blank_counts_as_missing() {
        let errors = input("   ", "A", "B", "3").validate().unwrap_err();
        assert_eq!(errors.messages("title"), ["The title field is required."]);
    }

    #[test]
    fn test_length_limits_count_characters() {
        assert!(input(&"é".repeat(255), "A", "B", "3").validate().is_ok());

        let errors = input(&"x".repeat(256), "A", &"d".repeat(2001), "3")
            .validate()
            .unwrap_err();
        assert!(errors.has("title"));
        assert!(errors.has("description"));
        assert!(!errors.has("author"));
    }

    #[test]
    fn test_rating_rules() {
        let errors = input("T", "A", "D", "0").validate().unwrap_err();
        assert_eq!(
            errors.messages("rating"),
            ["The rating field must be between 1 and 5."]
        );

        let errors = input("T", "A", "D", "four").validate().unwrap_err();
        assert_eq!(errors.messages("rating"), ["The rating field must be an integer."]);
    }
}

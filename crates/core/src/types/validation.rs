//! Field-level validation errors.

use std::collections::BTreeMap;

use serde::Serialize;

/// Validation failures keyed by input field name.
///
/// Serializes as `{"field": ["message", ...]}`, the shape the HTTP layer
/// returns under `errors` in a 422 response. Fields are kept sorted so the
/// output is stable.
///
/// ```
/// use bookshelf_core::ValidationErrors;
///
/// let mut errors = ValidationErrors::new();
/// errors.add("title", "The title field is required.");
/// assert!(errors.has("title"));
/// assert!(errors.into_result().is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a single failing field.
    #[must_use]
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// Record a message against a field.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Fold another set of errors into this one.
    pub fn merge(&mut self, other: Self) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether any message was recorded for `field`.
    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Messages recorded for `field`, empty when it passed.
    #[must_use]
    pub fn messages(&self, field: &str) -> &[String] {
        self.0.get(field).map_or(&[], Vec::as_slice)
    }

    /// Iterate over `(field, messages)` in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// `Ok(())` when nothing was recorded, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns `self` when at least one field failed.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
    }

    #[test]
    fn test_messages_accumulate_per_field() {
        let mut errors = ValidationErrors::new();
        errors.add("title", "required");
        errors.add("title", "too long");
        errors.add("rating", "out of range");

        assert_eq!(errors.messages("title"), ["required", "too long"]);
        assert_eq!(errors.messages("author"), [] as [String; 0]);
        assert_eq!(
            errors.to_string(),
            "rating: out of range; title: required; title: too long"
        );
    }

    #[test]
    fn test_merge() {
        let mut errors = ValidationErrors::single("email", "taken");
        errors.merge(ValidationErrors::single("email", "invalid"));
        assert_eq!(errors.messages("email").len(), 2);
    }

    #[test]
    fn test_serializes_as_field_map() {
        let errors = ValidationErrors::single("rating", "The rating must be between 1 and 5.");
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"rating": ["The rating must be between 1 and 5."]})
        );
    }
}

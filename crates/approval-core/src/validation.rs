//! Identifier validation and translation of store errors into messages
//! suitable for a transient notification.

use lazy_static::lazy_static;
use regex::Regex;

use crate::CoreError;

lazy_static! {
    static ref UUID_PATTERN: Regex = Regex::new(
        r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$"
    )
    .expect("UUID pattern is a valid regex");
}

/// Check that a string is a canonical hyphenated UUID
pub fn is_valid_uuid(value: &str) -> bool {
    UUID_PATTERN.is_match(value)
}

/// Translate an error reported by the store into a user-facing message.
///
/// Known codes are PostgreSQL SQLSTATEs and the codes used by the hosted
/// REST layer in front of it. Unknown codes fall through to the raw message.
pub fn translate_remote_error(code: Option<&str>, message: &str) -> String {
    match code {
        Some("23505") => "A record with these details already exists.".to_string(),
        Some("23503") => "This change references a record that no longer exists.".to_string(),
        Some("23502") => "A required field is missing.".to_string(),
        Some("22P02") => "One of the identifiers is not in a valid format.".to_string(),
        Some("42501") => "You do not have permission to perform this action.".to_string(),
        Some("PGRST116") => "The requested record was not found.".to_string(),
        Some("PGRST301") => "Your session has expired. Please sign in again.".to_string(),
        _ => {
            let lowered = message.to_lowercase();
            if lowered.contains("failed to fetch")
                || lowered.contains("network")
                || lowered.contains("connection refused")
                || lowered.contains("timed out")
            {
                "Could not reach the server. Check your connection and try again.".to_string()
            } else if message.trim().is_empty() {
                "An unexpected error occurred.".to_string()
            } else {
                message.to_string()
            }
        }
    }
}

/// Message shown to the user for any error surfaced by the step builder
pub fn user_message(error: &CoreError) -> String {
    match error {
        CoreError::ValidationError(msg) => msg.clone(),
        CoreError::Remote { code, message } => translate_remote_error(code.as_deref(), message),
        CoreError::PartialWrite { .. } => {
            "Saving the steps failed part-way. The steps shown are not stored yet; save again to restore them."
                .to_string()
        }
        CoreError::ResolutionError(msg) => format!(
            "Could not set up the workflow ({}). Changes are kept locally until it can be saved.",
            msg
        ),
        CoreError::SessionBusy => "Please wait for the current save to finish.".to_string(),
        CoreError::IndexOutOfRange { .. } => "That step no longer exists.".to_string(),
        CoreError::NotFound(what) => format!("{} was not found.", what),
        other => other.to_string(),
    }
}

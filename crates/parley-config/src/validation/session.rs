//! Validation for the backend and session sections.

use crate::schema::ParleyConfig;

use super::helpers::validate_range;

pub(crate) fn validate_backend(errors: &mut Vec<String>, config: &ParleyConfig) {
    if config.backend.command.trim().is_empty() {
        errors.push("backend.command must not be empty".into());
    }
    if let Some(ref template) = config.backend.prompt_template {
        if !template.contains("{instruction}") {
            errors.push("backend.prompt_template must contain {instruction}".into());
        }
    }
}

pub(crate) fn validate_session(errors: &mut Vec<String>, config: &ParleyConfig) {
    validate_range(
        errors,
        "session.intent_capacity",
        config.session.intent_capacity,
        1,
        1024,
    );
    validate_range(
        errors,
        "session.event_capacity",
        config.session.event_capacity,
        1,
        4096,
    );
}

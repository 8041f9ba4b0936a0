use crate::models::bug::{BugPayload, BugStatus, Priority, Severity};
use crate::models::validation::{ValidationError, ValidationResult};

pub const TITLE_MIN: usize = 5;
pub const TITLE_MAX: usize = 100;
pub const DESCRIPTION_MIN: usize = 10;
pub const DESCRIPTION_MAX: usize = 1000;
pub const MAX_TAGS: usize = 5;
pub const TAG_MIN: usize = 2;

/// Check a candidate bug report against the field rules.
///
/// Every failing rule is collected, at most one error per field. Tags are
/// checked separately by [`validate_tags`].
pub fn validate_bug(payload: &BugPayload) -> ValidationResult {
    let mut errors = Vec::new();

    check_length(&mut errors, "title", "Title", payload.title.as_deref(), TITLE_MIN, TITLE_MAX);
    check_length(
        &mut errors,
        "description",
        "Description",
        payload.description.as_deref(),
        DESCRIPTION_MIN,
        DESCRIPTION_MAX,
    );

    match present(payload.severity.as_deref()) {
        None => errors.push(ValidationError::new("severity", "Severity is required")),
        Some(value) if value.parse::<Severity>().is_err() => {
            errors.push(ValidationError::new("severity", "Invalid severity value"))
        }
        Some(_) => {}
    }

    match present(payload.priority.as_deref()) {
        None => errors.push(ValidationError::new("priority", "Priority is required")),
        Some(value) if value.parse::<Priority>().is_err() => {
            errors.push(ValidationError::new("priority", "Invalid priority value"))
        }
        Some(_) => {}
    }

    // Status is optional on the payload; creation forces `open`.
    if let Some(status) = payload.status.as_deref() {
        if status.trim().parse::<BugStatus>().is_err() {
            errors.push(ValidationError::new("status", "Invalid status value"));
        }
    }

    if present(payload.reported_by.as_deref()).is_none() {
        errors.push(ValidationError::new("reportedBy", "Reporter is required"));
    }

    if let Some(assignee) = present(payload.assigned_to.as_deref()) {
        if !is_email_shaped(assignee) {
            errors.push(ValidationError::new(
                "assignedTo",
                "Assigned to must be a valid email address",
            ));
        }
    }

    ValidationResult::from_errors(errors)
}

/// Check a tag list on its own. Both the count rule and the per-tag length
/// rule are reported when both fail.
pub fn validate_tags(tags: &[String]) -> ValidationResult {
    let mut errors = Vec::new();

    if tags.len() > MAX_TAGS {
        errors.push(ValidationError::new(
            "tags",
            format!("Maximum {MAX_TAGS} tags allowed"),
        ));
    }

    if tags.iter().any(|tag| tag.trim().chars().count() < TAG_MIN) {
        errors.push(ValidationError::new(
            "tags",
            format!("Each tag must be at least {TAG_MIN} characters"),
        ));
    }

    ValidationResult::from_errors(errors)
}

/// Full check used before any write: wrong-typed fields, field rules and
/// tag rules. A field with a type error gets no further rule errors.
pub fn validate_submission(payload: &BugPayload) -> ValidationResult {
    let checked = validate_bug(payload).and(validate_tags(&payload.tags));
    let mut errors = payload.malformed.clone();
    errors.extend(
        checked
            .errors
            .into_iter()
            .filter(|e| !payload.malformed.iter().any(|m| m.field == e.field)),
    );
    ValidationResult::from_errors(errors)
}

/// Render errors as `field: message` joined by `", "`.
pub fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Minimal `local@domain.tld` shape: no whitespace, a single `@`, and a
/// dotted domain with no empty labels.
pub fn is_email_shaped(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    domain.contains('.') && domain.split('.').all(|label| !label.is_empty())
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn check_length(
    errors: &mut Vec<ValidationError>,
    field: &str,
    label: &str,
    value: Option<&str>,
    min: usize,
    max: usize,
) {
    let Some(value) = present(value) else {
        errors.push(ValidationError::new(field, format!("{label} is required")));
        return;
    };

    let len = value.chars().count();
    if len < min {
        errors.push(ValidationError::new(
            field,
            format!("{label} must be at least {min} characters"),
        ));
    } else if len > max {
        errors.push(ValidationError::new(
            field,
            format!("{label} must be at most {max} characters"),
        ));
    }
}

use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ValidationError {}

pub(crate) fn bounded_trimmed(
    input: &str,
    what: &str,
    min: usize,
    max: usize,
) -> Result<String, ValidationError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(ValidationError(format!("{what} is required")));
    }
    let chars = s.chars().count();
    if chars < min || chars > max {
        return Err(ValidationError(format!(
            "{what} must be between {min} and {max} characters long"
        )));
    }
    Ok(s.to_string())
}

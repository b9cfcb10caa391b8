use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ValidationError;

pub fn is_valid_name(
    field: &'static str,
    name: &str,
) -> Result<(), ValidationError> {
    match name.trim().is_empty() {
        true => Err(ValidationError::invalid(field, "must not be blank")),
        false if name.chars().count() > 100 => Err(ValidationError::invalid(
            field,
            "must be at most 100 characters",
        )),
        false => Ok(()),
    }
}

/// Accepts CSS colour keywords (`navy`, `darkorange`) and `#rgb`/`#rrggbb`.
pub fn is_valid_color(color: &str) -> Result<(), ValidationError> {
    static RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^(?:#[0-9a-fA-F]{3}|#[0-9a-fA-F]{6}|[a-zA-Z]{3,20})$")
            .unwrap()
    });
    match RE.is_match(color) {
        true => Ok(()),
        false => Err(ValidationError::invalid("color", "not a colour")),
    }
}

#[cfg(test)]
#[test]
fn test_color() {
    assert!(is_valid_color("navy").is_ok());
    assert!(is_valid_color("#1a2B3c").is_ok());
    assert!(is_valid_color("#fff").is_ok());
    assert!(is_valid_color("#ffff").is_err());
    assert!(is_valid_color("rgb(0,0,0)").is_err());
}

#[cfg(test)]
#[test]
fn test_name() {
    assert!(is_valid_name("name", "Room A").is_ok());
    assert!(is_valid_name("name", "   ").is_err());
}

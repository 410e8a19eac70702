//! Normalization of IBGE municipality codes.
//!
//! Every dataset in the pipeline is joined on the 7-digit IBGE municipality
//! code (2-digit state + 5-digit municipality). Upstream systems deliver it
//! as an integer, a float-encoded integer or a string, sometimes with the
//! leading zero dropped and sometimes with separator characters mixed in.

use serde_json::Value;

use crate::schema::value_as_string;

/// Normalize a digit string to the canonical 7-digit IBGE code.
///
/// Non-digit characters are stripped first, a 6-digit result is left-padded
/// with one zero, a 7-digit result is accepted as-is. Anything else yields
/// `None`; a malformed code is a normal per-row condition, not an error.
#[must_use]
pub fn normalize(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    match digits.len() {
        7 => Some(digits),
        6 => Some(format!("0{digits}")),
        _ => None,
    }
}

/// Normalize a loose JSON value (integer, float-encoded integer or string)
/// to the canonical 7-digit IBGE code
#[must_use]
pub fn normalize_value(raw: &Value) -> Option<String> {
    value_as_string(raw).as_deref().and_then(normalize)
}

/// Whether a string already is a canonical 7-digit code
#[must_use]
pub fn is_valid(code: &str) -> bool {
    code.len() == 7 && code.chars().all(|c| c.is_ascii_digit())
}

//! Destination number normalization
//!
//! Every number handed to the fabric must be E.164. The rules are the ones
//! the dialer has always applied, with the country-code default made an
//! explicit knob instead of a silent guess:
//!
//! 1. A `+` prefix is accepted as-is (digits validated).
//! 2. A number starting `91` with 12+ digits is treated as already carrying
//!    the Indian country code.
//! 3. Exactly 10 digits are assumed NANP and prefixed `+1`.
//! 4. Otherwise the configured default country code applies; with none
//!    configured the number is rejected.

use crate::error::{EngineError, Result};

/// Normalize `raw` to E.164, applying `default_country_code` (digits only,
/// e.g. `"44"`) when the heuristics don't decide.
pub fn normalize_e164(raw: &str, default_country_code: Option<&str>) -> Result<String> {
    let trimmed: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect();

    if trimmed.is_empty() {
        return Err(EngineError::validation("phone number is empty"));
    }

    if let Some(rest) = trimmed.strip_prefix('+') {
        if rest.len() < 7 || rest.len() > 15 || !rest.chars().all(|c| c.is_ascii_digit()) {
            return Err(EngineError::validation(format!("invalid E.164 number: {raw}")));
        }
        return Ok(trimmed);
    }

    if !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(EngineError::validation(format!("phone number contains non-digits: {raw}")));
    }

    if trimmed.starts_with("91") && trimmed.len() >= 12 {
        return Ok(format!("+{trimmed}"));
    }

    if trimmed.len() == 10 {
        return Ok(format!("+1{trimmed}"));
    }

    match default_country_code {
        Some(cc) if cc.chars().all(|c| c.is_ascii_digit()) && !cc.is_empty() => {
            let candidate = format!("+{cc}{trimmed}");
            if candidate.len() > 16 {
                return Err(EngineError::validation(format!("number too long: {raw}")));
            }
            Ok(candidate)
        }
        Some(cc) => {
            Err(EngineError::validation(format!("invalid default country code: {cc}")))
        }
        None => Err(EngineError::validation(format!(
            "ambiguous phone number {raw} and no default country code configured"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plus_prefixed_passes_through() {
        assert_eq!(normalize_e164("+15550001111", None).unwrap(), "+15550001111");
        assert_eq!(normalize_e164("+44 20 7946 0958", None).unwrap(), "+442079460958");
    }

    #[test]
    fn indian_long_numbers_gain_plus() {
        assert_eq!(normalize_e164("919876543210", None).unwrap(), "+919876543210");
    }

    #[test]
    fn ten_digits_assume_nanp() {
        assert_eq!(normalize_e164("5550001111", None).unwrap(), "+15550001111");
        assert_eq!(normalize_e164("(555) 000-1111", None).unwrap(), "+15550001111");
    }

    #[test]
    fn ambiguous_without_default_fails_closed() {
        assert!(normalize_e164("12345678", None).is_err());
    }

    #[test]
    fn default_country_code_applies() {
        // 10 digits hits the NANP rule before the default applies
        assert_eq!(normalize_e164("2079460958", Some("44")).unwrap(), "+12079460958");
        assert_eq!(normalize_e164("20794609581", Some("44")).unwrap(), "+4420794609581");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(normalize_e164("", None).is_err());
        assert!(normalize_e164("call-me", None).is_err());
        assert!(normalize_e164("+12ab", None).is_err());
        assert!(normalize_e164("+123", None).is_err());
    }
}

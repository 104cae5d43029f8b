//! ISO vocabulary lookups used by metadata validation and transcript checks.
//!
//! - Country codes for responsible parties resolve against ISO 3166 (alpha-2 or alpha-3).
//! - Language codes reported by an engine resolve against ISO 639 and are normalized to the
//!   three-letter ISO 639-3 form that FADGI expects in the `Language:` header.

use isocountry::CountryCode;
use isolang::Language;

/// Returns `true` when `code` is a recognized ISO 3166 country code.
///
/// Matching is exact (case-sensitive), the same way the code appears in the header.
pub fn is_country_code(code: &str) -> bool {
    match code.len() {
        2 => CountryCode::for_alpha2(code).is_ok(),
        3 => CountryCode::for_alpha3(code).is_ok(),
        _ => false,
    }
}

/// Resolve an engine language code to its canonical ISO 639-3 form.
///
/// Whisper-style engines report two-letter ISO 639-1 codes (`"en"`); other engines may already
/// emit three-letter codes. Anything that resolves to neither returns `None`.
pub fn to_iso639_3(code: &str) -> Option<&'static str> {
    let code = code.trim();
    let lang = match code.len() {
        2 => Language::from_639_1(code),
        3 => Language::from_639_3(code),
        _ => None,
    }?;

    Some(lang.to_639_3())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn country_codes_accept_alpha2_and_alpha3() {
        assert!(is_country_code("US"));
        assert!(is_country_code("USA"));
        assert!(is_country_code("CA"));
    }

    #[test]
    fn country_codes_reject_unknown_and_lowercase() {
        assert!(!is_country_code("ZZ"));
        assert!(!is_country_code("us"));
        assert!(!is_country_code(""));
        assert!(!is_country_code("United States"));
    }

    #[test]
    fn language_codes_normalize_to_three_letters() {
        assert_eq!(to_iso639_3("en"), Some("eng"));
        assert_eq!(to_iso639_3("es"), Some("spa"));
        assert_eq!(to_iso639_3("eng"), Some("eng"));
    }

    #[test]
    fn language_codes_reject_unknown() {
        assert_eq!(to_iso639_3("xx"), None);
        assert_eq!(to_iso639_3(""), None);
        assert_eq!(to_iso639_3("english"), None);
    }
}

//! Expiration date candidate filtering

use once_cell::sync::Lazy;
use regex::Regex;

use crate::analysis::DEFAULT_TOP_CANDIDATES;
use crate::vision::ocr::RecognizedLine;

/// `MM/YY`, `MM/YYYY`, `MMYY` or `MMYYYY`, nothing before or after
static EXPIRATION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(0[1-9]|1[0-2])/?([0-9]{4}|[0-9]{2})$").expect("static regex")
});

/// First candidate that is exactly an expiration date, in the same
/// line-then-rank order as the card number search
pub fn extract_expiration(lines: &[RecognizedLine]) -> Option<String> {
    extract_expiration_with(lines, DEFAULT_TOP_CANDIDATES)
}

/// Same as [`extract_expiration`] with an explicit per-line candidate limit
pub fn extract_expiration_with(lines: &[RecognizedLine], top_n: usize) -> Option<String> {
    lines
        .iter()
        .flat_map(|line| line.top_candidates(top_n))
        .filter_map(|candidate| match_expiration(&candidate.text))
        .find(|matched| !matched.is_empty())
}

/// The candidate itself if the whole string is an expiration date
pub fn match_expiration(text: &str) -> Option<String> {
    EXPIRATION_REGEX
        .find(text)
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_boundaries() {
        assert_eq!(match_expiration("01/23").as_deref(), Some("01/23"));
        assert_eq!(match_expiration("12/2099").as_deref(), Some("12/2099"));
        assert_eq!(match_expiration("0426").as_deref(), Some("0426"));
        assert_eq!(match_expiration("042026").as_deref(), Some("042026"));

        assert_eq!(match_expiration("00/23"), None);
        assert_eq!(match_expiration("13/23"), None);
        assert_eq!(match_expiration("1/23"), None);
        assert_eq!(match_expiration("01/231"), None);
    }

    #[test]
    fn test_requires_full_string_match() {
        assert_eq!(match_expiration("VALID THRU 04/26"), None);
        assert_eq!(match_expiration("04/26 "), None);
        assert_eq!(match_expiration("x04/26"), None);
        assert_eq!(match_expiration("04-26"), None);
        assert_eq!(match_expiration("٠٤/٢٦"), None);
    }

    #[test]
    fn test_extract_from_lines() {
        let ocr = vec![
            RecognizedLine::from_ranked(["4111 1111 1111 1111"]),
            RecognizedLine::from_ranked(["JOHN DOE"]),
            RecognizedLine::from_ranked(["04/26"]),
        ];
        assert_eq!(extract_expiration(&ocr).as_deref(), Some("04/26"));
        // pure function of its input
        assert_eq!(extract_expiration(&ocr), extract_expiration(&ocr));
    }

    #[test]
    fn test_lower_ranked_candidate_can_match() {
        let ocr = vec![RecognizedLine::from_ranked(["O4/26", "04/26", "04/28"])];
        assert_eq!(extract_expiration(&ocr).as_deref(), Some("04/26"));
    }

    #[test]
    fn test_no_match() {
        let ocr = vec![RecognizedLine::from_ranked(["JOHN DOE", "4111"])];
        assert_eq!(extract_expiration(&ocr), None);
        assert_eq!(extract_expiration(&[]), None);
    }
}

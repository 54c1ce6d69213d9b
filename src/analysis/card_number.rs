//! Card number candidate filtering

use crate::analysis::luhn::CARD_NUMBER_LEN;
use crate::analysis::DEFAULT_TOP_CANDIDATES;
use crate::vision::ocr::RecognizedLine;

/// First plausible 16-digit card number among the OCR candidates.
///
/// Lines are visited in detection order and, within a line, the top
/// [`DEFAULT_TOP_CANDIDATES`] in rank order. The check digit is not verified here.
pub fn extract_card_number(lines: &[RecognizedLine]) -> Option<String> {
    extract_card_number_with(lines, DEFAULT_TOP_CANDIDATES)
}

/// Same as [`extract_card_number`] with an explicit per-line candidate limit
pub fn extract_card_number_with(lines: &[RecognizedLine], top_n: usize) -> Option<String> {
    lines
        .iter()
        .flat_map(|line| line.top_candidates(top_n))
        .find_map(|candidate| normalize_card_number(&candidate.text))
}

/// Strip all whitespace and keep the result only if it is exactly 16 ASCII digits
pub fn normalize_card_number(text: &str) -> Option<String> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let plausible =
        compact.len() == CARD_NUMBER_LEN && compact.bytes().all(|b| b.is_ascii_digit());
    plausible.then_some(compact)
}

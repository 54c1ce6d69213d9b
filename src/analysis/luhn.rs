//! Luhn (mod 10) check digit validation

/// Length of the card numbers this scanner accepts
pub const CARD_NUMBER_LEN: usize = 16;

/// Whether `digits` is a 16-digit number with a correct Luhn check digit.
///
/// Anything that is not exactly 16 ASCII digits is simply invalid. Walking the
/// 15 payload digits from the right, every digit at an even position is
/// doubled (and digit-summed when above 9). The expected check digit is
/// `(sum * 9) mod 10`, which equals `(10 - sum mod 10) mod 10`.
pub fn is_valid(digits: &str) -> bool {
    if digits.len() != CARD_NUMBER_LEN || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let bytes = digits.as_bytes();
    let (payload, check) = bytes.split_at(CARD_NUMBER_LEN - 1);
    let check_digit = u32::from(check[0] - b'0');

    let sum: u32 = payload
        .iter()
        .rev()
        .enumerate()
        .map(|(index, b)| {
            let digit = u32::from(b - b'0');
            if index % 2 == 0 {
                let doubled = digit * 2;
                if doubled > 9 {
                    doubled / 10 + doubled % 10
                } else {
                    doubled
                }
            } else {
                digit
            }
        })
        .sum();

    (sum * 9) % 10 == check_digit
}

/// Mask all but the last four digits, for logs
pub fn mask(number: &str) -> String {
    let visible = number.chars().rev().take(4).collect::<Vec<_>>();
    let hidden = number.chars().count().saturating_sub(visible.len());
    let mut masked = "*".repeat(hidden);
    masked.extend(visible.into_iter().rev());
    masked
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Textbook Luhn: double every second digit from the right (check digit
    /// included at position 0), digit-sum, total must be a multiple of ten.
    fn standard_luhn(digits: &str) -> bool {
        let sum: u32 = digits
            .bytes()
            .rev()
            .enumerate()
            .map(|(i, b)| {
                let d = u32::from(b - b'0');
                if i % 2 == 1 {
                    let dd = d * 2;
                    if dd > 9 {
                        dd - 9
                    } else {
                        dd
                    }
                } else {
                    d
                }
            })
            .sum();
        sum % 10 == 0
    }

    const VALID: &[&str] = &[
        "4111111111111111",
        "4012888888881881",
        "5555555555554444",
        "5105105105105100",
        "6011111111111117",
        "3530111333300000",
        "4242424242424242",
    ];

    #[test]
    fn test_known_test_numbers_are_valid() {
        for number in VALID {
            assert!(is_valid(number), "{} should be valid", number);
        }
    }

    #[test]
    fn test_every_single_digit_change_is_rejected() {
        for number in VALID {
            let original = number.as_bytes();
            for position in 0..CARD_NUMBER_LEN {
                for digit in b'0'..=b'9' {
                    if digit == original[position] {
                        continue;
                    }
                    let mut changed = original.to_vec();
                    changed[position] = digit;
                    let changed = String::from_utf8(changed).unwrap();
                    assert!(!is_valid(&changed), "{} should be invalid", changed);
                }
            }
        }
    }

    #[test]
    fn test_agrees_with_standard_formulation() {
        // deterministic LCG so the sample is reproducible
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        for _ in 0..5_000 {
            let mut number = String::with_capacity(CARD_NUMBER_LEN);
            for _ in 0..CARD_NUMBER_LEN {
                state = state
                    .wrapping_mul(6_364_136_223_846_793_005)
                    .wrapping_add(1_442_695_040_888_963_407);
                number.push(char::from(b'0' + ((state >> 33) % 10) as u8));
            }
            assert_eq!(is_valid(&number), standard_luhn(&number), "{}", number);
        }
    }

    #[test]
    fn test_rejects_malformed_input() {
        assert!(!is_valid(""));
        assert!(!is_valid("411111111111111"));
        assert!(!is_valid("41111111111111111"));
        assert!(!is_valid("4111 1111 1111 1111"));
        assert!(!is_valid("411111111111111a"));
        // fullwidth digits are not ASCII digits
        assert!(!is_valid("４１１１１１１１１１１１１１１１"));
    }

    #[test]
    fn test_mask_keeps_last_four() {
        assert_eq!(mask("4111111111111111"), "************1111");
        assert_eq!(mask("12"), "12");
    }
}

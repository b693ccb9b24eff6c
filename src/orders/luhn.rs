use lazy_static::lazy_static;
use regex::Regex;

pub(crate) fn is_digits(number: &str) -> bool {
    lazy_static! {
        static ref DIGITS_RE: Regex = Regex::new(r"^[0-9]+$").unwrap();
    }
    DIGITS_RE.is_match(number)
}

/// Mod-10 check: every second digit counted from the right (the rightmost
/// being position 0 and never doubled) is doubled, minus 9 when above 9.
/// Non-digit input never passes.
pub fn is_valid(number: &str) -> bool {
    if !is_digits(number) {
        return false;
    }
    let parity = number.len() % 2;
    let sum: u32 = number
        .bytes()
        .map(|b| u32::from(b - b'0'))
        .enumerate()
        .map(|(i, d)| {
            if i % 2 == parity {
                let doubled = d * 2;
                if doubled > 9 {
                    doubled - 9
                } else {
                    doubled
                }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

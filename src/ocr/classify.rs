use crate::models::PlateType;

#[derive(Clone, Copy)]
enum Slot {
    Letter,
    Digit,
}

use Slot::{Digit, Letter};

/// `AAA9999`
const MERCOSUL: [Slot; 7] = [Letter, Letter, Letter, Digit, Digit, Digit, Digit];
/// `AAA9A99`
const BRAZIL: [Slot; 7] = [Letter, Letter, Letter, Digit, Letter, Digit, Digit];

/// Plate format verdict plus character statistics for the OCR texts of one crop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub type_plate: PlateType,
    pub error_type_plate: bool,
    pub num_letters: u32,
    pub num_numbers: u32,
    pub amount_characters: u32,
}

impl Default for Classification {
    fn default() -> Self {
        Self {
            type_plate: PlateType::NotDetected,
            error_type_plate: false,
            num_letters: 0,
            num_numbers: 0,
            amount_characters: 0,
        }
    }
}

/// Keep ASCII letters and digits only.
pub fn clean_text(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_alphanumeric).collect()
}

fn matches(text: &str, pattern: &[Slot]) -> bool {
    text.chars().count() == pattern.len()
        && text.chars().zip(pattern).all(|(c, slot)| match slot {
            Letter => c.is_ascii_uppercase(),
            Digit => c.is_ascii_digit(),
        })
}

/// Scan cleaned texts in order; the first one matching a plate format decides
/// the type and stops the scan.
///
/// Every non-matching text overwrites the character counts, so the counts
/// describe the last text looked at before the scan ended, not the best
/// candidate.
pub fn classify(texts: &[String]) -> Classification {
    let mut result = Classification::default();
    for text in texts {
        if matches(text, &MERCOSUL) {
            result.type_plate = PlateType::Mercosul;
            result.error_type_plate = true;
            break;
        }
        if matches(text, &BRAZIL) {
            result.type_plate = PlateType::Brazil;
            result.error_type_plate = true;
            break;
        }
        result.num_letters = text.chars().filter(char::is_ascii_alphabetic).count() as u32;
        result.num_numbers = text.chars().filter(char::is_ascii_digit).count() as u32;
        result.amount_characters = text.chars().count() as u32;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn mercosul_layout() {
        let c = classify(&texts(&["ABC1234"]));
        assert_eq!(c.type_plate, PlateType::Mercosul);
        assert!(c.error_type_plate);
        assert_eq!(c.amount_characters, 0);
    }

    #[test]
    fn legacy_layout() {
        let c = classify(&texts(&["ABC1D23"]));
        assert_eq!(c.type_plate, PlateType::Brazil);
        assert!(c.error_type_plate);
    }

    #[test]
    fn unmatched_text_is_counted() {
        let c = classify(&texts(&["AB12"]));
        assert_eq!(c.type_plate, PlateType::NotDetected);
        assert!(!c.error_type_plate);
        assert_eq!((c.num_letters, c.num_numbers, c.amount_characters), (2, 2, 4));
    }

    #[test]
    fn match_stops_scan_and_keeps_earlier_counts() {
        let c = classify(&texts(&["AB12", "ABC1234", "XYZ"]));
        assert_eq!(c.type_plate, PlateType::Mercosul);
        assert_eq!((c.num_letters, c.num_numbers, c.amount_characters), (2, 2, 4));
    }

    #[test]
    fn last_unmatched_text_wins() {
        let c = classify(&texts(&["ABCD12345", "x1"]));
        assert_eq!((c.num_letters, c.num_numbers, c.amount_characters), (1, 1, 2));
    }

    #[test]
    fn lowercase_does_not_match() {
        let c = classify(&texts(&["abc1234"]));
        assert_eq!(c.type_plate, PlateType::NotDetected);
        assert_eq!((c.num_letters, c.num_numbers, c.amount_characters), (3, 4, 7));
    }

    #[test]
    fn nothing_recognized() {
        assert_eq!(classify(&[]), Classification::default());
    }

    #[test]
    fn cleaning_strips_punctuation_and_spaces() {
        assert_eq!(clean_text("ABC-1D23"), "ABC1D23");
        assert_eq!(clean_text(" br·ABC 1234 "), "brABC1234");
        assert_eq!(clean_text("--"), "");
    }
}

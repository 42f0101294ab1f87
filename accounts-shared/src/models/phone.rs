/// Phone number parsing and formatting
///
/// Numbers are normalized to E.164 (`+<country code><national number>`) for
/// storage and can be rendered back in a national format for display.
///
/// The country calling code is split off using the ITU-T E.164 assignment
/// table. Calling codes are prefix-free, so the first match of length one,
/// two or three digits is unambiguous.
///
/// # Example
///
/// ```
/// use accounts_shared::models::phone::PhoneNumber;
///
/// let phone = PhoneNumber::parse("(415) 555-0123", 1).unwrap();
/// assert_eq!(phone.as_e164(), "+14155550123");
/// assert_eq!(phone.as_national(), "(415) 555-0123");
///
/// let uk = PhoneNumber::parse("+44 20 7946 0958", 1).unwrap();
/// assert_eq!(uk.country_code(), 44);
/// assert_eq!(uk.as_national(), "0207 946 0958");
/// ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// One-digit calling codes (North America, Russia/Kazakhstan)
const ONE_DIGIT_CODES: &[u16] = &[1, 7];

/// Two-digit calling codes
const TWO_DIGIT_CODES: &[u16] = &[
    20, 27, 30, 31, 32, 33, 34, 36, 39, 40, 41, 43, 44, 45, 46, 47, 48, 49, 51, 52, 53, 54, 55,
    56, 57, 58, 60, 61, 62, 63, 64, 65, 66, 81, 82, 84, 86, 90, 91, 92, 93, 94, 95, 98,
];

/// Assigned three-digit calling codes; spare codes are rejected
const THREE_DIGIT_CODES: &[u16] = &[
    211, 212, 213, 216, 218, 220, 221, 222, 223, 224, 225, 226, 227, 228, 229, 230, 231, 232,
    233, 234, 235, 236, 237, 238, 239, 240, 241, 242, 243, 244, 245, 246, 247, 248, 249, 250,
    251, 252, 253, 254, 255, 256, 257, 258, 260, 261, 262, 263, 264, 265, 266, 267, 268, 269,
    290, 291, 297, 298, 299, 350, 351, 352, 353, 354, 355, 356, 357, 358, 359, 370, 371, 372,
    373, 374, 375, 376, 377, 378, 380, 381, 382, 383, 385, 386, 387, 389, 420, 421, 423, 500,
    501, 502, 503, 504, 505, 506, 507, 508, 509, 590, 591, 592, 593, 594, 595, 596, 597, 598,
    599, 670, 672, 673, 674, 675, 676, 677, 678, 679, 680, 681, 682, 683, 685, 686, 687, 688,
    689, 690, 691, 692, 800, 808, 850, 852, 853, 855, 856, 870, 880, 881, 882, 883, 886, 960,
    961, 962, 963, 964, 965, 966, 967, 968, 970, 971, 972, 973, 974, 975, 976, 977, 992, 993,
    994, 995, 996, 998,
];

/// Maximum digits in an E.164 number, country code included
const MAX_E164_DIGITS: usize = 15;

/// Error type for phone parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhoneError {
    /// Nothing left after stripping separators
    #[error("This field is required.")]
    Empty,

    /// Characters other than digits and common separators
    #[error("Enter a valid phone number (e.g. +12125552368).")]
    InvalidCharacters,

    /// Unknown or malformed country calling code
    #[error("Enter a valid phone number (e.g. +12125552368).")]
    InvalidCountryCode,

    /// National number too short or too long
    #[error("Enter a valid phone number (e.g. +12125552368).")]
    InvalidLength,
}

/// A validated international phone number
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber {
    country_code: u16,
    national: String,
}

impl PhoneNumber {
    /// Parses user input into a phone number
    ///
    /// Input starting with `+` or `00` is treated as international. Anything
    /// else is a national number in the `default_country_code` region; a single
    /// leading trunk `0` is dropped before the default code is applied.
    pub fn parse(input: &str, default_country_code: u16) -> Result<Self, PhoneError> {
        let trimmed = input.trim();
        let (international, rest) = if let Some(rest) = trimmed.strip_prefix('+') {
            (true, rest)
        } else {
            (false, trimmed)
        };

        let mut digits = String::with_capacity(rest.len());
        for c in rest.chars() {
            match c {
                '0'..='9' => digits.push(c),
                ' ' | '-' | '.' | '(' | ')' => {}
                _ => return Err(PhoneError::InvalidCharacters),
            }
        }

        if digits.is_empty() {
            return Err(PhoneError::Empty);
        }

        if international {
            return Self::from_international_digits(&digits);
        }

        if let Some(rest) = digits.strip_prefix("00") {
            return Self::from_international_digits(rest);
        }

        // NANP numbers are often written with the leading 1
        if default_country_code == 1 && digits.len() == 11 && digits.starts_with('1') {
            return Self::from_international_digits(&digits);
        }

        let national = digits.strip_prefix('0').unwrap_or(&digits);
        Self::new(default_country_code, national)
    }

    /// Parses a stored E.164 string
    pub fn from_e164(value: &str) -> Result<Self, PhoneError> {
        let digits = value.strip_prefix('+').ok_or(PhoneError::InvalidCountryCode)?;
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(PhoneError::InvalidCharacters);
        }
        Self::from_international_digits(digits)
    }

    fn from_international_digits(digits: &str) -> Result<Self, PhoneError> {
        let code_len = calling_code_length(digits).ok_or(PhoneError::InvalidCountryCode)?;
        let country_code: u16 = digits[..code_len]
            .parse()
            .map_err(|_| PhoneError::InvalidCountryCode)?;
        Self::new(country_code, &digits[code_len..])
    }

    fn new(country_code: u16, national: &str) -> Result<Self, PhoneError> {
        if calling_code_length(&country_code.to_string()) != Some(country_code.to_string().len()) {
            return Err(PhoneError::InvalidCountryCode);
        }

        let total = country_code.to_string().len() + national.len();
        if national.len() < 4 || total > MAX_E164_DIGITS {
            return Err(PhoneError::InvalidLength);
        }

        // NANP: 10 digits, area code and exchange never start with 0 or 1
        if country_code == 1 {
            let bytes = national.as_bytes();
            if national.len() != 10 || bytes[0] < b'2' || bytes[3] < b'2' {
                return Err(PhoneError::InvalidLength);
            }
        }

        Ok(Self {
            country_code,
            national: national.to_string(),
        })
    }

    /// Country calling code (e.g. 1, 44, 358)
    pub fn country_code(&self) -> u16 {
        self.country_code
    }

    /// National significant number, digits only
    pub fn national_number(&self) -> &str {
        &self.national
    }

    /// E.164 representation used for storage
    pub fn as_e164(&self) -> String {
        format!("+{}{}", self.country_code, self.national)
    }

    /// Human-readable national format
    ///
    /// NANP numbers render as `(AAA) EEE-SSSS`. Other numbers get a trunk `0`
    /// and are grouped with the last four digits and the three before them
    /// split off.
    pub fn as_national(&self) -> String {
        let n = &self.national;

        if self.country_code == 1 {
            return format!("({}) {}-{}", &n[..3], &n[3..6], &n[6..]);
        }

        let len = n.len();
        if len > 7 {
            format!("0{} {} {}", &n[..len - 7], &n[len - 7..len - 4], &n[len - 4..])
        } else if len > 4 {
            format!("0{} {}", &n[..len - 4], &n[len - 4..])
        } else {
            format!("0{}", n)
        }
    }
}

/// Returns the length of the calling code at the start of `digits`
fn calling_code_length(digits: &str) -> Option<usize> {
    let bytes = digits.as_bytes();
    if bytes.is_empty() || bytes[0] == b'0' || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }

    let first = u16::from(bytes[0] - b'0');
    if ONE_DIGIT_CODES.contains(&first) {
        return Some(1);
    }

    if bytes.len() < 2 {
        return None;
    }
    let two = first * 10 + u16::from(bytes[1] - b'0');
    if TWO_DIGIT_CODES.contains(&two) {
        return Some(2);
    }

    if bytes.len() < 3 {
        return None;
    }
    let three = two * 10 + u16::from(bytes[2] - b'0');
    THREE_DIGIT_CODES.contains(&three).then_some(3)
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{}{}", self.country_code, self.national)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = PhoneError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_e164(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(value: PhoneNumber) -> Self {
        value.as_e164()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nanp_variants() {
        for input in ["4155550123", "415-555-0123", "(415) 555.0123", "1 415 555 0123", "+1 (415) 555-0123"] {
            let phone = PhoneNumber::parse(input, 1).unwrap();
            assert_eq!(phone.as_e164(), "+14155550123", "input {input:?}");
        }
    }

    #[test]
    fn test_parse_international_prefixes() {
        let plus = PhoneNumber::parse("+358 40 123 4567", 1).unwrap();
        let zeros = PhoneNumber::parse("00358401234567", 1).unwrap();
        assert_eq!(plus, zeros);
        assert_eq!(plus.country_code(), 358);
        assert_eq!(plus.national_number(), "401234567");
    }

    #[test]
    fn test_parse_national_with_trunk_prefix() {
        let phone = PhoneNumber::parse("020 7946 0958", 44).unwrap();
        assert_eq!(phone.as_e164(), "+442079460958");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(PhoneNumber::parse("", 1), Err(PhoneError::Empty));
        assert_eq!(PhoneNumber::parse("call me", 1), Err(PhoneError::InvalidCharacters));
        assert_eq!(PhoneNumber::parse("+0123456789", 1), Err(PhoneError::InvalidCountryCode));
        for spare in ["+999 123 4567", "+210 123 4567", "+280 1234567", "+6991234567"] {
            assert_eq!(
                PhoneNumber::parse(spare, 1),
                Err(PhoneError::InvalidCountryCode),
                "{spare:?} has an unassigned calling code"
            );
        }
        assert_eq!(PhoneNumber::parse("1234567", 999), Err(PhoneError::InvalidCountryCode));
        assert_eq!(PhoneNumber::parse("555", 1), Err(PhoneError::InvalidLength));
        assert_eq!(PhoneNumber::parse("+1234", 1), Err(PhoneError::InvalidLength));
        assert_eq!(
            PhoneNumber::parse("+4412345678901234", 1),
            Err(PhoneError::InvalidLength)
        );
    }

    #[test]
    fn test_nanp_area_code_rules() {
        assert!(PhoneNumber::parse("0155550123", 1).is_err());
        assert!(PhoneNumber::parse("4151550123", 1).is_err());
    }

    #[test]
    fn test_e164_roundtrip_through_serde() {
        let phone = PhoneNumber::parse("+7 912 345 67 89", 1).unwrap();
        let json = serde_json::to_string(&phone).unwrap();
        assert_eq!(json, "\"+79123456789\"");
        let back: PhoneNumber = serde_json::from_str(&json).unwrap();
        assert_eq!(back, phone);
    }

    #[test]
    fn test_national_format() {
        assert_eq!(
            PhoneNumber::from_e164("+12125552368").unwrap().as_national(),
            "(212) 555-2368"
        );
        assert_eq!(
            PhoneNumber::from_e164("+33612345678").unwrap().as_national(),
            "061 234 5678"
        );
        assert_eq!(PhoneNumber::from_e164("+3541234567").unwrap().as_national(), "0123 4567");
    }
}

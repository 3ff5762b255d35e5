//! ISBN-10 / ISBN-13 validation and normalization.

/// Strip separators and validate the checksum. Returns the bare ISBN
/// (digits, plus a trailing `X` for ISBN-10) or `None` when invalid.
pub fn check_isbn(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == 'X' || *c == 'x')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    match cleaned.len() {
        10 if is_valid_isbn10(&cleaned) => Some(cleaned),
        13 if is_valid_isbn13(&cleaned) => Some(cleaned),
        _ => None,
    }
}

fn is_valid_isbn10(s: &str) -> bool {
    let mut sum = 0u32;
    for (i, c) in s.chars().enumerate() {
        let value = match c {
            'X' if i == 9 => 10,
            d => match d.to_digit(10) {
                Some(v) => v,
                None => return false,
            },
        };
        sum += value * (10 - i as u32);
    }
    sum % 11 == 0
}

fn is_valid_isbn13(s: &str) -> bool {
    if !(s.starts_with("978") || s.starts_with("979")) {
        return false;
    }
    let mut sum = 0u32;
    for (i, c) in s.chars().enumerate() {
        let Some(d) = c.to_digit(10) else {
            return false;
        };
        sum += if i % 2 == 0 { d } else { d * 3 };
    }
    sum % 10 == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn accepts_valid_isbn13() {
        assert_eq!(check_isbn("9788205598980").as_deref(), Some("9788205598980"));
        assert_eq!(check_isbn("978-82-05-59898-0").as_deref(), Some("9788205598980"));
    }

    #[test]
    fn accepts_valid_isbn10_with_x() {
        assert_eq!(check_isbn("0-8044-2957-X").as_deref(), Some("080442957X"));
        assert_eq!(check_isbn("080442957x").as_deref(), Some("080442957X"));
    }

    #[test]
    fn rejects_bad_checksum_and_lengths() {
        assert!(check_isbn("9788205598981").is_none());
        assert!(check_isbn("0804429570").is_none());
        assert!(check_isbn("12345").is_none());
        assert!(check_isbn("").is_none());
        // X is only valid as the ISBN-10 check digit
        assert!(check_isbn("08044X9570").is_none());
    }

    #[test]
    fn rejects_isbn13_without_bookland_prefix() {
        // Valid EAN-13 checksum, but not an ISBN
        assert!(check_isbn("4006381333931").is_none());
    }

    fn with_isbn13_check_digit(body: &str) -> String {
        let sum: u32 = body
            .chars()
            .enumerate()
            .map(|(i, c)| {
                let d = c.to_digit(10).unwrap();
                if i % 2 == 0 { d } else { d * 3 }
            })
            .sum();
        format!("{}{}", body, (10 - sum % 10) % 10)
    }

    proptest! {
        #[test]
        fn generated_isbn13_always_validates(body in "97[89][0-9]{9}") {
            let isbn = with_isbn13_check_digit(&body);
            prop_assert_eq!(check_isbn(&isbn), Some(isbn.clone()));
        }
    }
}

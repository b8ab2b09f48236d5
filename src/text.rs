//! Text normalization - Canonical form for product names.
//!
//! Inventory data arrives typed on Persian keyboards, pasted from Arabic
//! locales, and exported from spreadsheets, so one product shows up under
//! several spellings. [`normalize`] folds them to a single canonical string
//! that serves as the catalog's identity key and the matcher's comparison
//! form.

/// Normalizes a product name to its canonical comparison/storage form.
///
/// Applied in order: strip a leading byte-order mark; fold Persian and
/// Arabic-Indic digit glyphs to ASCII; unify Arabic letterforms to their
/// Persian equivalents; turn separators (thousands marks, Arabic and ASCII
/// commas/semicolons/colons, periods, tatweel, zero-width joiners) into
/// spaces; collapse whitespace runs; trim; lower-case.
///
/// The result is a fixed point: `normalize(normalize(s)) == normalize(s)`.
/// Empty and whitespace-only input normalize to `""`.
#[must_use]
pub fn normalize(value: &str) -> String {
    let stripped = value.strip_prefix('\u{feff}').unwrap_or(value);
    let mut out = String::with_capacity(stripped.len());
    let mut pending_space = false;

    for ch in stripped.chars() {
        let mapped = match ch {
            // Persian digits U+06F0..=U+06F9
            '\u{06f0}'..='\u{06f9}' => char::from(b'0' + (ch as u32 - 0x06f0) as u8),
            // Arabic-Indic digits U+0660..=U+0669
            '\u{0660}'..='\u{0669}' => char::from(b'0' + (ch as u32 - 0x0660) as u8),
            // Arabic letterforms folded to the Persian shapes
            'ي' => 'ی',
            'ك' => 'ک',
            'ة' | 'ۀ' => 'ه',
            'ؤ' => 'و',
            'أ' | 'إ' | 'ٱ' | 'آ' => 'ا',
            'ئ' => 'ی',
            // Separators become word breaks; the collapse below dedups them
            '٬' | '٫' | '،' | ',' | '؛' | ';' | ':' | '.' | 'ـ' | '\u{200c}' | '\u{200d}' => ' ',
            other => other,
        };

        if mapped.is_whitespace() {
            // Leading whitespace never flushes; interior runs flush once
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        for lower in mapped.to_lowercase() {
            out.push(lower);
        }
    }

    out
}

/// Returns true when a name normalizes to the empty string, i.e. carries no
/// usable identity.
#[must_use]
pub fn is_blank(value: &str) -> bool {
    normalize(value).is_empty()
}

/// Parses a number cell as exported spreadsheets write them: Persian or
/// Arabic digit glyphs, `٬`/`,` thousands separators, and `٫` for the
/// decimal point are all accepted. Returns None for anything that is not a
/// single number.
#[must_use]
pub fn parse_number(value: &str) -> Option<f64> {
    let stripped = value.strip_prefix('\u{feff}').unwrap_or(value);
    let mut cleaned = String::with_capacity(stripped.len());
    for ch in stripped.chars() {
        match ch {
            '\u{06f0}'..='\u{06f9}' => cleaned.push(char::from(b'0' + (ch as u32 - 0x06f0) as u8)),
            '\u{0660}'..='\u{0669}' => cleaned.push(char::from(b'0' + (ch as u32 - 0x0660) as u8)),
            '٫' => cleaned.push('.'),
            '٬' | ',' | '\u{200c}' => {}
            other if other.is_whitespace() => {}
            other => cleaned.push(other),
        }
    }

    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "کفش مشکی",
            "كفش مشكي",
            "  Mixed  CASE  Latin ",
            "۱۲۳ شال",
            "٠٤٢ پیراهن",
            "برند\u{200c}دار",
            "، ؛ : . ـ",
            "",
            "   \t  ",
            "\u{feff}کیف چرم",
        ];
        for sample in samples {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "not idempotent for {sample:?}");
        }
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_arabic_letterforms_fold_to_persian() {
        // Arabic kaf/yeh spelling collapses onto the Persian spelling
        assert_eq!(normalize("كفش مشكي"), normalize("کفش مشکی"));
        assert_eq!(normalize("علي"), normalize("علی"));
        assert_eq!(normalize("مكتب"), normalize("مکتب"));
        assert_eq!(normalize("مدرسة"), normalize("مدرسه"));
        assert_eq!(normalize("مسؤول"), normalize("مسوول"));
        assert_eq!(normalize("أحمد"), normalize("احمد"));
        assert_eq!(normalize("آب معدنی"), normalize("اب معدنی"));
        assert_eq!(normalize("هيئت"), normalize("هییت"));
    }

    #[test]
    fn test_digit_glyphs_fold_to_ascii() {
        assert_eq!(normalize("سایز ۴۲"), "سایز 42");
        assert_eq!(normalize("سایز ٤٢"), "سایز 42");
        assert_eq!(normalize("۰۱۲۳۴۵۶۷۸۹"), "0123456789");
        assert_eq!(normalize("٠١٢٣٤٥٦٧٨٩"), "0123456789");
    }

    #[test]
    fn test_separators_become_single_spaces() {
        assert_eq!(normalize("کیف،چرم"), "کیف چرم");
        assert_eq!(normalize("a,b;c:d.e"), "a b c d e");
        assert_eq!(normalize("کشـــدار"), "کش دار");
        assert_eq!(normalize("می\u{200c}خواهم"), "می خواهم");
        assert_eq!(normalize("۱٬۰۰۰ تومان"), "1 000 تومان");
    }

    #[test]
    fn test_whitespace_collapses_and_trims() {
        assert_eq!(normalize("  کفش   مشکی  "), "کفش مشکی");
        assert_eq!(normalize("\t Shoe \n Black \t"), "shoe black");
        assert_eq!(normalize("     "), "");
    }

    #[test]
    fn test_leading_bom_is_stripped() {
        assert_eq!(normalize("\u{feff}کفش"), "کفش");
        assert_eq!(normalize("\u{feff}"), "");
    }

    #[test]
    fn test_latin_lowercases() {
        assert_eq!(normalize("Nike AIR"), "nike air");
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(""));
        assert!(is_blank("  \t "));
        assert!(is_blank("،،،"));
        assert!(!is_blank("کفش"));
    }

    #[test]
    fn test_parse_number_accepts_localized_digits() {
        assert_eq!(parse_number("42"), Some(42.0));
        assert_eq!(parse_number("۴۲"), Some(42.0));
        assert_eq!(parse_number("٤٢"), Some(42.0));
        assert_eq!(parse_number("۱٬۰۰۰"), Some(1000.0));
        assert_eq!(parse_number("1,250.5"), Some(1250.5));
        assert_eq!(parse_number("۱۲٫۵"), Some(12.5));
        assert_eq!(parse_number(" 99 "), Some(99.0));
        assert_eq!(parse_number("-3.5"), Some(-3.5));
    }

    #[test]
    fn test_parse_number_rejects_non_numbers() {
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("   "), None);
        assert_eq!(parse_number("کفش"), None);
        assert_eq!(parse_number("12ab"), None);
    }
}

/// Parses a human-readable interval like `"2d"` or `"1h30m"` into seconds.
///
/// Each term is an optional digit run followed by a unit character
/// (`s`, `m`, `h`, `d`); an omitted digit run counts as 1. A trailing digit
/// run with no unit is taken as raw seconds. Any other character is skipped,
/// so malformed input degrades instead of failing.
pub fn parse_interval(text: &str) -> u64 {
    let mut total: u64 = 0;
    let mut digits = String::new();

    for ch in text.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
        } else if let Some(unit) = unit_seconds(ch) {
            total = total.saturating_add(take_count(&mut digits).saturating_mul(unit));
        }
    }

    if !digits.is_empty() {
        total = total.saturating_add(take_count(&mut digits));
    }

    total
}

fn take_count(digits: &mut String) -> u64 {
    let count = if digits.is_empty() {
        1
    } else {
        digits.parse().unwrap_or(u64::MAX)
    };
    digits.clear();
    count
}

fn unit_seconds(ch: char) -> Option<u64> {
    match ch {
        's' => Some(1),
        'm' => Some(60),
        'h' => Some(3600),
        'd' => Some(86400),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::parse_interval;

    #[test]
    fn single_terms() {
        assert_eq!(parse_interval("30s"), 30);
        assert_eq!(parse_interval("2m"), 120);
        assert_eq!(parse_interval("1h"), 3600);
        assert_eq!(parse_interval("2d"), 172_800);
    }

    #[test]
    fn terms_sum() {
        assert_eq!(parse_interval("1h30m"), 5400);
        assert_eq!(parse_interval("1d12h"), 129_600);
    }

    #[test]
    fn omitted_digit_run_counts_as_one() {
        assert_eq!(parse_interval("d"), 86_400);
        assert_eq!(parse_interval("hm"), 3660);
    }

    #[test]
    fn trailing_digits_are_raw_seconds() {
        assert_eq!(parse_interval("90"), 90);
        assert_eq!(parse_interval("1m30"), 90);
    }

    #[test]
    fn empty_input_is_zero() {
        assert_eq!(parse_interval(""), 0);
    }

    // The grammar is deliberately permissive: anything that is neither a
    // digit nor a unit is skipped without complaint.
    #[test]
    fn unrecognized_characters_are_skipped() {
        assert_eq!(parse_interval("1h 30m"), 5400);
        assert_eq!(parse_interval("every 2 days"), parse_interval("2d"));
        assert_eq!(parse_interval("x1hx"), 3600);
    }

    // parse(a + b) == parse(a) + parse(b) whenever a and b are complete
    // unit-terminated terms.
    #[test]
    fn concatenation_of_complete_terms_is_additive() {
        let terms = ["5s", "3m", "2h", "1d", "m", "12h"];
        for a in terms {
            for b in terms {
                let joined = format!("{a}{b}");
                assert_eq!(
                    parse_interval(&joined),
                    parse_interval(a) + parse_interval(b),
                    "term concatenation {joined:?}"
                );
            }
        }
    }

    #[test]
    fn huge_digit_runs_saturate_instead_of_wrapping() {
        assert_eq!(parse_interval("99999999999999999999999999d"), u64::MAX);
    }
}

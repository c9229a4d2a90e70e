//! Session timeout strings: `N`, `Ns`, `Nmn`, `Nh`, `Nd`.

/// Unit suffixes and their multipliers, in seconds.
const UNITS: [(&str, i64); 4] = [("s", 1), ("mn", 60), ("h", 3600), ("d", 86_400)];

/// Converts a timeout string into seconds.
///
/// The first run of decimal digits is the count. The suffix slot directly after
/// it is the longest run of unit tokens (`s`, `mn`, `h`, `d`); a single known
/// unit selects its multiplier, anything else in that slot counts as seconds.
///
/// There is no error channel: input without digits, or whose digits overflow,
/// yields `0`.
pub fn parse_duration(input: &str) -> i64 {
    let Some(start) = input.find(|c: char| c.is_ascii_digit()) else {
        return 0;
    };
    let rest = &input[start..];
    let digits_len = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());

    let Ok(count) = rest[..digits_len].parse::<i64>() else {
        return 0;
    };

    let suffix = unit_run(&rest[digits_len..]);
    let multiplier = UNITS
        .iter()
        .find(|(unit, _)| *unit == suffix)
        .map_or(1, |(_, m)| *m);

    count.checked_mul(multiplier).unwrap_or(0)
}

/// Longest prefix of `s` made only of unit tokens.
fn unit_run(s: &str) -> &str {
    let mut end = 0;
    'scan: while end < s.len() {
        for (unit, _) in UNITS {
            if s[end..].starts_with(unit) {
                end += unit.len();
                continue 'scan;
            }
        }
        break;
    }
    &s[..end]
}

// Human durations such as "1d2h30m" for mute and ban commands.

use chrono::Duration;

/// Parse `<n><unit>` groups with units `d`, `h`, `m`, `s`. Whitespace between
/// groups is allowed. Returns `None` for malformed input or a zero total.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let mut total: i64 = 0;
    let mut number: Option<i64> = None;
    let mut seen_group = false;

    for ch in input.trim().chars() {
        if let Some(digit) = ch.to_digit(10) {
            let current = number.unwrap_or(0);
            number = Some(current.checked_mul(10)?.checked_add(digit as i64)?);
            continue;
        }
        if ch.is_whitespace() {
            if number.is_some() {
                return None;
            }
            continue;
        }

        let unit_secs = match ch.to_ascii_lowercase() {
            'd' => 86_400,
            'h' => 3_600,
            'm' => 60,
            's' => 1,
            _ => return None,
        };
        let value = number.take()?;
        total = total.checked_add(value.checked_mul(unit_secs)?)?;
        seen_group = true;
    }

    if number.is_some() || !seen_group || total == 0 {
        return None;
    }
    Duration::try_seconds(total)
}

/// Inverse of `parse_duration` for display, largest units first.
pub fn format_duration(duration: Duration) -> String {
    let mut secs = duration.num_seconds().max(0);
    if secs == 0 {
        return "0s".to_string();
    }

    let mut out = String::new();
    for (unit, size) in [("d", 86_400), ("h", 3_600), ("m", 60), ("s", 1)] {
        let count = secs / size;
        if count > 0 {
            out.push_str(&format!("{count}{unit}"));
            secs %= size;
        }
    }
    out
}

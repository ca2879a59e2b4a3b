//! Display helpers that turn raw registration values into cell text.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde_json::Value;

const DATE_TIME_DISPLAY: &str = "%d %b %Y, %I:%M %p";
const DATE_DISPLAY: &str = "%d %b %Y";

/// Anything below this is treated as seconds rather than milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    // Naive timestamps come from the database without an offset and are UTC.
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }

    if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
        let n: i64 = raw.parse().ok()?;
        let millis = if n < EPOCH_MILLIS_THRESHOLD { n * 1000 } else { n };
        return DateTime::from_timestamp_millis(millis);
    }

    None
}

/// Renders a timestamp in `tz`, e.g. `15 Mar 2024, 04:00 PM`.
///
/// Accepts RFC 3339, naive ISO timestamps (taken as UTC), plain dates and
/// epoch seconds/milliseconds. Anything else is returned unchanged so the
/// sheet still shows what the frontend sent.
pub fn format_timestamp(raw: &str, tz: Tz) -> String {
    let raw = raw.trim();

    if let Some(instant) = parse_instant(raw) {
        return instant.with_timezone(&tz).format(DATE_TIME_DISPLAY).to_string();
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.format(DATE_DISPLAY).to_string();
    }

    raw.to_string()
}

/// Text form of a custom field answer. `None` means "nothing to show".
///
/// Lists (checkbox answers) are joined with `", "`.
pub fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(render_value).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(_) => Some(value.to_string()),
    }
}

/// `checked_in` -> `Checked In`.
pub fn title_case(raw: &str) -> String {
    raw.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn payment_status_label(raw: &str) -> String {
    match raw.trim().to_ascii_lowercase().as_str() {
        "verified" | "paid" | "completed" | "success" => "✓ Paid".to_string(),
        "pending" | "submitted" => "Pending".to_string(),
        "rejected" | "failed" => "✗ Rejected".to_string(),
        other => title_case(other),
    }
}

/// Prefixes an amount with the currency symbol, trimming useless decimals.
pub fn format_amount(currency_symbol: &str, raw: &str) -> String {
    let raw = raw.trim();
    let stripped = raw.strip_prefix(currency_symbol).unwrap_or(raw).trim();

    match stripped.parse::<f64>() {
        Ok(amount) if amount.fract() == 0.0 => format!("{currency_symbol}{amount:.0}"),
        Ok(amount) => format!("{currency_symbol}{amount:.2}"),
        Err(_) => format!("{currency_symbol}{stripped}"),
    }
}

pub fn is_link(raw: &str) -> bool {
    let raw = raw.trim();
    raw.starts_with("https://") || raw.starts_with("http://")
}

/// Sheets formula for a clickable link. Quotes are doubled per formula syntax.
pub fn hyperlink_formula(url: &str, label: &str) -> String {
    format!(
        "=HYPERLINK(\"{}\",\"{}\")",
        url.trim().replace('"', "\"\""),
        label.replace('"', "\"\"")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const IST: Tz = chrono_tz::Asia::Kolkata;

    #[test]
    fn test_format_rfc3339_in_zone() {
        assert_eq!(
            format_timestamp("2024-03-15T10:30:00Z", IST),
            "15 Mar 2024, 04:00 PM"
        );
        assert_eq!(
            format_timestamp("2024-03-15T10:30:00.123+05:30", IST),
            "15 Mar 2024, 10:30 AM"
        );
    }

    #[test]
    fn test_format_naive_and_epoch() {
        assert_eq!(
            format_timestamp("2024-03-15 10:30:00", IST),
            "15 Mar 2024, 04:00 PM"
        );
        // 2024-03-15T10:30:00Z
        assert_eq!(format_timestamp("1710498600000", IST), "15 Mar 2024, 04:00 PM");
        assert_eq!(format_timestamp("1710498600", IST), "15 Mar 2024, 04:00 PM");
    }

    #[test]
    fn test_format_plain_date_and_garbage() {
        assert_eq!(format_timestamp("2024-03-15", IST), "15 Mar 2024");
        assert_eq!(format_timestamp("next tuesday", IST), "next tuesday");
    }

    #[test]
    fn test_render_value() {
        assert_eq!(render_value(&json!(null)), None);
        assert_eq!(render_value(&json!("  ")), None);
        assert_eq!(render_value(&json!([])), None);
        assert_eq!(
            render_value(&json!(["Veg", "No onion"])),
            Some("Veg, No onion".to_string())
        );
        assert_eq!(render_value(&json!(3)), Some("3".to_string()));
        assert_eq!(render_value(&json!(true)), Some("true".to_string()));
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("checked_in"), "Checked In");
        assert_eq!(title_case("TEAM"), "Team");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_payment_labels_and_amounts() {
        assert_eq!(payment_status_label("verified"), "✓ Paid");
        assert_eq!(payment_status_label("PENDING"), "Pending");
        assert_eq!(payment_status_label("refund_requested"), "Refund Requested");

        assert_eq!(format_amount("₹", "500"), "₹500");
        assert_eq!(format_amount("₹", "₹ 499.5"), "₹499.50");
        assert_eq!(format_amount("$", "free"), "$free");
    }

    #[test]
    fn test_hyperlink_formula_escapes_quotes() {
        assert_eq!(
            hyperlink_formula("https://x.io/a\"b", "View Proof"),
            "=HYPERLINK(\"https://x.io/a\"\"b\",\"View Proof\")"
        );
    }
}

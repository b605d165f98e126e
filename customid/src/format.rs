//! Element formatting.
//!
//! Every generator produces a [`RawValue`]; [`format`] turns it into the
//! text fragment that lands in the custom ID. Formatting is total: a spec the
//! formatter does not understand degrades to plain output instead of failing.
//!
//! Number specs:
//!
//! | spec   | output                                         |
//! |--------|------------------------------------------------|
//! | `""`   | plain decimal                                  |
//! | `D<n>` | decimal, left-padded with zeros to `n` digits  |
//! | `X<n>` | uppercase hex, left-padded with zeros to `n`   |
//! | other  | plain decimal                                  |
//!
//! Date specs replace the tokens `yyyy`, `MM`, `dd`, `HH`, `mm` and `ss` and
//! copy every other character. An empty date spec yields ISO-8601 in UTC with
//! millisecond precision.

use chrono::{DateTime, FixedOffset, Utc};
use uuid::Uuid;

/// Padding widths above this are clamped.
pub const MAX_PAD_WIDTH: usize = 64;

/// Date tokens and the chrono pattern each one renders. Longer tokens come
/// first so that a position is matched greedily.
const DATE_TOKENS: [(&str, &str); 6] = [
    ("yyyy", "%Y"),
    ("MM", "%m"),
    ("dd", "%d"),
    ("HH", "%H"),
    ("mm", "%M"),
    ("ss", "%S"),
];

const ISO_UTC_MILLIS: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// A generated value before formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    /// Random numbers and sequence values.
    Number(u64),
    /// A wall-clock reading, carrying its local offset.
    DateTime(DateTime<FixedOffset>),
    /// A random UUID.
    Guid(Uuid),
    /// Literal text.
    Text(String),
}

/// Formats `raw` according to `spec`.
pub fn format(raw: &RawValue, spec: &str) -> String {
    match raw {
        RawValue::Number(value) => format_number(*value, spec),
        RawValue::DateTime(datetime) => format_datetime(datetime, spec),
        RawValue::Guid(uuid) => uuid.hyphenated().to_string(),
        RawValue::Text(text) => text.clone(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumberSpec {
    Plain,
    Decimal(usize),
    Hex(usize),
}

fn parse_number_spec(spec: &str) -> NumberSpec {
    if let Some(rest) = spec.strip_prefix('D') {
        NumberSpec::Decimal(pad_width(rest))
    } else if let Some(rest) = spec.strip_prefix('X') {
        NumberSpec::Hex(pad_width(rest))
    } else {
        NumberSpec::Plain
    }
}

/// Width from the leading digits of `rest`; zero when there are none.
fn pad_width(rest: &str) -> usize {
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let digits = &rest[..digits_end];
    if digits.is_empty() {
        return 0;
    }
    // Only overflow can fail here; an absurd width clamps like a large one.
    digits
        .parse::<usize>()
        .map_or(MAX_PAD_WIDTH, |width| width.min(MAX_PAD_WIDTH))
}

/// Formats a number with a `D<n>` / `X<n>` spec.
///
/// Padding never truncates: a value wider than `n` is rendered in full.
/// Widths above [`MAX_PAD_WIDTH`] are clamped, so `D100` pads to 64 digits.
pub fn format_number(value: u64, spec: &str) -> String {
    match parse_number_spec(spec) {
        NumberSpec::Plain => value.to_string(),
        NumberSpec::Decimal(width) => format!("{value:0width$}"),
        NumberSpec::Hex(width) => format!("{value:0width$X}"),
    }
}

/// Formats a date/time with a token spec, or ISO-8601 UTC when `spec` is
/// empty.
///
/// Every occurrence of a token is substituted, not only the first one:
/// `yyyy-yyyy` renders the year twice.
pub fn format_datetime(datetime: &DateTime<FixedOffset>, spec: &str) -> String {
    if spec.is_empty() {
        return datetime
            .with_timezone(&Utc)
            .format(ISO_UTC_MILLIS)
            .to_string();
    }

    let mut out = String::with_capacity(spec.len() + 8);
    let mut rest = spec;
    'scan: while let Some(ch) = rest.chars().next() {
        for (token, pattern) in DATE_TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(&datetime.format(pattern).to_string());
                rest = tail;
                continue 'scan;
            }
        }
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    out
}

//! Element generators.
//!
//! One exhaustive match over [`Element`] produces the raw value of every
//! element kind; the result goes through the shared formatter. PREVIEW and
//! FINAL assembly both come through here and only differ in the sequence
//! value they pass in.

use std::fmt;

use chrono::{DateTime, FixedOffset, Local};
use rand::Rng;
use uuid::Uuid;

use crate::element::{CustomIdElement, Element};
use crate::format::{self, RawValue};

/// Exclusive upper bound of `RANDOM_6DIGIT`.
pub const RANDOM_6DIGIT_BOUND: u64 = 1_000_000;
/// Exclusive upper bound of `RANDOM_9DIGIT`.
pub const RANDOM_9DIGIT_BOUND: u64 = 1_000_000_000;
/// Exclusive upper bound of `RANDOM_20BIT`.
pub const RANDOM_20BIT_BOUND: u64 = 1 << 20;
/// Exclusive upper bound of `RANDOM_32BIT`.
pub const RANDOM_32BIT_BOUND: u64 = 1 << 32;

/// Source of the wall-clock time used by `DATE_TIME` elements.
pub trait Clock: Send + Sync + fmt::Debug {
    /// The current time with the server's local offset.
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Reads the system clock in the server's local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(DateTime<FixedOffset>);

impl FixedClock {
    /// Creates a clock frozen at `instant`.
    pub const fn new(instant: DateTime<FixedOffset>) -> Self {
        Self(instant)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

/// Values shared by every element of one assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationContext {
    /// Clock reading taken once for the whole ID
    pub now: DateTime<FixedOffset>,
    /// Sequence value for `SEQUENCE` elements
    pub sequence: u64,
}

/// Produces the raw value of one element.
pub fn generate<R>(element: &Element, rng: &mut R, context: &GenerationContext) -> RawValue
where
    R: Rng,
{
    match element {
        Element::FixedText(text) => RawValue::Text(text.clone()),
        Element::Random6Digit => RawValue::Number(rng.random_range(0..RANDOM_6DIGIT_BOUND)),
        Element::Random9Digit => RawValue::Number(rng.random_range(0..RANDOM_9DIGIT_BOUND)),
        Element::Random20Bit => RawValue::Number(rng.random_range(0..RANDOM_20BIT_BOUND)),
        Element::Random32Bit => RawValue::Number(rng.random_range(0..RANDOM_32BIT_BOUND)),
        Element::Guid => RawValue::Guid(random_uuid(rng)),
        Element::DateTime => RawValue::DateTime(context.now),
        Element::Sequence => RawValue::Number(context.sequence),
    }
}

/// Generates and formats one element.
pub fn render<R>(element: &CustomIdElement, rng: &mut R, context: &GenerationContext) -> String
where
    R: Rng,
{
    format::format(&generate(&element.element, rng, context), &element.format)
}

/// A version 4 UUID drawn from `rng`.
fn random_uuid<R>(rng: &mut R) -> Uuid
where
    R: Rng,
{
    uuid::Builder::from_random_bytes(rng.random()).into_uuid()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn context() -> GenerationContext {
        GenerationContext {
            now: FixedOffset::east_opt(0)
                .unwrap()
                .with_ymd_and_hms(2025, 10, 15, 12, 0, 0)
                .unwrap(),
            sequence: 42,
        }
    }

    fn number(raw: RawValue) -> u64 {
        match raw {
            RawValue::Number(value) => value,
            other => panic!("expected a number, got {other:?}"),
        }
    }

    #[test]
    fn random_elements_stay_within_their_ranges() {
        let mut rng = StdRng::seed_from_u64(7);
        let ctx = context();
        for _ in 0..2_000 {
            assert!(number(generate(&Element::Random6Digit, &mut rng, &ctx)) < RANDOM_6DIGIT_BOUND);
            assert!(number(generate(&Element::Random9Digit, &mut rng, &ctx)) < RANDOM_9DIGIT_BOUND);
            assert!(number(generate(&Element::Random20Bit, &mut rng, &ctx)) < RANDOM_20BIT_BOUND);
            assert!(number(generate(&Element::Random32Bit, &mut rng, &ctx)) < RANDOM_32BIT_BOUND);
        }
    }

    #[test]
    fn guid_has_uuid_v4_shape() {
        let mut rng = StdRng::seed_from_u64(11);
        let element = CustomIdElement::new(Element::Guid, "", 0);
        for _ in 0..100 {
            let text = render(&element, &mut rng, &context());
            assert_eq!(text.len(), 36);
            let bytes = text.as_bytes();
            for dash in [8, 13, 18, 23] {
                assert_eq!(bytes[dash], b'-');
            }
            assert_eq!(bytes[14], b'4');
            assert!(matches!(bytes[19], b'8' | b'9' | b'a' | b'b'));
            assert!(text
                .chars()
                .all(|c| c == '-' || c.is_ascii_digit() || ('a'..='f').contains(&c)));
        }
    }

    #[test]
    fn fixed_text_sequence_and_date_come_from_their_sources() {
        let mut rng = StdRng::seed_from_u64(0);
        let ctx = context();
        assert_eq!(
            render(&CustomIdElement::new(Element::FixedText("INV-".into()), "", 0), &mut rng, &ctx),
            "INV-"
        );
        assert_eq!(
            render(&CustomIdElement::new(Element::FixedText(String::new()), "", 0), &mut rng, &ctx),
            ""
        );
        assert_eq!(
            render(&CustomIdElement::new(Element::Sequence, "D4", 0), &mut rng, &ctx),
            "0042"
        );
        assert_eq!(
            render(&CustomIdElement::new(Element::DateTime, "yyyyMMdd", 0), &mut rng, &ctx),
            "20251015"
        );
    }

    #[test]
    fn seeded_sources_are_reproducible() {
        let element = CustomIdElement::new(Element::Random9Digit, "D9", 0);
        let mut first = StdRng::seed_from_u64(99);
        let mut second = StdRng::seed_from_u64(99);
        assert_eq!(
            render(&element, &mut first, &context()),
            render(&element, &mut second, &context())
        );
    }

    #[test]
    fn fixed_clock_is_frozen() {
        let clock = FixedClock::new(context().now);
        assert_eq!(clock.now(), clock.now());
    }
}

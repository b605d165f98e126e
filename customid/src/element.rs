//! Custom ID template elements.
//!
//! A template is an ordered list of [`CustomIdElement`]s. Each element is a
//! tagged [`Element`] plus the verbatim format spec and its position. The
//! string forms of [`ElementType`] and the format specs are the persisted
//! wire format and must stay stable.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{ConfigVersion, InventoryId, Timestamp};

/// Maximum number of elements a template may hold.
pub const MAX_ELEMENTS: usize = 10;

/// The closed set of element kinds, named as they are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementType {
    /// Literal text.
    FixedText,
    /// Uniform random integer in `[0, 10^6)`.
    #[serde(rename = "RANDOM_6DIGIT")]
    Random6Digit,
    /// Uniform random integer in `[0, 10^9)`.
    #[serde(rename = "RANDOM_9DIGIT")]
    Random9Digit,
    /// Uniform random integer in `[0, 2^20)`.
    #[serde(rename = "RANDOM_20BIT")]
    Random20Bit,
    /// Uniform random integer in `[0, 2^32)`.
    #[serde(rename = "RANDOM_32BIT")]
    Random32Bit,
    /// Random UUID v4.
    Guid,
    /// Wall-clock date and time.
    DateTime,
    /// Inventory-scoped increasing counter.
    Sequence,
}

impl ElementType {
    /// Every element type, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::FixedText,
        Self::Random6Digit,
        Self::Random9Digit,
        Self::Random20Bit,
        Self::Random32Bit,
        Self::Guid,
        Self::DateTime,
        Self::Sequence,
    ];

    /// The persisted name of this element type.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FixedText => "FIXED_TEXT",
            Self::Random6Digit => "RANDOM_6DIGIT",
            Self::Random9Digit => "RANDOM_9DIGIT",
            Self::Random20Bit => "RANDOM_20BIT",
            Self::Random32Bit => "RANDOM_32BIT",
            Self::Guid => "GUID",
            Self::DateTime => "DATE_TIME",
            Self::Sequence => "SEQUENCE",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name an [`ElementType`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized element type `{0}`")]
pub struct UnknownElementType(pub String);

impl FromStr for ElementType {
    type Err = UnknownElementType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownElementType(s.to_string()))
    }
}

/// One template segment, with the payload its kind needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Element {
    /// Literal text copied into the ID.
    FixedText(String),
    /// Random number below one million.
    Random6Digit,
    /// Random number below one billion.
    Random9Digit,
    /// Random 20-bit number.
    Random20Bit,
    /// Random 32-bit number.
    Random32Bit,
    /// Random UUID v4.
    Guid,
    /// Current local date/time.
    DateTime,
    /// Next inventory sequence number.
    Sequence,
}

impl Element {
    /// The kind tag of this element.
    pub const fn element_type(&self) -> ElementType {
        match self {
            Self::FixedText(_) => ElementType::FixedText,
            Self::Random6Digit => ElementType::Random6Digit,
            Self::Random9Digit => ElementType::Random9Digit,
            Self::Random20Bit => ElementType::Random20Bit,
            Self::Random32Bit => ElementType::Random32Bit,
            Self::Guid => ElementType::Guid,
            Self::DateTime => ElementType::DateTime,
            Self::Sequence => ElementType::Sequence,
        }
    }

    /// Literal text of a fixed-text element.
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::FixedText(text) => Some(text),
            _ => None,
        }
    }

    /// Builds the element for `kind`, taking the literal from `value` for
    /// fixed text. Other kinds ignore `value`.
    pub fn from_parts(kind: ElementType, value: Option<String>) -> Self {
        match kind {
            ElementType::FixedText => Self::FixedText(value.unwrap_or_default()),
            ElementType::Random6Digit => Self::Random6Digit,
            ElementType::Random9Digit => Self::Random9Digit,
            ElementType::Random20Bit => Self::Random20Bit,
            ElementType::Random32Bit => Self::Random32Bit,
            ElementType::Guid => Self::Guid,
            ElementType::DateTime => Self::DateTime,
            ElementType::Sequence => Self::Sequence,
        }
    }
}

/// A validated, positioned template element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "ElementDraft")]
pub struct CustomIdElement {
    /// What to generate.
    pub element: Element,
    /// Format spec, kept exactly as configured.
    pub format: String,
    /// Zero-based position in the assembled ID.
    pub order: u32,
}

impl CustomIdElement {
    /// Creates an element at `order` with the given format spec.
    pub fn new(element: Element, format: impl Into<String>, order: u32) -> Self {
        Self {
            element,
            format: format.into(),
            order,
        }
    }

    /// The kind tag of this element.
    pub const fn element_type(&self) -> ElementType {
        self.element.element_type()
    }
}

/// Unvalidated element as received from callers or read back from storage.
///
/// Field names follow the JSON wire format (`elementType`, `format`,
/// `value`, `order`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementDraft {
    /// Persisted element type name; `None` when the caller omitted it.
    #[serde(default)]
    pub element_type: Option<String>,
    /// Format spec.
    #[serde(default)]
    pub format: Option<String>,
    /// Literal text for fixed-text elements.
    #[serde(default)]
    pub value: Option<String>,
    /// Explicit position; defaults to the list index.
    #[serde(default)]
    pub order: Option<u32>,
}

impl ElementDraft {
    /// Draft for `kind` with the given format.
    pub fn new(kind: ElementType, format: impl Into<String>) -> Self {
        Self {
            element_type: Some(kind.as_str().to_string()),
            format: Some(format.into()),
            value: None,
            order: None,
        }
    }

    /// Draft for a fixed-text element.
    pub fn fixed_text(value: impl Into<String>) -> Self {
        Self {
            element_type: Some(ElementType::FixedText.as_str().to_string()),
            format: None,
            value: Some(value.into()),
            order: None,
        }
    }

    /// Sets an explicit position.
    #[must_use]
    pub const fn with_order(mut self, order: u32) -> Self {
        self.order = Some(order);
        self
    }
}

impl From<CustomIdElement> for ElementDraft {
    fn from(element: CustomIdElement) -> Self {
        let kind = element.element_type();
        let value = match element.element {
            Element::FixedText(text) => Some(text),
            _ => None,
        };
        Self {
            element_type: Some(kind.as_str().to_string()),
            format: Some(element.format),
            value,
            order: Some(element.order),
        }
    }
}

/// The saved template of one inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomIdConfig {
    /// Owning inventory.
    pub inventory_id: InventoryId,
    /// Elements in ascending `order`.
    pub elements: Vec<CustomIdElement>,
    /// Optimistic-lock version.
    pub version: ConfigVersion,
    /// When the template was last replaced.
    pub updated_at: Timestamp,
}

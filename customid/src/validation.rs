//! Template validation.
//!
//! Turns caller-supplied [`ElementDraft`]s into [`CustomIdElement`]s sorted
//! by `order`. Saving is strict; previews tolerate fixed-text elements whose
//! value is still empty because the user may be typing it.

use std::collections::HashSet;

use crate::element::{CustomIdElement, Element, ElementDraft, ElementType, MAX_ELEMENTS};
use crate::errors::ValidationError;

/// Which rule set applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// Rules for a template that is about to be saved.
    Save,
    /// Rules for a template that is only being previewed.
    Preview,
}

/// Validates a template for saving.
pub fn validate_elements(drafts: &[ElementDraft]) -> Result<Vec<CustomIdElement>, ValidationError> {
    validate(drafts, ValidationMode::Save)
}

/// Validates a template for previewing.
pub fn validate_preview_elements(
    drafts: &[ElementDraft],
) -> Result<Vec<CustomIdElement>, ValidationError> {
    validate(drafts, ValidationMode::Preview)
}

/// Validates `drafts` under `mode` and returns the elements in ascending
/// `order`. Elements without an explicit order take their list position.
pub fn validate(
    drafts: &[ElementDraft],
    mode: ValidationMode,
) -> Result<Vec<CustomIdElement>, ValidationError> {
    if drafts.is_empty() {
        return Err(ValidationError::NoElements);
    }
    if drafts.len() > MAX_ELEMENTS {
        return Err(ValidationError::TooManyElements {
            count: drafts.len(),
            max: MAX_ELEMENTS,
        });
    }

    let mut seen_orders = HashSet::with_capacity(drafts.len());
    let mut elements = Vec::with_capacity(drafts.len());
    for (index, draft) in drafts.iter().enumerate() {
        let element = validate_one(index, draft, mode)?;
        if !seen_orders.insert(element.order) {
            return Err(ValidationError::DuplicateOrder {
                index,
                order: element.order,
            });
        }
        elements.push(element);
    }

    elements.sort_by_key(|element| element.order);
    Ok(elements)
}

fn validate_one(
    index: usize,
    draft: &ElementDraft,
    mode: ValidationMode,
) -> Result<CustomIdElement, ValidationError> {
    let type_name = draft
        .element_type
        .as_deref()
        .filter(|name| !name.is_empty())
        .ok_or(ValidationError::MissingElementType { index })?;
    let kind: ElementType =
        type_name
            .parse()
            .map_err(|_| ValidationError::UnknownElementType {
                index,
                element_type: type_name.to_string(),
            })?;

    let element = match kind {
        ElementType::FixedText => {
            let value = draft.value.clone().unwrap_or_default();
            if value.is_empty() && mode == ValidationMode::Save {
                return Err(ValidationError::MissingFixedTextValue { index });
            }
            Element::FixedText(value)
        }
        other => Element::from_parts(other, None),
    };

    // MAX_ELEMENTS keeps every list index far below u32::MAX.
    let position = u32::try_from(index).unwrap_or(u32::MAX);
    Ok(CustomIdElement::new(
        element,
        draft.format.clone().unwrap_or_default(),
        draft.order.unwrap_or(position),
    ))
}

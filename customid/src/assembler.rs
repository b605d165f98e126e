//! Custom ID assembly.
//!
//! Elements are rendered in ascending `order` and concatenated without
//! separators. The sequence value is resolved at most once per assembly, so
//! a template with two `SEQUENCE` elements repeats the same number. Previews
//! peek at the sequence; final assemblies reserve it.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use tracing::{instrument, trace};

use crate::config::SequenceStrategy;
use crate::element::{CustomIdElement, ElementType};
use crate::errors::StoreResult;
use crate::generate::{self, Clock, GenerationContext};
use crate::sequence::{SequenceResolver, PREVIEW_PLACEHOLDER};
use crate::store::InventoryStore;
use crate::types::InventoryId;

/// What an assembly is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyMode<'a> {
    /// Show the user what an ID would look like. The sequence is peeked for
    /// the given inventory, or replaced by a placeholder when there is none.
    Preview(Option<&'a InventoryId>),
    /// Produce the ID of a new item of the inventory, reserving the sequence.
    Final(&'a InventoryId),
}

/// Renders templates into custom ID strings.
#[derive(Debug)]
pub struct Assembler<'a, S: ?Sized> {
    store: &'a S,
    strategy: SequenceStrategy,
    clock: &'a dyn Clock,
    rng: &'a Mutex<StdRng>,
}

impl<'a, S> Assembler<'a, S>
where
    S: InventoryStore + ?Sized,
{
    /// Creates an assembler drawing from the given sources.
    pub const fn new(
        store: &'a S,
        strategy: SequenceStrategy,
        clock: &'a dyn Clock,
        rng: &'a Mutex<StdRng>,
    ) -> Self {
        Self {
            store,
            strategy,
            clock,
            rng,
        }
    }

    /// Assembles one custom ID from `elements`.
    ///
    /// `elements` is expected to be validated and non-empty. Two previews of
    /// the same template generally differ, and a preview says nothing about
    /// the ID a later final assembly produces.
    #[instrument(name = "assembler.assemble", skip(self, elements), fields(elements = elements.len()))]
    pub async fn assemble(
        &self,
        elements: &[CustomIdElement],
        mode: AssemblyMode<'_>,
    ) -> StoreResult<String> {
        let mut ordered: Vec<&CustomIdElement> = elements.iter().collect();
        ordered.sort_by_key(|element| element.order);

        let sequence = if ordered
            .iter()
            .any(|element| element.element_type() == ElementType::Sequence)
        {
            self.resolve_sequence(mode).await?
        } else {
            0
        };

        let context = GenerationContext {
            now: self.clock.now(),
            sequence,
        };
        let custom_id: String = {
            let mut rng = self.rng.lock();
            ordered
                .iter()
                .map(|element| generate::render(element, &mut *rng, &context))
                .collect()
        };
        trace!(custom_id = %custom_id, "[assembler.assembled]");
        Ok(custom_id)
    }

    async fn resolve_sequence(&self, mode: AssemblyMode<'_>) -> StoreResult<u64> {
        let resolver = SequenceResolver::new(self.store, self.strategy);
        match mode {
            AssemblyMode::Preview(Some(inventory_id)) => resolver.peek(inventory_id).await,
            AssemblyMode::Preview(None) => Ok(PREVIEW_PLACEHOLDER),
            AssemblyMode::Final(inventory_id) => resolver.next(inventory_id).await,
        }
    }
}

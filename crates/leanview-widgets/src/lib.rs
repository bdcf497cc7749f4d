#![forbid(unsafe_code)]

//! Display units for lean-aware pages.
//!
//! | Tag | Unit |
//! |-----|------|
//! | `lean-state` | [`StateDisplay`] |
//! | `lean-list` | [`ReactiveList`] |
//! | `lean-selector` | [`Selector`] |
//! | `lean-card` | [`CompositeCard`] |
//! | `lean-block` | [`VariantBlock`] |
//!
//! [`define_all`] registers every tag so [`Runtime::upgrade`] mounts units on
//! server-rendered hosts, including hosts produced by other units' renders.

pub mod composite_card;
pub mod markup;
pub mod reactive_list;
pub mod selector;
pub mod state_display;
pub mod variant_block;

use leanview_runtime::{ComponentKind, Runtime};

pub use composite_card::CompositeCard;
pub use reactive_list::{ListItem, ListPhase, LoadError, ReactiveList, load, load_json};
pub use selector::Selector;
pub use state_display::StateDisplay;
pub use variant_block::VariantBlock;

/// Register every unit under its host tag.
pub fn define_all(runtime: &Runtime) {
    runtime.define::<StateDisplay>(ComponentKind::StateDisplay.tag());
    runtime.define::<ReactiveList>(ComponentKind::ReactiveList.tag());
    runtime.define::<Selector>(ComponentKind::Selector.tag());
    runtime.define::<CompositeCard>(ComponentKind::CompositeCard.tag());
    runtime.define::<VariantBlock>(ComponentKind::VariantBlock.tag());
}

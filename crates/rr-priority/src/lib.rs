//! `rr-priority` — urgency scoring for demand nodes.
//!
//! | Module    | Contents                                               |
//! |-----------|--------------------------------------------------------|
//! | [`model`] | `UrgencyModel`, `priority_cmp`, `ordered_pending`      |
//! | [`error`] | `PriorityError`, `PriorityResult<T>`                   |
//!
//! The model writes normalised urgency back into the [`rr_graph::Graph`]
//! and onto each outstanding [`rr_core::Request`]; the fleet allocator reads
//! the order from [`ordered_pending`].

pub mod error;
pub mod model;


pub use error::{PriorityError, PriorityResult};
pub use model::{UrgencyModel, ordered_pending, priority_cmp};

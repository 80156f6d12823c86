//! `rr-fleet` — vehicles, delivery plans and fleet allocation.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                  |
//! |---------------|-----------------------------------------------------------|
//! | [`vehicle`]   | `Vehicle`, `Leg`, `Stop`, `RouteState`, `MissionLog`      |
//! | [`plan`]      | `DeliveryPlan`, `PlannedStop`, `Unserved`                 |
//! | [`allocator`] | `FleetAllocator` (greedy urgency-ordered assignment)      |
//! | [`refine`]    | `StopOrderRefiner` (Held-Karp / pairwise exchange)        |
//! | [`error`]     | `FleetError`, `FleetResult<T>`                            |
//!
//! # Feature flags
//!
//! | Flag       | Effect                                                   |
//! |------------|----------------------------------------------------------|
//! | `parallel` | Candidate scoring and refinement on Rayon.               |
//! | `serde`    | Derives `Serialize`/`Deserialize` on plan types.         |

pub mod allocator;
pub mod error;
pub mod plan;
pub mod refine;
pub mod vehicle;

#[cfg(test)]
mod tests;

pub use allocator::{Allocation, FleetAllocator};
pub use error::{FleetError, FleetResult};
pub use plan::{DeliveryPlan, PlannedStop, Unserved};
pub use refine::{LegMatrix, Reorder, StopOrderRefiner, exact_order, exchange_order, order_objective};
pub use vehicle::{Delivery, Leg, LegEdit, MissionLog, OnEdge, RouteState, Stop, Vehicle};

//! `rr-core` — foundational types for the `relief_router` engine.
//!
//! This crate is a dependency of every other `rr-*` crate.  It has no `rr-*`
//! dependencies and minimal external ones (only `rand` and `thiserror`, plus
//! optional `serde`).
//!
//! # What lives here
//!
//! | Module      | Contents                                                  |
//! |-------------|-----------------------------------------------------------|
//! | [`ids`]     | `NodeId`, `EdgeId`, `VehicleId`, `RequestId`              |
//! | [`geo`]     | `GeoPoint`, haversine distance                            |
//! | [`time`]    | `Step`, `SimClock`                                        |
//! | [`rng`]     | `SimRng` for generators and event drivers                 |
//! | [`request`] | `Request`, `RequestStatus`, `UnservedReason`              |
//! | [`config`]  | `EngineConfig` and its weight/policy sections             |
//! | [`error`]   | `CoreError`, `CoreResult`                                 |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public types.        |

pub mod config;
pub mod error;
pub mod geo;
pub mod ids;
pub mod request;
pub mod rng;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::{
    CostWeights, DEFAULT_DEGRADED_PENALTY, EngineConfig, RefinePolicy, RefineStrategy,
    UrgencyWeights,
};
pub use error::{CoreError, CoreResult};
pub use geo::GeoPoint;
pub use ids::{EdgeId, NodeId, RequestId, VehicleId};
pub use request::{Request, RequestStatus, UnservedReason};
pub use rng::SimRng;
pub use time::{SimClock, Step};

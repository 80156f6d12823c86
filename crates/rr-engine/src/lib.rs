//! `rr-engine` — step orchestrator for the relief_router engine.
//!
//! # Step loop
//!
//! ```text
//! loop:
//!   step()
//!     ① Events   : drain the edge-event queue into the graph
//!     ② Recovery : NoPathFound requests back to Pending on any recovery
//!     ③ Replan   : repair affected routes; hand back unreachable stops,
//!                  then reopen CapacityExceeded requests that fit again
//!     ④ Urgency  : refresh scores when dirty
//!     ⑤ Allocate : greedy assignment in urgency order
//!     ⑥ Refine   : reorder stops of touched vehicles
//!     ⑦ Homing   : idle vehicles back to the nearest depot
//!   advance(dt)  : move vehicles, deliver, retire exhausted vehicles
//! ```
//!
//! # Cargo features
//!
//! | Feature    | Effect                                                    |
//! |------------|-----------------------------------------------------------|
//! | `parallel` | Route searches in ③ ⑤ ⑥ run on Rayon's thread pool.       |
//! | `serde`    | Derives on configuration, plans and requests.             |
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use rr_core::{NodeId, VehicleId};
//! use rr_engine::{EngineBuilder, NoopObserver};
//!
//! let mut engine = EngineBuilder::new()
//!     .vehicle(VehicleId(0), 40)
//!     .depot(NodeId(0))
//!     .build()?;
//! engine.load_graph(nodes, edges)?;
//! let summary = engine.run(1_000, 10.0, &mut NoopObserver)?;
//! ```

pub mod builder;
pub mod engine;
pub mod error;
pub mod observer;


pub use builder::EngineBuilder;
pub use engine::{Engine, FleetPlans, RunSummary, StepSummary};
pub use error::{EngineError, EngineResult};
pub use observer::{EngineObserver, NoopObserver};

//! `rr-graph` — road graph with mutable edge availability, and routing.
//!
//! # Crate layout
//!
//! | Module      | Contents                                                     |
//! |-------------|--------------------------------------------------------------|
//! | [`network`] | `Graph` (CSR + R-tree), `GraphBuilder`, `NodeSpec`, `EdgeSpec` |
//! | [`state`]   | `EdgeState`, `EdgeStateChange`                               |
//! | [`router`]  | `Router` trait, `Route`, `CostModel`, Dijkstra and A*        |
//! | [`error`]   | `GraphError`, `GraphResult<T>`                               |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                       |
//! |---------|--------------------------------------------------------------|
//! | `serde` | Derives `Serialize`/`Deserialize` on public types.           |

pub mod error;
pub mod network;
pub mod router;
pub mod state;


pub use error::{GraphError, GraphResult};
pub use network::{EdgeSpec, EdgeView, Graph, GraphBuilder, NodeSpec};
pub use router::{AStarRouter, CostModel, DijkstraRouter, Route, RouteMode, Router};
pub use state::{EdgeState, EdgeStateChange, ParseEdgeStateError};

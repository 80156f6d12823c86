//! `rr-replan` — reacting to edge failures.
//!
//! | Module        | Contents                                                   |
//! |---------------|------------------------------------------------------------|
//! | [`queue`]     | `EdgeEventQueue`, `EdgeEventSender` (bounded, coalescing)  |
//! | [`replanner`] | `Replanner`: schedule → compute → commit with generations  |
//! | [`error`]     | `ReplanError`, `ReplanResult<T>`                           |
//!
//! # Feature flags
//!
//! | Flag       | Effect                                                  |
//! |------------|---------------------------------------------------------|
//! | `parallel` | Replan jobs are computed on Rayon.                      |

pub mod error;
pub mod queue;
pub mod replanner;

#[cfg(test)]
mod tests;

pub use error::{ReplanError, ReplanResult};
pub use queue::{EdgeEvent, EdgeEventQueue, EdgeEventSender, SendOutcome};
pub use replanner::{ReplanJob, ReplanOutcome, ReplanReport, Replanner};

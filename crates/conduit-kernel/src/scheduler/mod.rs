//! Scheduler: byte channels, runners and the statement graph engine.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Engine                              │
//! │  block stdin ──▶ ┌────────┐  route  ┌────────┐               │
//! │                  │ stmt 0 │────────▶│ stmt 1 │──▶ block stdout│
//! │                  └────────┘         └────────┘               │
//! │                       │ ;  (barrier: wait, stop on failure)  │
//! │                  ┌────────┐                                  │
//! │                  │ stmt 2 │──────────────────────▶ block stdout│
//! │                  └────────┘                                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every arrow is a [`ByteChannel`]. Each statement is started by the
//! evaluator chain in [`crate::dispatch`] and observed through [`Running`].

mod channel;
mod engine;
mod running;
mod state;

pub use channel::{ByteChannel, ChannelError, Feed, PUMP_CHUNK_SIZE};
pub use engine::Engine;
pub use running::Running;
pub use state::{InvalidTransition, StatementState};

//! Frame chain
//!
//! The chain is the relay's shared data structure: an append-only, singly
//! linked sequence of frames written by exactly one producer and read by any
//! number of consumers without locks.
//!
//! # Architecture
//!
//! ```text
//!    FrameWriter (ingestion)                FrameChain (readers)
//!            │                                     │
//!            │ push()                              │ current()
//!            ▼                                     ▼
//!   ┌─────────┐ next ┌─────────┐ next ┌─────────┐ next ┌─────────┐
//!   │ Frame 0 │─────►│ Frame 1 │─────►│ Frame 2 │─────►│ Frame 3 │ ◄── tail
//!   │ done    │      │ damaged │      │ done    │      │ pending │
//!   └─────────┘      └─────────┘      └─────────┘      └─────────┘
//!        ▲                                 ▲
//!   [sequential cursor]              [latest-join reader]
//! ```
//!
//! # Publication order
//!
//! For every push the successor is linked first, the payload is published
//! second, and the tail pointer moves last. A reader that was waiting on the
//! old tail is woken with the complete payload and finds `next` already in
//! place.
//!
//! # Reclamation
//!
//! Nodes are reference counted. The chain itself only holds the tail (and
//! the latest good frame), so a frame is freed as soon as every consumer
//! cursor has moved past it.

pub mod error;
pub mod frame;
pub mod gate;
pub mod store;

pub use error::ChainError;
pub use frame::Frame;
pub use gate::{CompletionGate, Published};
pub use store::{FrameChain, FrameWriter};

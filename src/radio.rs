//! Parrot Logic
//!
//! State machines and business logic of the parrot.
//! Implements the functional core between the squelch edge and the
//! keyed reply.

pub mod clips;
pub mod control;
pub mod quality;
pub mod recorder;
pub mod transmit;

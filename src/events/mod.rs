//! Delta events: the data that flows from the scheduler to consumers.
//!
//! See the crate docs for the system-level wiring diagram.

mod event;

pub use event::DeltaEvent;

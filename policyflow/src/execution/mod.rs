//! Execution context and the events derived from it.

mod context;
mod events;

pub use context::Execution;
pub use events::{
    DoneListener, EventListener, ExecutionDoneEvent, ExecutionEvent, ExecutionScheduledEvent,
    ScheduledListener,
};

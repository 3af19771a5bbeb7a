//! Background job processing for Noshwork.
//!
//! A [`Dispatcher`] claims leased jobs from the store and routes them to the
//! type-specific handlers. Multiple dispatcher instances may run concurrently
//! with distinct processor ids; the store's fencing keeps them safe.

pub mod dispatcher;
pub mod handlers;

pub use dispatcher::{Dispatcher, TickOutcome};
pub use handlers::Handlers;

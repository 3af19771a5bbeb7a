//! HTTP server for Noshwork.
//!
//! Exposes the job producer and scheduler-tick endpoints, the checkout
//! snapshot endpoint, and the signed payment webhook that drives the
//! [`reconcile::Reconciler`].

pub mod error;
pub mod reconcile;
pub mod routes;
pub mod state;

pub use reconcile::{ReconcileOutcome, Reconciler};
pub use state::AppState;

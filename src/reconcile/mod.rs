//! UUID reconciliation between UCS Manager and Performance Manager

pub mod engine;

mod proptest;

pub use engine::{collapse_discovered, ReconcileOptions, Reconciler, Reconciliation};

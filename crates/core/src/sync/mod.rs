pub mod navigation;
pub mod reconcile;
pub mod runner;
pub mod tables;

pub use navigation::{NavigationOutcome, NavigationRebuilder};
pub use reconcile::{DirectoryReconciler, ReconcileReport};
pub use runner::{PriceSync, RunOutcome, RunReport};
pub use tables::{ensure_system_tables, RetryingStore};

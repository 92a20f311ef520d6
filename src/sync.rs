//! Reading progress synchronisation.

mod debounce;
mod progress;

pub use debounce::{Coalesce, Debouncer};
pub use progress::{Lifecycle, ProgressSync, SyncFailure};

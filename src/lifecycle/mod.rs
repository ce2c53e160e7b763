//! Process lifecycle.
//!
//! # Data Flow
//! ```text
//! startup::initialize
//!     rules file → FileRepository → ResolutionEngine::rebuild (generation 1)
//!
//! startup::run
//!     rebuild loop ─┐
//!     store watcher ├─ all hold a Shutdown receiver
//!     admin API    ─┤
//!     redirect front┘ (bound last, returns when drained)
//!
//! signals
//!     SIGTERM / Ctrl-C → Shutdown::trigger
//! ```
//!
//! A rules file that cannot be read stops startup; a later bad edit only
//! keeps the previous index.

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;

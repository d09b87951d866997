//! # timberline
//!
//! A left-leaning red-black tree multimap with per-key FIFO multiplicity,
//! plus a tick-driven completely fair scheduling simulator built on it.
//!
//! ## Overview
//!
//! The core of this crate is [`multimap::TreeMultimap`], an ordered multimap
//! that keeps all values sharing a key inside one tree node. It supports
//! logarithmic insertion, lookup, removal, and min/max queries while
//! preserving red-black balance through every mutation, including removals
//! that only excise a node once its value multiplicity drops to zero.
//!
//! On top of it, [`scheduler::CfsScheduler`] simulates a completely-fair
//! scheduler that indexes runnable tasks by virtual runtime and always
//! advances the minimum-keyed one.
//!
//! ## Feature Flags
//!
//! - `scheduler` (default): the scheduling simulator
//! - `cli`: the `cfs-sched` binary (implies `scheduler`)
//!
//! ## Example
//!
//! ```rust
//! use timberline::prelude::*;
//!
//! let mut map = TreeMultimap::new();
//! map.insert(5, "oldest");
//! map.insert(5, "newest");
//!
//! assert_eq!(map.len(), 1);
//! assert_eq!(map.get(&5), Ok(&"oldest"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Prelude module for convenient imports.
///
/// Re-exports commonly used types.
///
/// # Usage
///
/// ```rust
/// use timberline::prelude::*;
/// ```
pub mod prelude {
    pub use crate::multimap::{MultimapError, TreeMultimap};

    #[cfg(feature = "scheduler")]
    pub use crate::scheduler::{CfsScheduler, ScheduleError, Task, TickReport};
}

pub mod multimap;

#[cfg(feature = "scheduler")]
pub mod scheduler;

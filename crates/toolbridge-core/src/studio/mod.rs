//! Studios own the connection fleets
//!
//! One studio per transport kind. A failing connection is isolated by
//! default; `InitPolicy::AbortFleet` tears the whole fleet down instead.

mod fleet;
mod report;

pub use fleet::{NetworkStudio, Studio, StudioError, SubprocessStudio};
pub use report::{InitPolicy, InitReport};

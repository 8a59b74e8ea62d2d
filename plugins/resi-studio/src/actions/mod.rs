//! Operator commands bound to control-surface buttons.
//!
//! Both commands take the context's command lock, so a Go Live and a Stop Live for
//! the same pair never interleave their check-then-act sequences.

pub mod go_live;
pub mod stop_live;

pub use go_live::{GoLiveOutcome, GoLiveRequest, go_live, schedule_id_from_location};
pub use stop_live::{NO_SCHEDULE_MESSAGE, StopLiveOutcome, stop_live};

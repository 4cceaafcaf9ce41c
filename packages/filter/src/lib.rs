#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Cascading location filter for the EMIS dashboard.
//!
//! A [`FilterController`] owns one filter bar: the selected state, county,
//! payam and school, the option list at each level, and the statistics for
//! the current selection. Changing a level clears the levels below it and
//! re-fetches, and answers that arrive for a selection the user has
//! already moved away from are dropped.
//!
//! The controller is generic over a [`FilterSource`], so the enrollment
//! overview ([`EnrollmentSource`]) and the cash-transfer page
//! ([`CashTransferSource`]) share the same cascade while showing different
//! statistics.

pub mod controller;
pub mod query;
pub mod source;
pub mod state;

pub use controller::{FilterController, FilterView, PendingRefresh, RefreshOutcome};
pub use query::{DashboardQuery, DashboardTab};
pub use source::{CashTransferSource, EnrollmentSource, FilterSource};
pub use state::{DATABASE_UNAVAILABLE, LoadState};

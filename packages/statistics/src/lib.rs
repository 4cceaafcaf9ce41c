#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Statistics presentation for the EMIS dashboard.
//!
//! Pure functions that turn fetched aggregates into display-ready
//! percentages, ratios, formatted numbers, chart slices, and summary cards.
//! Nothing in this crate performs I/O, and no function panics on partial
//! or degenerate input.

pub mod format;
pub mod learners;
pub mod summary;

pub use format::{
    clamp_percent, clamp_percent_opt, format_amount, format_number, format_percent, format_ratio,
    percent, ratio,
};
pub use learners::{ClassSummary, class_breakdown};
pub use summary::{
    ChartSlice, GenderBreakdown, StatCard, attendance_rate, cash_transfer_cards, disability_rate,
    gender_breakdown, regional_chart, reporting_rate, summary_cards,
};

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Attendance marking for one school's learner list.
//!
//! An [`AttendanceBoard`] loads the learners of a school for a date, keeps
//! the set of selected learners, and marks the selection present or absent
//! in one bulk call. After a successful mark the list is re-fetched for the
//! same date and the selection is cleared; after a failure nothing changes.
//! Either way the outcome is reported once through a [`Notifier`].

pub mod board;

use async_trait::async_trait;
use chrono::NaiveDate;
use emis_api::{ApiError, DashboardClient};
use emis_attendance_models::{MarkAttendanceRequest, MarkAttendanceResponse, Notification};
use emis_school_models::{Learner, SchoolCode};

pub use board::AttendanceBoard;

/// Errors from the marking flow.
#[derive(Debug, thiserror::Error)]
pub enum AttendanceError {
    /// No learner is selected.
    #[error("Select at least one learner first")]
    NothingSelected,

    /// Marking absent without a reason.
    #[error("An absence reason is required")]
    MissingReason,

    /// No school is chosen.
    #[error("No school selected")]
    NoSchool,

    /// The API call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// The two endpoints the marking flow needs.
#[async_trait]
pub trait AttendanceApi: Send + Sync {
    /// Learners of `code` with their marks for `date`.
    async fn learners(&self, code: &SchoolCode, date: NaiveDate) -> Result<Vec<Learner>, ApiError>;

    /// Applies one mark to every learner in `request`.
    async fn mark_bulk(
        &self,
        request: &MarkAttendanceRequest,
    ) -> Result<MarkAttendanceResponse, ApiError>;
}

#[async_trait]
impl AttendanceApi for DashboardClient {
    async fn learners(&self, code: &SchoolCode, date: NaiveDate) -> Result<Vec<Learner>, ApiError> {
        Self::learners(self, code, date).await
    }

    async fn mark_bulk(
        &self,
        request: &MarkAttendanceRequest,
    ) -> Result<MarkAttendanceResponse, ApiError> {
        self.mark_attendance(request).await
    }
}

/// Receives the user-facing outcome of each marking action.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match notification {
            Notification::Success(message) => log::info!("{message}"),
            Notification::Error(message) => log::error!("{message}"),
        }
    }
}

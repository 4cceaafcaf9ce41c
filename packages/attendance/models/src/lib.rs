#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Attendance marking types.
//!
//! Request and response bodies for the learner-list and bulk-mark
//! endpoints, the reasons a learner can be marked absent for, and the
//! notifications the marking flow emits.

use chrono::NaiveDate;
use emis_school_models::SchoolCode;
use emis_school_models::lenient::{first_count, first_text};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Why a learner was absent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AbsenceReason {
    /// Illness.
    Sick,
    /// Family obligations.
    Family,
    /// Flooding, heavy rain, and similar.
    Weather,
    /// Too far from school / no transport.
    Distance,
    /// Free-text reason.
    Other(String),
}

impl AbsenceReason {
    /// The fixed reasons offered in selection prompts.
    pub const KNOWN: [Self; 4] = [Self::Sick, Self::Family, Self::Weather, Self::Distance];

    /// Parses a reason from free text. Known reasons match
    /// case-insensitively; anything else non-empty becomes
    /// [`Self::Other`]. Blank input yields `None`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(
            Self::KNOWN
                .into_iter()
                .find(|r| r.as_str().eq_ignore_ascii_case(trimmed))
                .unwrap_or_else(|| Self::Other(trimmed.to_string())),
        )
    }

    /// Text sent to the API.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Sick => "Sick",
            Self::Family => "Family",
            Self::Weather => "Weather",
            Self::Distance => "Distance",
            Self::Other(text) => text,
        }
    }
}

impl std::fmt::Display for AbsenceReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The mark applied to every learner in one bulk call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttendanceMark {
    /// Present.
    Present,
    /// Absent, with a reason.
    Absent(AbsenceReason),
}

impl AttendanceMark {
    /// `true` for [`Self::Present`].
    #[must_use]
    pub const fn is_present(&self) -> bool {
        matches!(self, Self::Present)
    }

    /// Absence reason, if any.
    #[must_use]
    pub const fn reason(&self) -> Option<&AbsenceReason> {
        match self {
            Self::Present => None,
            Self::Absent(reason) => Some(reason),
        }
    }
}

/// Body of `POST /attendance/getStudentsAttendance`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnersRequest {
    /// School code.
    pub code: SchoolCode,
    /// Attendance date.
    pub date: NaiveDate,
}

/// Body of `POST /attendance/markAttendanceBulk`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAttendanceRequest {
    /// School the learners belong to.
    pub code: SchoolCode,
    /// Learners to mark.
    pub learner_ids: Vec<String>,
    /// Attendance date.
    pub date: NaiveDate,
    /// `true` to mark present, `false` to mark absent.
    pub present: bool,
    /// Required when `present` is `false`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub absence_reason: Option<String>,
}

impl MarkAttendanceRequest {
    /// Builds the request body for applying `mark` to `learner_ids`.
    #[must_use]
    pub fn new(
        code: SchoolCode,
        learner_ids: Vec<String>,
        date: NaiveDate,
        mark: &AttendanceMark,
    ) -> Self {
        Self {
            code,
            learner_ids,
            date,
            present: mark.is_present(),
            absence_reason: mark.reason().map(|r| r.as_str().to_string()),
        }
    }
}

/// Response of the bulk-mark endpoint.
///
/// The update count may sit at the top level or inside a `data` object
/// next to the message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawMarkAttendanceResponse")]
pub struct MarkAttendanceResponse {
    /// Records the server reports as updated.
    pub updated: u64,
    /// Server message, if any.
    pub message: String,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMarkAttendanceResponse {
    updated: Option<Value>,
    modified_count: Option<Value>,
    n_modified: Option<Value>,
    message: Option<Value>,
    data: Option<Value>,
}

impl From<RawMarkAttendanceResponse> for MarkAttendanceResponse {
    fn from(raw: RawMarkAttendanceResponse) -> Self {
        let inner = match raw.data {
            Some(data @ Value::Object(_)) => serde_json::from_value(data).unwrap_or_default(),
            _ => RawMarkAttendanceResponse::default(),
        };
        Self {
            updated: first_count([
                raw.updated,
                raw.modified_count,
                raw.n_modified,
                inner.updated,
                inner.modified_count,
                inner.n_modified,
            ]),
            message: first_text([raw.message, inner.message]),
        }
    }
}

/// A user-facing notification (the dashboard's toast).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The action succeeded.
    Success(String),
    /// The action failed.
    Error(String),
}

impl Notification {
    /// Notification text.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Success(m) | Self::Error(m) => m,
        }
    }
}

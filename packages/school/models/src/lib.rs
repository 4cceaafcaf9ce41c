#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Learner and school record types.
//!
//! Records are parsed once from the upstream JSON into these types. Field
//! name variants and loosely typed values are absorbed during
//! deserialization (see [`lenient`]), so code downstream works with plain
//! fields instead of probing optional paths.

pub mod lenient;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Learner gender as recorded by the enrollment forms.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    /// Male.
    Male,
    /// Female.
    Female,
    /// Missing or unrecognized.
    #[default]
    Unknown,
}

impl Gender {
    /// Parses the spellings seen in the upstream data (`"M"`, `"male"`,
    /// `"Female"`, `"girl"`, ...). Anything else is [`Self::Unknown`].
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "m" | "male" | "boy" | "boys" => Self::Male,
            "f" | "female" | "girl" | "girls" => Self::Female,
            _ => Self::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for Gender {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(value.as_deref().map_or(Self::Unknown, Self::parse))
    }
}

/// Error returned when a school code is not three ASCII letters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid school code {0:?}: expected three letters")]
pub struct InvalidSchoolCode(pub String);

/// A school's three-letter code, normalized to uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchoolCode(String);

impl SchoolCode {
    /// Validates and normalizes a school code.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidSchoolCode`] unless the trimmed input is exactly
    /// three ASCII letters.
    pub fn parse(value: &str) -> Result<Self, InvalidSchoolCode> {
        let trimmed = value.trim();
        if trimmed.len() == 3 && trimmed.bytes().all(|b| b.is_ascii_alphabetic()) {
            Ok(Self(trimmed.to_ascii_uppercase()))
        } else {
            Err(InvalidSchoolCode(value.to_string()))
        }
    }

    /// The normalized code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SchoolCode {
    type Error = InvalidSchoolCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SchoolCode> for String {
    fn from(code: SchoolCode) -> Self {
        code.0
    }
}

impl std::str::FromStr for SchoolCode {
    type Err = InvalidSchoolCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for SchoolCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An enrolled learner together with their attendance mark for the date
/// the list was requested for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLearner", rename_all = "camelCase")]
pub struct Learner {
    /// Stable learner identifier (`learnerUniqueID`, falling back to the
    /// enrollment `reference`).
    pub id: String,
    /// Given name.
    pub first_name: String,
    /// Middle name, often empty.
    pub middle_name: String,
    /// Family name.
    pub last_name: String,
    /// Gender.
    pub gender: Gender,
    /// Whether the learner is recorded as living with a disability.
    pub disability: bool,
    /// Date of birth, when it parses.
    pub dob: Option<NaiveDate>,
    /// Class label (e.g. `"P4"`, `"S2"`); empty when unknown.
    pub class: String,
    /// Attendance mark for the requested date, `None` when not yet marked.
    pub present: Option<bool>,
    /// Recorded absence reason, if marked absent.
    pub absence_reason: Option<String>,
}

impl Learner {
    /// Full name with empty parts skipped.
    #[must_use]
    pub fn full_name(&self) -> String {
        [&self.first_name, &self.middle_name, &self.last_name]
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Age in whole years on `date`, if the date of birth is known.
    #[must_use]
    pub fn age_on(&self, date: NaiveDate) -> Option<u32> {
        self.dob.and_then(|dob| date.years_since(dob))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLearner {
    #[serde(rename = "learnerUniqueID")]
    learner_unique_id: Option<Value>,
    reference: Option<Value>,
    first_name: Option<Value>,
    firstname: Option<Value>,
    middle_name: Option<Value>,
    middlename: Option<Value>,
    last_name: Option<Value>,
    lastname: Option<Value>,
    gender: Option<Value>,
    disability: Option<Value>,
    is_with_disability: Option<Value>,
    dob: Option<Value>,
    class: Option<Value>,
    learner_class: Option<Value>,
    present: Option<Value>,
    attendance: Option<Value>,
    absence_reason: Option<Value>,
}

impl TryFrom<RawLearner> for Learner {
    type Error = String;

    fn try_from(raw: RawLearner) -> Result<Self, Self::Error> {
        let id = lenient::first_text([raw.learner_unique_id, raw.reference])
            .trim()
            .to_string();
        if id.is_empty() {
            return Err("learner record has neither learnerUniqueID nor reference".to_string());
        }

        let present = lenient::first_present([raw.present, raw.attendance]);
        let gender = lenient::first_text([raw.gender]);

        Ok(Self {
            id,
            first_name: lenient::first_text([raw.first_name, raw.firstname]),
            middle_name: lenient::first_text([raw.middle_name, raw.middlename]),
            last_name: lenient::first_text([raw.last_name, raw.lastname]),
            gender: Gender::parse(&gender),
            disability: lenient::first_present([raw.disability, raw.is_with_disability])
                .as_ref()
                .and_then(lenient::value_to_bool)
                .unwrap_or(false),
            dob: parse_date(&lenient::first_text([raw.dob])),
            class: lenient::first_text([raw.class, raw.learner_class]).trim().to_string(),
            present: present.as_ref().and_then(lenient::value_to_bool),
            absence_reason: Some(lenient::first_text([raw.absence_reason]))
                .filter(|r| !r.trim().is_empty()),
        })
    }
}

/// Parses the leading `YYYY-MM-DD` of a date or ISO timestamp.
#[must_use]
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let head = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

/// A school as listed by the dashboard, with its attendance aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawSchool")]
pub struct School {
    /// Three-letter school code.
    pub code: SchoolCode,
    /// School name.
    pub name: String,
    /// State code.
    pub state: Option<String>,
    /// County name.
    pub county: Option<String>,
    /// Payam name.
    pub payam: Option<String>,
    /// Enrolled learners.
    pub learners: u64,
    /// Learners marked present on the reporting date.
    pub present: u64,
    /// Learners marked absent on the reporting date.
    pub absent: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSchool {
    code: Option<Value>,
    name: Option<Value>,
    school: Option<Value>,
    state: Option<Value>,
    state10: Option<Value>,
    county: Option<Value>,
    county28: Option<Value>,
    payam: Option<Value>,
    payam28: Option<Value>,
    learners: Option<Value>,
    total_learners: Option<Value>,
    present: Option<Value>,
    present_count: Option<Value>,
    absent: Option<Value>,
    absent_count: Option<Value>,
}

impl TryFrom<RawSchool> for School {
    type Error = InvalidSchoolCode;

    fn try_from(raw: RawSchool) -> Result<Self, Self::Error> {
        let place = |candidates: [Option<Value>; 2]| {
            Some(lenient::first_text(candidates)).filter(|s| !s.is_empty())
        };
        Ok(Self {
            code: SchoolCode::parse(&lenient::first_text([raw.code]))?,
            name: lenient::first_text([raw.name, raw.school]),
            state: place([raw.state, raw.state10]),
            county: place([raw.county, raw.county28]),
            payam: place([raw.payam, raw.payam28]),
            learners: lenient::first_count([raw.learners, raw.total_learners]),
            present: lenient::first_count([raw.present, raw.present_count]),
            absent: lenient::first_count([raw.absent, raw.absent_count]),
        })
    }
}

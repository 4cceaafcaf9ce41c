//! Typed endpoints of the dashboard API.
//!
//! Responses come back either bare or wrapped in an envelope such as
//! `{ "success": true, "message": "..", "data": ... }` depending on the
//! endpoint; [`list_body`] and [`object_body`] strip the wrapper when it
//! holds the shape the caller expects. List endpoints are parsed item by item so a single
//! malformed record is logged and skipped instead of failing the list.

use chrono::NaiveDate;
use emis_attendance_models::{LearnersRequest, MarkAttendanceRequest, MarkAttendanceResponse};
use emis_location_models::{LocationLevel, LocationNode, LocationSelection, states};
use emis_school_models::{Learner, SchoolCode};
use emis_statistics_models::{CashTransferStats, StatisticsSnapshot};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::retry::{self, RetryPolicy};
use crate::{ApiConfig, ApiError};

/// Endpoint paths, relative to the configured base URL.
pub mod paths {
    /// Counties of a state.
    pub const COUNTIES: &str = "/data-set/get/2023_data/county";
    /// Payams of a county.
    pub const PAYAMS: &str = "/data-set/get/2023_data/payam";
    /// Schools of a payam.
    pub const SCHOOLS: &str = "/data-set/get/2023_data/school";
    /// Enrollment statistics for a selection.
    pub const STATISTICS: &str = "/data-set/get/2023_data/stats";
    /// Cash-transfer stat cards for a selection.
    pub const CASH_TRANSFER_STATS: &str = "/ct/stat-card/data";
    /// Learner list with attendance marks for a school and date.
    pub const LEARNERS_ATTENDANCE: &str = "/attendance/getStudentsAttendance";
    /// Bulk attendance marking.
    pub const MARK_ATTENDANCE_BULK: &str = "/attendance/markAttendanceBulk";
}

/// Client for the dashboard API.
///
/// Cheap to clone: the underlying `reqwest::Client` is reference counted.
#[derive(Debug, Clone)]
pub struct DashboardClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl DashboardClient {
    /// Builds a client from resolved configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Http`] if the TLS backend fails to initialize.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("emis-dashboard/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            retry: config.retry,
        })
    }

    /// Builds a client from the environment (see [`ApiConfig::from_env`]).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] if configuration is missing or invalid.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::new(&ApiConfig::from_env()?)
    }

    /// The configured API root.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn post_json<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<Value, ApiError> {
        let url = self.url(path);
        log::debug!("POST {url}");
        retry::send_json(&self.retry, || self.http.post(&url).json(body)).await
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, ApiError> {
        let url = self.url(path);
        log::debug!("GET {url} {query:?}");
        retry::send_json(&self.retry, || self.http.get(&url).query(query)).await
    }

    /// Counties of `state`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the request fails or the response is not a
    /// list.
    pub async fn counties(&self, state: &str) -> Result<Vec<LocationNode>, ApiError> {
        let body = self.post_json(paths::COUNTIES, &json!({ "state": state })).await?;
        parse_list(body, paths::COUNTIES)
    }

    /// Payams of `county` in `state`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the request fails or the response is not a
    /// list.
    pub async fn payams(&self, state: &str, county: &str) -> Result<Vec<LocationNode>, ApiError> {
        let body = self
            .post_json(paths::PAYAMS, &json!({ "state": state, "county": county }))
            .await?;
        parse_list(body, paths::PAYAMS)
    }

    /// Schools of `payam`. Node ids are school codes.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the request fails or the response is not a
    /// list.
    pub async fn schools(
        &self,
        state: &str,
        county: &str,
        payam: &str,
    ) -> Result<Vec<LocationNode>, ApiError> {
        let body = self
            .post_json(
                paths::SCHOOLS,
                &json!({ "state": state, "county": county, "payam": payam }),
            )
            .await?;
        parse_list(body, paths::SCHOOLS)
    }

    /// Options for `level` under the ancestors in `scope`.
    ///
    /// States come from the fixed table without a request.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] if an ancestor of `level` is
    /// not selected in `scope`, otherwise whatever the endpoint returns.
    pub async fn options(
        &self,
        level: LocationLevel,
        scope: &LocationSelection,
    ) -> Result<Vec<LocationNode>, ApiError> {
        let need = |l: LocationLevel| {
            scope.get(l).ok_or_else(|| ApiError::InvalidRequest {
                message: format!("listing {level} options requires a {l}"),
            })
        };

        match level {
            LocationLevel::State => Ok(states::state_nodes()),
            LocationLevel::County => self.counties(need(LocationLevel::State)?).await,
            LocationLevel::Payam => {
                self.payams(need(LocationLevel::State)?, need(LocationLevel::County)?)
                    .await
            }
            LocationLevel::School => {
                self.schools(
                    need(LocationLevel::State)?,
                    need(LocationLevel::County)?,
                    need(LocationLevel::Payam)?,
                )
                .await
            }
        }
    }

    /// Enrollment statistics scoped to `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] when the API has no data for the
    /// selection, or any other [`ApiError`] on failure.
    pub async fn statistics(
        &self,
        scope: &LocationSelection,
    ) -> Result<StatisticsSnapshot, ApiError> {
        let body = self.post_json(paths::STATISTICS, scope).await?;
        parse_object(body, paths::STATISTICS)
    }

    /// Cash-transfer stat cards scoped to `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] when the API has no data for the
    /// selection, or any other [`ApiError`] on failure.
    pub async fn cash_transfer_stats(
        &self,
        scope: &LocationSelection,
    ) -> Result<CashTransferStats, ApiError> {
        let query: Vec<(&str, &str)> = scope.iter().map(|(l, v)| (l.query_key(), v)).collect();
        let body = self.get_json(paths::CASH_TRANSFER_STATS, &query).await?;
        parse_object(body, paths::CASH_TRANSFER_STATS)
    }

    /// Learners of school `code` with their attendance marks for `date`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] if the request fails or the response is not a
    /// list.
    pub async fn learners(
        &self,
        code: &SchoolCode,
        date: NaiveDate,
    ) -> Result<Vec<Learner>, ApiError> {
        let request = LearnersRequest {
            code: code.clone(),
            date,
        };
        let body = self.post_json(paths::LEARNERS_ATTENDANCE, &request).await?;
        parse_list(body, paths::LEARNERS_ATTENDANCE)
    }

    /// Marks every learner in `request` present or absent.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidRequest`] for an empty learner list or an
    /// absence without a reason, otherwise whatever the endpoint returns.
    pub async fn mark_attendance(
        &self,
        request: &MarkAttendanceRequest,
    ) -> Result<MarkAttendanceResponse, ApiError> {
        if request.learner_ids.is_empty() {
            return Err(ApiError::InvalidRequest {
                message: "no learners to mark".to_string(),
            });
        }
        if !request.present && request.absence_reason.as_deref().is_none_or(str::is_empty) {
            return Err(ApiError::InvalidRequest {
                message: "marking absent requires a reason".to_string(),
            });
        }

        log::info!(
            "Marking {} learner(s) {} at {} for {}",
            request.learner_ids.len(),
            if request.present { "present" } else { "absent" },
            request.code,
            request.date
        );
        let body = self.post_json(paths::MARK_ATTENDANCE_BULK, request).await?;
        parse_document(body, paths::MARK_ATTENDANCE_BULK)
    }
}

/// Keys an envelope may carry its payload under.
const ENVELOPE_KEYS: [&str; 2] = ["data", "results"];

/// The list inside a response: the body itself, or the first envelope key
/// that holds an array.
#[must_use]
pub fn list_body(value: Value) -> Value {
    match value {
        Value::Object(mut map) => {
            let key = ENVELOPE_KEYS
                .into_iter()
                .find(|key| map.get(*key).is_some_and(Value::is_array));
            match key.and_then(|key| map.remove(key)) {
                Some(inner) => inner,
                None => Value::Object(map),
            }
        }
        other => other,
    }
}

/// The object inside a response: the `data` object when the body wraps
/// one, otherwise the body itself.
#[must_use]
pub fn object_body(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.get("data").is_some_and(Value::is_object) => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Parses a list response, skipping (and logging) records that do not
/// parse.
///
/// # Errors
///
/// Returns [`ApiError::Parse`] if the (unwrapped) body is not an array.
pub fn parse_list<T: DeserializeOwned>(body: Value, path: &str) -> Result<Vec<T>, ApiError> {
    let items = match list_body(body) {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => {
            return Err(ApiError::Parse {
                url: path.to_string(),
                message: format!("expected a list, got {}", kind(&other)),
            });
        }
    };

    let total = items.len();
    let parsed: Vec<T> = items
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| match serde_json::from_value(item) {
            Ok(v) => Some(v),
            Err(e) => {
                log::warn!("{path}: skipping record {i}: {e}");
                None
            }
        })
        .collect();

    if parsed.len() < total {
        log::warn!("{path}: parsed {}/{total} records", parsed.len());
    }
    Ok(parsed)
}

/// Parses an object response. `null` parses as the type's default shape
/// when `T` accepts an empty object.
///
/// # Errors
///
/// Returns [`ApiError::Parse`] if the (unwrapped) body does not
/// deserialize as `T`.
pub fn parse_object<T: DeserializeOwned>(body: Value, path: &str) -> Result<T, ApiError> {
    parse_document(object_body(body), path)
}

/// Parses a whole response body as `T`, envelope included. `null` parses
/// as an empty object.
///
/// # Errors
///
/// Returns [`ApiError::Parse`] if the body does not deserialize as `T`.
pub fn parse_document<T: DeserializeOwned>(body: Value, path: &str) -> Result<T, ApiError> {
    let value = match body {
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other,
    };
    serde_json::from_value(value).map_err(|e| ApiError::Parse {
        url: path.to_string(),
        message: e.to_string(),
    })
}

const fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

//! Per-widget load state.

use emis_api::ApiError;

/// Message shown in place of any widget while the API's database is down.
pub const DATABASE_UNAVAILABLE: &str =
    "Database connection issue: the dashboard cannot reach its data right now";

/// Where one piece of dashboard data stands.
///
/// Option lists and statistics each carry one of these. A 404 from the API
/// is not a failure: it means the filter matched nothing, and becomes
/// [`LoadState::Empty`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoadState<T> {
    /// Nothing requested (the level above is not selected).
    #[default]
    Idle,
    /// A request is in flight.
    Loading,
    /// Data arrived.
    Loaded(T),
    /// The API has no data for the current filter.
    Empty,
    /// The request failed; holds the message shown in place of the data.
    Failed(String),
    /// The API cannot reach its database. Unlike [`LoadState::Failed`]
    /// this takes over the whole dashboard, not one widget.
    Unavailable,
}

impl<T> LoadState<T> {
    /// Maps a fetch result onto a load state, logging failures.
    #[must_use]
    pub fn from_result(result: Result<T, ApiError>, what: &str) -> Self {
        match result {
            Ok(value) => Self::Loaded(value),
            Err(e) if e.is_not_found() => {
                log::debug!("No {what} for the current filter");
                Self::Empty
            }
            Err(e) => Self::from_error(&e, what),
        }
    }

    /// Maps a failure other than 404 onto a load state, logging it.
    #[must_use]
    pub fn from_error(error: &ApiError, what: &str) -> Self {
        log::error!("Failed to load {what}: {error}");
        if error.is_database_unavailable() {
            Self::Unavailable
        } else {
            Self::Failed(error.to_string())
        }
    }

    /// `true` while a request is in flight.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// `true` when the API reported its database as unreachable.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable)
    }

    /// The loaded value, if any.
    #[must_use]
    pub const fn loaded(&self) -> Option<&T> {
        match self {
            Self::Loaded(value) => Some(value),
            _ => None,
        }
    }

    /// The failure message, if the last request failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            Self::Unavailable => Some(DATABASE_UNAVAILABLE),
            _ => None,
        }
    }
}

impl<T: Clone + Default> LoadState<T> {
    /// What a widget should render: the loaded value, or the default
    /// (all-zero) value in every other state.
    #[must_use]
    pub fn display_value(&self) -> T {
        self.loaded().cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_empty_not_failed() {
        let state: LoadState<u32> = LoadState::from_result(
            Err(ApiError::NotFound {
                url: "http://x/ct/stat-card/data".to_string(),
            }),
            "stats",
        );
        assert_eq!(state, LoadState::Empty);
        assert_eq!(state.display_value(), 0);
    }

    #[test]
    fn other_errors_keep_their_message() {
        let state: LoadState<u32> = LoadState::from_result(
            Err(ApiError::InvalidRequest {
                message: "no state".to_string(),
            }),
            "counties",
        );
        assert_eq!(state.error(), Some("Invalid request: no state"));
        assert_eq!(state.display_value(), 0);
    }

    #[test]
    fn database_outage_is_its_own_state() {
        let state: LoadState<u32> = LoadState::from_result(
            Err(ApiError::DatabaseUnavailable {
                url: "http://x/data-set/get/2023_data/stats".to_string(),
            }),
            "stats",
        );
        assert_eq!(state, LoadState::Unavailable);
        assert!(state.is_unavailable());
        assert_eq!(state.error(), Some(DATABASE_UNAVAILABLE));
        assert_eq!(state.display_value(), 0);
    }

    #[test]
    fn loaded_value_is_displayed() {
        let state = LoadState::from_result(Ok(7_u32), "stats");
        assert_eq!(state.loaded(), Some(&7));
        assert_eq!(state.display_value(), 7);
        assert!(!state.is_loading());
    }
}

//! Mirroring the dashboard filter into a URL query string.
//!
//! A dashboard link carries the whole filter: `state`, `county`, `payam`,
//! `code` (school), plus the active `tab` and `year`. Writing a query
//! replaces those keys and leaves every other query parameter alone, so
//! links survive being embedded in pages that add their own parameters.

use std::str::FromStr;

use emis_location_models::states::resolve_state;
use emis_location_models::{LocationLevel, LocationSelection};
use reqwest::Url;

/// Query keys owned by the dashboard.
pub const MANAGED_KEYS: [&str; 6] = ["state", "county", "payam", "code", "tab", "year"];

const PLACEHOLDER_BASE: &str = "http://dashboard.invalid/";

/// A dashboard page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum DashboardTab {
    /// Enrollment summary cards and the regional chart.
    Overview,
    /// Enrollment by gender and disability.
    Enrollment,
    /// Learner attendance for one school.
    Attendance,
    /// Cash-transfer programme cards.
    CashTransfer,
    /// Teacher counts.
    Teachers,
}

impl DashboardTab {
    /// Every tab, in menu order.
    pub const ALL: [Self; 5] = [
        Self::Overview,
        Self::Enrollment,
        Self::Attendance,
        Self::CashTransfer,
        Self::Teachers,
    ];

    /// Menu label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Overview => "Overview",
            Self::Enrollment => "Enrollment",
            Self::Attendance => "Attendance",
            Self::CashTransfer => "Cash transfer",
            Self::Teachers => "Teachers",
        }
    }
}

/// Everything a dashboard link encodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardQuery {
    /// Location filter. Always consistent after parsing.
    pub selection: LocationSelection,
    /// Active tab.
    pub tab: Option<DashboardTab>,
    /// Reporting year.
    pub year: Option<u16>,
}

impl DashboardQuery {
    /// Reads the dashboard keys from `url`'s query string.
    ///
    /// Unknown tabs and unparseable years are ignored. A location level
    /// given without its parent is dropped along with everything below
    /// it, so `?state=CES&payam=Kator` restores just the state.
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        let mut raw: [Option<String>; 4] = Default::default();
        let mut query = Self::default();

        for (key, value) in url.query_pairs() {
            if let Some(level) = LocationLevel::ALL.into_iter().find(|l| l.query_key() == key) {
                raw[level.depth()] = Some(value.into_owned());
            } else if key == "tab" {
                query.tab = DashboardTab::from_str(value.trim()).ok();
            } else if key == "year" {
                query.year = value.trim().parse().ok();
            }
        }

        let mut selection = LocationSelection::default();
        for level in LocationLevel::ALL {
            let value = raw[level.depth()].take().map(|v| match level {
                LocationLevel::State => resolve_state(&v).map_or(v, str::to_string),
                LocationLevel::School => v.trim().to_ascii_uppercase(),
                _ => v,
            });
            selection.set(level, value);
        }
        query.selection = selection.into_consistent();
        query
    }

    /// Parses either a full URL or a bare query such as `?state=CES`.
    ///
    /// Returns `None` only when `input` cannot be read as either.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        let url = Url::parse(input).or_else(|_| {
            let relative = if input.starts_with('?') {
                input.to_string()
            } else {
                format!("?{input}")
            };
            Url::parse(PLACEHOLDER_BASE).and_then(|base| base.join(&relative))
        });
        url.ok().map(|url| Self::from_url(&url))
    }

    /// The query pairs this query writes, in a stable order.
    #[must_use]
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs: Vec<(&'static str, String)> = self
            .selection
            .iter()
            .map(|(level, value)| (level.query_key(), value.to_string()))
            .collect();
        if let Some(tab) = self.tab {
            pairs.push(("tab", tab.to_string()));
        }
        if let Some(year) = self.year {
            pairs.push(("year", year.to_string()));
        }
        pairs
    }

    /// Writes this query into `url`, replacing the dashboard keys and
    /// keeping every other parameter in its original order.
    pub fn write_to(&self, url: &mut Url) {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !MANAGED_KEYS.contains(&key.as_ref()))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        let ours = self.pairs();

        if kept.is_empty() && ours.is_empty() {
            url.set_query(None);
            return;
        }

        let mut serializer = url.query_pairs_mut();
        serializer.clear();
        for (key, value) in &kept {
            serializer.append_pair(key, value);
        }
        for (key, value) in &ours {
            serializer.append_pair(key, value);
        }
    }

    /// Returns a copy of `base` carrying this query.
    #[must_use]
    pub fn to_url(&self, base: &Url) -> Url {
        let mut url = base.clone();
        self.write_to(&mut url);
        url
    }

    /// The encoded query string without a leading `?`.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        Url::parse(PLACEHOLDER_BASE)
            .map(|base| self.to_url(&base).query().unwrap_or_default().to_string())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn tabs_use_kebab_case() {
        assert_eq!(DashboardTab::CashTransfer.to_string(), "cash-transfer");
        assert_eq!(
            DashboardTab::from_str("Cash-Transfer").unwrap(),
            DashboardTab::CashTransfer
        );
        assert!(DashboardTab::from_str("finance").is_err());
    }

    #[test]
    fn reads_full_filter() {
        let query = DashboardQuery::from_url(&url(
            "https://dash.example.org/?state=ces&county=Juba&payam=Kator&code=abc&tab=attendance&year=2023",
        ));
        assert_eq!(query.selection.state.as_deref(), Some("CES"));
        assert_eq!(query.selection.county.as_deref(), Some("Juba"));
        assert_eq!(query.selection.payam.as_deref(), Some("Kator"));
        assert_eq!(query.selection.school.as_deref(), Some("ABC"));
        assert_eq!(query.tab, Some(DashboardTab::Attendance));
        assert_eq!(query.year, Some(2023));
    }

    #[test]
    fn drops_levels_without_a_parent() {
        let query = DashboardQuery::parse("?state=CES&payam=Kator&code=ABC").unwrap();
        assert_eq!(query.selection.state.as_deref(), Some("CES"));
        assert!(query.selection.county.is_none());
        assert!(query.selection.payam.is_none());
        assert!(query.selection.school.is_none());
    }

    #[test]
    fn ignores_bad_tab_and_year() {
        let query = DashboardQuery::parse("tab=finance&year=last").unwrap();
        assert_eq!(query, DashboardQuery::default());
    }

    #[test]
    fn write_keeps_unrelated_params() {
        let mut target = url("https://dash.example.org/?lang=en&county=Old&utm=x");
        let query = DashboardQuery {
            selection: LocationSelection::default().with(LocationLevel::State, "EES"),
            tab: Some(DashboardTab::CashTransfer),
            year: None,
        };
        query.write_to(&mut target);
        assert_eq!(target.query(), Some("lang=en&utm=x&state=EES&tab=cash-transfer"));
    }

    #[test]
    fn empty_query_removes_the_question_mark() {
        let mut target = url("https://dash.example.org/?state=CES");
        DashboardQuery::default().write_to(&mut target);
        assert_eq!(target.as_str(), "https://dash.example.org/");
    }

    #[test]
    fn written_links_read_back() {
        let query = DashboardQuery {
            selection: LocationSelection::default()
                .with(LocationLevel::State, "CES")
                .with(LocationLevel::County, "Juba")
                .with(LocationLevel::Payam, "Juba Town"),
            tab: Some(DashboardTab::Overview),
            year: Some(2023),
        };
        assert_eq!(
            query.to_query_string(),
            "state=CES&county=Juba&payam=Juba+Town&tab=overview&year=2023"
        );
        assert_eq!(
            DashboardQuery::parse(&query.to_query_string()),
            Some(query)
        );
    }
}

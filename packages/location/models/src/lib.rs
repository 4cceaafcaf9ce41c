#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Location hierarchy types for the EMIS dashboard.
//!
//! Locations form a strict four-level hierarchy: state ⊃ county ⊃ payam ⊃
//! school. A [`LocationSelection`] holds at most one value per level and
//! keeps itself consistent: setting a level always clears every level
//! below it.

pub mod states;

use serde::{Deserialize, Serialize};

/// One level of the location hierarchy, ordered from broadest to
/// narrowest.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LocationLevel {
    /// Top level. The option list is fixed (see [`states`]).
    State,
    /// Subdivision of a state.
    County,
    /// Subdivision of a county.
    Payam,
    /// Leaf level, identified by a three-letter school code.
    School,
}

impl LocationLevel {
    /// All levels, broadest first.
    pub const ALL: [Self; 4] = [Self::State, Self::County, Self::Payam, Self::School];

    /// Zero-based depth in the hierarchy (`State` is 0).
    #[must_use]
    pub const fn depth(self) -> usize {
        match self {
            Self::State => 0,
            Self::County => 1,
            Self::Payam => 2,
            Self::School => 3,
        }
    }

    /// The next narrower level, or `None` for [`Self::School`].
    #[must_use]
    pub const fn child(self) -> Option<Self> {
        match self {
            Self::State => Some(Self::County),
            Self::County => Some(Self::Payam),
            Self::Payam => Some(Self::School),
            Self::School => None,
        }
    }

    /// The next broader level, or `None` for [`Self::State`].
    #[must_use]
    pub const fn parent(self) -> Option<Self> {
        match self {
            Self::State => None,
            Self::County => Some(Self::State),
            Self::Payam => Some(Self::County),
            Self::School => Some(Self::Payam),
        }
    }

    /// Key under which this level is mirrored in a dashboard URL.
    ///
    /// Schools are keyed by their code, hence `code` rather than `school`.
    #[must_use]
    pub const fn query_key(self) -> &'static str {
        match self {
            Self::State => "state",
            Self::County => "county",
            Self::Payam => "payam",
            Self::School => "code",
        }
    }

    /// Human-readable label used in prompts and headings.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::State => "State",
            Self::County => "County",
            Self::Payam => "Payam",
            Self::School => "School",
        }
    }

    /// Levels strictly below this one, broadest first.
    pub fn descendants(self) -> impl Iterator<Item = Self> {
        Self::ALL.into_iter().filter(move |l| *l > self)
    }
}

/// A single selectable location at any level of the hierarchy.
///
/// The upstream API is inconsistent about field names (`_id`, `id`, `code`
/// for identifiers; `name`, `label`, or the level name itself for display
/// names) and sometimes returns bare strings. All of those shapes are
/// accepted here so nothing downstream has to guess.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawLocationNode")]
pub struct LocationNode {
    /// Value sent back to the API when this node is selected.
    pub id: String,
    /// Display name.
    pub name: String,
}

impl LocationNode {
    /// Creates a node whose id and name are the same string.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLocationNode {
    Bare(String),
    Record(RawLocationRecord),
}

/// Every field the API has been seen to use, kept apart so a record that
/// carries several of them (`_id` and `code`, `school` and `county`) still
/// deserializes.
#[derive(Deserialize)]
struct RawLocationRecord {
    code: Option<serde_json::Value>,
    id: Option<serde_json::Value>,
    #[serde(rename = "_id")]
    object_id: Option<serde_json::Value>,
    name: Option<serde_json::Value>,
    label: Option<serde_json::Value>,
    school: Option<serde_json::Value>,
    payam: Option<serde_json::Value>,
    county: Option<serde_json::Value>,
    state: Option<serde_json::Value>,
}

fn scalar(value: Option<serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl From<RawLocationRecord> for LocationNode {
    fn from(raw: RawLocationRecord) -> Self {
        // Narrowest level first: a school row also names its county.
        let name = scalar(raw.name)
            .or_else(|| scalar(raw.label))
            .or_else(|| scalar(raw.school))
            .or_else(|| scalar(raw.payam))
            .or_else(|| scalar(raw.county))
            .or_else(|| scalar(raw.state));
        let id = scalar(raw.code)
            .or_else(|| scalar(raw.id))
            .or_else(|| scalar(raw.object_id));

        match (id, name) {
            (Some(id), Some(name)) => Self { id, name },
            (Some(id), None) => Self::named(id),
            (None, Some(name)) => Self::named(name),
            (None, None) => Self::named(String::new()),
        }
    }
}

impl From<RawLocationNode> for LocationNode {
    fn from(raw: RawLocationNode) -> Self {
        match raw {
            RawLocationNode::Bare(name) => Self::named(name),
            RawLocationNode::Record(record) => record.into(),
        }
    }
}

/// The currently chosen value at each level of the hierarchy.
///
/// Values are normalized on the way in: surrounding whitespace is trimmed
/// and empty strings count as "not selected".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSelection {
    /// Selected state code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Selected county.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,
    /// Selected payam.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payam: Option<String>,
    /// Selected school code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(rename = "code")]
    pub school: Option<String>,
}

impl LocationSelection {
    /// Returns the selected value at `level`.
    #[must_use]
    pub fn get(&self, level: LocationLevel) -> Option<&str> {
        self.slot(level).as_deref()
    }

    /// Sets `level` to `value` and clears every narrower level.
    ///
    /// Passing `None` (or an empty string) clears `level` as well.
    pub fn set(&mut self, level: LocationLevel, value: Option<String>) {
        *self.slot_mut(level) = normalize(value);
        self.clear_below(level);
    }

    /// Builder form of [`Self::set`].
    #[must_use]
    pub fn with(mut self, level: LocationLevel, value: impl Into<String>) -> Self {
        self.set(level, Some(value.into()));
        self
    }

    /// Clears every level narrower than `level`.
    pub fn clear_below(&mut self, level: LocationLevel) {
        for descendant in level.descendants() {
            *self.slot_mut(descendant) = None;
        }
    }

    /// Returns a copy containing only `level` and the levels above it.
    #[must_use]
    pub fn scoped_to(&self, level: LocationLevel) -> Self {
        let mut scoped = self.clone();
        scoped.clear_below(level);
        scoped
    }

    /// The narrowest level that has a value, if any.
    #[must_use]
    pub fn deepest(&self) -> Option<LocationLevel> {
        LocationLevel::ALL
            .into_iter()
            .rev()
            .find(|l| self.get(*l).is_some())
    }

    /// `true` when nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deepest().is_none()
    }

    /// `true` when no level is set while one of its ancestors is unset.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let mut gap = false;
        for level in LocationLevel::ALL {
            match (self.get(level).is_some(), gap) {
                (true, true) => return false,
                (false, _) => gap = true,
                (true, false) => {}
            }
        }
        true
    }

    /// Drops everything after the first unset level so the result is
    /// always consistent.
    #[must_use]
    pub fn into_consistent(mut self) -> Self {
        if let Some(first_gap) = LocationLevel::ALL
            .into_iter()
            .find(|l| self.get(*l).is_none())
        {
            self.clear_below(first_gap);
        }
        self
    }

    /// Iterates the set levels, broadest first.
    pub fn iter(&self) -> impl Iterator<Item = (LocationLevel, &str)> {
        LocationLevel::ALL
            .into_iter()
            .filter_map(|l| self.get(l).map(|v| (l, v)))
    }

    const fn slot(&self, level: LocationLevel) -> &Option<String> {
        match level {
            LocationLevel::State => &self.state,
            LocationLevel::County => &self.county,
            LocationLevel::Payam => &self.payam,
            LocationLevel::School => &self.school,
        }
    }

    const fn slot_mut(&mut self, level: LocationLevel) -> &mut Option<String> {
        match level {
            LocationLevel::State => &mut self.state,
            LocationLevel::County => &mut self.county,
            LocationLevel::Payam => &mut self.payam,
            LocationLevel::School => &mut self.school,
        }
    }
}

impl std::fmt::Display for LocationSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<&str> = self.iter().map(|(_, v)| v).collect();
        if parts.is_empty() {
            write!(f, "All locations")
        } else {
            write!(f, "{}", parts.join(" / "))
        }
    }
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

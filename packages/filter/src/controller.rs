//! The cascading filter controller.
//!
//! Every change goes through two steps. [`FilterController::begin`] (and its
//! `restore`/`refresh` siblings) updates the selection synchronously: lower
//! levels are cleared, the affected lists are marked loading, and the new
//! view is published. The returned [`PendingRefresh`] then fetches the
//! child options and the statistics concurrently.
//!
//! Each begin step takes a new generation number and stamps every slot it
//! touches with it. A response is only written into a slot whose stamp
//! still matches the generation that requested it, so a slow answer for
//! an old selection can never overwrite data for a newer one, while a
//! slot the newer selection did not touch still receives its answer.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use emis_api::ApiError;
use emis_location_models::states::state_nodes;
use emis_location_models::{LocationLevel, LocationNode, LocationSelection};
use futures::future::{join, join_all};
use tokio::sync::watch;

use crate::query::{DashboardQuery, DashboardTab};
use crate::source::FilterSource;
use crate::state::LoadState;

/// Everything a filter bar and its statistics widgets render.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterView<T> {
    /// Current location filter. Always consistent.
    pub selection: LocationSelection,
    /// Active tab.
    pub tab: Option<DashboardTab>,
    /// Reporting year.
    pub year: Option<u16>,
    /// Statistics for the current selection.
    pub statistics: LoadState<T>,
    /// Generation of the most recent change.
    pub generation: u64,
    options: [LoadState<Vec<LocationNode>>; 4],
}

impl<T> FilterView<T> {
    fn new() -> Self {
        Self {
            selection: LocationSelection::default(),
            tab: None,
            year: None,
            statistics: LoadState::Idle,
            generation: 0,
            options: [
                LoadState::Loaded(state_nodes()),
                LoadState::Idle,
                LoadState::Idle,
                LoadState::Idle,
            ],
        }
    }

    /// Load state of the option list for `level`.
    #[must_use]
    pub const fn options(&self, level: LocationLevel) -> &LoadState<Vec<LocationNode>> {
        &self.options[level.depth()]
    }

    /// The selectable options for `level`; empty unless loaded.
    #[must_use]
    pub fn choices(&self, level: LocationLevel) -> &[LocationNode] {
        self.options(level).loaded().map_or(&[], Vec::as_slice)
    }

    /// `true` when any slot found the API's database unreachable, so the
    /// whole dashboard should show the outage screen.
    #[must_use]
    pub fn database_unavailable(&self) -> bool {
        self.statistics.is_unavailable() || self.options.iter().any(LoadState::is_unavailable)
    }

    /// The link query describing this view.
    #[must_use]
    pub fn query(&self) -> DashboardQuery {
        DashboardQuery {
            selection: self.selection.clone(),
            tab: self.tab,
            year: self.year,
        }
    }
}

impl<T: Clone + Default> FilterView<T> {
    /// Statistics to render: the loaded snapshot, or the all-zero value
    /// while loading, on 404 and on failure.
    #[must_use]
    pub fn displayed_statistics(&self) -> T {
        self.statistics.display_value()
    }
}

/// Result of running a [`PendingRefresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// Generation the refresh was started for.
    pub generation: u64,
    /// Responses written into the view.
    pub applied: usize,
    /// Responses dropped because a newer change re-requested their slot.
    pub discarded: usize,
}

impl RefreshOutcome {
    /// `true` when every response was dropped.
    #[must_use]
    pub const fn is_superseded(&self) -> bool {
        self.applied == 0 && self.discarded > 0
    }
}

struct Shared<T> {
    view: FilterView<T>,
    option_stamps: [u64; 4],
    statistics_stamp: u64,
}

impl<T> Shared<T> {
    fn next_generation(&mut self) -> u64 {
        self.view.generation += 1;
        self.view.generation
    }

    fn stamp_options(
        &mut self,
        level: LocationLevel,
        generation: u64,
        state: LoadState<Vec<LocationNode>>,
    ) {
        self.view.options[level.depth()] = state;
        self.option_stamps[level.depth()] = generation;
    }

    fn stamp_statistics(&mut self, generation: u64) {
        self.view.statistics = LoadState::Loading;
        self.statistics_stamp = generation;
    }
}

/// Owns one filter bar: its selection, option lists and statistics.
pub struct FilterController<S: FilterSource> {
    source: Arc<S>,
    shared: Arc<Mutex<Shared<S::Statistics>>>,
    updates: Arc<watch::Sender<FilterView<S::Statistics>>>,
}

impl<S: FilterSource> Clone for FilterController<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            shared: Arc::clone(&self.shared),
            updates: Arc::clone(&self.updates),
        }
    }
}

impl<S: FilterSource> FilterController<S> {
    /// Creates a controller with nothing selected. Only the state list is
    /// available until [`Self::refresh`] or a selection runs.
    #[must_use]
    pub fn new(source: S) -> Self {
        let view = FilterView::new();
        let (updates, _) = watch::channel(view.clone());
        Self {
            source: Arc::new(source),
            shared: Arc::new(Mutex::new(Shared {
                view,
                option_stamps: [0; 4],
                statistics_stamp: 0,
            })),
            updates: Arc::new(updates),
        }
    }

    /// The data source.
    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// A copy of the current view.
    #[must_use]
    pub fn snapshot(&self) -> FilterView<S::Statistics> {
        self.lock().view.clone()
    }

    /// Receives every published view, starting with the current one.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<FilterView<S::Statistics>> {
        self.updates.subscribe()
    }

    /// The link query for the current view.
    #[must_use]
    pub fn query(&self) -> DashboardQuery {
        self.lock().view.query()
    }

    /// Statistics to render for the current view.
    #[must_use]
    pub fn displayed_statistics(&self) -> S::Statistics {
        self.lock().view.displayed_statistics()
    }

    /// Sets `level` to `value` (or clears it) and prepares the fetches the
    /// change needs.
    ///
    /// Every level below `level` is cleared along with its option list.
    /// When a value is set, the next level's options are marked loading.
    /// Statistics are always re-requested. A value for a level whose
    /// parent is unset is dropped.
    pub fn begin(&self, level: LocationLevel, value: Option<String>) -> PendingRefresh<S> {
        let mut shared = self.lock();

        let mut selection = shared.view.selection.clone();
        selection.set(level, value);
        shared.view.selection = selection.into_consistent();

        let generation = shared.next_generation();
        for descendant in level.descendants() {
            shared.stamp_options(descendant, generation, LoadState::Idle);
        }

        let mut levels = Vec::new();
        if shared.view.selection.get(level).is_some()
            && let Some(child) = level.child()
        {
            shared.stamp_options(child, generation, LoadState::Loading);
            levels.push(child);
        }
        shared.stamp_statistics(generation);

        log::debug!(
            "Filter #{generation}: {level} -> {:?} ({})",
            shared.view.selection.get(level),
            shared.view.selection
        );
        self.pending(&shared, generation, levels)
    }

    /// Sets `level` and waits for the resulting fetches.
    pub async fn select(&self, level: LocationLevel, value: Option<String>) -> RefreshOutcome {
        self.begin(level, value).run().await
    }

    /// Replaces the whole view with `query`, as when opening a link, and
    /// prepares one fetch per level that has a selected parent plus the
    /// statistics.
    pub fn begin_restore(&self, query: DashboardQuery) -> PendingRefresh<S> {
        let mut shared = self.lock();

        shared.view.selection = query.selection.into_consistent();
        shared.view.tab = query.tab;
        shared.view.year = query.year;

        let generation = shared.next_generation();
        let mut levels = Vec::new();
        for level in LocationLevel::State.descendants() {
            let parent_selected = level
                .parent()
                .is_some_and(|p| shared.view.selection.get(p).is_some());
            if parent_selected {
                shared.stamp_options(level, generation, LoadState::Loading);
                levels.push(level);
            } else {
                shared.stamp_options(level, generation, LoadState::Idle);
            }
        }
        shared.stamp_statistics(generation);

        log::debug!(
            "Filter #{generation}: restoring {} ({} option lists)",
            shared.view.selection,
            levels.len()
        );
        self.pending(&shared, generation, levels)
    }

    /// Restores `query` and waits for every fetch.
    pub async fn restore(&self, query: DashboardQuery) -> RefreshOutcome {
        self.begin_restore(query).run().await
    }

    /// Re-fetches everything the current selection shows.
    pub fn begin_refresh(&self) -> PendingRefresh<S> {
        let query = self.query();
        self.begin_restore(query)
    }

    /// Re-fetches everything and waits for it.
    pub async fn refresh(&self) -> RefreshOutcome {
        self.begin_refresh().run().await
    }

    /// Switches tabs. Nothing is fetched.
    pub fn set_tab(&self, tab: Option<DashboardTab>) {
        let mut shared = self.lock();
        shared.view.tab = tab;
        self.publish(&shared);
    }

    /// Changes the reporting year. Nothing is fetched.
    pub fn set_year(&self, year: Option<u16>) {
        let mut shared = self.lock();
        shared.view.year = year;
        self.publish(&shared);
    }

    fn pending(
        &self,
        shared: &Shared<S::Statistics>,
        generation: u64,
        levels: Vec<LocationLevel>,
    ) -> PendingRefresh<S> {
        self.publish(shared);
        PendingRefresh {
            controller: self.clone(),
            generation,
            selection: shared.view.selection.clone(),
            levels,
        }
    }

    fn apply(
        &self,
        generation: u64,
        options: Vec<(LocationLevel, Result<Vec<LocationNode>, ApiError>)>,
        statistics: Result<S::Statistics, ApiError>,
    ) -> RefreshOutcome {
        let mut shared = self.lock();
        let mut outcome = RefreshOutcome {
            generation,
            applied: 0,
            discarded: 0,
        };

        for (level, result) in options {
            if shared.option_stamps[level.depth()] == generation {
                shared.view.options[level.depth()] = LoadState::from_result(result, level.label());
                outcome.applied += 1;
            } else {
                log::debug!("Filter #{generation}: discarding stale {level} options");
                outcome.discarded += 1;
            }
        }

        if shared.statistics_stamp == generation {
            shared.view.statistics = LoadState::from_result(statistics, "statistics");
            outcome.applied += 1;
        } else {
            log::debug!("Filter #{generation}: discarding stale statistics");
            outcome.discarded += 1;
        }

        if outcome.applied > 0 {
            self.publish(&shared);
        }
        outcome
    }

    fn publish(&self, shared: &Shared<S::Statistics>) {
        self.updates.send_replace(shared.view.clone());
    }

    fn lock(&self) -> MutexGuard<'_, Shared<S::Statistics>> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fetches prepared by a begin step. Nothing is requested until
/// [`Self::run`] is awaited.
#[must_use = "a pending refresh does nothing until it is run"]
pub struct PendingRefresh<S: FilterSource> {
    controller: FilterController<S>,
    generation: u64,
    selection: LocationSelection,
    levels: Vec<LocationLevel>,
}

impl<S: FilterSource> PendingRefresh<S> {
    /// Generation this refresh belongs to.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Selection the fetches are scoped to.
    #[must_use]
    pub const fn selection(&self) -> &LocationSelection {
        &self.selection
    }

    /// Fetches the option lists and the statistics concurrently and
    /// writes every response whose slot has not been re-requested since.
    pub async fn run(self) -> RefreshOutcome {
        let source = &self.controller.source;
        let selection = &self.selection;

        let option_fetches = join_all(self.levels.iter().map(|&level| {
            let scope = level
                .parent()
                .map_or_else(LocationSelection::default, |p| selection.scoped_to(p));
            async move {
                let result = source.options(level, &scope).await;
                (level, result)
            }
        }));

        let (options, statistics) = join(option_fetches, source.statistics(selection)).await;
        self.controller.apply(self.generation, options, statistics)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use emis_statistics_models::StatisticsSnapshot;
    use reqwest::Url;

    use super::*;
    use emis_location_models::LocationLevel::{County, Payam, School, State};

    #[derive(Default)]
    struct MockSource {
        delays: BTreeMap<String, Duration>,
        learners: BTreeMap<String, u64>,
        missing: BTreeSet<String>,
        failing: BTreeSet<String>,
        offline: BTreeSet<String>,
        option_calls: AtomicUsize,
        statistics_calls: AtomicUsize,
    }

    impl MockSource {
        fn delay(mut self, state: &str, millis: u64) -> Self {
            self.delays
                .insert(state.to_string(), Duration::from_millis(millis));
            self
        }

        fn learners(mut self, key: &str, total: u64) -> Self {
            self.learners.insert(key.to_string(), total);
            self
        }

        fn missing(mut self, key: &str) -> Self {
            self.missing.insert(key.to_string());
            self
        }

        fn failing(mut self, key: &str) -> Self {
            self.failing.insert(key.to_string());
            self
        }

        fn offline(mut self, key: &str) -> Self {
            self.offline.insert(key.to_string());
            self
        }

        async fn pause(&self, scope: &LocationSelection) {
            if let Some(delay) = scope.state.as_ref().and_then(|s| self.delays.get(s)) {
                tokio::time::sleep(*delay).await;
            }
        }
    }

    #[async_trait]
    impl FilterSource for MockSource {
        type Statistics = StatisticsSnapshot;

        async fn options(
            &self,
            level: LocationLevel,
            scope: &LocationSelection,
        ) -> Result<Vec<LocationNode>, ApiError> {
            self.option_calls.fetch_add(1, Ordering::SeqCst);
            self.pause(scope).await;
            let parent = level
                .parent()
                .and_then(|p| scope.get(p))
                .unwrap_or("root")
                .to_string();
            Ok((1..=2)
                .map(|n| LocationNode::named(format!("{parent}-{level}-{n}")))
                .collect())
        }

        async fn statistics(
            &self,
            scope: &LocationSelection,
        ) -> Result<StatisticsSnapshot, ApiError> {
            self.statistics_calls.fetch_add(1, Ordering::SeqCst);
            self.pause(scope).await;
            let key = scope
                .deepest()
                .and_then(|l| scope.get(l))
                .unwrap_or("all")
                .to_string();
            if self.missing.contains(&key) {
                return Err(ApiError::NotFound {
                    url: format!("http://mock/stats/{key}"),
                });
            }
            if self.offline.contains(&key) {
                return Err(ApiError::DatabaseUnavailable {
                    url: format!("http://mock/stats/{key}"),
                });
            }
            if self.failing.contains(&key) {
                return Err(ApiError::Status {
                    status: 500,
                    url: format!("http://mock/stats/{key}"),
                    body: "boom".to_string(),
                });
            }
            let mut snapshot = StatisticsSnapshot::zeroed();
            snapshot.demographics.total_learners = self.learners.get(&key).copied().unwrap_or(100);
            Ok(snapshot)
        }
    }

    fn names(nodes: &[LocationNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.name.as_str()).collect()
    }

    fn full_query() -> DashboardQuery {
        DashboardQuery {
            selection: LocationSelection::default()
                .with(State, "CES")
                .with(County, "Juba")
                .with(Payam, "Kator")
                .with(School, "ABC"),
            tab: Some(DashboardTab::Overview),
            year: None,
        }
    }

    #[tokio::test]
    async fn starts_with_only_states() {
        let controller = FilterController::new(MockSource::default());
        let view = controller.snapshot();
        assert_eq!(view.choices(State).len(), 13);
        assert_eq!(view.options(County), &LoadState::Idle);
        assert_eq!(view.statistics, LoadState::Idle);
        assert_eq!(view.displayed_statistics(), StatisticsSnapshot::zeroed());
    }

    #[tokio::test]
    async fn restore_fetches_every_level_at_once() {
        let controller = FilterController::new(MockSource::default().learners("ABC", 42));
        let outcome = controller.restore(full_query()).await;

        assert_eq!(outcome.applied, 4);
        assert_eq!(controller.source().option_calls.load(Ordering::SeqCst), 3);
        assert_eq!(controller.source().statistics_calls.load(Ordering::SeqCst), 1);

        let view = controller.snapshot();
        assert_eq!(names(view.choices(County)), ["CES-county-1", "CES-county-2"]);
        assert_eq!(names(view.choices(Payam)), ["Juba-payam-1", "Juba-payam-2"]);
        assert_eq!(names(view.choices(School)), ["Kator-school-1", "Kator-school-2"]);
        assert_eq!(view.displayed_statistics().demographics.total_learners, 42);
        assert_eq!(view.query(), full_query());
    }

    #[tokio::test]
    async fn changing_state_clears_everything_below() {
        let controller = FilterController::new(MockSource::default());
        controller.restore(full_query()).await;

        let pending = controller.begin(State, Some("EES".to_string()));
        let view = controller.snapshot();
        assert_eq!(view.selection, LocationSelection::default().with(State, "EES"));
        assert!(view.options(County).is_loading());
        assert_eq!(view.options(Payam), &LoadState::Idle);
        assert_eq!(view.options(School), &LoadState::Idle);
        assert!(view.statistics.is_loading());

        pending.run().await;
        let view = controller.snapshot();
        assert_eq!(names(view.choices(County)), ["EES-county-1", "EES-county-2"]);
        assert!(view.choices(Payam).is_empty());

        let link = view.query().to_url(
            &Url::parse("https://dash.example.org/?lang=en&county=Juba&code=ABC").unwrap(),
        );
        assert_eq!(link.query(), Some("lang=en&state=EES&tab=overview"));
    }

    #[tokio::test]
    async fn clearing_a_level_keeps_its_own_options() {
        let controller = FilterController::new(MockSource::default().learners("CES", 7));
        controller.restore(full_query()).await;

        controller.select(County, None).await;
        let view = controller.snapshot();
        assert_eq!(view.selection, LocationSelection::default().with(State, "CES"));
        assert_eq!(names(view.choices(County)), ["CES-county-1", "CES-county-2"]);
        assert_eq!(view.options(Payam), &LoadState::Idle);
        assert_eq!(view.displayed_statistics().demographics.total_learners, 7);
    }

    #[tokio::test]
    async fn orphan_value_is_dropped() {
        let controller = FilterController::new(MockSource::default());
        let pending = controller.begin(Payam, Some("Kator".to_string()));
        assert!(pending.selection().is_empty());
        pending.run().await;
        assert_eq!(controller.source().option_calls.load(Ordering::SeqCst), 0);
        assert_eq!(controller.source().statistics_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn not_found_shows_zero_statistics() {
        let controller = FilterController::new(
            MockSource::default().learners("CES", 500).missing("EES"),
        );
        controller.select(State, Some("CES".to_string())).await;
        assert_eq!(controller.displayed_statistics().demographics.total_learners, 500);

        controller.select(State, Some("EES".to_string())).await;
        let view = controller.snapshot();
        assert_eq!(view.statistics, LoadState::Empty);
        assert_eq!(view.displayed_statistics(), StatisticsSnapshot::zeroed());
        assert_eq!(view.choices(County).len(), 2);
    }

    #[tokio::test]
    async fn failures_are_reported_with_zero_fallback() {
        let controller = FilterController::new(MockSource::default().failing("WES"));
        controller.select(State, Some("WES".to_string())).await;
        let view = controller.snapshot();
        assert!(view.statistics.error().is_some_and(|e| e.contains("500")));
        assert_eq!(view.displayed_statistics(), StatisticsSnapshot::zeroed());
    }

    #[tokio::test]
    async fn database_outage_takes_over_the_view_until_it_recovers() {
        let controller = FilterController::new(MockSource::default().offline("UPN"));
        controller.select(State, Some("UPN".to_string())).await;
        let view = controller.snapshot();
        assert_eq!(view.statistics, LoadState::Unavailable);
        assert!(view.database_unavailable());
        assert_eq!(view.displayed_statistics(), StatisticsSnapshot::zeroed());

        controller.select(State, Some("CES".to_string())).await;
        assert!(!controller.snapshot().database_unavailable());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_answer_for_old_selection_is_discarded() {
        let source = MockSource::default()
            .delay("CES", 500)
            .delay("EES", 10)
            .learners("CES", 111)
            .learners("EES", 222);
        let controller = FilterController::new(source);

        let first = controller.begin(State, Some("CES".to_string()));
        let second = controller.begin(State, Some("EES".to_string()));
        let (a, b) = join(first.run(), second.run()).await;

        assert!(a.is_superseded());
        assert_eq!(b.applied, 2);

        let view = controller.snapshot();
        assert_eq!(view.selection.state.as_deref(), Some("EES"));
        assert_eq!(names(view.choices(County)), ["EES-county-1", "EES-county-2"]);
        assert_eq!(view.displayed_statistics().demographics.total_learners, 222);
    }

    #[tokio::test(start_paused = true)]
    async fn fast_answer_for_old_selection_is_discarded() {
        let source = MockSource::default()
            .delay("CES", 10)
            .delay("EES", 500)
            .learners("CES", 111);
        let controller = FilterController::new(source);

        let first = controller.begin(State, Some("CES".to_string()));
        let second = controller.begin(State, Some("EES".to_string()));
        let mut updates = controller.subscribe();

        let a = first.run().await;
        assert!(a.is_superseded());
        assert!(!updates.has_changed().unwrap());
        assert!(controller.snapshot().statistics.is_loading());

        second.run().await;
        let view = controller.snapshot();
        assert_eq!(names(view.choices(County)), ["EES-county-1", "EES-county-2"]);
        assert_eq!(view.displayed_statistics().demographics.total_learners, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn untouched_slots_still_receive_late_answers() {
        let source = MockSource::default().delay("CES", 100).learners("Juba", 9);
        let controller = FilterController::new(source);

        let state = controller.begin(State, Some("CES".to_string()));
        let county = controller.begin(County, Some("Juba".to_string()));
        let (a, b) = join(state.run(), county.run()).await;

        assert_eq!((a.applied, a.discarded), (1, 1));
        assert_eq!((b.applied, b.discarded), (2, 0));

        let view = controller.snapshot();
        assert_eq!(names(view.choices(County)), ["CES-county-1", "CES-county-2"]);
        assert_eq!(names(view.choices(Payam)), ["Juba-payam-1", "Juba-payam-2"]);
        assert_eq!(view.displayed_statistics().demographics.total_learners, 9);
    }

    #[tokio::test]
    async fn subscribers_see_each_change() {
        let controller = FilterController::new(MockSource::default());
        let mut updates = controller.subscribe();

        controller.set_tab(Some(DashboardTab::CashTransfer));
        assert!(updates.has_changed().unwrap());
        assert_eq!(updates.borrow_and_update().tab, Some(DashboardTab::CashTransfer));

        controller.select(State, Some("CES".to_string())).await;
        assert_eq!(updates.borrow_and_update().selection.state.as_deref(), Some("CES"));
        assert_eq!(controller.source().statistics_calls.load(Ordering::SeqCst), 1);

        controller.set_year(Some(2023));
        assert_eq!(controller.query().to_query_string(), "state=CES&tab=cash-transfer&year=2023");
    }
}

//! One school's learner list and the marking selection over it.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use emis_attendance_models::{
    AbsenceReason, AttendanceMark, MarkAttendanceRequest, MarkAttendanceResponse, Notification,
};
use emis_filter::LoadState;
use emis_location_models::LocationSelection;
use emis_school_models::{Learner, SchoolCode};
use emis_statistics::{ClassSummary, class_breakdown};

use crate::{AttendanceApi, AttendanceError, Notifier};

/// Learners of one school on one date, plus the learners selected for the
/// next bulk mark.
pub struct AttendanceBoard<A, N> {
    api: A,
    notifier: N,
    code: Option<SchoolCode>,
    date: NaiveDate,
    learners: LoadState<Vec<Learner>>,
    selected: BTreeSet<String>,
}

impl<A: AttendanceApi, N: Notifier> AttendanceBoard<A, N> {
    /// Creates a board with no school chosen.
    #[must_use]
    pub const fn new(api: A, notifier: N, date: NaiveDate) -> Self {
        Self {
            api,
            notifier,
            code: None,
            date,
            learners: LoadState::Idle,
            selected: BTreeSet::new(),
        }
    }

    #[must_use]
    pub const fn api(&self) -> &A {
        &self.api
    }

    #[must_use]
    pub const fn notifier(&self) -> &N {
        &self.notifier
    }

    /// School whose learners are shown.
    #[must_use]
    pub const fn code(&self) -> Option<&SchoolCode> {
        self.code.as_ref()
    }

    /// Attendance date.
    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.date
    }

    /// Learner list state.
    #[must_use]
    pub const fn learners(&self) -> &LoadState<Vec<Learner>> {
        &self.learners
    }

    /// Loaded learners; empty unless loaded.
    #[must_use]
    pub fn learner_list(&self) -> &[Learner] {
        self.learners.loaded().map_or(&[], Vec::as_slice)
    }

    /// Ids of the selected learners.
    #[must_use]
    pub const fn selected(&self) -> &BTreeSet<String> {
        &self.selected
    }

    /// Points the board at another school or date. The learner list and
    /// the selection are dropped if either changed.
    ///
    /// Returns `true` if anything changed.
    pub fn retarget(&mut self, code: Option<SchoolCode>, date: NaiveDate) -> bool {
        if self.code == code && self.date == date {
            return false;
        }
        log::debug!(
            "Attendance board: {} on {date}",
            code.as_ref().map_or("no school", SchoolCode::as_str)
        );
        self.code = code;
        self.date = date;
        self.learners = LoadState::Idle;
        self.selected.clear();
        true
    }

    /// Follows the school chosen in a location filter. A missing or
    /// malformed school code leaves the board without a school.
    pub fn follow(&mut self, selection: &LocationSelection) -> bool {
        let code = selection
            .school
            .as_deref()
            .and_then(|s| SchoolCode::parse(s).ok());
        self.retarget(code, self.date)
    }

    /// Fetches the learner list for the current school and date.
    ///
    /// Selected ids that are no longer in the list are dropped. A 404
    /// leaves the board with an empty list.
    ///
    /// # Errors
    ///
    /// * [`AttendanceError::NoSchool`] if no school is chosen
    /// * [`AttendanceError::Api`] if the request fails
    pub async fn load(&mut self) -> Result<(), AttendanceError> {
        let code = self.code.clone().ok_or(AttendanceError::NoSchool)?;
        self.learners = LoadState::Loading;

        match self.api.learners(&code, self.date).await {
            Ok(learners) => {
                log::debug!("Loaded {} learner(s) for {code} on {}", learners.len(), self.date);
                self.selected
                    .retain(|id| learners.iter().any(|l| &l.id == id));
                self.learners = LoadState::Loaded(learners);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                self.selected.clear();
                self.learners = LoadState::Empty;
                Ok(())
            }
            Err(e) => {
                self.learners = LoadState::from_error(&e, &format!("learners for {code}"));
                Err(e.into())
            }
        }
    }

    /// Flips the selection of learner `id`. Ids not in the loaded list are
    /// ignored.
    ///
    /// Returns whether the learner is now selected.
    pub fn toggle(&mut self, id: &str) -> bool {
        if !self.knows(id) {
            return false;
        }
        if self.selected.remove(id) {
            false
        } else {
            self.selected.insert(id.to_string());
            true
        }
    }

    /// Adds every known id in `ids` to the selection.
    pub fn select<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for id in ids {
            let id = id.as_ref().trim();
            if self.knows(id) {
                self.selected.insert(id.to_string());
            }
        }
    }

    /// Selects every loaded learner.
    pub fn select_all(&mut self) {
        self.selected = self.learner_list().iter().map(|l| l.id.clone()).collect();
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    /// Per-class totals of the loaded list.
    #[must_use]
    pub fn class_summary(&self) -> Vec<ClassSummary> {
        class_breakdown(self.learner_list())
    }

    /// Marks the selected learners present.
    ///
    /// # Errors
    ///
    /// See [`Self::mark`].
    pub async fn mark_present(&mut self) -> Result<MarkAttendanceResponse, AttendanceError> {
        self.mark(AttendanceMark::Present).await
    }

    /// Marks the selected learners absent for `reason`.
    ///
    /// # Errors
    ///
    /// [`AttendanceError::MissingReason`] for a blank reason, otherwise see
    /// [`Self::mark`].
    pub async fn mark_absent(
        &mut self,
        reason: &str,
    ) -> Result<MarkAttendanceResponse, AttendanceError> {
        match AbsenceReason::parse(reason) {
            Some(reason) => self.mark(AttendanceMark::Absent(reason)).await,
            None => Err(self.report(AttendanceError::MissingReason)),
        }
    }

    /// Applies `mark` to the selection in one bulk call.
    ///
    /// On success the selection is cleared, the learner list is re-fetched
    /// for the same date and one success notification is sent. On failure
    /// one error notification is sent and the board is left as it was.
    ///
    /// # Errors
    ///
    /// * [`AttendanceError::NoSchool`] if no school is chosen
    /// * [`AttendanceError::NothingSelected`] if the selection is empty
    /// * [`AttendanceError::Api`] if the bulk call fails
    pub async fn mark(
        &mut self,
        mark: AttendanceMark,
    ) -> Result<MarkAttendanceResponse, AttendanceError> {
        let Some(code) = self.code.clone() else {
            return Err(self.report(AttendanceError::NoSchool));
        };
        if self.selected.is_empty() {
            return Err(self.report(AttendanceError::NothingSelected));
        }

        let ids: Vec<String> = self.selected.iter().cloned().collect();
        let request = MarkAttendanceRequest::new(code, ids, self.date, &mark);

        let response = match self.api.mark_bulk(&request).await {
            Ok(response) => response,
            Err(e) => {
                log::error!("Failed to mark attendance at {}: {e}", request.code);
                return Err(self.report(AttendanceError::Api(e)));
            }
        };

        self.selected.clear();
        if let Err(e) = self.load().await {
            log::warn!("Attendance saved but the learner list did not refresh: {e}");
        }

        self.notifier
            .notify(Notification::Success(success_message(&request, &mark, &response)));
        Ok(response)
    }

    fn knows(&self, id: &str) -> bool {
        self.learner_list().iter().any(|l| l.id == id)
    }

    fn report(&self, error: AttendanceError) -> AttendanceError {
        self.notifier.notify(Notification::Error(error.to_string()));
        error
    }
}

fn success_message(
    request: &MarkAttendanceRequest,
    mark: &AttendanceMark,
    response: &MarkAttendanceResponse,
) -> String {
    if !response.message.trim().is_empty() {
        return response.message.trim().to_string();
    }
    let count = request.learner_ids.len();
    let noun = if count == 1 { "learner" } else { "learners" };
    match mark {
        AttendanceMark::Present => format!("Marked {count} {noun} present"),
        AttendanceMark::Absent(reason) => format!("Marked {count} {noun} absent ({reason})"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use emis_api::ApiError;
    use emis_location_models::LocationLevel;
    use emis_school_models::Gender;

    use super::*;

    struct MockApi {
        roster: Mutex<Vec<Learner>>,
        fail_mark: bool,
        learner_requests: Mutex<Vec<(String, NaiveDate)>>,
        marks: Mutex<Vec<MarkAttendanceRequest>>,
    }

    impl MockApi {
        fn new(roster: Vec<Learner>) -> Self {
            Self {
                roster: Mutex::new(roster),
                fail_mark: false,
                learner_requests: Mutex::new(Vec::new()),
                marks: Mutex::new(Vec::new()),
            }
        }

        fn failing(mut self) -> Self {
            self.fail_mark = true;
            self
        }

        fn learner_requests(&self) -> Vec<(String, NaiveDate)> {
            self.learner_requests.lock().unwrap().clone()
        }

        fn marks(&self) -> Vec<MarkAttendanceRequest> {
            self.marks.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AttendanceApi for MockApi {
        async fn learners(
            &self,
            code: &SchoolCode,
            date: NaiveDate,
        ) -> Result<Vec<Learner>, ApiError> {
            self.learner_requests
                .lock()
                .unwrap()
                .push((code.to_string(), date));
            Ok(self.roster.lock().unwrap().clone())
        }

        async fn mark_bulk(
            &self,
            request: &MarkAttendanceRequest,
        ) -> Result<MarkAttendanceResponse, ApiError> {
            self.marks.lock().unwrap().push(request.clone());
            if self.fail_mark {
                return Err(ApiError::Status {
                    status: 500,
                    url: "http://mock/attendance/markAttendanceBulk".to_string(),
                    body: "write failed".to_string(),
                });
            }
            let mut roster = self.roster.lock().unwrap();
            let mut updated = 0;
            for learner in roster.iter_mut() {
                if request.learner_ids.contains(&learner.id) {
                    learner.present = Some(request.present);
                    learner.absence_reason.clone_from(&request.absence_reason);
                    updated += 1;
                }
            }
            Ok(MarkAttendanceResponse {
                updated,
                message: String::new(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        seen: Mutex<Vec<Notification>>,
    }

    impl RecordingNotifier {
        fn seen(&self) -> Vec<Notification> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notification: Notification) {
            self.seen.lock().unwrap().push(notification);
        }
    }

    fn learner(id: &str, class: &str, gender: Gender) -> Learner {
        Learner {
            id: id.to_string(),
            first_name: format!("First{id}"),
            middle_name: String::new(),
            last_name: format!("Last{id}"),
            gender,
            disability: false,
            dob: None,
            class: class.to_string(),
            present: None,
            absence_reason: None,
        }
    }

    fn roster() -> Vec<Learner> {
        vec![
            learner("L1", "P1", Gender::Female),
            learner("L2", "P1", Gender::Male),
            learner("L3", "P2", Gender::Female),
        ]
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 6).unwrap()
    }

    fn code() -> SchoolCode {
        SchoolCode::parse("ABC").unwrap()
    }

    async fn loaded_board(api: MockApi) -> AttendanceBoard<MockApi, RecordingNotifier> {
        let mut board = AttendanceBoard::new(api, RecordingNotifier::default(), date());
        board.retarget(Some(code()), date());
        board.load().await.unwrap();
        board
    }

    #[tokio::test]
    async fn sick_absence_clears_selection_and_reloads_same_date() {
        let mut board = loaded_board(MockApi::new(roster())).await;
        board.select(["L1", "L2"]);

        let response = board.mark_absent("Sick").await.unwrap();
        assert_eq!(response.updated, 2);

        let marks = board.api().marks();
        assert_eq!(marks.len(), 1);
        assert_eq!(marks[0].learner_ids, ["L1", "L2"]);
        assert!(!marks[0].present);
        assert_eq!(marks[0].absence_reason.as_deref(), Some("Sick"));

        assert_eq!(
            board.api().learner_requests(),
            [("ABC".to_string(), date()), ("ABC".to_string(), date())]
        );
        assert!(board.selected().is_empty());
        assert_eq!(board.learner_list()[0].present, Some(false));
        assert_eq!(
            board.notifier().seen(),
            [Notification::Success("Marked 2 learners absent (Sick)".to_string())]
        );
    }

    #[tokio::test]
    async fn failed_mark_leaves_everything_as_it_was() {
        let mut board = loaded_board(MockApi::new(roster()).failing()).await;
        board.select(["L3"]);

        let err = board.mark_present().await.unwrap_err();
        assert!(matches!(err, AttendanceError::Api(ApiError::Status { status: 500, .. })));

        assert_eq!(board.selected().iter().collect::<Vec<_>>(), ["L3"]);
        assert_eq!(board.api().learner_requests().len(), 1);
        assert_eq!(board.learner_list()[2].present, None);

        let seen = board.notifier().seen();
        assert_eq!(seen.len(), 1);
        assert!(matches!(&seen[0], Notification::Error(m) if m.contains("500")));
    }

    #[tokio::test]
    async fn rejects_empty_selection_and_blank_reason_before_calling_the_api() {
        let mut board = loaded_board(MockApi::new(roster())).await;

        assert!(matches!(
            board.mark_present().await,
            Err(AttendanceError::NothingSelected)
        ));

        board.toggle("L1");
        assert!(matches!(
            board.mark_absent("  ").await,
            Err(AttendanceError::MissingReason)
        ));

        assert!(board.api().marks().is_empty());
        assert_eq!(board.notifier().seen().len(), 2);
        assert_eq!(board.selected().len(), 1);
    }

    #[tokio::test]
    async fn marking_needs_a_school() {
        let mut board =
            AttendanceBoard::new(MockApi::new(roster()), RecordingNotifier::default(), date());
        assert!(matches!(board.load().await, Err(AttendanceError::NoSchool)));
        assert!(matches!(
            board.mark_present().await,
            Err(AttendanceError::NoSchool)
        ));
    }

    #[tokio::test]
    async fn selection_only_holds_loaded_learners() {
        let mut board = loaded_board(MockApi::new(roster())).await;

        assert!(board.toggle("L2"));
        assert!(!board.toggle("L2"));
        assert!(!board.toggle("L99"));
        board.select(["L1", "nobody"]);
        assert_eq!(board.selected().len(), 1);

        board.select_all();
        assert_eq!(board.selected().len(), 3);
        board.clear_selection();
        assert!(board.selected().is_empty());
    }

    #[tokio::test]
    async fn retargeting_drops_list_and_selection() {
        let mut board = loaded_board(MockApi::new(roster())).await;
        board.select_all();

        assert!(!board.retarget(Some(code()), date()));
        assert_eq!(board.selected().len(), 3);

        let next_day = date().succ_opt().unwrap();
        assert!(board.retarget(Some(code()), next_day));
        assert_eq!(board.learners(), &LoadState::Idle);
        assert!(board.selected().is_empty());
    }

    #[tokio::test]
    async fn follows_the_filter_school() {
        let mut board = loaded_board(MockApi::new(roster())).await;

        let mut selection = LocationSelection::default()
            .with(LocationLevel::State, "CES")
            .with(LocationLevel::County, "Juba")
            .with(LocationLevel::Payam, "Kator")
            .with(LocationLevel::School, "abc");
        assert!(!board.follow(&selection));

        selection.set(LocationLevel::County, Some("Terekeka".to_string()));
        assert!(board.follow(&selection));
        assert!(board.code().is_none());
        assert!(board.learner_list().is_empty());
    }

    #[tokio::test]
    async fn summarizes_loaded_classes() {
        let board = loaded_board(MockApi::new(roster())).await;
        let summary = board.class_summary();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].class, "P1");
        assert_eq!((summary[0].male, summary[0].female), (1, 1));
        assert_eq!(summary[1].total, 1);
    }
}

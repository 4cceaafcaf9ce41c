//! Interactive dashboard browser.
//!
//! Walks down the location hierarchy with `dialoguer` prompts. After every
//! change the statistics for the new selection are shown again, and once a
//! school is chosen its learners can be marked present or absent.

use chrono::NaiveDate;
use dialoguer::{Input, MultiSelect};
use emis_api::DashboardClient;
use emis_attendance::{AttendanceBoard, LogNotifier};
use emis_attendance_models::AbsenceReason;
use emis_cli_utils::{MultiProgress, pick, with_backdrop};
use emis_filter::{
    CashTransferSource, DashboardTab, EnrollmentSource, FilterController, FilterView, LoadState,
};
use emis_location_models::{LocationLevel, LocationSelection};
use emis_statistics_models::StatisticsSnapshot;

use crate::render;

type Board = AttendanceBoard<DashboardClient, LogNotifier>;

/// Top-level actions in the browser menu.
#[derive(Clone, Copy)]
enum Action {
    Choose(LocationLevel),
    Tab,
    Year,
    Attendance,
    Link,
    Refresh,
    Quit,
}

impl Action {
    fn available(view: &FilterView<StatisticsSnapshot>) -> Vec<Self> {
        let mut actions: Vec<Self> = LocationLevel::ALL
            .into_iter()
            .filter(|level| {
                level
                    .parent()
                    .is_none_or(|p| view.selection.get(p).is_some())
            })
            .map(Self::Choose)
            .collect();
        if view.selection.school.is_some() {
            actions.push(Self::Attendance);
        }
        actions.extend([Self::Tab, Self::Year, Self::Link, Self::Refresh, Self::Quit]);
        actions
    }

    fn label(self, view: &FilterView<StatisticsSnapshot>) -> String {
        match self {
            Self::Choose(level) => format!(
                "{}: {}",
                level.label(),
                view.selection.get(level).unwrap_or("All")
            ),
            Self::Tab => format!(
                "Tab: {}",
                view.tab.unwrap_or(DashboardTab::Overview).label()
            ),
            Self::Year => format!(
                "Year: {}",
                view.year.map_or_else(|| "current".to_string(), |y| y.to_string())
            ),
            Self::Attendance => "Mark attendance".to_string(),
            Self::Link => "Show link".to_string(),
            Self::Refresh => "Refresh".to_string(),
            Self::Quit => "Quit".to_string(),
        }
    }
}

/// Actions on a school's learner list.
#[derive(Clone, Copy)]
enum BoardAction {
    SelectLearners,
    SelectAll,
    MarkPresent,
    MarkAbsent,
    ChangeDate,
    Back,
}

impl BoardAction {
    const ALL: &[Self] = &[
        Self::SelectLearners,
        Self::SelectAll,
        Self::MarkPresent,
        Self::MarkAbsent,
        Self::ChangeDate,
        Self::Back,
    ];

    const fn label(self) -> &'static str {
        match self {
            Self::SelectLearners => "Select learners",
            Self::SelectAll => "Select all",
            Self::MarkPresent => "Mark selected present",
            Self::MarkAbsent => "Mark selected absent",
            Self::ChangeDate => "Change date",
            Self::Back => "Back",
        }
    }
}

/// Runs the browser until the user quits.
///
/// # Errors
///
/// Returns an error if the terminal cannot be read.
pub async fn run(
    client: DashboardClient,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let enrollment = FilterController::new(EnrollmentSource::new(client.clone()));
    let cash = FilterController::new(CashTransferSource::new(client.clone()));
    let mut board = AttendanceBoard::new(client, LogNotifier, chrono::Local::now().date_naive());

    println!("EMIS Dashboard");
    with_backdrop(multi, "Loading national statistics...", enrollment.refresh()).await;

    loop {
        let view = enrollment.snapshot();
        if view.tab == Some(DashboardTab::CashTransfer) {
            with_backdrop(multi, "Loading cash transfers...", cash.restore(view.query())).await;
            render::print_cash_transfer(&cash.snapshot());
        } else {
            render::print_enrollment(&view);
        }
        println!();

        let actions = Action::available(&view);
        let labels: Vec<String> = actions.iter().map(|a| a.label(&view)).collect();
        let Some(idx) = pick("What next?", &labels, 0)? else {
            break;
        };

        match actions[idx] {
            Action::Choose(level) => {
                if let Some(value) = choose(&view, level)? {
                    with_backdrop(multi, "Loading...", enrollment.select(level, value)).await;
                }
            }
            Action::Tab => {
                let labels: Vec<&str> = DashboardTab::ALL.iter().map(|t| t.label()).collect();
                if let Some(i) = pick("Tab", &labels, 0)? {
                    enrollment.set_tab(Some(DashboardTab::ALL[i]));
                }
            }
            Action::Year => {
                let input: String = Input::new()
                    .with_prompt("Year (blank for current)")
                    .allow_empty(true)
                    .interact_text()?;
                match input.trim() {
                    "" => enrollment.set_year(None),
                    text => match text.parse() {
                        Ok(year) => enrollment.set_year(Some(year)),
                        Err(_) => println!("Not a year: {text}"),
                    },
                }
            }
            Action::Attendance => attendance(&mut board, &view.selection, multi).await?,
            Action::Link => println!("?{}", view.query().to_query_string()),
            Action::Refresh => {
                with_backdrop(multi, "Refreshing...", enrollment.refresh()).await;
            }
            Action::Quit => break,
        }
    }

    Ok(())
}

/// Prompts for a value at `level`. `Some(None)` means "all".
fn choose(
    view: &FilterView<StatisticsSnapshot>,
    level: LocationLevel,
) -> Result<Option<Option<String>>, dialoguer::Error> {
    if let Some(message) = view.options(level).error() {
        println!("{} options are unavailable: {message}", level.label());
    }

    let choices = view.choices(level);
    let current = view.selection.get(level);
    let labels: Vec<String> = std::iter::once(format!("(All {}s)", level.label().to_lowercase()))
        .chain(choices.iter().map(|n| n.name.clone()))
        .collect();
    let default = current
        .and_then(|c| choices.iter().position(|n| n.id == c))
        .map_or(0, |i| i + 1);

    Ok(pick(level.label(), &labels, default)?
        .map(|i| i.checked_sub(1).map(|i| choices[i].id.clone())))
}

async fn attendance(
    board: &mut Board,
    selection: &LocationSelection,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    board.follow(selection);
    let Some(code) = board.code().cloned() else {
        println!(
            "{:?} is not a valid school code",
            selection.school.as_deref().unwrap_or_default()
        );
        return Ok(());
    };

    loop {
        if matches!(board.learners(), LoadState::Idle)
            && with_backdrop(multi, "Loading learners...", board.load())
                .await
                .is_err()
        {
            if board.learners().is_unavailable() {
                render::print_database_outage();
            }
            return Ok(());
        }

        println!();
        println!("{code} on {}", board.date());
        render::print_learners(board.learner_list(), board.selected(), board.date());
        render::print_class_summary(&board.class_summary());
        println!();

        let labels: Vec<&str> = BoardAction::ALL.iter().map(|a| a.label()).collect();
        let prompt = format!("{} selected", board.selected().len());
        let Some(idx) = pick(&prompt, &labels, 0)? else {
            return Ok(());
        };

        match BoardAction::ALL[idx] {
            BoardAction::SelectLearners => select_learners(board)?,
            BoardAction::SelectAll => board.select_all(),
            BoardAction::MarkPresent => {
                if let Ok(response) =
                    with_backdrop(multi, "Saving attendance...", board.mark_present()).await
                {
                    println!("{} record(s) updated", response.updated);
                }
            }
            BoardAction::MarkAbsent => {
                if let Some(reason) = absence_reason()?
                    && let Ok(response) =
                        with_backdrop(multi, "Saving attendance...", board.mark_absent(&reason))
                            .await
                {
                    println!("{} record(s) updated", response.updated);
                }
            }
            BoardAction::ChangeDate => {
                let input: String = Input::new()
                    .with_prompt("Date (YYYY-MM-DD)")
                    .default(board.date().to_string())
                    .interact_text()?;
                match input.trim().parse::<NaiveDate>() {
                    Ok(date) => {
                        board.retarget(Some(code.clone()), date);
                    }
                    Err(_) => println!("Not a date: {input}"),
                }
            }
            BoardAction::Back => return Ok(()),
        }
    }
}

fn select_learners(board: &mut Board) -> Result<(), dialoguer::Error> {
    let learners = board.learner_list();
    if learners.is_empty() {
        return Ok(());
    }
    let items: Vec<String> = learners
        .iter()
        .map(|l| render::learner_line(l, board.date()))
        .collect();
    let defaults: Vec<bool> = learners
        .iter()
        .map(|l| board.selected().contains(&l.id))
        .collect();

    let Some(chosen) = MultiSelect::new()
        .with_prompt("Learners (space to toggle, enter to confirm)")
        .items(&items)
        .defaults(&defaults)
        .interact_opt()?
    else {
        return Ok(());
    };

    let ids: Vec<String> = chosen.into_iter().map(|i| learners[i].id.clone()).collect();
    board.clear_selection();
    board.select(ids);
    Ok(())
}

fn absence_reason() -> Result<Option<String>, dialoguer::Error> {
    let mut labels: Vec<String> = AbsenceReason::KNOWN.iter().map(ToString::to_string).collect();
    labels.push("Other...".to_string());

    match pick("Reason", &labels, 0)? {
        Some(i) if i < AbsenceReason::KNOWN.len() => Ok(Some(labels[i].clone())),
        Some(_) => Input::new()
            .with_prompt("Reason")
            .allow_empty(true)
            .interact_text()
            .map(Some),
        None => Ok(None),
    }
}

//! Plain-text rendering of dashboard views.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use emis_filter::{DATABASE_UNAVAILABLE, FilterView, LoadState};
use emis_location_models::{LocationLevel, LocationNode};
use emis_school_models::Learner;
use emis_statistics::{
    ChartSlice, ClassSummary, StatCard, cash_transfer_cards, format_amount, format_number,
    format_percent, regional_chart, summary::CURRENCY, summary_cards,
};
use emis_statistics_models::{CashTransferStats, StatisticsSnapshot};

const BAR_WIDTH: usize = 24;

/// A bar `width` cells wide filled to `share` percent.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn bar(share: f64, width: usize) -> String {
    let share = emis_statistics::clamp_percent(share);
    let filled = ((share / 100.0) * width as f64).round() as usize;
    let filled = filled.min(width);
    format!("{}{}", "#".repeat(filled), "-".repeat(width - filled))
}

fn heading(title: &str) {
    println!();
    println!("{title}");
    println!("{}", "=".repeat(title.chars().count()));
}

fn location_line<T>(view: &FilterView<T>) {
    let tab = view
        .tab
        .map_or_else(String::new, |t| format!("  [{}]", t.label()));
    let year = view.year.map_or_else(String::new, |y| format!("  {y}"));
    heading(&format!("{}{tab}{year}", view.selection));
}

fn status_line<T>(state: &LoadState<T>) {
    match state {
        LoadState::Empty => println!("No data for this filter; showing zeros."),
        LoadState::Failed(message) => println!("Statistics unavailable: {message}"),
        LoadState::Idle
        | LoadState::Loading
        | LoadState::Loaded(_)
        | LoadState::Unavailable => {}
    }
}

/// The full-screen notice shown instead of the dashboard while the API
/// cannot reach its database.
pub fn print_database_outage() {
    heading("Database connection issue");
    println!("{DATABASE_UNAVAILABLE}.");
    println!("No figures are shown until the connection is restored; try again shortly.");
}

/// Prints summary cards, one per line.
pub fn print_cards(cards: &[StatCard]) {
    let width = cards.iter().map(|c| c.title.len()).max().unwrap_or(0);
    for card in cards {
        print!("{:<width$}  {:>10}  {}", card.title, card.value, card.caption);
        if let Some(progress) = card.progress {
            print!("  [{}]", bar(progress, BAR_WIDTH / 2));
        }
        println!();
    }
}

/// Prints a horizontal bar chart.
pub fn print_chart(title: &str, slices: &[ChartSlice]) {
    if slices.is_empty() {
        return;
    }
    println!();
    println!("{title}");
    let width = slices.iter().map(|s| s.label.chars().count()).max().unwrap_or(0);
    for slice in slices {
        println!(
            "  {:<width$}  {}  {:>7}  {}",
            slice.label,
            bar(slice.share, BAR_WIDTH),
            format_number(slice.value),
            format_percent(slice.share),
        );
    }
}

/// The level a user would pick next, if any.
pub fn next_level<T>(view: &FilterView<T>) -> Option<LocationLevel> {
    view.selection
        .deepest()
        .map_or(Some(LocationLevel::State), LocationLevel::child)
}

fn names(nodes: &[LocationNode]) -> String {
    nodes
        .iter()
        .map(|n| n.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_next_options<T>(view: &FilterView<T>) {
    let Some(level) = next_level(view) else {
        return;
    };
    let text = match view.options(level) {
        LoadState::Loaded(nodes) if nodes.is_empty() => "none".to_string(),
        LoadState::Loaded(nodes) => names(nodes),
        LoadState::Empty => "none".to_string(),
        LoadState::Loading => "loading...".to_string(),
        LoadState::Idle | LoadState::Unavailable => return,
        LoadState::Failed(message) => format!("unavailable ({message})"),
    };
    println!();
    println!("{} options: {text}", level.label());
}

/// Enrollment overview for a filter view.
pub fn print_enrollment(view: &FilterView<StatisticsSnapshot>) {
    if view.database_unavailable() {
        print_database_outage();
        return;
    }
    location_line(view);
    status_line(&view.statistics);
    let snapshot = view.displayed_statistics();
    print_cards(&summary_cards(&snapshot));
    print_chart(
        "Learners by region",
        &regional_chart(&snapshot.regional_distribution),
    );
    print_next_options(view);
}

/// Cash-transfer cards and tranches for a filter view.
pub fn print_cash_transfer(view: &FilterView<CashTransferStats>) {
    if view.database_unavailable() {
        print_database_outage();
        return;
    }
    location_line(view);
    status_line(&view.statistics);
    let stats = view.displayed_statistics();
    print_cards(&cash_transfer_cards(&stats));

    if !stats.tranches.is_empty() {
        println!();
        println!("Tranches");
        for tranche in &stats.tranches {
            println!(
                "  #{:<3} {:>8} learners  {:>8} paid  {}",
                tranche.tranche,
                format_number(tranche.learners),
                format_number(tranche.paid),
                format_amount(tranche.amount, CURRENCY),
            );
        }
    }
    print_next_options(view);
}

fn mark_label(learner: &Learner) -> String {
    match (learner.present, learner.absence_reason.as_deref()) {
        (Some(true), _) => "present".to_string(),
        (Some(false), Some(reason)) if !reason.is_empty() => format!("absent ({reason})"),
        (Some(false), _) => "absent".to_string(),
        (None, _) => "-".to_string(),
    }
}

/// One line per learner, for lists and prompts.
#[must_use]
pub fn learner_line(learner: &Learner, date: NaiveDate) -> String {
    let age = learner
        .age_on(date)
        .map_or_else(String::new, |a| format!(", {a}y"));
    format!(
        "{:<12} {:<32} {:<4} {}{}  {}",
        learner.id,
        learner.full_name(),
        learner.class,
        learner.gender,
        age,
        mark_label(learner)
    )
}

/// A school's learner list with selection markers.
pub fn print_learners(learners: &[Learner], selected: &BTreeSet<String>, date: NaiveDate) {
    if learners.is_empty() {
        println!("No learners.");
        return;
    }
    for learner in learners {
        let marker = if selected.contains(&learner.id) { "*" } else { " " };
        println!("{marker} {}", learner_line(learner, date));
    }
}

/// Per-class totals.
pub fn print_class_summary(summaries: &[ClassSummary]) {
    if summaries.is_empty() {
        return;
    }
    println!();
    println!(
        "{:<12} {:>6} {:>6} {:>6} {:>5} {:>8} {:>7} {:>9}",
        "Class", "Total", "Male", "Female", "LWD", "Present", "Absent", "Rate"
    );
    for s in summaries {
        println!(
            "{:<12} {:>6} {:>6} {:>6} {:>5} {:>8} {:>7} {:>9}",
            s.class,
            s.total,
            s.male,
            s.female,
            s.lwd,
            s.present,
            s.absent,
            format_percent(s.attendance_rate())
        );
    }
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line client for the EMIS dashboard.
//!
//! Every subcommand is a one-shot view of the dashboard: statistics for a
//! location, the cash-transfer cards, a school's learner list, a bulk
//! attendance mark, or a shareable link. With no subcommand an interactive
//! browser walks down the location hierarchy one level at a time.
//!
//! The API root comes from `EMIS_BASE_URL` (or an `EMIS_CONFIG` TOML file)
//! unless `--base-url` is given.

mod interactive;
mod render;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use emis_api::{ApiConfig, DashboardClient};
use emis_attendance::{AttendanceBoard, LogNotifier};
use emis_cli_utils::{MultiProgress, with_backdrop};
use emis_filter::{
    CashTransferSource, DashboardQuery, DashboardTab, EnrollmentSource, FilterController,
    FilterSource, FilterView,
};
use emis_location_models::states::resolve_state;
use emis_location_models::{LocationLevel, LocationSelection};
use emis_school_models::SchoolCode;
use reqwest::Url;

#[derive(Parser)]
#[command(name = "emis", about = "EMIS dashboard client")]
struct Cli {
    /// API root (overrides `EMIS_BASE_URL`)
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Enrollment summary cards and regional chart for a location
    Stats {
        #[command(flatten)]
        location: LocationArgs,
    },
    /// Cash-transfer programme cards for a location
    CashTransfer {
        #[command(flatten)]
        location: LocationArgs,
    },
    /// A school's learners and their attendance for a date
    Learners {
        /// Three-letter school code
        #[arg(long)]
        code: String,
        /// Attendance date (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Mark learners present or absent in one bulk call
    Mark {
        /// Three-letter school code
        #[arg(long)]
        code: String,
        /// Attendance date (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Comma-separated learner ids
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<String>,
        /// Mark the learners present
        #[arg(long, conflicts_with = "absent")]
        present: bool,
        /// Mark the learners absent for this reason (e.g. "Sick")
        #[arg(long, value_name = "REASON")]
        absent: Option<String>,
    },
    /// Print the dashboard link for a location, tab and year
    Link {
        #[command(flatten)]
        location: LocationArgs,
        /// Dashboard tab (overview, enrollment, attendance, cash-transfer, teachers)
        #[arg(long)]
        tab: Option<DashboardTab>,
        /// Reporting year
        #[arg(long)]
        year: Option<u16>,
        /// Dashboard page URL to attach the query to
        #[arg(long)]
        page: Option<String>,
    },
    /// Restore and print the view a dashboard link points at
    Open {
        /// Dashboard URL or bare query string
        url: String,
    },
}

#[derive(Args, Debug, Default, Clone)]
struct LocationArgs {
    /// State code or name (e.g. CES, "Central Equatoria")
    #[arg(long)]
    state: Option<String>,
    /// County (requires --state)
    #[arg(long)]
    county: Option<String>,
    /// Payam (requires --county)
    #[arg(long)]
    payam: Option<String>,
    /// School code (requires --payam)
    #[arg(long)]
    code: Option<String>,
}

impl LocationArgs {
    fn selection(&self) -> Result<LocationSelection, String> {
        let state = self
            .state
            .as_deref()
            .map(|s| {
                resolve_state(s)
                    .map(str::to_string)
                    .ok_or_else(|| format!("unknown state {s:?}"))
            })
            .transpose()?;

        let mut selection = LocationSelection::default();
        let values = [
            state,
            self.county.clone(),
            self.payam.clone(),
            self.code.clone(),
        ];
        for (level, value) in LocationLevel::ALL.into_iter().zip(values) {
            if value.is_some() {
                if let Some(parent) = level.parent()
                    && selection.get(parent).is_none()
                {
                    return Err(format!(
                        "--{} requires --{}",
                        level.query_key(),
                        parent.query_key()
                    ));
                }
                selection.set(level, value);
            }
        }
        Ok(selection)
    }
}

fn client(base_url: Option<&str>) -> Result<DashboardClient, emis_api::ApiError> {
    match base_url {
        Some(url) => DashboardClient::new(&ApiConfig::for_base_url(url)?),
        None => DashboardClient::from_env(),
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Restores `query` into a fresh controller over `source` behind a
/// spinner, prints the view, and fails if the statistics could not be
/// loaded.
async fn show<S: FilterSource>(
    multi: &MultiProgress,
    source: S,
    query: DashboardQuery,
    print: fn(&FilterView<S::Statistics>),
) -> Result<(), Box<dyn std::error::Error>> {
    let controller = FilterController::new(source);
    with_backdrop(multi, "Loading dashboard...", controller.restore(query)).await;

    let view = controller.snapshot();
    print(&view);

    match view.statistics.error() {
        Some(message) => Err(message.into()),
        None => Ok(()),
    }
}

/// Loads the board's learner list, showing the outage screen when the API
/// cannot reach its database.
async fn load_board(
    multi: &MultiProgress,
    board: &mut AttendanceBoard<DashboardClient, LogNotifier>,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = with_backdrop(multi, "Loading learners...", board.load()).await;
    if board.learners().is_unavailable() {
        render::print_database_outage();
    }
    result.map_err(Into::into)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = emis_cli_utils::init_logger();
    let cli = Cli::parse();
    let base_url = cli.base_url.as_deref();

    let Some(command) = cli.command else {
        return interactive::run(client(base_url)?, &multi).await;
    };

    match command {
        Commands::Stats { location } => {
            let query = DashboardQuery {
                selection: location.selection()?,
                tab: Some(DashboardTab::Overview),
                year: None,
            };
            let source = EnrollmentSource::new(client(base_url)?);
            show(&multi, source, query, render::print_enrollment).await?;
        }
        Commands::CashTransfer { location } => {
            let query = DashboardQuery {
                selection: location.selection()?,
                tab: Some(DashboardTab::CashTransfer),
                year: None,
            };
            let source = CashTransferSource::new(client(base_url)?);
            show(&multi, source, query, render::print_cash_transfer).await?;
        }
        Commands::Learners { code, date } => {
            let code = SchoolCode::parse(&code)?;
            let date = date.unwrap_or_else(today);
            let mut board = AttendanceBoard::new(client(base_url)?, LogNotifier, date);
            board.retarget(Some(code.clone()), date);
            load_board(&multi, &mut board).await?;

            println!("{code} on {date}");
            render::print_learners(board.learner_list(), board.selected(), date);
            render::print_class_summary(&board.class_summary());
        }
        Commands::Mark {
            code,
            date,
            ids,
            present,
            absent,
        } => {
            if !present && absent.is_none() {
                return Err("pass --present or --absent REASON".into());
            }
            let code = SchoolCode::parse(&code)?;
            let date = date.unwrap_or_else(today);
            let mut board = AttendanceBoard::new(client(base_url)?, LogNotifier, date);
            board.retarget(Some(code), date);
            load_board(&multi, &mut board).await?;

            board.select(&ids);
            let unknown: Vec<&String> = ids
                .iter()
                .filter(|id| !board.selected().contains(id.trim()))
                .collect();
            if !unknown.is_empty() {
                log::warn!("Skipping unknown learner id(s): {unknown:?}");
            }

            let response = match absent {
                Some(reason) if !present => board.mark_absent(&reason).await?,
                _ => board.mark_present().await?,
            };
            println!("{} record(s) updated", response.updated);
            render::print_learners(board.learner_list(), board.selected(), date);
        }
        Commands::Link {
            location,
            tab,
            year,
            page,
        } => {
            let query = DashboardQuery {
                selection: location.selection()?,
                tab,
                year,
            };
            match page {
                Some(page) => println!("{}", query.to_url(&Url::parse(&page)?)),
                None => println!("?{}", query.to_query_string()),
            }
        }
        Commands::Open { url } => {
            let query = DashboardQuery::parse(&url).ok_or("not a dashboard link")?;
            let client = client(base_url)?;
            if query.tab == Some(DashboardTab::CashTransfer) {
                show(&multi, CashTransferSource::new(client), query, render::print_cash_transfer)
                    .await?;
            } else {
                show(&multi, EnrollmentSource::new(client), query, render::print_enrollment)
                    .await?;
            }
        }
    }

    Ok(())
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared CLI utilities for the EMIS dashboard tools.
//!
//! [`init_logger`] sets up `indicatif-log-bridge` so that `log::info!` and
//! friends are suspended while the loading spinner redraws. A [`Backdrop`]
//! is that spinner: it stays on screen while a request is in flight and
//! clears itself when dropped.

use std::future::Future;
use std::time::Duration;

use dialoguer::Select;
use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::MultiProgress;

/// A loading spinner shown while dashboard data is fetched.
pub struct Backdrop {
    bar: ProgressBar,
}

impl Backdrop {
    /// Adds a spinner with `message` to `multi`.
    #[must_use]
    pub fn start(multi: &MultiProgress, message: &str) -> Self {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.to_string());
        Self { bar }
    }

    pub fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }
}

impl Drop for Backdrop {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

/// Awaits `future` with a spinner showing `message`.
pub async fn with_backdrop<F: Future>(multi: &MultiProgress, message: &str, future: F) -> F::Output {
    let _backdrop = Backdrop::start(multi, message);
    future.await
}

/// Asks the user to pick one of `labels`.
///
/// Returns `None` when the user backs out with Esc or `q`.
///
/// # Errors
///
/// Returns an error if the terminal cannot be read.
pub fn pick<T: std::fmt::Display>(
    prompt: &str,
    labels: &[T],
    default: usize,
) -> Result<Option<usize>, dialoguer::Error> {
    if labels.is_empty() {
        return Ok(None);
    }
    Select::new()
        .with_prompt(prompt)
        .items(labels)
        .default(default.min(labels.len() - 1))
        .interact_opt()
}

/// Initializes the global logger wrapped in `indicatif-log-bridge` so that
/// `log::info!` and friends are suspended while spinners redraw.
///
/// Returns the [`MultiProgress`] that every [`Backdrop`] must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok(); // already set (tests)

    log::set_max_level(level);

    multi
}

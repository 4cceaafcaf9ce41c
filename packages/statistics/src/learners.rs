//! Client-side grouping of an already-loaded learner list.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use emis_school_models::{Gender, Learner};
use serde::Serialize;

use crate::format::percent;

/// Label used for learners without a class.
pub const UNASSIGNED_CLASS: &str = "Unassigned";

/// Per-class counts for one school's learner list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSummary {
    /// Class label.
    pub class: String,
    /// Learners in the class.
    pub total: u64,
    /// Male learners.
    pub male: u64,
    /// Female learners.
    pub female: u64,
    /// Learners with disabilities.
    pub lwd: u64,
    /// Learners marked present.
    pub present: u64,
    /// Learners marked absent.
    pub absent: u64,
}

impl ClassSummary {
    /// Learners without an attendance mark.
    #[must_use]
    pub const fn unmarked(&self) -> u64 {
        self.total
            .saturating_sub(self.present)
            .saturating_sub(self.absent)
    }

    /// Share of marked learners who were present.
    #[must_use]
    pub fn attendance_rate(&self) -> f64 {
        percent(self.present, self.present.saturating_add(self.absent))
    }
}

/// Groups learners by class, ordered P1 < P2 < ... < P10 < S1, with
/// learners that have no class last.
#[must_use]
pub fn class_breakdown(learners: &[Learner]) -> Vec<ClassSummary> {
    let mut groups: BTreeMap<&str, ClassSummary> = BTreeMap::new();

    for learner in learners {
        let class = if learner.class.is_empty() {
            UNASSIGNED_CLASS
        } else {
            learner.class.as_str()
        };
        let entry = groups.entry(class).or_insert_with(|| ClassSummary {
            class: class.to_string(),
            ..ClassSummary::default()
        });

        entry.total += 1;
        match learner.gender {
            Gender::Male => entry.male += 1,
            Gender::Female => entry.female += 1,
            Gender::Unknown => {}
        }
        if learner.disability {
            entry.lwd += 1;
        }
        match learner.present {
            Some(true) => entry.present += 1,
            Some(false) => entry.absent += 1,
            None => {}
        }
    }

    let mut summaries: Vec<ClassSummary> = groups.into_values().collect();
    summaries.sort_by(|a, b| compare_classes(&a.class, &b.class));
    summaries
}

/// Natural ordering for class labels: alphabetic prefix first, then the
/// numeric suffix as a number.
fn compare_classes(a: &str, b: &str) -> Ordering {
    match (a == UNASSIGNED_CLASS, b == UNASSIGNED_CLASS) {
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        _ => {}
    }
    class_key(a).cmp(&class_key(b))
}

fn class_key(class: &str) -> (String, u32, String) {
    let prefix: String = class
        .chars()
        .take_while(|c| !c.is_ascii_digit())
        .collect::<String>()
        .to_ascii_uppercase();
    let digits: String = class
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect();
    (prefix, digits.parse().unwrap_or(0), class.to_string())
}

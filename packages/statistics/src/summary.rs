//! Derived values and display cards for aggregate snapshots.

use emis_statistics_models::{
    CashTransferStats, Demographics, Engagement, RegionCount, StatisticsSnapshot,
};
use serde::Serialize;

use crate::format::{format_amount, format_number, format_percent, format_ratio, percent};

/// Currency label used for cash-transfer amounts.
pub const CURRENCY: &str = "SSP";

/// Male/female split of a learner population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenderBreakdown {
    /// Male learners.
    pub male: u64,
    /// Female learners.
    pub female: u64,
    /// Male share of `male + female`, in `[0, 100]`.
    pub male_percent: f64,
    /// Female share of `male + female`, in `[0, 100]`.
    pub female_percent: f64,
}

/// Splits learners by gender. Shares are computed against `male + female`
/// so they always sum to 100 (or are both 0).
#[must_use]
pub fn gender_breakdown(demographics: &Demographics) -> GenderBreakdown {
    let whole = demographics.male.saturating_add(demographics.female);
    GenderBreakdown {
        male: demographics.male,
        female: demographics.female,
        male_percent: percent(demographics.male, whole),
        female_percent: percent(demographics.female, whole),
    }
}

/// Share of learners living with a disability.
#[must_use]
pub fn disability_rate(demographics: &Demographics) -> f64 {
    percent(demographics.lwd, demographics.effective_total())
}

/// Share of marked learners who were present.
#[must_use]
pub fn attendance_rate(engagement: &Engagement) -> f64 {
    percent(
        engagement.present,
        engagement.present.saturating_add(engagement.absent),
    )
}

/// Share of schools that reported attendance.
#[must_use]
pub fn reporting_rate(engagement: &Engagement) -> f64 {
    percent(engagement.schools_reporting, engagement.schools)
}

/// One slice of a distribution chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSlice {
    /// Slice label.
    pub label: String,
    /// Raw value.
    pub value: u64,
    /// Share of the chart total, in `[0, 100]`.
    pub share: f64,
}

/// Turns the regional distribution into chart slices, largest first
/// (ties broken by name). Regions without a name are labelled
/// `"Unspecified"`.
#[must_use]
pub fn regional_chart(regions: &[RegionCount]) -> Vec<ChartSlice> {
    let total = regions
        .iter()
        .fold(0u64, |acc, r| acc.saturating_add(r.learners));

    let mut slices: Vec<ChartSlice> = regions
        .iter()
        .map(|r| ChartSlice {
            label: if r.name.trim().is_empty() {
                "Unspecified".to_string()
            } else {
                r.name.trim().to_string()
            },
            value: r.learners,
            share: percent(r.learners, total),
        })
        .collect();

    slices.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.label.cmp(&b.label)));
    slices
}

/// A summary card ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatCard {
    /// Card heading.
    pub title: &'static str,
    /// Headline value, already formatted.
    pub value: String,
    /// Secondary line under the value.
    pub caption: String,
    /// Progress bar fill in `[0, 100]`, for cards that have one.
    pub progress: Option<f64>,
}

/// Summary cards for an enrollment snapshot.
#[must_use]
pub fn summary_cards(snapshot: &StatisticsSnapshot) -> Vec<StatCard> {
    let demographics = &snapshot.demographics;
    let engagement = &snapshot.engagement;
    let gender = gender_breakdown(demographics);
    let total = demographics.effective_total();
    let disability = disability_rate(demographics);
    let attendance = attendance_rate(engagement);
    let reporting = reporting_rate(engagement);

    vec![
        StatCard {
            title: "Total Learners",
            value: format_number(total),
            caption: format!(
                "{} male / {} female",
                format_number(gender.male),
                format_number(gender.female)
            ),
            progress: None,
        },
        StatCard {
            title: "Female Learners",
            value: format_percent(gender.female_percent),
            caption: format!("{} girls enrolled", format_number(gender.female)),
            progress: Some(gender.female_percent),
        },
        StatCard {
            title: "Learners With Disabilities",
            value: format_number(demographics.lwd),
            caption: format!(
                "{} of learners ({} male / {} female)",
                format_percent(disability),
                format_number(demographics.male_lwd),
                format_number(demographics.female_lwd)
            ),
            progress: Some(disability),
        },
        StatCard {
            title: "Attendance",
            value: format_percent(attendance),
            caption: format!(
                "{} present / {} absent",
                format_number(engagement.present),
                format_number(engagement.absent)
            ),
            progress: Some(attendance),
        },
        StatCard {
            title: "Schools Reporting",
            value: format!(
                "{} / {}",
                format_number(engagement.schools_reporting),
                format_number(engagement.schools)
            ),
            caption: format!(
                "{} reporting, {} enumerators",
                format_percent(reporting),
                format_number(engagement.enumerators)
            ),
            progress: Some(reporting),
        },
        StatCard {
            title: "Learner-Teacher Ratio",
            value: format_ratio(total, engagement.teachers),
            caption: format!("{} teachers", format_number(engagement.teachers)),
            progress: None,
        },
    ]
}

/// Summary cards for the cash-transfer dashboard.
#[must_use]
pub fn cash_transfer_cards(stats: &CashTransferStats) -> Vec<StatCard> {
    let approval = percent(stats.approved_learners, stats.eligible_learners);
    let paid = percent(stats.paid_learners, stats.approved_learners);

    let mut cards = vec![
        StatCard {
            title: "Eligible Learners",
            value: format_number(stats.eligible_learners),
            caption: format!("across {} schools", format_number(stats.schools)),
            progress: None,
        },
        StatCard {
            title: "Approved",
            value: format_number(stats.approved_learners),
            caption: format!("{} of eligible", format_percent(approval)),
            progress: Some(approval),
        },
        StatCard {
            title: "Paid",
            value: format_number(stats.paid_learners),
            caption: format!("{} of approved", format_percent(paid)),
            progress: Some(paid),
        },
        StatCard {
            title: "Amount Disbursed",
            value: format_amount(stats.amount_disbursed, CURRENCY),
            caption: format!("{} tranches", stats.tranches.len()),
            progress: None,
        },
    ];

    for tranche in &stats.tranches {
        let tranche_paid = percent(tranche.paid, tranche.learners);
        cards.push(StatCard {
            title: "Tranche",
            value: format!("#{}", tranche.tranche),
            caption: format!(
                "{} paid of {} ({})",
                format_number(tranche.paid),
                format_number(tranche.learners),
                format_amount(tranche.amount, CURRENCY)
            ),
            progress: Some(tranche_paid),
        });
    }

    cards
}

#[cfg(test)]
mod tests {
    use super::*;
    use emis_statistics_models::TrancheSummary;

    fn snapshot() -> StatisticsSnapshot {
        StatisticsSnapshot {
            demographics: Demographics {
                total_learners: 2000,
                male: 1100,
                female: 900,
                lwd: 50,
                male_lwd: 30,
                female_lwd: 20,
            },
            regional_distribution: vec![
                RegionCount {
                    name: "Yei".to_string(),
                    learners: 500,
                    schools: 4,
                },
                RegionCount {
                    name: "Juba".to_string(),
                    learners: 1500,
                    schools: 10,
                },
            ],
            engagement: Engagement {
                schools: 14,
                schools_reporting: 7,
                present: 1800,
                absent: 200,
                enumerators: 3,
                teachers: 50,
            },
        }
    }

    #[test]
    fn gender_shares_sum_to_100() {
        let g = gender_breakdown(&snapshot().demographics);
        assert!((g.male_percent - 55.0).abs() < 1e-9);
        assert!((g.male_percent + g.female_percent - 100.0).abs() < 1e-9);
    }

    #[test]
    fn zero_snapshot_is_total() {
        let cards = summary_cards(&StatisticsSnapshot::zeroed());
        assert_eq!(cards.len(), 6);
        assert_eq!(cards[0].value, "0");
        assert_eq!(cards[3].value, "0.0%");
        assert_eq!(cards[5].value, "N/A");
        for card in &cards {
            if let Some(p) = card.progress {
                assert!((0.0..=100.0).contains(&p));
            }
        }
    }

    #[test]
    fn cards_from_snapshot() {
        let cards = summary_cards(&snapshot());
        assert_eq!(cards[0].value, "2.0K");
        assert_eq!(cards[1].value, "45.0%");
        assert_eq!(cards[3].value, "90.0%");
        assert_eq!(cards[4].value, "7 / 14");
        assert_eq!(cards[5].value, "1:40");
    }

    #[test]
    fn chart_sorted_descending() {
        let slices = regional_chart(&snapshot().regional_distribution);
        assert_eq!(slices[0].label, "Juba");
        assert!((slices[0].share - 75.0).abs() < 1e-9);
        assert_eq!(slices[1].label, "Yei");
    }

    #[test]
    fn chart_of_empty_regions() {
        let slices = regional_chart(&[RegionCount::default()]);
        assert_eq!(slices[0].label, "Unspecified");
        assert!(slices[0].share.abs() < f64::EPSILON);
    }

    #[test]
    fn cash_transfer_with_tranches() {
        let stats = CashTransferStats {
            eligible_learners: 1000,
            approved_learners: 800,
            paid_learners: 400,
            schools: 20,
            amount_disbursed: 2_000_000.0,
            tranches: vec![TrancheSummary {
                tranche: 1,
                learners: 800,
                paid: 400,
                amount: 2_000_000.0,
            }],
        };
        let cards = cash_transfer_cards(&stats);
        assert_eq!(cards.len(), 5);
        assert_eq!(cards[1].caption, "80.0% of eligible");
        assert_eq!(cards[2].caption, "50.0% of approved");
        assert_eq!(cards[3].value, "SSP 2.0M");
        assert_eq!(cards[4].value, "#1");
    }
}

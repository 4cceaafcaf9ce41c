#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aggregate statistics returned by the dashboard API.
//!
//! A snapshot is computed server-side for one location selection and is
//! always replaced wholesale when the selection changes. Every numeric
//! field defaults to zero, so the all-zero value produced by
//! [`StatisticsSnapshot::zeroed`] doubles as the "no data for this filter"
//! display.

use emis_school_models::lenient::{first_amount, first_count, first_present, first_text};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Enrollment statistics for one location selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawSnapshot")]
pub struct StatisticsSnapshot {
    /// Learner counts by gender and disability.
    pub demographics: Demographics,
    /// Learner and school counts per child region of the selection.
    pub regional_distribution: Vec<RegionCount>,
    /// Reporting activity for the selection.
    pub engagement: Engagement,
}

impl StatisticsSnapshot {
    /// The all-zero fallback shown when the API has no data for a filter.
    #[must_use]
    pub fn zeroed() -> Self {
        Self::default()
    }

    /// `true` if every count in the snapshot is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.demographics == Demographics::default()
            && self.engagement == Engagement::default()
            && self
                .regional_distribution
                .iter()
                .all(|r| r.learners == 0 && r.schools == 0)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSnapshot {
    demographics: Option<Value>,
    regional_distribution: Option<Value>,
    regions: Option<Value>,
    regional: Option<Value>,
    engagement: Option<Value>,
}

impl From<RawSnapshot> for StatisticsSnapshot {
    fn from(raw: RawSnapshot) -> Self {
        Self {
            demographics: nested(raw.demographics),
            regional_distribution: nested_list(first_present([
                raw.regional_distribution,
                raw.regions,
                raw.regional,
            ])),
            engagement: nested(raw.engagement),
        }
    }
}

/// A nested section, zeroed when missing or not an object.
fn nested<T: DeserializeOwned + Default>(value: Option<Value>) -> T {
    value
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

/// A nested list, keeping the entries that parse.
fn nested_list<T: DeserializeOwned>(value: Option<Value>) -> Vec<T> {
    match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    }
}

/// Learner counts by gender and disability status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawDemographics")]
pub struct Demographics {
    /// All learners.
    pub total_learners: u64,
    /// Male learners.
    pub male: u64,
    /// Female learners.
    pub female: u64,
    /// Learners with disabilities (LWD).
    pub lwd: u64,
    /// Male learners with disabilities.
    pub male_lwd: u64,
    /// Female learners with disabilities.
    pub female_lwd: u64,
}

impl Demographics {
    /// Total learners, falling back to `male + female` when the API left
    /// the total out.
    #[must_use]
    pub const fn effective_total(&self) -> u64 {
        if self.total_learners > 0 {
            self.total_learners
        } else {
            self.male.saturating_add(self.female)
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDemographics {
    total_learners: Option<Value>,
    total: Option<Value>,
    male: Option<Value>,
    boys: Option<Value>,
    female: Option<Value>,
    girls: Option<Value>,
    lwd: Option<Value>,
    learners_with_disabilities: Option<Value>,
    male_lwd: Option<Value>,
    #[serde(rename = "maleLWD")]
    male_lwd_upper: Option<Value>,
    female_lwd: Option<Value>,
    #[serde(rename = "femaleLWD")]
    female_lwd_upper: Option<Value>,
}

impl From<RawDemographics> for Demographics {
    fn from(raw: RawDemographics) -> Self {
        Self {
            total_learners: first_count([raw.total_learners, raw.total]),
            male: first_count([raw.male, raw.boys]),
            female: first_count([raw.female, raw.girls]),
            lwd: first_count([raw.lwd, raw.learners_with_disabilities]),
            male_lwd: first_count([raw.male_lwd, raw.male_lwd_upper]),
            female_lwd: first_count([raw.female_lwd, raw.female_lwd_upper]),
        }
    }
}

/// One region's share of a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawRegionCount")]
pub struct RegionCount {
    /// Region name (state code, county, or payam, one level below the
    /// selection).
    pub name: String,
    /// Learners in the region.
    pub learners: u64,
    /// Schools in the region.
    pub schools: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRegionCount {
    name: Option<Value>,
    #[serde(rename = "_id")]
    object_id: Option<Value>,
    payam: Option<Value>,
    county: Option<Value>,
    state: Option<Value>,
    learners: Option<Value>,
    count: Option<Value>,
    total_learners: Option<Value>,
    schools: Option<Value>,
    school_count: Option<Value>,
}

impl From<RawRegionCount> for RegionCount {
    fn from(raw: RawRegionCount) -> Self {
        Self {
            name: first_text([raw.name, raw.object_id, raw.payam, raw.county, raw.state]),
            learners: first_count([raw.learners, raw.count, raw.total_learners]),
            schools: first_count([raw.schools, raw.school_count]),
        }
    }
}

/// Reporting and attendance activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawEngagement")]
pub struct Engagement {
    /// Schools in scope.
    pub schools: u64,
    /// Schools that submitted attendance for the reporting day.
    pub schools_reporting: u64,
    /// Learners marked present.
    pub present: u64,
    /// Learners marked absent.
    pub absent: u64,
    /// Active enumerators (field data-collection agents).
    pub enumerators: u64,
    /// Teachers on record.
    pub teachers: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEngagement {
    schools: Option<Value>,
    total_schools: Option<Value>,
    schools_reporting: Option<Value>,
    reporting_schools: Option<Value>,
    present: Option<Value>,
    present_today: Option<Value>,
    absent: Option<Value>,
    absent_today: Option<Value>,
    enumerators: Option<Value>,
    teachers: Option<Value>,
}

impl From<RawEngagement> for Engagement {
    fn from(raw: RawEngagement) -> Self {
        Self {
            schools: first_count([raw.schools, raw.total_schools]),
            schools_reporting: first_count([raw.schools_reporting, raw.reporting_schools]),
            present: first_count([raw.present, raw.present_today]),
            absent: first_count([raw.absent, raw.absent_today]),
            enumerators: first_count([raw.enumerators]),
            teachers: first_count([raw.teachers]),
        }
    }
}

/// Cash-transfer grant statistics for one location selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawCashTransferStats")]
pub struct CashTransferStats {
    /// Learners eligible for the grant.
    pub eligible_learners: u64,
    /// Eligible learners whose payment was approved.
    pub approved_learners: u64,
    /// Learners who have been paid.
    pub paid_learners: u64,
    /// Schools participating in the programme.
    pub schools: u64,
    /// Total amount disbursed.
    pub amount_disbursed: f64,
    /// Per-tranche breakdown.
    pub tranches: Vec<TrancheSummary>,
}

impl CashTransferStats {
    /// The all-zero fallback shown when the API has no data for a filter.
    #[must_use]
    pub fn zeroed() -> Self {
        Self::default()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCashTransferStats {
    eligible_learners: Option<Value>,
    eligible: Option<Value>,
    approved_learners: Option<Value>,
    approved: Option<Value>,
    paid_learners: Option<Value>,
    paid: Option<Value>,
    schools: Option<Value>,
    total_schools: Option<Value>,
    amount_disbursed: Option<Value>,
    total_amount: Option<Value>,
    amount: Option<Value>,
    tranches: Option<Value>,
}

impl From<RawCashTransferStats> for CashTransferStats {
    fn from(raw: RawCashTransferStats) -> Self {
        Self {
            eligible_learners: first_count([raw.eligible_learners, raw.eligible]),
            approved_learners: first_count([raw.approved_learners, raw.approved]),
            paid_learners: first_count([raw.paid_learners, raw.paid]),
            schools: first_count([raw.schools, raw.total_schools]),
            amount_disbursed: first_amount([raw.amount_disbursed, raw.total_amount, raw.amount]),
            tranches: nested_list(raw.tranches),
        }
    }
}

/// One disbursement round of the cash-transfer programme.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawTrancheSummary")]
pub struct TrancheSummary {
    /// Tranche number, starting at 1.
    pub tranche: u64,
    /// Learners included in the tranche.
    pub learners: u64,
    /// Learners in the tranche who have been paid.
    pub paid: u64,
    /// Amount disbursed in the tranche.
    pub amount: f64,
}

#[derive(Deserialize)]
struct RawTrancheSummary {
    tranche: Option<Value>,
    number: Option<Value>,
    learners: Option<Value>,
    paid: Option<Value>,
    amount: Option<Value>,
}

impl From<RawTrancheSummary> for TrancheSummary {
    fn from(raw: RawTrancheSummary) -> Self {
        Self {
            tranche: first_count([raw.tranche, raw.number]),
            learners: first_count([raw.learners]),
            paid: first_count([raw.paid]),
            amount: first_amount([raw.amount]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_snapshot_defaults_to_zero() {
        let snapshot: StatisticsSnapshot = serde_json::from_value(json!({
            "demographics": { "male": "120", "girls": 80 },
            "regions": null
        }))
        .unwrap();

        assert_eq!(snapshot.demographics.male, 120);
        assert_eq!(snapshot.demographics.female, 80);
        assert_eq!(snapshot.demographics.lwd, 0);
        assert_eq!(snapshot.demographics.effective_total(), 200);
        assert!(snapshot.regional_distribution.is_empty());
        assert_eq!(snapshot.engagement, Engagement::default());
    }

    #[test]
    fn empty_object_is_zeroed() {
        let snapshot: StatisticsSnapshot = serde_json::from_value(json!({})).unwrap();
        assert_eq!(snapshot, StatisticsSnapshot::zeroed());
        assert!(snapshot.is_zero());
    }

    #[test]
    fn region_aliases() {
        let snapshot: StatisticsSnapshot = serde_json::from_value(json!({
            "regionalDistribution": [
                { "_id": "Juba", "count": 500, "schoolCount": "12" },
                { "county": "Yei", "learners": 300 }
            ]
        }))
        .unwrap();

        assert_eq!(snapshot.regional_distribution.len(), 2);
        assert_eq!(snapshot.regional_distribution[0].name, "Juba");
        assert_eq!(snapshot.regional_distribution[0].schools, 12);
        assert_eq!(snapshot.regional_distribution[1].name, "Yei");
        assert!(!snapshot.is_zero());
    }

    #[test]
    fn cash_transfer_amounts() {
        let stats: CashTransferStats = serde_json::from_value(json!({
            "eligible": 1000,
            "approved": "800",
            "paid": 600,
            "totalAmount": "1,500,000.50",
            "tranches": [{ "number": 1, "learners": 600, "paid": 600, "amount": 900000 }]
        }))
        .unwrap();

        assert_eq!(stats.eligible_learners, 1000);
        assert_eq!(stats.approved_learners, 800);
        assert!((stats.amount_disbursed - 1_500_000.5).abs() < 1e-6);
        assert_eq!(stats.tranches[0].tranche, 1);
    }

    #[test]
    fn records_with_several_spellings_of_a_field() {
        let snapshot: StatisticsSnapshot = serde_json::from_value(json!({
            "demographics": { "total": 90, "totalLearners": 100, "male": 60, "boys": 55 },
            "regionalDistribution": [
                { "_id": "Juba", "county": "Juba", "count": 5, "totalLearners": 7 }
            ],
            "regions": [{ "name": "ignored" }],
            "engagement": { "schools": 4, "totalSchools": 9 }
        }))
        .unwrap();

        assert_eq!(snapshot.demographics.total_learners, 100);
        assert_eq!(snapshot.demographics.male, 60);
        assert_eq!(snapshot.regional_distribution.len(), 1);
        assert_eq!(snapshot.regional_distribution[0].name, "Juba");
        assert_eq!(snapshot.regional_distribution[0].learners, 5);
        assert_eq!(snapshot.engagement.schools, 4);

        let stats: CashTransferStats = serde_json::from_value(json!({
            "eligible": 10,
            "eligibleLearners": 12,
            "totalAmount": 500,
            "amount": 400,
            "tranches": [{ "tranche": 2, "number": 1 }, "garbage"]
        }))
        .unwrap();

        assert_eq!(stats.eligible_learners, 12);
        assert!((stats.amount_disbursed - 500.0).abs() < f64::EPSILON);
        assert_eq!(stats.tranches.len(), 1);
        assert_eq!(stats.tranches[0].tranche, 2);
    }

    #[test]
    fn malformed_sections_fall_back_to_zero() {
        let snapshot: StatisticsSnapshot = serde_json::from_value(json!({
            "demographics": "n/a",
            "regionalDistribution": { "Juba": 3 },
            "engagement": { "present": "12" }
        }))
        .unwrap();

        assert_eq!(snapshot.demographics, Demographics::default());
        assert!(snapshot.regional_distribution.is_empty());
        assert_eq!(snapshot.engagement.present, 12);
    }

    #[test]
    fn serialized_snapshot_reads_back() {
        let snapshot = StatisticsSnapshot {
            demographics: Demographics {
                total_learners: 10,
                male_lwd: 2,
                ..Demographics::default()
            },
            regional_distribution: vec![RegionCount {
                name: "Yei".to_string(),
                learners: 4,
                schools: 1,
            }],
            engagement: Engagement::default(),
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(serde_json::from_value::<StatisticsSnapshot>(value).unwrap(), snapshot);
    }
}

//! Where the filter gets its option lists and statistics.

use async_trait::async_trait;
use emis_api::{ApiError, DashboardClient};
use emis_location_models::{LocationLevel, LocationNode, LocationSelection};
use emis_statistics_models::{CashTransferStats, StatisticsSnapshot};

/// Data behind one dashboard filter bar.
///
/// Each dashboard page pairs the same cascading location options with its
/// own statistics type.
#[async_trait]
pub trait FilterSource: Send + Sync {
    /// Statistics shown under the filter. `Default` is the all-zero
    /// fallback displayed when there is no data.
    type Statistics: Clone + Default + Send + Sync + 'static;

    /// Options for `level` under the ancestors selected in `scope`.
    async fn options(
        &self,
        level: LocationLevel,
        scope: &LocationSelection,
    ) -> Result<Vec<LocationNode>, ApiError>;

    /// Statistics for everything inside `scope`.
    async fn statistics(&self, scope: &LocationSelection) -> Result<Self::Statistics, ApiError>;
}

/// Enrollment overview data from the dashboard API.
#[derive(Debug, Clone)]
pub struct EnrollmentSource {
    client: DashboardClient,
}

impl EnrollmentSource {
    #[must_use]
    pub const fn new(client: DashboardClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FilterSource for EnrollmentSource {
    type Statistics = StatisticsSnapshot;

    async fn options(
        &self,
        level: LocationLevel,
        scope: &LocationSelection,
    ) -> Result<Vec<LocationNode>, ApiError> {
        self.client.options(level, scope).await
    }

    async fn statistics(&self, scope: &LocationSelection) -> Result<StatisticsSnapshot, ApiError> {
        self.client.statistics(scope).await
    }
}

/// Cash-transfer programme data from the dashboard API.
#[derive(Debug, Clone)]
pub struct CashTransferSource {
    client: DashboardClient,
}

impl CashTransferSource {
    #[must_use]
    pub const fn new(client: DashboardClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FilterSource for CashTransferSource {
    type Statistics = CashTransferStats;

    async fn options(
        &self,
        level: LocationLevel,
        scope: &LocationSelection,
    ) -> Result<Vec<LocationNode>, ApiError> {
        self.client.options(level, scope).await
    }

    async fn statistics(&self, scope: &LocationSelection) -> Result<CashTransferStats, ApiError> {
        self.client.cash_transfer_stats(scope).await
    }
}

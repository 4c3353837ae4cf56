//! Market data payload served on the dashboard overview.

use serde::{Deserialize, Serialize};

use crate::identity::Timestamp;

/// Protocol-wide market snapshot.
///
/// Field names follow the dashboard's JSON contract (`camelCase`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct MarketData {
    /// Total value locked, in USD.
    pub tvl: u64,
    /// Trading volume over the last 24 hours, in USD.
    pub volume_24h: u64,
    /// Blended annual percentage yield across pools (percent).
    pub apy: f64,
    /// Number of open liquidity positions.
    pub active_positions: u32,
    /// Share of deposited liquidity currently deployed (0.0 - 1.0).
    pub utilization: f64,
    /// When the upstream produced this snapshot.
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

impl MarketData {
    /// Reject snapshots that cannot be shown on the dashboard.
    pub fn validate(&self) -> Result<(), String> {
        if !self.apy.is_finite() || self.apy < 0.0 {
            return Err(format!("apy must be a non-negative number, got {}", self.apy));
        }
        if !(0.0..=1.0).contains(&self.utilization) {
            return Err(format!(
                "utilization must be within 0.0..=1.0, got {}",
                self.utilization
            ));
        }
        Ok(())
    }
}

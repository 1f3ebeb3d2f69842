// =============================================================================
// FREIGHT CALCULATOR
// =============================================================================
// Shipping cost as a pure function of destination region and subtotal.
//
// - subtotal >= free_threshold  -> 0
// - otherwise the fee of the region's tier (metro / standard / remote)
// =============================================================================

use crate::error::{OrderError, OrderResult};

pub const DEFAULT_FREE_THRESHOLD: i64 = 9900;
pub const DEFAULT_METRO_FEE: i64 = 800;
pub const DEFAULT_STANDARD_FEE: i64 = 1200;
pub const DEFAULT_REMOTE_FEE: i64 = 2000;

pub const DEFAULT_METRO_REGIONS: &[&str] = &[
    "Beijing",
    "Shanghai",
    "Tianjin",
    "Chongqing",
    "Guangdong",
    "Jiangsu",
    "Zhejiang",
];

pub const DEFAULT_REMOTE_REGIONS: &[&str] = &[
    "Xinjiang",
    "Tibet",
    "Qinghai",
    "Inner Mongolia",
    "Ningxia",
    "Gansu",
    "Hainan",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionTier {
    Metro,
    Standard,
    Remote,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FreightRules {
    pub free_threshold: i64,
    pub metro_fee: i64,
    pub standard_fee: i64,
    pub remote_fee: i64,
    pub metro_regions: Vec<String>,
    pub remote_regions: Vec<String>,
}

impl Default for FreightRules {
    fn default() -> Self {
        Self {
            free_threshold: DEFAULT_FREE_THRESHOLD,
            metro_fee: DEFAULT_METRO_FEE,
            standard_fee: DEFAULT_STANDARD_FEE,
            remote_fee: DEFAULT_REMOTE_FEE,
            metro_regions: DEFAULT_METRO_REGIONS.iter().map(|r| r.to_string()).collect(),
            remote_regions: DEFAULT_REMOTE_REGIONS.iter().map(|r| r.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FreightCalculator {
    rules: FreightRules,
}

impl FreightCalculator {
    pub fn new(rules: FreightRules) -> Self {
        Self { rules }
    }

    /// Region names match case-insensitively; unknown regions are Standard.
    pub fn tier(&self, region: &str) -> RegionTier {
        let region = region.trim();
        let listed = |list: &[String]| list.iter().any(|r| r.eq_ignore_ascii_case(region));

        if listed(&self.rules.metro_regions) {
            RegionTier::Metro
        } else if listed(&self.rules.remote_regions) {
            RegionTier::Remote
        } else {
            RegionTier::Standard
        }
    }

    pub fn calculate(&self, region: &str, subtotal: i64) -> OrderResult<i64> {
        if region.trim().is_empty() {
            return Err(OrderError::Validation("destination region is empty".into()));
        }
        if subtotal < 0 {
            return Err(OrderError::Validation(format!(
                "subtotal must not be negative, got {}",
                subtotal
            )));
        }

        if subtotal >= self.rules.free_threshold {
            return Ok(0);
        }

        Ok(match self.tier(region) {
            RegionTier::Metro => self.rules.metro_fee,
            RegionTier::Standard => self.rules.standard_fee,
            RegionTier::Remote => self.rules.remote_fee,
        })
    }
}

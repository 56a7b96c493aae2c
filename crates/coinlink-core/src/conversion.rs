//! Greedy conversion of credited currency into minutes and reward points.
//!
//! Both conversions walk their table from the largest denomination down,
//! consuming as many whole units of each denomination as the balance allows.
//! They are pure functions: no store access, no side effects.
//!
//! # Examples
//!
//! ```
//! use coinlink_core::{RateTable, time_from_balance};
//!
//! let rates = RateTable::parse("1:10,5:60,10:180,20:300").unwrap();
//! // 20 (+300), 10 (+180), 5 (+60)
//! assert_eq!(time_from_balance(35, &rates), 540);
//! ```

use std::collections::BTreeMap;

use tracing::warn;

use crate::constants::{DEFAULT_RATE_TIER, FALLBACK_MINUTES_PER_UNIT};
use crate::{Result, error::Error};

/// Coin rate table: `(denomination, minutes)` tiers sorted by denomination
/// descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateTable {
    tiers: Vec<(u64, u64)>,
}

impl RateTable {
    /// Parse a `denomination:minutes` list such as `"1:10,5:60"`.
    ///
    /// # Errors
    /// Returns `Error::InvalidRate` if the list is empty or any entry is not
    /// two non-negative integers separated by `:`.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut tiers = Vec::new();

        for part in spec.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (amount, minutes) = part
                .split_once(':')
                .ok_or_else(|| Error::InvalidRate(part.to_string()))?;
            let amount: u64 = amount
                .trim()
                .parse()
                .map_err(|_| Error::InvalidRate(part.to_string()))?;
            let minutes: u64 = minutes
                .trim()
                .parse()
                .map_err(|_| Error::InvalidRate(part.to_string()))?;
            tiers.push((amount, minutes));
        }

        if tiers.is_empty() {
            return Err(Error::InvalidRate(spec.to_string()));
        }

        Ok(Self::from_tiers(tiers))
    }

    /// Parse a rate list, falling back to the default single tier when the
    /// configuration is malformed.
    pub fn parse_or_default(spec: &str) -> Self {
        Self::parse(spec).unwrap_or_else(|e| {
            warn!(rates = spec, error = %e, "malformed coin rates, using default tier");
            Self::default()
        })
    }

    /// Build a table from arbitrary tiers; they are sorted descending.
    #[must_use]
    pub fn from_tiers(mut tiers: Vec<(u64, u64)>) -> Self {
        tiers.sort_by(|a, b| b.0.cmp(&a.0));
        Self { tiers }
    }

    /// Tiers, largest denomination first.
    #[must_use]
    pub fn tiers(&self) -> &[(u64, u64)] {
        &self.tiers
    }
}

impl Default for RateTable {
    fn default() -> Self {
        Self {
            tiers: vec![DEFAULT_RATE_TIER],
        }
    }
}

/// Reward table: `(denomination, points)` sorted by denomination descending.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PointMap {
    tiers: Vec<(u64, f64)>,
}

impl PointMap {
    /// Build from the persisted `{"denomination": points}` map.
    ///
    /// Keys that are not integers and negative or non-finite values are
    /// skipped.
    pub fn from_map(map: &BTreeMap<String, f64>) -> Self {
        let mut tiers: Vec<(u64, f64)> = map
            .iter()
            .filter_map(|(denomination, points)| {
                let denomination = denomination.trim().parse::<u64>().ok()?;
                (points.is_finite() && *points >= 0.0).then_some((denomination, *points))
            })
            .collect();
        tiers.sort_by(|a, b| b.0.cmp(&a.0));
        Self { tiers }
    }

    /// Tiers, largest denomination first.
    #[must_use]
    pub fn tiers(&self) -> &[(u64, f64)] {
        &self.tiers
    }
}

/// Convert a balance into minutes of access.
///
/// Any remainder smaller than the smallest denomination converts at
/// [`FALLBACK_MINUTES_PER_UNIT`]. Zero denominations are ignored.
#[must_use]
pub fn time_from_balance(balance: u64, rates: &RateTable) -> u64 {
    let mut remaining = balance;
    let mut minutes = 0u64;

    for &(denomination, tier_minutes) in rates.tiers() {
        if denomination == 0 {
            continue;
        }
        let count = remaining / denomination;
        if count > 0 {
            minutes = minutes.saturating_add(count.saturating_mul(tier_minutes));
            remaining %= denomination;
        }
    }

    minutes.saturating_add(remaining.saturating_mul(FALLBACK_MINUTES_PER_UNIT))
}

/// Convert a balance into reward points.
///
/// Unlike [`time_from_balance`], a remainder below the smallest denomination
/// earns nothing. Returns `0.0` when the points feature is disabled.
#[must_use]
pub fn points_from_balance(balance: u64, points: &PointMap, enabled: bool) -> f64 {
    if !enabled {
        return 0.0;
    }

    let mut remaining = balance;
    let mut total = 0.0;

    for &(denomination, tier_points) in points.tiers() {
        if denomination == 0 {
            continue;
        }
        let count = remaining / denomination;
        if count > 0 {
            total += count as f64 * tier_points;
            remaining %= denomination;
        }
    }

    total
}

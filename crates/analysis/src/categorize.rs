use std::fmt;

use chrono::{DateTime, Utc};
use common::config::SizeBins;
use serde::{Deserialize, Serialize};

use crate::metrics::duration_days;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeCategory {
    Micro,
    Small,
    Medium,
    Large,
    Mega,
}

impl SizeCategory {
    pub const ORDERED: [SizeCategory; 5] = [
        SizeCategory::Micro,
        SizeCategory::Small,
        SizeCategory::Medium,
        SizeCategory::Large,
        SizeCategory::Mega,
    ];

    /// Buckets a star count against validated edges, lower edge closed.
    /// NaN and negative counts fall into the lowest bucket.
    pub fn from_stars(stars: f64, bins: &SizeBins) -> Self {
        if stars.is_nan() {
            return SizeCategory::Micro;
        }
        let idx = bins.edges().iter().take_while(|edge| stars >= **edge).count();
        Self::ORDERED[idx]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SizeCategory::Micro => "micro",
            SizeCategory::Small => "small",
            SizeCategory::Medium => "medium",
            SizeCategory::Large => "large",
            SizeCategory::Mega => "mega",
        }
    }
}

impl fmt::Display for SizeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityCategory {
    VeryActive,
    Active,
    LessActive,
    Inactive,
}

impl ActivityCategory {
    pub fn from_days_since_update(days: f64) -> Self {
        if days <= 7.0 {
            ActivityCategory::VeryActive
        } else if days <= 30.0 {
            ActivityCategory::Active
        } else if days <= 90.0 {
            ActivityCategory::LessActive
        } else {
            ActivityCategory::Inactive
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityCategory::VeryActive => "very_active",
            ActivityCategory::Active => "active",
            ActivityCategory::LessActive => "less_active",
            ActivityCategory::Inactive => "inactive",
        }
    }
}

impl fmt::Display for ActivityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A repository with no recorded update is treated as updated at `now`.
pub fn effective_updated_at(updated_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    updated_at.unwrap_or(now)
}

pub fn days_since_update(updated_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let updated = effective_updated_at(updated_at, now);
    duration_days(Some(updated), Some(now)).unwrap_or(0.0)
}

/// Strictly more than `threshold_days` since the last update. Thresholds too
/// large to represent are never crossed.
pub fn is_stale(updated_at: Option<DateTime<Utc>>, now: DateTime<Utc>, threshold_days: i64) -> bool {
    let elapsed_ms = (now - effective_updated_at(updated_at, now)).num_milliseconds();
    elapsed_ms > threshold_days.saturating_mul(MILLIS_PER_DAY)
}

const MILLIS_PER_DAY: i64 = 86_400_000;

//! Column-wise outlier handling. No strategy ever drops a value: the output
//! column always has the input's length.

use std::cmp::Ordering;

use common::config::{OutlierRule, OutlierStrategy};
use normalizer::Repository;
use tracing::debug;

pub fn handle_outliers(values: &[f64], strategy: OutlierStrategy) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    match strategy {
        OutlierStrategy::PercentileClip { p } => percentile_clip(values, p),
        OutlierStrategy::IqrClip { k } => iqr_clip(values, k),
        OutlierStrategy::ZscoreImpute { t } => zscore_impute(values, t),
        OutlierStrategy::LogTransform => values.iter().map(|v| v.max(0.0).ln_1p()).collect(),
    }
}

/// Applies each rule to its repository column in order.
pub fn apply_outlier_rules(mut repos: Vec<Repository>, rules: &[OutlierRule]) -> Vec<Repository> {
    for rule in rules {
        let column: Vec<f64> = repos
            .iter()
            .filter_map(|repo| repo.count(&rule.column))
            .collect();
        if column.len() != repos.len() {
            continue;
        }
        let handled = handle_outliers(&column, rule.strategy);
        let changed = column
            .iter()
            .zip(&handled)
            .filter(|(before, after)| before != after)
            .count();
        for (repo, value) in repos.iter_mut().zip(handled) {
            if let Some(slot) = repo.count_mut(&rule.column) {
                *slot = value;
            }
        }
        debug!(
            column = %rule.column,
            strategy = rule.strategy.name(),
            changed,
            "handled outliers"
        );
    }
    repos
}

fn percentile_clip(values: &[f64], p: f64) -> Vec<f64> {
    let sorted = sorted_finite(values);
    if sorted.is_empty() {
        return values.to_vec();
    }
    let upper = quantile(&sorted, p);
    values
        .iter()
        .map(|&v| if v > upper { upper } else { v })
        .collect()
}

fn iqr_clip(values: &[f64], k: f64) -> Vec<f64> {
    let sorted = sorted_finite(values);
    if sorted.is_empty() {
        return values.to_vec();
    }
    let q1 = quantile(&sorted, 0.25);
    let q3 = quantile(&sorted, 0.75);
    let iqr = q3 - q1;
    let lower = q1 - k * iqr;
    let upper = q3 + k * iqr;
    values
        .iter()
        .map(|&v| {
            if v < lower {
                lower
            } else if v > upper {
                upper
            } else {
                v
            }
        })
        .collect()
}

fn zscore_impute(values: &[f64], t: f64) -> Vec<f64> {
    let sorted = sorted_finite(values);
    let Some((mean, std_dev)) = mean_and_std_dev(&sorted) else {
        return values.to_vec();
    };
    // Zero variance: every value equals the mean, nothing to impute.
    if std_dev <= 0.0 || !std_dev.is_finite() {
        return values.to_vec();
    }
    let median = quantile(&sorted, 0.5);
    values
        .iter()
        .map(|&v| {
            if ((v - mean) / std_dev).abs() > t {
                median
            } else {
                v
            }
        })
        .collect()
}

fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}

/// Quantile `q` in `[0, 1]` of ascending `sorted`, interpolating linearly
/// between the two closest ranks.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        len => {
            let rank = q.clamp(0.0, 1.0) * (len - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let frac = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * frac
        }
    }
}

/// Mean and sample standard deviation; `None` below two values.
pub fn mean_and_std_dev(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some((mean, variance.sqrt()))
}

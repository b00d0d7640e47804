//! Field cluster prioritisation.
//!
//! Clusters are groups of stranded people reported by survey drones. Ranking
//! keeps the clusters that pass the filter and orders them by
//! `people / max_people - distance / max_distance`, both maxima taken over the
//! filtered set. Each ranked cluster carries a per-head ration estimate.

use serde::{Deserialize, Serialize};

use relief_core::RequirementEstimate;

use crate::error::{AiError, AiResult};

pub const DEFAULT_MAX_DISTANCE_KM: f64 = 100.0;
pub const DEFAULT_CLUSTER_LIMIT: usize = 5;

/// Per-person ration as an exact fraction, floored per cluster.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Ration {
    pub item: &'static str,
    pub numerator: u64,
    pub denominator: u64,
}

pub const CLUSTER_RATIONS: [Ration; 5] = [
    Ration { item: "Medical Kit", numerator: 1, denominator: 5 },
    Ration { item: "Emergency Food Pack", numerator: 1, denominator: 1 },
    Ration { item: "Water Bottles", numerator: 3, denominator: 1 },
    Ration { item: "Blankets", numerator: 1, denominator: 1 },
    Ration { item: "First Aid Bandages", numerator: 1, denominator: 2 },
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterReport {
    pub cluster_id: String,
    pub people: u64,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_km: f64,
}

impl ClusterReport {
    pub fn validate(&self) -> AiResult<()> {
        if self.cluster_id.trim().is_empty() {
            return Err(AiError::InvalidInput("cluster_id must not be empty".to_string()));
        }
        if !self.latitude.is_finite() || !self.longitude.is_finite() {
            return Err(AiError::InvalidInput(format!(
                "cluster {} has a non-finite location",
                self.cluster_id
            )));
        }
        if !self.distance_km.is_finite() || self.distance_km < 0.0 {
            return Err(AiError::InvalidInput(format!(
                "cluster {} has invalid distance {}",
                self.cluster_id, self.distance_km
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ClusterFilter {
    pub min_people: u64,
    pub max_distance_km: f64,
    pub limit: usize,
}

impl Default for ClusterFilter {
    fn default() -> Self {
        Self {
            min_people: 0,
            max_distance_km: DEFAULT_MAX_DISTANCE_KM,
            limit: DEFAULT_CLUSTER_LIMIT,
        }
    }
}

impl ClusterFilter {
    fn check(&self) -> AiResult<()> {
        if !self.max_distance_km.is_finite() || self.max_distance_km < 0.0 {
            return Err(AiError::InvalidInput(format!(
                "max_distance must be a non-negative number (got {})",
                self.max_distance_km
            )));
        }
        if self.limit == 0 {
            return Err(AiError::InvalidInput("limit must be positive".to_string()));
        }
        Ok(())
    }

    fn admits(&self, report: &ClusterReport) -> bool {
        report.people >= self.min_people && report.distance_km <= self.max_distance_km
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCluster {
    #[serde(flatten)]
    pub report: ClusterReport,
    pub priority_score: f64,
    pub recommended_resources: RequirementEstimate,
}

/// Floored ration table for `people`.
pub fn cluster_resources(people: u64) -> RequirementEstimate {
    let mut out = RequirementEstimate::new();
    for r in CLUSTER_RATIONS {
        let qty = u128::from(people) * u128::from(r.numerator) / u128::from(r.denominator);
        out.insert(r.item, u64::try_from(qty).unwrap_or(u64::MAX));
    }
    out
}

/// Filter, score and keep the best `filter.limit` clusters. Equal scores keep input order.
pub fn rank_clusters(reports: &[ClusterReport], filter: &ClusterFilter) -> AiResult<Vec<RankedCluster>> {
    filter.check()?;

    let admitted: Vec<&ClusterReport> = reports.iter().filter(|r| filter.admits(r)).collect();
    let max_people = admitted.iter().map(|r| r.people).max().unwrap_or(0);
    let max_distance = admitted.iter().map(|r| r.distance_km).fold(0.0_f64, f64::max);

    let mut ranked: Vec<RankedCluster> = admitted
        .into_iter()
        .map(|report| {
            let people_term = if max_people == 0 {
                0.0
            } else {
                report.people as f64 / max_people as f64
            };
            let distance_term = if max_distance > 0.0 {
                report.distance_km / max_distance
            } else {
                0.0
            };
            RankedCluster {
                report: report.clone(),
                priority_score: people_term - distance_term,
                recommended_resources: cluster_resources(report.people),
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.priority_score.total_cmp(&a.priority_score));
    ranked.truncate(filter.limit);
    Ok(ranked)
}

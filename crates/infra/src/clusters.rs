//! Drone cluster reports loaded from CSV.
//!
//! Expected header: `Cluster_ID,No_of_People,Latitude,Longitude,Distance_from_Inventory_km`.
//! Extra columns are ignored. A bad row fails the whole load.

use std::io;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use relief_ai::{AiError, ClusterReport};

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("cluster csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid cluster row at line {line}: {source}")]
    InvalidRow {
        line: u64,
        #[source]
        source: AiError,
    },
}

#[derive(Debug, Deserialize)]
struct ClusterRow {
    #[serde(rename = "Cluster_ID")]
    cluster_id: String,
    #[serde(rename = "No_of_People")]
    people: u64,
    #[serde(rename = "Latitude")]
    latitude: f64,
    #[serde(rename = "Longitude")]
    longitude: f64,
    #[serde(rename = "Distance_from_Inventory_km")]
    distance_km: f64,
}

impl From<ClusterRow> for ClusterReport {
    fn from(row: ClusterRow) -> Self {
        ClusterReport {
            cluster_id: row.cluster_id.trim().to_string(),
            people: row.people,
            latitude: row.latitude,
            longitude: row.longitude,
            distance_km: row.distance_km,
        }
    }
}

pub fn read_cluster_reports<R: io::Read>(reader: R) -> Result<Vec<ClusterReport>, ClusterError> {
    let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut out = Vec::new();

    for record in csv.deserialize::<ClusterRow>() {
        let report = ClusterReport::from(record?);
        if let Err(source) = report.validate() {
            // Header is line 1.
            return Err(ClusterError::InvalidRow {
                line: out.len() as u64 + 2,
                source,
            });
        }
        out.push(report);
    }
    Ok(out)
}

pub fn load_cluster_reports(path: &Path) -> Result<Vec<ClusterReport>, ClusterError> {
    let file = std::fs::File::open(path).map_err(csv::Error::from)?;
    let reports = read_cluster_reports(io::BufReader::new(file))?;
    info!(path = %path.display(), clusters = reports.len(), "cluster reports loaded");
    Ok(reports)
}

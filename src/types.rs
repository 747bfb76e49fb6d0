use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One repository or application tracked by the organization.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    pub target_name: String,
}

impl Target {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            target_name: name.into(),
        }
    }
}

/// One row of the issues export. `last_tested_date` is kept as the raw string the
/// vendor sent; it is parsed during reconciliation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanRecord {
    pub target_name: String,
    #[serde(default)]
    pub last_tested_date: Option<String>,
}

impl ScanRecord {
    pub fn new(name: impl Into<String>, last_tested_date: impl Into<String>) -> Self {
        Self {
            target_name: name.into(),
            last_tested_date: Some(last_tested_date.into()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComplianceStatus {
    #[serde(rename = "COMPLIANT")]
    Compliant,
    #[serde(rename = "NON-COMPLIANT")]
    NonCompliant,
    #[serde(rename = "GHOST / ZERO-VULN")]
    Ghost,
}

impl ComplianceStatus {
    pub const ALL: [ComplianceStatus; 3] = [
        ComplianceStatus::Compliant,
        ComplianceStatus::NonCompliant,
        ComplianceStatus::Ghost,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ComplianceStatus::Compliant => "COMPLIANT",
            ComplianceStatus::NonCompliant => "NON-COMPLIANT",
            ComplianceStatus::Ghost => "GHOST / ZERO-VULN",
        }
    }
}

impl fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One output row. A `None` date means the target was never scanned.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub target_name: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_tested_date: Option<OffsetDateTime>,
    pub compliance_status: ComplianceStatus,
}

/// Per-status row counts for the console summary.
#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub compliant: u64,
    pub non_compliant: u64,
    pub ghost: u64,
}

impl StatusCounts {
    pub fn from_rows(rows: &[ReportRow]) -> Self {
        let mut counts = Self::default();
        for row in rows {
            match row.compliance_status {
                ComplianceStatus::Compliant => counts.compliant += 1,
                ComplianceStatus::NonCompliant => counts.non_compliant += 1,
                ComplianceStatus::Ghost => counts.ghost += 1,
            }
        }
        counts
    }

    pub fn get(&self, status: ComplianceStatus) -> u64 {
        match status {
            ComplianceStatus::Compliant => self.compliant,
            ComplianceStatus::NonCompliant => self.non_compliant,
            ComplianceStatus::Ghost => self.ghost,
        }
    }

    pub fn total(&self) -> u64 {
        self.compliant + self.non_compliant + self.ghost
    }

    /// Statuses present in the report, most frequent first.
    pub fn ranked(&self) -> Vec<(ComplianceStatus, u64)> {
        let mut out: Vec<(ComplianceStatus, u64)> = ComplianceStatus::ALL
            .iter()
            .map(|&s| (s, self.get(s)))
            .filter(|&(_, n)| n > 0)
            .collect();
        // stable: ties keep declaration order
        out.sort_by(|a, b| b.1.cmp(&a.1));
        out
    }
}

use std::collections::{HashMap, HashSet};

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime};

use crate::error::{ReportError, Result};
use crate::types::{ComplianceStatus, ReportRow, ScanRecord, Target};

/// Parse a vendor timestamp. RFC 3339 keeps its offset; naive date-times and
/// bare dates are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<OffsetDateTime> {
    let s = raw.trim();
    if let Ok(t) = OffsetDateTime::parse(s, &Rfc3339) {
        return Ok(t);
    }
    let naive = s.replacen(' ', "T", 1);
    if let Ok(t) = PrimitiveDateTime::parse(
        &naive,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"),
    ) {
        return Ok(t.assume_utc());
    }
    if let Ok(d) = Date::parse(s, format_description!("[year]-[month]-[day]")) {
        return Ok(d.midnight().assume_utc());
    }
    Err(ReportError::parse(
        "last_tested_date",
        format!("unrecognised timestamp {raw:?}"),
    ))
}

/// Latest scan per target. Records without a date are skipped.
pub fn latest_scans(records: &[ScanRecord]) -> Result<HashMap<String, OffsetDateTime>> {
    let mut latest: HashMap<String, OffsetDateTime> = HashMap::new();
    for rec in records {
        let Some(raw) = rec.last_tested_date.as_deref().filter(|s| !s.trim().is_empty()) else {
            continue;
        };
        let ts = parse_timestamp(raw)?;
        latest
            .entry(rec.target_name.clone())
            .and_modify(|cur| {
                if ts > *cur {
                    *cur = ts;
                }
            })
            .or_insert(ts);
    }
    Ok(latest)
}

/// Oldest scan instant that still counts as compliant. Thresholds reaching past
/// the earliest representable date saturate there.
pub fn cutoff(now: OffsetDateTime, threshold_days: u32) -> OffsetDateTime {
    now.to_offset(time::UtcOffset::UTC)
        .checked_sub(Duration::days(i64::from(threshold_days)))
        .unwrap_or_else(|| Date::MIN.midnight().assume_utc())
}

pub fn classify(last_tested: Option<OffsetDateTime>, cutoff: OffsetDateTime) -> ComplianceStatus {
    match last_tested {
        None => ComplianceStatus::Ghost,
        Some(ts) if ts >= cutoff => ComplianceStatus::Compliant,
        Some(_) => ComplianceStatus::NonCompliant,
    }
}

/// Left-join the inventory against the latest scan per target and classify each row.
///
/// Exactly one row per distinct inventory name, in inventory order. Scan records
/// for names missing from the inventory are dropped. Names match exactly.
pub fn reconcile(
    targets: &[Target],
    records: &[ScanRecord],
    threshold_days: u32,
    now: OffsetDateTime,
) -> Result<Vec<ReportRow>> {
    let latest = latest_scans(records)?;
    let cutoff = cutoff(now, threshold_days);
    let mut seen = HashSet::new();

    let rows = targets
        .iter()
        .filter(|t| seen.insert(t.target_name.as_str()))
        .map(|t| {
            let last = latest.get(&t.target_name).copied();
            ReportRow {
                target_name: t.target_name.clone(),
                last_tested_date: last.map(|ts| ts.to_offset(time::UtcOffset::UTC)),
                compliance_status: classify(last, cutoff),
            }
        })
        .collect();
    Ok(rows)
}

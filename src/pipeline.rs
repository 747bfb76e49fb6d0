use std::path::{Path, PathBuf};

use time::{Date, OffsetDateTime};
use tracing::info;

use crate::client::ApiClient;
use crate::config::Config;
use crate::error::Result;
use crate::export::fetch_scan_data;
use crate::inventory::fetch_inventory;
use crate::reconcile::reconcile;
use crate::report::{print_summary, write_report};
use crate::retry::Sleeper;
use crate::types::ReportRow;

/// Fetch inventory and scan data, then join and classify against `now`.
pub async fn build_report<S: Sleeper>(
    client: &ApiClient<S>,
    config: &Config,
    now: OffsetDateTime,
) -> Result<Vec<ReportRow>> {
    let targets = fetch_inventory(client, &config.org_id).await?;
    let records = fetch_scan_data(client, &config.org_id, &config.poll).await?;
    let rows = reconcile(&targets, &records, config.threshold_days, now)?;
    info!(
        targets = targets.len(),
        records = records.len(),
        rows = rows.len(),
        "reconciled"
    );
    Ok(rows)
}

/// One complete run: the CSV is written only after every step succeeded.
/// `report_date` names the file; see [`crate::report::local_today`].
pub async fn run_report<S: Sleeper>(
    client: &ApiClient<S>,
    config: &Config,
    output_dir: &Path,
    report_date: Date,
) -> Result<PathBuf> {
    let rows = build_report(client, config, OffsetDateTime::now_utc()).await?;
    let path = write_report(output_dir, report_date, &rows)?;
    print_summary(&path, &rows);
    Ok(path)
}

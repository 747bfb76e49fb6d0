use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::error::{ReportError, Result};
use crate::types::{ReportRow, StatusCounts};

/// `snyk_report_<YYYYMMDD>.csv`
pub fn report_filename(date: Date) -> Result<String> {
    let stamp = date.format(format_description!("[year][month][day]"))?;
    Ok(format!("snyk_report_{stamp}.csv"))
}

/// Today's date in the local timezone, or UTC when the offset is unknown.
/// Call before the runtime spawns threads; the local offset is unavailable after.
pub fn local_today() -> Date {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .date()
}

/// Serialize the rows as CSV with a header line.
pub fn write_csv<W: Write>(writer: W, rows: &[ReportRow]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    if rows.is_empty() {
        wtr.write_record(["target_name", "last_tested_date", "compliance_status"])?;
    }
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Write the dated report into `dir` and return its path. Nothing is left
/// behind at the final path if serialization fails part-way.
pub fn write_report(dir: &Path, date: Date, rows: &[ReportRow]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(report_filename(date)?);
    let tmp = path.with_extension("csv.partial");
    let result = File::create(&tmp)
        .map_err(ReportError::from)
        .and_then(|f| write_csv(f, rows));
    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    std::fs::rename(&tmp, &path)?;
    Ok(path)
}

/// Summary lines, most frequent status first.
pub fn summary_lines(rows: &[ReportRow]) -> Vec<String> {
    let counts = StatusCounts::from_rows(rows);
    let width = counts
        .ranked()
        .iter()
        .map(|(s, _)| s.as_str().len())
        .max()
        .unwrap_or(0);
    let mut lines: Vec<String> = counts
        .ranked()
        .into_iter()
        .map(|(status, n)| format!("{:<width$}  {n}", status.as_str(), width = width))
        .collect();
    lines.push(format!("total targets: {}", counts.total()));
    lines
}

pub fn print_summary(path: &Path, rows: &[ReportRow]) {
    println!("\n[SUCCESS] Report generated: {}", path.display());
    for line in summary_lines(rows) {
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ComplianceStatus;
    use time::macros::{date, datetime};

    fn rows() -> Vec<ReportRow> {
        vec![
            ReportRow {
                target_name: "acme/api".into(),
                last_tested_date: Some(datetime!(2024-11-05 12:00 UTC)),
                compliance_status: ComplianceStatus::Compliant,
            },
            ReportRow {
                target_name: "acme/web, legacy".into(),
                last_tested_date: Some(datetime!(2024-09-01 00:00 UTC)),
                compliance_status: ComplianceStatus::NonCompliant,
            },
            ReportRow {
                target_name: "acme/ghost".into(),
                last_tested_date: None,
                compliance_status: ComplianceStatus::Ghost,
            },
            ReportRow {
                target_name: "acme/ghost2".into(),
                last_tested_date: None,
                compliance_status: ComplianceStatus::Ghost,
            },
        ]
    }

    #[test]
    fn filename_uses_compact_date() {
        assert_eq!(
            report_filename(date!(2024 - 03 - 07)).unwrap(),
            "snyk_report_20240307.csv"
        );
    }

    #[test]
    fn write_report_uses_dated_name_and_leaves_no_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_report(dir.path(), date!(2024 - 11 - 15), &rows()).unwrap();
        assert_eq!(path, dir.path().join("snyk_report_20241115.csv"));
        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["snyk_report_20241115.csv".to_string()]);
    }

    #[test]
    fn csv_has_header_and_status_labels() {
        let mut buf = Vec::new();
        write_csv(&mut buf, &rows()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "target_name,last_tested_date,compliance_status");
        assert_eq!(lines[1], "acme/api,2024-11-05T12:00:00Z,COMPLIANT");
        assert_eq!(lines[2], "\"acme/web, legacy\",2024-09-01T00:00:00Z,NON-COMPLIANT");
        assert_eq!(lines[3], "acme/ghost,,GHOST / ZERO-VULN");
    }

    #[test]
    fn empty_report_still_has_header() {
        let mut buf = Vec::new();
        write_csv(&mut buf, &[]).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "target_name,last_tested_date,compliance_status\n"
        );
    }

    #[test]
    fn summary_orders_by_count() {
        let lines = summary_lines(&rows());
        assert!(lines[0].starts_with("GHOST / ZERO-VULN"));
        assert!(lines[0].ends_with(" 2"));
        assert!(lines[1].starts_with("COMPLIANT"));
        assert!(lines[2].starts_with("NON-COMPLIANT"));
        assert_eq!(lines[3], "total targets: 4");
    }
}

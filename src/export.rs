use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::client::ApiClient;
use crate::config::PollPolicy;
use crate::error::{ReportError, Result};
use crate::retry::Sleeper;
use crate::types::ScanRecord;

pub const EXPORT_COLUMNS: [&str; 2] = ["target_name", "last_tested_date"];

#[derive(Debug, Deserialize)]
struct Document<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct CreatedExport {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ExportResource {
    attributes: ExportAttributes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportAttributes {
    pub status: String,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Export job state as reported by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportStatus {
    Completed,
    Failed,
    /// Any non-terminal state (`queued`, `started`, ...).
    Pending(String),
}

impl ExportStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "completed" => ExportStatus::Completed,
            "failed" => ExportStatus::Failed,
            other => ExportStatus::Pending(other.to_string()),
        }
    }
}

impl ExportAttributes {
    fn error_message(&self) -> String {
        match &self.error {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(Value::Null) | None => "Unknown error".to_string(),
            Some(Value::String(_)) => "Unknown error".to_string(),
            Some(other) => other.to_string(),
        }
    }
}

fn export_request() -> Value {
    json!({
        "data": {
            "attributes": {
                "type": "issues",
                "format": "json",
                "columns": EXPORT_COLUMNS,
            }
        }
    })
}

/// Submit an issues export and return the job id.
pub async fn submit_export<S: Sleeper>(client: &ApiClient<S>, org_id: &str) -> Result<String> {
    println!("[*] Requesting scan data from Export API...");
    let url = client.endpoint(&format!("orgs/{org_id}/exports"))?;
    let created: Document<CreatedExport> = client.post_json(url, &export_request()).await?.json()?;
    info!(export_id = %created.data.id, "export job submitted");
    Ok(created.data.id)
}

/// Poll the job until it completes or fails. The status is queried first and
/// the interval wait only happens between non-terminal polls.
pub async fn poll_export<S: Sleeper>(
    client: &ApiClient<S>,
    org_id: &str,
    export_id: &str,
    policy: &PollPolicy,
) -> Result<ExportAttributes> {
    let max_polls = policy.max_polls.max(1);
    let mut polls = 0u32;

    loop {
        let url = client.endpoint(&format!("orgs/{org_id}/exports/{export_id}"))?;
        let doc: Document<ExportResource> = client.get(url).await?.json()?;
        let attrs = doc.data.attributes;
        polls += 1;
        debug!(export_id, polls, status = %attrs.status, "export status");

        match ExportStatus::parse(&attrs.status) {
            ExportStatus::Completed => return Ok(attrs),
            ExportStatus::Failed => {
                return Err(ReportError::ExportFailed {
                    message: attrs.error_message(),
                });
            }
            ExportStatus::Pending(status) => {
                if polls >= max_polls {
                    return Err(ReportError::ExportTimeout {
                        elapsed: policy.budget(),
                    });
                }
                println!(
                    "    - Current status: {status}. Waiting {}s...",
                    policy.interval.as_secs()
                );
                client.sleeper().sleep(policy.interval).await?;
            }
        }
    }
}

/// Fetch the completed export's document and decode it into scan records.
pub async fn download_export<S: Sleeper>(
    client: &ApiClient<S>,
    attrs: &ExportAttributes,
) -> Result<Vec<ScanRecord>> {
    let link = attrs
        .url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ReportError::parse("export status", "completed export has no download url"))?;
    let url = client.resolve_link(link)?;
    let resp = client.get_anonymous(url).await?;
    println!("[*] Download complete. Processing results...");
    parse_records(&resp.body)
}

/// Decode an export document: a JSON array of records, or one JSON object per line.
pub fn parse_records(body: &[u8]) -> Result<Vec<ScanRecord>> {
    match serde_json::from_slice::<Vec<ScanRecord>>(body) {
        Ok(records) => Ok(records),
        Err(array_err) => {
            let text = String::from_utf8_lossy(body);
            let mut records = Vec::new();
            for (idx, line) in text.lines().enumerate() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let rec: ScanRecord = serde_json::from_str(line).map_err(|e| {
                    ReportError::parse(
                        "export document",
                        format!("not a JSON array ({array_err}) nor JSON lines (line {}: {e})", idx + 1),
                    )
                })?;
                records.push(rec);
            }
            Ok(records)
        }
    }
}

/// Submit, poll and download: the full scan-data workflow.
pub async fn fetch_scan_data<S: Sleeper>(
    client: &ApiClient<S>,
    org_id: &str,
    policy: &PollPolicy,
) -> Result<Vec<ScanRecord>> {
    let export_id = submit_export(client, org_id).await?;
    let attrs = poll_export(client, org_id, &export_id, policy).await?;
    let records = download_export(client, &attrs).await?;
    println!("    [+] Retrieved {} scan records", records.len());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parsing() {
        assert_eq!(ExportStatus::parse("completed"), ExportStatus::Completed);
        assert_eq!(ExportStatus::parse("failed"), ExportStatus::Failed);
        assert_eq!(
            ExportStatus::parse("queued"),
            ExportStatus::Pending("queued".into())
        );
        assert_eq!(
            ExportStatus::parse("started"),
            ExportStatus::Pending("started".into())
        );
    }

    #[test]
    fn request_asks_for_two_columns() {
        let req = export_request();
        assert_eq!(req["data"]["attributes"]["type"], "issues");
        assert_eq!(req["data"]["attributes"]["format"], "json");
        assert_eq!(
            req["data"]["attributes"]["columns"],
            json!(["target_name", "last_tested_date"])
        );
    }

    #[test]
    fn error_message_defaults() {
        let mut attrs = ExportAttributes {
            status: "failed".into(),
            error: None,
            url: None,
        };
        assert_eq!(attrs.error_message(), "Unknown error");
        attrs.error = Some(json!("quota exhausted"));
        assert_eq!(attrs.error_message(), "quota exhausted");
        attrs.error = Some(json!({"code": "E1"}));
        assert_eq!(attrs.error_message(), r#"{"code":"E1"}"#);
    }

    #[test]
    fn parses_json_array() {
        let body = br#"[
            {"target_name": "a", "last_tested_date": "2024-10-01T00:00:00Z"},
            {"target_name": "b", "last_tested_date": null}
        ]"#;
        let recs = parse_records(body).unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[1].last_tested_date, None);
    }

    #[test]
    fn parses_json_lines() {
        let body = b"{\"target_name\":\"a\",\"last_tested_date\":\"2024-10-01T00:00:00Z\"}\n\n{\"target_name\":\"a\",\"last_tested_date\":\"2024-09-01T00:00:00Z\"}\n";
        let recs = parse_records(body).unwrap();
        assert_eq!(recs.len(), 2);
        assert!(recs.iter().all(|r| r.target_name == "a"));
    }

    #[test]
    fn garbage_is_parse_error() {
        let err = parse_records(b"<html>oops</html>").unwrap_err();
        assert!(matches!(err, ReportError::Parse { .. }));
    }
}

//! Shared helpers for the integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use snyk_compliance_rs::retry::Sleeper;
use snyk_compliance_rs::{ApiClient, Config, Result};

pub const ORG: &str = "org-1";
pub const TOKEN: &str = "test-token";

/// Records every requested wait and returns immediately.
#[derive(Clone, Default)]
pub struct RecordingSleeper {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) -> Result<()> {
        self.sleeps.lock().unwrap().push(duration);
        Ok(())
    }
}

pub fn config_for(server_uri: &str) -> Config {
    let mut cfg = Config::new(TOKEN, ORG);
    cfg.api_url = format!("{server_uri}/rest");
    cfg
}

pub fn client_for(config: &Config) -> (ApiClient<RecordingSleeper>, RecordingSleeper) {
    let sleeper = RecordingSleeper::default();
    let client = ApiClient::new(config, sleeper.clone()).unwrap();
    (client, sleeper)
}

pub fn targets_page(names: &[&str], next: Option<&str>) -> Value {
    let data: Vec<Value> = names
        .iter()
        .enumerate()
        .map(|(i, n)| {
            json!({
                "id": format!("target-{i}"),
                "type": "target",
                "attributes": {"display_name": n, "is_private": true}
            })
        })
        .collect();
    json!({"data": data, "links": {"next": next}})
}

pub fn export_status(status: &str, url: Option<&str>, error: Option<&str>) -> Value {
    json!({
        "data": {
            "id": "exp-1",
            "type": "resource",
            "attributes": {"status": status, "url": url, "error": error}
        }
    })
}

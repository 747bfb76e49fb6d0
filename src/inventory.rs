use serde::Deserialize;
use tracing::debug;

use crate::client::ApiClient;
use crate::error::Result;
use crate::retry::Sleeper;
use crate::types::Target;

#[derive(Debug, Deserialize)]
struct TargetPage {
    #[serde(default)]
    data: Vec<TargetResource>,
    #[serde(default)]
    links: Option<PageLinks>,
}

#[derive(Debug, Deserialize)]
struct TargetResource {
    attributes: TargetAttributes,
}

#[derive(Debug, Deserialize)]
struct TargetAttributes {
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct PageLinks {
    #[serde(default)]
    next: Option<String>,
}

impl TargetPage {
    /// Link to the next page; `None` once the listing is exhausted.
    fn next_link(&self) -> Option<&str> {
        self.links
            .as_ref()
            .and_then(|l| l.next.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Walk the organization's target listing until `links.next` runs out.
///
/// Page size is never used as a stop signal; an empty page with a `next` link
/// is followed like any other.
pub async fn fetch_inventory<S: Sleeper>(client: &ApiClient<S>, org_id: &str) -> Result<Vec<Target>> {
    println!("[*] Fetching inventory for Org: {org_id}...");
    let mut targets = Vec::new();
    let mut next = Some(client.endpoint(&format!("orgs/{org_id}/targets"))?);
    let mut pages = 0usize;

    while let Some(url) = next.take() {
        let page: TargetPage = client.get(url).await?.json()?;
        pages += 1;
        debug!(page = pages, entries = page.data.len(), "inventory page");

        if let Some(link) = page.next_link() {
            next = Some(client.resolve_link(link)?);
        }
        targets.extend(
            page.data
                .into_iter()
                .map(|t| Target::new(t.attributes.display_name)),
        );
    }

    println!("    [+] Found {} targets", targets.len());
    Ok(targets)
}

//! Reachability checks for the local speech servers.

use std::time::Duration;

use tracing::debug;

const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Whether anything answers HTTP at `url`. Any response counts.
pub async fn server_reachable(url: &str) -> bool {
    let client = reqwest::Client::new();
    let reachable = client
        .get(url)
        .timeout(PROBE_TIMEOUT)
        .send()
        .await
        .is_ok();
    debug!("probe {url}: reachable={reachable}");
    reachable
}

//! Keeps a hosted dyno awake by requesting its public URL. Platforms that
//! idle a web process after ~30 minutes without traffic also idle workers.

use anyhow::Context;
use tracing::debug;

pub async fn ping(http: &reqwest::Client, url: &str) -> anyhow::Result<()> {
    let resp = http
        .get(url)
        .send()
        .await
        .with_context(|| format!("keep-alive request to {url} failed"))?;

    let status = resp.status();
    if !status.is_success() {
        anyhow::bail!("keep-alive request to {url} returned {status}");
    }

    debug!(url, status = %status, "Keep-alive ping");
    Ok(())
}

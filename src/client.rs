//! Remote controller: posts control events to a running hub.

use anyhow::{Context, Result, anyhow, bail};
use serde_json::Value;
use url::Url;

/// `<server>/api/scripts/<script>/control`, with `script` percent-encoded.
pub fn control_url(server: &str, script: &str) -> Result<Url> {
    let mut url = Url::parse(server).with_context(|| format!("invalid server url: {server}"))?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("server url cannot be a base: {server}"))?
        .pop_if_empty()
        .extend(["api", "scripts", script, "control"]);
    Ok(url)
}

pub async fn send_control(server: &str, script: &str, payload: &Value) -> Result<()> {
    let url = control_url(server, script)?;
    let response = reqwest::Client::new()
        .post(url.clone())
        .json(payload)
        .send()
        .await
        .with_context(|| format!("could not reach {url}"))?;

    if !response.status().is_success() {
        bail!("{url} answered {}", response.status());
    }
    Ok(())
}

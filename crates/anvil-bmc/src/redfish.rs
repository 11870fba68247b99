//! Redfish adapter (Dell iDRAC resource layout).
//!
//! HTTPS JSON REST with basic authentication. BMCs in the field almost
//! always present self-signed certificates, so certificate verification
//! is opt-out via [`RedfishConfig::with_insecure`].

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use crate::adapter::VendorAdapter;
use crate::error::{BmcError, Result};
use crate::types::{BootMode, PowerState, ResetKind};

const SYSTEM_PATH: &str = "/redfish/v1/Systems/System.Embedded.1";
const VIRTUAL_CD_PATH: &str = "/redfish/v1/Managers/iDRAC.Embedded.1/VirtualMedia/CD";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Redfish connection configuration
#[derive(Debug, Clone)]
pub struct RedfishConfig {
    /// Base URL (e.g. https://10.0.0.10)
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Skip TLS verification (self-signed BMC certs)
    pub insecure: bool,
}

impl RedfishConfig {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            insecure: false,
        }
    }

    /// Allow insecure TLS (self-signed certs)
    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }
}

/// Redfish REST adapter
#[derive(Debug)]
pub struct RedfishAdapter {
    config: RedfishConfig,
    client: reqwest::Client,
}

impl RedfishAdapter {
    pub fn new(config: RedfishConfig) -> Result<Self> {
        if config.base_url.is_empty() {
            return Err(BmcError::InvalidConfig("empty base URL".into()));
        }
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BmcError::InvalidConfig(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let response = self
            .client
            .get(self.url(path))
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(classify_http(status, &body));
        }
        serde_json::from_str(&body)
            .map_err(|e| BmcError::Transport(format!("malformed redfish response: {}", e)))
    }

    async fn post_json(&self, path: &str, body: Value) -> Result<()> {
        let response = self
            .client
            .post(self.url(path))
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(&body)
            .send()
            .await?;
        check_status(response).await
    }

    async fn patch_json(&self, path: &str, body: Value) -> Result<()> {
        let response = self
            .client
            .patch(self.url(path))
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(&body)
            .send()
            .await?;
        check_status(response).await
    }

    async fn virtual_cd_inserted(&self) -> Result<bool> {
        let media = self.get_json(VIRTUAL_CD_PATH).await?;
        Ok(media["Inserted"].as_bool().unwrap_or(false))
    }
}

async fn check_status(response: reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_http(status, &body))
}

/// Map an HTTP failure onto the Transport/Rejected taxonomy.
///
/// Auth failures count as transport: the request never reached the
/// subsystem it was aimed at, and credentials problems are operator
/// input problems, not BMC refusals of the operation itself.
fn classify_http(status: StatusCode, body: &str) -> BmcError {
    let detail = extract_message(body).unwrap_or_else(|| truncate(body, 200));
    let msg = format!("HTTP {}: {}", status.as_u16(), detail);

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BmcError::Transport(msg),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => BmcError::Transport(msg),
        s if s.is_server_error() => BmcError::Transport(msg),
        s if s.is_client_error() => BmcError::Rejected(msg),
        _ => BmcError::Transport(msg),
    }
}

/// Pull the human-readable message out of a Redfish error document.
fn extract_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let info = value["error"]["@Message.ExtendedInfo"].as_array()?;
    let message = info.first()?["Message"].as_str()?;
    Some(message.to_string())
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    // Back off to a char boundary; slicing mid-character panics.
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[async_trait]
impl VendorAdapter for RedfishAdapter {
    fn vendor_name(&self) -> &'static str {
        "redfish"
    }

    async fn eject_media(&self) -> Result<()> {
        // Ejecting an empty drive is a 400 on most firmware; check first
        // so eject stays idempotent.
        if !self.virtual_cd_inserted().await? {
            debug!(bmc = %self.config.base_url, "virtual media already empty");
            return Ok(());
        }
        self.post_json(
            &format!("{}/Actions/VirtualMedia.EjectMedia", VIRTUAL_CD_PATH),
            json!({}),
        )
        .await
    }

    async fn insert_media(&self, image_uri: &str, write_protected: bool) -> Result<()> {
        debug!(bmc = %self.config.base_url, image = %image_uri, "inserting virtual media");
        self.post_json(
            &format!("{}/Actions/VirtualMedia.InsertMedia", VIRTUAL_CD_PATH),
            json!({
                "Image": image_uri,
                "Inserted": true,
                "WriteProtected": write_protected,
            }),
        )
        .await
    }

    async fn set_one_time_boot(&self, mode: BootMode) -> Result<()> {
        let override_mode = match mode {
            BootMode::Uefi => "UEFI",
            BootMode::Legacy => "Legacy",
        };
        self.patch_json(
            SYSTEM_PATH,
            json!({
                "Boot": {
                    "BootSourceOverrideEnabled": "Once",
                    "BootSourceOverrideTarget": "Cd",
                    "BootSourceOverrideMode": override_mode,
                }
            }),
        )
        .await
    }

    async fn reset(&self, kind: ResetKind) -> Result<()> {
        let reset_type = match kind {
            ResetKind::ForceRestart => "ForceRestart",
            ResetKind::PowerOn => "On",
        };
        self.post_json(
            &format!("{}/Actions/ComputerSystem.Reset", SYSTEM_PATH),
            json!({ "ResetType": reset_type }),
        )
        .await
    }

    async fn power_state(&self) -> Result<PowerState> {
        let system = self.get_json(SYSTEM_PATH).await?;
        let state = match system["PowerState"].as_str() {
            Some("On") => PowerState::On,
            Some("Off") => PowerState::Off,
            other => {
                warn!(state = ?other, "unrecognized redfish power state");
                PowerState::Unknown
            }
        };
        Ok(state)
    }

    async fn media_attached(&self) -> Result<bool> {
        self.virtual_cd_inserted().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> RedfishConfig {
        RedfishConfig::new("https://bmc.local", "root", "calvin")
    }

    #[test]
    fn test_adapter_creation() {
        let adapter = RedfishAdapter::new(test_config()).unwrap();
        assert_eq!(adapter.vendor_name(), "redfish");
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let result = RedfishAdapter::new(RedfishConfig::new("", "root", "calvin"));
        assert!(matches!(result, Err(BmcError::InvalidConfig(_))));
    }

    #[test]
    fn test_url_join_strips_trailing_slash() {
        let adapter =
            RedfishAdapter::new(RedfishConfig::new("https://bmc.local/", "root", "calvin"))
                .unwrap();
        assert_eq!(
            adapter.url(SYSTEM_PATH),
            "https://bmc.local/redfish/v1/Systems/System.Embedded.1"
        );
    }

    #[test]
    fn test_classify_auth_is_transport() {
        let err = classify_http(StatusCode::UNAUTHORIZED, "");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_classify_server_error_is_transport() {
        let err = classify_http(StatusCode::INTERNAL_SERVER_ERROR, "");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_classify_client_error_is_rejected() {
        let err = classify_http(StatusCode::BAD_REQUEST, "");
        assert!(matches!(err, BmcError::Rejected(_)));
    }

    #[test]
    fn test_extract_redfish_message() {
        let body = r#"{"error":{"@Message.ExtendedInfo":[{"Message":"Virtual Media is detached or unlicensed."}]}}"#;
        assert_eq!(
            extract_message(body).as_deref(),
            Some("Virtual Media is detached or unlicensed.")
        );

        let err = classify_http(StatusCode::BAD_REQUEST, body);
        assert!(err.to_string().contains("detached or unlicensed"));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        // A multi-byte character straddling the cut must not panic.
        let body = format!("{}é and more", "x".repeat(199));
        let out = truncate(&body, 200);
        assert!(out.ends_with("..."));
        assert!(out.len() <= 204);

        assert_eq!(truncate("short", 200), "short");
    }

    #[test]
    fn test_classify_long_non_redfish_body() {
        // Gateways in front of a BMC return HTML error pages, not Redfish
        // documents; classification must still produce a clean error.
        let body = format!("<html>{}é</html>{}", "x".repeat(193), "y".repeat(500));
        let err = classify_http(StatusCode::BAD_GATEWAY, &body);
        assert!(err.is_retryable());
        assert!(err.to_string().contains("HTTP 502"));
    }

    #[test]
    fn test_extract_message_malformed_body() {
        assert_eq!(extract_message("not json"), None);
        assert_eq!(extract_message(r#"{"error":{}}"#), None);
    }

    #[test]
    fn test_insecure_config() {
        let config = test_config().with_insecure(true);
        assert!(config.insecure);
        RedfishAdapter::new(config).unwrap();
    }
}

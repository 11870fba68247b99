//! HPE iLO adapter (RIBCL XML protocol).
//!
//! RIBCL is a pre-Redfish management protocol: XML command documents are
//! POSTed to `/ribcl` over HTTPS and the BMC answers with a concatenation
//! of small XML response documents, one `RESPONSE STATUS="0x...."`
//! element per command processed. Status 0x0000 is success; anything else
//! is an in-band refusal.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::adapter::VendorAdapter;
use crate::error::{BmcError, Result};
use crate::types::{BootMode, PowerState, ResetKind};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// iLO connection configuration
#[derive(Debug, Clone)]
pub struct IloConfig {
    /// BMC address (hostname or IP, no scheme)
    pub address: String,
    pub username: String,
    pub password: String,
    /// Skip TLS verification (self-signed BMC certs)
    pub insecure: bool,
}

impl IloConfig {
    pub fn new(
        address: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            username: username.into(),
            password: password.into(),
            insecure: false,
        }
    }

    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }
}

/// RIBCL XML adapter
#[derive(Debug)]
pub struct IloAdapter {
    config: IloConfig,
    client: reqwest::Client,
}

impl IloAdapter {
    pub fn new(config: IloConfig) -> Result<Self> {
        if config.address.is_empty() {
            return Err(BmcError::InvalidConfig("empty BMC address".into()));
        }
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| BmcError::InvalidConfig(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn ribcl_url(&self) -> String {
        format!("https://{}/ribcl", self.config.address)
    }

    /// Wrap a command body in the RIBCL login envelope.
    fn envelope(&self, body: &str) -> String {
        format!(
            "<?xml version=\"1.0\"?>\n<RIBCL VERSION=\"2.0\">\n<LOGIN USER_LOGIN=\"{}\" PASSWORD=\"{}\">\n{}\n</LOGIN>\n</RIBCL>\n",
            escape_attr(&self.config.username),
            escape_attr(&self.config.password),
            body
        )
    }

    /// POST a command document and return the raw response text.
    async fn send(&self, body: &str) -> Result<String> {
        let response = self
            .client
            .post(self.ribcl_url())
            .header("Content-Type", "text/xml")
            .body(self.envelope(body))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(BmcError::Transport(format!(
                "HTTP {} from iLO",
                status.as_u16()
            )));
        }
        Ok(text)
    }

    /// POST a command and fail on any nonzero in-band status.
    async fn send_checked(&self, body: &str) -> Result<String> {
        let text = self.send(body).await?;
        check_responses(&text)?;
        Ok(text)
    }
}

#[async_trait]
impl VendorAdapter for IloAdapter {
    fn vendor_name(&self) -> &'static str {
        "ilo"
    }

    async fn eject_media(&self) -> Result<()> {
        let body = r#"<RIB_INFO MODE="write"><EJECT_VIRTUAL_MEDIA DEVICE="CDROM"/></RIB_INFO>"#;
        match self.send_checked(body).await {
            Ok(_) => Ok(()),
            // Ejecting an empty drive is a refusal on iLO; idempotence
            // says that counts as success.
            Err(BmcError::Rejected(msg)) if msg.to_uppercase().contains("NO IMAGE") => {
                debug!(bmc = %self.config.address, "virtual media already empty");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn insert_media(&self, image_uri: &str, write_protected: bool) -> Result<()> {
        debug!(bmc = %self.config.address, image = %image_uri, "inserting virtual media");
        let protect = if write_protected { "YES" } else { "NO" };
        let body = format!(
            concat!(
                r#"<RIB_INFO MODE="write">"#,
                r#"<INSERT_VIRTUAL_MEDIA DEVICE="CDROM" IMAGE_URL="{}"/>"#,
                r#"<SET_VM_STATUS DEVICE="CDROM">"#,
                r#"<VM_BOOT_OPTION VALUE="CONNECT"/>"#,
                r#"<VM_WRITE_PROTECT VALUE="{}"/>"#,
                r#"</SET_VM_STATUS>"#,
                r#"</RIB_INFO>"#
            ),
            escape_attr(image_uri),
            protect
        );
        self.send_checked(&body).await?;
        Ok(())
    }

    async fn set_one_time_boot(&self, mode: BootMode) -> Result<()> {
        // RIBCL has no UEFI/legacy knob on the one-time override; the
        // firmware's configured mode governs. Target selection only.
        debug!(requested_mode = %mode, "ilo one-time boot to virtual CD");
        let body =
            r#"<SERVER_INFO MODE="write"><SET_ONE_TIME_BOOT VALUE="CDROM"/></SERVER_INFO>"#;
        self.send_checked(body).await?;
        Ok(())
    }

    async fn reset(&self, kind: ResetKind) -> Result<()> {
        let body = match kind {
            ResetKind::ForceRestart => {
                r#"<SERVER_INFO MODE="write"><RESET_SERVER/></SERVER_INFO>"#
            }
            ResetKind::PowerOn => {
                r#"<SERVER_INFO MODE="write"><SET_HOST_POWER HOST_POWER="Yes"/></SERVER_INFO>"#
            }
        };
        self.send_checked(body).await?;
        Ok(())
    }

    async fn power_state(&self) -> Result<PowerState> {
        let body = r#"<SERVER_INFO MODE="read"><GET_HOST_POWER_STATUS/></SERVER_INFO>"#;
        let text = self.send_checked(body).await?;
        Ok(parse_power_state(&text))
    }

    async fn media_attached(&self) -> Result<bool> {
        let body = r#"<RIB_INFO MODE="read"><GET_VM_STATUS DEVICE="CDROM"/></RIB_INFO>"#;
        let text = self.send_checked(body).await?;
        Ok(parse_image_inserted(&text))
    }
}

/// Scan every RESPONSE element for a nonzero STATUS.
fn check_responses(body: &str) -> Result<()> {
    let mut rest = body;
    while let Some(pos) = rest.find("STATUS=") {
        rest = &rest[pos + "STATUS=".len()..];
        let Some(status) = leading_quoted(rest) else {
            break;
        };
        let code = status.trim_start_matches("0x");
        let nonzero = u32::from_str_radix(code, 16).map(|v| v != 0).unwrap_or(true);
        if nonzero {
            let message = rest
                .find("MESSAGE=")
                .and_then(|m| leading_quoted(&rest[m + "MESSAGE=".len()..]))
                .unwrap_or_else(|| format!("status {}", status));
            return Err(BmcError::Rejected(message));
        }
    }
    Ok(())
}

/// Read a quoted attribute value sitting at the start of `s`, accepting
/// either quote style (iLO emits both).
fn leading_quoted(s: &str) -> Option<String> {
    let mut chars = s.chars();
    let quote = chars.next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let rest = &s[1..];
    let end = rest.find(quote)?;
    Some(rest[..end].to_string())
}

/// Extract a named attribute from anywhere in the response text.
fn find_attr(body: &str, name: &str) -> Option<String> {
    let needle = format!("{}=", name);
    let pos = body.find(&needle)?;
    leading_quoted(&body[pos + needle.len()..])
}

fn parse_power_state(body: &str) -> PowerState {
    match find_attr(body, "HOST_POWER").as_deref() {
        Some("ON") => PowerState::On,
        Some("OFF") => PowerState::Off,
        _ => PowerState::Unknown,
    }
}

fn parse_image_inserted(body: &str) -> bool {
    matches!(find_attr(body, "IMAGE_INSERTED").as_deref(), Some("YES"))
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    const OK_RESPONSE: &str = r#"<?xml version="1.0"?>
<RIBCL VERSION="2.23">
<RESPONSE
    STATUS="0x0000"
    MESSAGE='No error'
     />
</RIBCL>"#;

    #[test]
    fn test_envelope_contains_credentials() {
        let adapter = IloAdapter::new(IloConfig::new("10.0.0.20", "admin", "p<as&s")).unwrap();
        let doc = adapter.envelope("<RIB_INFO/>");
        assert!(doc.contains(r#"USER_LOGIN="admin""#));
        // Password XML-escaped, not raw
        assert!(doc.contains("p&lt;as&amp;s"));
        assert!(doc.contains("<RIB_INFO/>"));
    }

    #[test]
    fn test_empty_address_rejected() {
        let result = IloAdapter::new(IloConfig::new("", "admin", "pw"));
        assert!(matches!(result, Err(BmcError::InvalidConfig(_))));
    }

    #[test]
    fn test_check_responses_ok() {
        assert!(check_responses(OK_RESPONSE).is_ok());
    }

    #[test]
    fn test_check_responses_multiple_ok() {
        let doubled = format!("{}\n{}", OK_RESPONSE, OK_RESPONSE);
        assert!(check_responses(&doubled).is_ok());
    }

    #[test]
    fn test_check_responses_rejection_carries_message() {
        let body = r#"<RIBCL VERSION="2.23">
<RESPONSE STATUS="0x005F" MESSAGE='Virtual Media is disabled.'/>
</RIBCL>"#;
        let err = check_responses(body).unwrap_err();
        match err {
            BmcError::Rejected(msg) => assert_eq!(msg, "Virtual Media is disabled."),
            other => panic!("expected Rejected, got {:?}", other),
        }
    }

    #[test]
    fn test_check_responses_first_failure_wins() {
        let body = format!(
            "{}\n<RESPONSE STATUS=\"0x0001\" MESSAGE=\"boom\"/>\n{}",
            OK_RESPONSE, OK_RESPONSE
        );
        let err = check_responses(&body).unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_parse_power_state() {
        let body = r#"<GET_HOST_POWER HOST_POWER="ON"/>"#;
        assert_eq!(parse_power_state(body), PowerState::On);

        let body = r#"<GET_HOST_POWER HOST_POWER="OFF"/>"#;
        assert_eq!(parse_power_state(body), PowerState::Off);

        assert_eq!(parse_power_state("<RIBCL/>"), PowerState::Unknown);
    }

    #[test]
    fn test_parse_image_inserted() {
        let body = r#"<GET_VM_STATUS VM_APPLET="CONNECTED" DEVICE="CDROM"
            BOOT_OPTION="BOOT_ONCE" WRITE_PROTECT="YES"
            IMAGE_INSERTED="YES" IMAGE_URL="http://images.lab/esxi01.iso"/>"#;
        assert!(parse_image_inserted(body));

        let body = r#"<GET_VM_STATUS IMAGE_INSERTED="NO"/>"#;
        assert!(!parse_image_inserted(body));
    }

    #[test]
    fn test_escape_attr() {
        assert_eq!(escape_attr(r#"a"b'c&d"#), "a&quot;b&apos;c&amp;d");
    }
}

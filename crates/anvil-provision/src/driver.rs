//! The per-host remote-boot state machine.
//!
//! One driver owns one host's BMC conversation; calls are strictly
//! sequential because BMC sessions cannot process overlapping commands.
//! Retries restart the whole eject→verify sequence: virtual-media
//! subsystems are known to report inserted-but-not-attached after a
//! partial failure, and a clean eject is the only reliable way back to
//! a known state.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info, warn};

use anvil_bmc::{BmcError, BootMode, PowerState, ResetKind, VendorAdapter};
use anvil_common::{BuildArtifact, HostProbe, HostSpec};

use crate::error::{ProvisionError, Result};
use crate::session::{ProvisioningSession, SessionState};

/// Single connect attempt budget inside the reachability poll.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Tunables for one provisioning run.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Full-sequence attempts before giving up
    pub max_attempts: u32,
    /// Pause between full-sequence attempts
    pub retry_backoff: Duration,
    /// Interval between reachability probes
    pub poll_interval: Duration,
    /// Ceiling for the Installing wait (install normally finishes in
    /// 8-12 minutes; keep this generously above)
    pub install_timeout: Duration,
    /// Final verification window
    pub verify_timeout: Duration,
    /// Firmware path for the one-time boot override
    pub boot_mode: BootMode,
    /// Mount the virtual CD write-protected
    pub write_protect: bool,
    /// Port probed on the management IP to detect completion
    pub probe_port: u16,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff: Duration::from_secs(30),
            poll_interval: Duration::from_secs(20),
            install_timeout: Duration::from_secs(30 * 60),
            verify_timeout: Duration::from_secs(2 * 60),
            boot_mode: BootMode::Uefi,
            write_protect: true,
            probe_port: 22,
        }
    }
}

/// Drives one host from Idle to Succeeded or Failed.
pub struct ProvisioningDriver {
    adapter: Arc<dyn VendorAdapter>,
    probe: Arc<dyn HostProbe>,
    config: DriverConfig,
    cancel: watch::Receiver<bool>,
}

impl ProvisioningDriver {
    pub fn new(
        adapter: Arc<dyn VendorAdapter>,
        probe: Arc<dyn HostProbe>,
        config: DriverConfig,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            adapter,
            probe,
            config,
            cancel,
        }
    }

    /// Run the full session for one host. Always returns a terminal
    /// session; errors are folded into its Failed state.
    pub async fn provision(
        &self,
        host: &HostSpec,
        artifact: &BuildArtifact,
    ) -> ProvisioningSession {
        let mut session = ProvisioningSession::new(&host.hostname);
        info!(
            host = %host.hostname,
            vendor = self.adapter.vendor_name(),
            image = %artifact.image_uri,
            "starting provisioning session"
        );

        match self.run_attempts(host, artifact, &mut session).await {
            Ok(()) => {
                info!(host = %host.hostname, attempts = session.attempts, "provisioning succeeded");
                session.succeed();
            }
            Err(e) => {
                error!(host = %host.hostname, attempts = session.attempts, error = %e, "provisioning failed");
                session.fail(e.to_string());
            }
        }

        // Media must never be left mounted, whatever the outcome.
        if let Err(e) = self.adapter.eject_media().await {
            warn!(host = %host.hostname, error = %e, "final defensive eject failed");
        }

        session
    }

    async fn run_attempts(
        &self,
        host: &HostSpec,
        artifact: &BuildArtifact,
        session: &mut ProvisioningSession,
    ) -> Result<()> {
        let mut attempt = 1;
        loop {
            session.attempts = attempt;
            match self.run_sequence(host, artifact, session).await {
                Ok(()) => return Ok(()),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) if attempt >= self.config.max_attempts => return Err(e),
                Err(e) => {
                    warn!(
                        host = %host.hostname,
                        attempt,
                        error = %e,
                        backoff = ?self.config.retry_backoff,
                        "attempt failed; restarting sequence after backoff"
                    );
                    session.advance(SessionState::Idle);
                    self.pause(self.config.retry_backoff).await?;
                    attempt += 1;
                }
            }
        }
    }

    /// One pass of the MediaEjected..Verifying sequence.
    async fn run_sequence(
        &self,
        host: &HostSpec,
        artifact: &BuildArtifact,
        session: &mut ProvisioningSession,
    ) -> Result<()> {
        self.ensure_not_cancelled()?;

        // Always eject first, even when nothing is attached: clears
        // stale virtual-media sessions from previous runs.
        self.adapter.eject_media().await?;
        session.advance(SessionState::MediaEjected);

        self.ensure_not_cancelled()?;
        self.adapter
            .insert_media(&artifact.image_uri, self.config.write_protect)
            .await?;
        if !self.adapter.media_attached().await? {
            return Err(
                BmcError::Transport("virtual media not attached after insert".into()).into(),
            );
        }
        session.advance(SessionState::MediaInserted);

        self.ensure_not_cancelled()?;
        self.adapter.set_one_time_boot(self.config.boot_mode).await?;
        session.advance(SessionState::BootConfigured);

        self.ensure_not_cancelled()?;
        let kind = match self.adapter.power_state().await? {
            PowerState::On => ResetKind::ForceRestart,
            PowerState::Off | PowerState::Unknown => ResetKind::PowerOn,
        };
        self.adapter.reset(kind).await?;
        session.advance(SessionState::PoweredOn);

        session.advance(SessionState::Installing);
        info!(host = %host.hostname, "waiting for installer to bring up the management network");
        self.wait_reachable(host, self.config.install_timeout)
            .await?;

        session.advance(SessionState::Verifying);
        self.wait_reachable(host, self.config.verify_timeout)
            .await?;

        Ok(())
    }

    async fn wait_reachable(&self, host: &HostSpec, ceiling: Duration) -> Result<()> {
        let deadline = Instant::now() + ceiling;
        loop {
            self.ensure_not_cancelled()?;
            if self
                .probe
                .reachable(host.mgmt_ip, self.config.probe_port, PROBE_TIMEOUT)
                .await
            {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ProvisionError::VerificationTimeout(ceiling));
            }
            self.pause(self.config.poll_interval).await?;
        }
    }

    fn ensure_not_cancelled(&self) -> Result<()> {
        if *self.cancel.borrow() {
            Err(ProvisionError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleep that wakes early on cancellation.
    async fn pause(&self, duration: Duration) -> Result<()> {
        let cancel = self.cancel.clone();
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = cancelled(cancel) => Err(ProvisionError::Cancelled),
        }
    }
}

/// Resolves only when the cancel flag flips to true. A dropped sender
/// means nobody can cancel anymore, so pend forever.
async fn cancelled(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DriverConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.probe_port, 22);
        assert!(config.install_timeout > Duration::from_secs(12 * 60));
        assert!(config.write_protect);
    }
}

//! Fleet fan-out.
//!
//! Build and provision phases each run one independent task per host,
//! bounded by a configurable concurrency limit so the BMC network path
//! and the distribution share are not saturated. A failed host never
//! aborts its siblings.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use anvil_bmc::{
    BmcError, IloAdapter, IloConfig, RedfishAdapter, RedfishConfig, VendorAdapter,
};
use anvil_common::{
    BmcVendor, BuildArtifact, BuildStatus, Credentials, HostProbe, HostSpec, NetworkProfile,
    TcpProbe,
};
use anvil_image::ImageBuilder;

use crate::driver::{DriverConfig, ProvisioningDriver};
use crate::error::{ProvisionError, Result};
use crate::session::ProvisioningSession;

/// Creates the vendor adapter for a host. A seam so tests can inject
/// scripted adapters; production uses [`DefaultAdapterFactory`].
pub trait AdapterFactory: Send + Sync {
    fn create(
        &self,
        host: &HostSpec,
        credentials: &Credentials,
    ) -> std::result::Result<Arc<dyn VendorAdapter>, BmcError>;
}

/// Selects the adapter from the host's vendor field.
#[derive(Debug, Clone)]
pub struct DefaultAdapterFactory {
    /// Tolerate self-signed BMC certificates
    pub insecure_tls: bool,
}

impl AdapterFactory for DefaultAdapterFactory {
    fn create(
        &self,
        host: &HostSpec,
        credentials: &Credentials,
    ) -> std::result::Result<Arc<dyn VendorAdapter>, BmcError> {
        match host.vendor {
            BmcVendor::Redfish => {
                let config = RedfishConfig::new(
                    format!("https://{}", host.bmc_ip),
                    &credentials.bmc_username,
                    credentials.bmc_password.expose(),
                )
                .with_insecure(self.insecure_tls);
                Ok(Arc::new(RedfishAdapter::new(config)?))
            }
            BmcVendor::Ilo => {
                let config = IloConfig::new(
                    host.bmc_ip.to_string(),
                    &credentials.bmc_username,
                    credentials.bmc_password.expose(),
                )
                .with_insecure(self.insecure_tls);
                Ok(Arc::new(IloAdapter::new(config)?))
            }
        }
    }
}

/// Final per-host status for reporting and exit-code mapping.
#[derive(Debug, Clone)]
pub struct HostOutcome {
    pub hostname: String,
    pub built: bool,
    /// Boot sequence handed off to the installer
    pub provisioned: bool,
    /// Verification passed; only this counts as success
    pub verified: bool,
    /// First distinguishing error for a failed host
    pub error: Option<String>,
}

/// Aggregated outcome of a run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub outcomes: Vec<HostOutcome>,
}

impl RunSummary {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.verified)
    }

    /// Plain status table for the operator.
    pub fn render_table(&self) -> String {
        let width = self
            .outcomes
            .iter()
            .map(|o| o.hostname.len())
            .max()
            .unwrap_or(4)
            .max(4);

        let mut out = format!(
            "{:<w$}  {:<5}  {:<11}  {:<8}  ERROR\n",
            "HOST",
            "BUILT",
            "PROVISIONED",
            "VERIFIED",
            w = width
        );
        for o in &self.outcomes {
            out.push_str(&format!(
                "{:<w$}  {:<5}  {:<11}  {:<8}  {}\n",
                o.hostname,
                yes_no(o.built),
                yes_no(o.provisioned),
                yes_no(o.verified),
                o.error.as_deref().unwrap_or("-"),
                w = width
            ));
        }
        out
    }
}

fn yes_no(v: bool) -> &'static str {
    if v {
        "yes"
    } else {
        "no"
    }
}

/// Fans the two pipeline phases out across the host set.
pub struct Orchestrator {
    builder: Arc<ImageBuilder>,
    factory: Arc<dyn AdapterFactory>,
    probe: Arc<dyn HostProbe>,
    driver_config: DriverConfig,
    concurrency: usize,
    cancel_tx: watch::Sender<bool>,
}

impl Orchestrator {
    pub fn new(
        builder: ImageBuilder,
        factory: Arc<dyn AdapterFactory>,
        driver_config: DriverConfig,
        concurrency: usize,
    ) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            builder: Arc::new(builder),
            factory,
            probe: Arc::new(TcpProbe),
            driver_config,
            concurrency: concurrency.max(1),
            cancel_tx,
        }
    }

    /// Replace the reachability probe (tests).
    pub fn with_probe(mut self, probe: Arc<dyn HostProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Signal every in-flight driver to abort after its current BMC
    /// call; each one ejects media defensively and marks itself Failed.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    /// Full pipeline: build everything, provision what built, summarize.
    pub async fn run(
        &self,
        hosts: &[HostSpec],
        default_profile: &NetworkProfile,
        credentials: &Credentials,
    ) -> Result<RunSummary> {
        ensure_unique_hostnames(hosts)?;

        let artifacts = self.build_phase(hosts, default_profile, credentials).await;
        let sessions = self.provision_phase(hosts, &artifacts, credentials).await;

        Ok(summarize(hosts, &artifacts, &sessions))
    }

    /// Build phase only. Always yields one artifact per host; failures
    /// are folded into `BuildStatus::Failed`.
    pub async fn build_phase(
        &self,
        hosts: &[HostSpec],
        default_profile: &NetworkProfile,
        credentials: &Credentials,
    ) -> HashMap<String, BuildArtifact> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for host in hosts.iter().cloned() {
            let builder = self.builder.clone();
            let semaphore = semaphore.clone();
            let profile = host.profile(default_profile).clone();
            let credentials = credentials.clone();

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                match builder.build(&host, &profile, &credentials).await {
                    Ok(artifact) => artifact,
                    Err(e) => {
                        error!(host = %host.hostname, error = %e, "image build failed");
                        failed_artifact(&host.hostname, e.to_string())
                    }
                }
            });
        }

        let mut artifacts = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(artifact) => {
                    artifacts.insert(artifact.hostname.clone(), artifact);
                }
                Err(e) => error!(error = %e, "build task panicked"),
            }
        }
        artifacts
    }

    /// Provision phase only. Hosts without a built artifact are skipped.
    pub async fn provision_phase(
        &self,
        hosts: &[HostSpec],
        artifacts: &HashMap<String, BuildArtifact>,
        credentials: &Credentials,
    ) -> HashMap<String, ProvisioningSession> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for host in hosts.iter().cloned() {
            let Some(artifact) = artifacts.get(&host.hostname) else {
                continue;
            };
            if !artifact.is_built() {
                continue;
            }
            let artifact = artifact.clone();

            let adapter = match self.factory.create(&host, credentials) {
                Ok(adapter) => adapter,
                Err(e) => {
                    warn!(host = %host.hostname, error = %e, "could not create BMC adapter");
                    let mut session = ProvisioningSession::new(&host.hostname);
                    session.fail(e.to_string());
                    tasks.spawn(async move { session });
                    continue;
                }
            };

            let driver = ProvisioningDriver::new(
                adapter,
                self.probe.clone(),
                self.driver_config.clone(),
                self.cancel_tx.subscribe(),
            );
            let semaphore = semaphore.clone();

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                driver.provision(&host, &artifact).await
            });
        }

        let mut sessions = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(session) => {
                    info!(host = %session.hostname, state = %session.state, "session finished");
                    sessions.insert(session.hostname.clone(), session);
                }
                Err(e) => error!(error = %e, "provisioning task panicked"),
            }
        }
        sessions
    }
}

fn ensure_unique_hostnames(hosts: &[HostSpec]) -> Result<()> {
    let mut seen = HashSet::new();
    for host in hosts {
        if !seen.insert(host.hostname.as_str()) {
            return Err(ProvisionError::DuplicateHost(host.hostname.clone()));
        }
    }
    Ok(())
}

fn failed_artifact(hostname: &str, error: String) -> BuildArtifact {
    BuildArtifact {
        hostname: hostname.to_string(),
        image_path: PathBuf::new(),
        image_uri: String::new(),
        sha256: String::new(),
        built_at: chrono::Utc::now(),
        status: BuildStatus::Failed(error),
    }
}

/// Fold artifacts and sessions into the operator-facing summary.
pub fn summarize(
    hosts: &[HostSpec],
    artifacts: &HashMap<String, BuildArtifact>,
    sessions: &HashMap<String, ProvisioningSession>,
) -> RunSummary {
    let outcomes = hosts
        .iter()
        .map(|host| {
            let artifact = artifacts.get(&host.hostname);
            let built = artifact.map(|a| a.is_built()).unwrap_or(false);
            let build_error = artifact.and_then(|a| match &a.status {
                BuildStatus::Failed(msg) => Some(msg.clone()),
                _ => None,
            });

            let session = sessions.get(&host.hostname);
            let provisioned = session.map(|s| s.reached_install()).unwrap_or(false);
            let verified = session.map(|s| s.is_succeeded()).unwrap_or(false);
            let session_error = session.and_then(|s| s.last_error.clone());

            HostOutcome {
                hostname: host.hostname.clone(),
                built,
                provisioned,
                verified,
                error: build_error.or(session_error),
            }
        })
        .collect();

    RunSummary { outcomes }
}

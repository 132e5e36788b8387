//! The node process manager.
//!
//! A [`Harness`] owns at most one development node. `start` probes the
//! configured port first and binds to a node that is already listening
//! instead of spawning a second one; `bind` attaches to a node someone
//! else manages; `stop` tears down everything the handle owns. Chain
//! state is checkpointed with `evm_snapshot` right after startup so each
//! test case can roll back to a pristine chain.

use std::{
    collections::HashMap,
    process::Stdio,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, U256};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use testkit_common::{derive_wallet, HarnessError, Result, WalletAccount};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, Command},
    time::{sleep, timeout},
};
use tracing::{debug, info, warn};

use crate::{
    config::NodeConfig,
    deploy::{deploy_contract, DeployRequest, DeployedContract},
    docker::ComposeProject,
    invoke::{invoke_contract, ContractHandle},
};

/// Interval between readiness probes during startup.
const READINESS_INTERVAL: Duration = Duration::from_secs(1);

/// Bound on a single readiness probe round-trip.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// A chain state checkpoint.
///
/// Snapshot ids are consumed by `evm_revert`, so restoring always takes a
/// fresh snapshot and hands it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Id returned by `evm_snapshot`.
    pub id: U256,
    /// Block height at the time the snapshot was taken.
    pub height: u64,
}

/// Handle to a running development node.
#[derive(Debug)]
pub struct Harness {
    config: NodeConfig,
    provider: DynProvider,
    endpoint: String,
    child: Option<Child>,
    output: Option<Arc<Mutex<String>>>,
    accounts: Vec<WalletAccount>,
    contracts: HashMap<String, DeployedContract>,
    snapshot: Option<Snapshot>,
    compose: Option<ComposeProject>,
}

impl Harness {
    /// Starts a node, or binds to one already listening on the configured
    /// port.
    ///
    /// The port is probed first; a live node there is reused, never
    /// duplicated. When spawning fails because the port is held by a
    /// process that is not answering JSON-RPC, the holder is killed and
    /// the spawn retried once.
    pub async fn start(config: NodeConfig) -> Result<Self> {
        let endpoint = config.endpoint();
        let provider = ProviderBuilder::new().connect(&endpoint).await?.erased();

        if probe(&provider).await {
            info!("a node is already listening on port {}, binding to it", config.port());
            return Self::finish(config, provider, None, None, false).await;
        }

        let (mut child, output) = spawn_node(&config)?;
        if let Err(err) = wait_ready(&provider, &config, &mut child, &output).await {
            let HarnessError::PortUnavailable { port } = err else {
                return Err(err);
            };
            warn!("port {port} is held by a stale process, killing it and respawning");
            kill_port_holder(port).await?;
            let (retried, retried_output) = spawn_node(&config)?;
            child = retried;
            wait_ready(&provider, &config, &mut child, &retried_output).await?;
            return Self::finish(config, provider, Some(child), Some(retried_output), true).await;
        }

        Self::finish(config, provider, Some(child), Some(output), true).await
    }

    /// Binds to a node someone else manages, waiting for it to answer.
    ///
    /// When the config carries fork settings the bound node is reset to
    /// the fork point, best effort, so its state matches what `start`
    /// would have produced.
    pub async fn bind(config: NodeConfig) -> Result<Self> {
        let endpoint = config.endpoint();
        let provider = ProviderBuilder::new().connect(&endpoint).await?.erased();

        // Deadline, not attempt count: a probe can itself take up to
        // PROBE_TIMEOUT, and the reported bound must match the real wait.
        let deadline = Instant::now() + config.startup_timeout();
        loop {
            if probe(&provider).await {
                break;
            }
            if Instant::now() >= deadline {
                return Err(HarnessError::StartupTimeout {
                    port: config.port(),
                    timeout: config.startup_timeout(),
                });
            }
            sleep(READINESS_INTERVAL).await;
        }

        Self::finish(config, provider, None, None, false).await
    }

    async fn finish(
        config: NodeConfig,
        provider: DynProvider,
        child: Option<Child>,
        output: Option<Arc<Mutex<String>>>,
        owns_node: bool,
    ) -> Result<Self> {
        let mut accounts = Vec::with_capacity(config.accounts() as usize);
        for index in 0..config.accounts() {
            accounts.push(derive_wallet(config.mnemonic(), config.derivation_path(), index)?);
        }

        let compose = if owns_node {
            config.graph_project().map(|dir| ComposeProject::new(dir, config.silent()))
        } else {
            None
        };
        if let Some(compose) = &compose {
            compose.up().await?;
        }

        let mut harness = Self {
            endpoint: config.endpoint(),
            config,
            provider,
            child,
            output,
            accounts,
            contracts: HashMap::new(),
            snapshot: None,
            compose,
        };
        if !owns_node {
            harness.reconcile().await;
        }
        harness.snapshot = Some(harness.take_snapshot().await?);
        Ok(harness)
    }

    /// Brings a reused node's state in line with the fork settings. Resets
    /// that the node refuses are logged and swallowed.
    async fn reconcile(&self) {
        let Some(fork) = self.config.fork() else {
            return;
        };
        let params = serde_json::json!([{
            "forking": {
                "jsonRpcUrl": fork.url,
                "blockNumber": fork.block_number,
            }
        }]);
        let reset: Result<(), _> =
            self.provider.raw_request("anvil_reset".into(), params).await;
        if let Err(err) = reset {
            let err = HarnessError::ForkResetFailed { reason: err.to_string() };
            warn!("{err}, continuing with the node's current state");
        } else {
            debug!("reset reused node to fork of {} at {}", fork.url, fork.block_number);
        }
    }

    /// Rolls chain state back to the last snapshot.
    ///
    /// A no-op when no blocks were mined since the snapshot was taken.
    pub async fn reset(&mut self) -> Result<()> {
        let Some(snapshot) = self.snapshot else {
            return Ok(());
        };
        let height = self.provider.get_block_number().await?;
        if height == snapshot.height {
            debug!("chain untouched since snapshot {}, skipping revert", snapshot.id);
            return Ok(());
        }
        self.restore_snapshot().await?;
        Ok(())
    }

    /// Reverts to the current snapshot and takes a fresh one.
    ///
    /// The chain is re-advanced to the snapshot's height afterwards so
    /// block numbers stay monotonic across restores.
    pub async fn restore_snapshot(&mut self) -> Result<Snapshot> {
        let snapshot =
            self.snapshot.ok_or(HarnessError::ConfigurationMissing { what: "snapshot" })?;

        let before = self.provider.get_block_number().await?;
        let reverted: bool =
            self.provider.raw_request("evm_revert".into(), (snapshot.id,)).await?;
        if !reverted {
            warn!("node rejected revert to snapshot {}", snapshot.id);
        }
        let after = self.provider.get_block_number().await?;
        let unwound = before.saturating_sub(after);
        if unwound > 0 {
            let _: () =
                self.provider.raw_request("anvil_mine".into(), (U256::from(unwound),)).await?;
            debug!("re-mined {unwound} block(s) after revert");
        }

        let fresh = self.take_snapshot().await?;
        self.snapshot = Some(fresh);
        Ok(fresh)
    }

    async fn take_snapshot(&self) -> Result<Snapshot> {
        let id: U256 = self.provider.raw_request("evm_snapshot".into(), ()).await?;
        let height = self.provider.get_block_number().await?;
        debug!("took snapshot {id} at height {height}");
        Ok(Snapshot { id, height })
    }

    /// Unlocks `address` for node-signed transactions and funds it.
    pub async fn impersonate(&self, address: Address) -> Result<()> {
        let _: () =
            self.provider.raw_request("anvil_impersonateAccount".into(), (address,)).await?;
        let balance = U256::from(10_000u64) * U256::from(10u64).pow(U256::from(18u64));
        let _: () =
            self.provider.raw_request("anvil_setBalance".into(), (address, balance)).await?;
        info!("impersonating {address}");
        Ok(())
    }

    /// Deploys a contract from the configured project root and records it
    /// in the handle's registry.
    pub async fn deploy(&mut self, request: DeployRequest) -> Result<DeployedContract> {
        let root = self
            .config
            .project_root()
            .ok_or(HarnessError::ConfigurationMissing { what: "project root" })?
            .to_path_buf();
        let deployed = deploy_contract(
            &self.provider,
            self.deployer(),
            &root,
            &request,
            self.config.receipt_policy(),
        )
        .await?;
        self.contracts.insert(request.name.clone(), deployed.clone());
        Ok(deployed)
    }

    /// Invokes a contract method as `wallet`.
    pub async fn invoke(
        &self,
        wallet: Address,
        contract: &ContractHandle,
        method: &str,
        params: &[DynSolValue],
    ) -> Result<Vec<DynSolValue>> {
        invoke_contract(
            &self.provider,
            wallet,
            contract,
            method,
            params,
            self.config.receipt_policy(),
        )
        .await
    }

    /// Stops everything this handle owns: compose services first, then the
    /// node process. Binding handles own nothing and this is a no-op for
    /// them beyond dropping the connection.
    pub async fn stop(mut self) -> Result<()> {
        if let Some(compose) = self.compose.take() {
            compose.down().await?;
        }
        if let Some(mut child) = self.child.take() {
            child.kill().await?;
            info!("stopped node on port {}", self.config.port());
        }
        Ok(())
    }

    /// The JSON-RPC provider connected to the node.
    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }

    /// HTTP endpoint of the node.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The configuration the harness was built with.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Derived accounts in derivation-index order.
    pub fn wallets(&self) -> &[WalletAccount] {
        &self.accounts
    }

    /// The account at derivation index `index`.
    pub fn wallet(&self, index: usize) -> Option<&WalletAccount> {
        self.accounts.get(index)
    }

    /// The account that signs deployments, derivation index 0.
    pub fn deployer(&self) -> Address {
        self.accounts.first().map(|w| w.address).unwrap_or(Address::ZERO)
    }

    /// A contract previously deployed through this handle.
    pub fn contract(&self, name: &str) -> Option<&DeployedContract> {
        self.contracts.get(name)
    }

    /// The current snapshot, if one has been taken.
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.snapshot
    }

    /// Whether this handle spawned (and thus owns) the node process.
    pub fn owns_node(&self) -> bool {
        self.child.is_some()
    }

    /// Captured node output so far, empty for reused or bound nodes.
    pub fn captured_output(&self) -> String {
        self.output
            .as_ref()
            .and_then(|o| o.lock().ok().map(|s| s.clone()))
            .unwrap_or_default()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            let _ = child.start_kill();
        }
    }
}

/// One readiness probe. True when the node answers `eth_chainId`.
async fn probe(provider: &DynProvider) -> bool {
    matches!(timeout(PROBE_TIMEOUT, provider.get_chain_id()).await, Ok(Ok(_)))
}

fn spawn_node(config: &NodeConfig) -> Result<(Child, Arc<Mutex<String>>)> {
    let mut cmd = Command::new(config.node_bin());
    cmd.arg("--port")
        .arg(config.port().to_string())
        .arg("--accounts")
        .arg(config.accounts().to_string())
        .arg("--mnemonic")
        .arg(config.mnemonic())
        .arg("--derivation-path")
        .arg(config.derivation_path());
    if let Some(fork) = config.fork() {
        cmd.arg("--fork-url")
            .arg(&fork.url)
            .arg("--fork-block-number")
            .arg(fork.block_number.to_string());
    }
    cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);

    info!("spawning {} on port {}", config.node_bin(), config.port());
    let mut child = cmd.spawn()?;

    let output = Arc::new(Mutex::new(String::new()));
    if let Some(stdout) = child.stdout.take() {
        spawn_output_reader(stdout, output.clone(), config.silent());
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_output_reader(stderr, output.clone(), config.silent());
    }
    Ok((child, output))
}

fn spawn_output_reader<R>(reader: R, sink: Arc<Mutex<String>>, silent: bool)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if !silent {
                debug!("node: {line}");
            }
            if let Ok(mut sink) = sink.lock() {
                sink.push_str(&line);
                sink.push('\n');
            }
        }
    });
}

/// Waits for a freshly spawned node to answer JSON-RPC.
///
/// An early exit is classified by the captured output: a bind failure
/// becomes [`HarnessError::PortUnavailable`] so the caller can remediate,
/// anything else becomes [`HarnessError::NodeExited`].
async fn wait_ready(
    provider: &DynProvider,
    config: &NodeConfig,
    child: &mut Child,
    output: &Arc<Mutex<String>>,
) -> Result<()> {
    let deadline = Instant::now() + config.startup_timeout();
    loop {
        if child.try_wait()?.is_some() {
            // Give the reader tasks a moment to drain the pipes.
            sleep(Duration::from_millis(100)).await;
            let captured = output.lock().map(|s| s.clone()).unwrap_or_default();
            if captured.contains("Address already in use") || captured.contains("os error 98") {
                return Err(HarnessError::PortUnavailable { port: config.port() });
            }
            return Err(HarnessError::NodeExited { output: captured });
        }
        if probe(provider).await {
            info!("node on port {} is ready", config.port());
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(HarnessError::StartupTimeout {
                port: config.port(),
                timeout: config.startup_timeout(),
            });
        }
        sleep(READINESS_INTERVAL).await;
    }
}

/// Kills whatever holds `port`, unix only.
#[cfg(unix)]
async fn kill_port_holder(port: u16) -> Result<()> {
    let status = Command::new("fuser")
        .arg("-k")
        .arg(format!("{port}/tcp"))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;
    debug!("fuser -k {port}/tcp exited with {status}");
    // Give the kernel a beat to release the socket.
    sleep(Duration::from_millis(500)).await;
    Ok(())
}

#[cfg(not(unix))]
async fn kill_port_holder(port: u16) -> Result<()> {
    Err(HarnessError::PortUnavailable { port })
}

//! Docker compose helper for auxiliary services.
//!
//! When a graph project is configured, its indexing stack (graph node,
//! IPFS, database) is brought up and torn down alongside the chain node.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use testkit_common::Result;
use tokio::process::Command;
use tracing::{debug, info};

/// A docker compose project the harness owns.
#[derive(Debug, Clone)]
pub struct ComposeProject {
    dir: PathBuf,
    silent: bool,
}

impl ComposeProject {
    /// Compose project rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>, silent: bool) -> Self {
        Self { dir: dir.into(), silent }
    }

    /// Directory holding the compose file.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `docker compose up --detach`.
    pub async fn up(&self) -> Result<()> {
        info!("starting docker compose project at {}", self.dir.display());
        self.run(&["compose", "up", "--detach"]).await
    }

    /// `docker compose down`.
    pub async fn down(&self) -> Result<()> {
        info!("stopping docker compose project at {}", self.dir.display());
        self.run(&["compose", "down"]).await
    }

    async fn run(&self, args: &[&str]) -> Result<()> {
        let mut cmd = Command::new("docker");
        cmd.args(args).current_dir(&self.dir);
        if self.silent {
            cmd.stdout(Stdio::null()).stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }
        let output = cmd.output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(std::io::Error::other(format!(
                "docker {} failed in {}: {}",
                args.join(" "),
                self.dir.display(),
                stderr.trim()
            ))
            .into());
        }
        debug!("docker {} succeeded", args.join(" "));
        Ok(())
    }
}

//! Command-line surface: one binary, three verbs, three kinds

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use certchain_signing::{CfsslConfig, CfsslEngine, SigningEngine};
use certchain_store::{S3Store, StoreAccessor};
use clap::{Parser, Subcommand};
use log::{debug, info};
use serde::Serialize;
use tokio::io::AsyncReadExt;

use crate::config::SourceConfig;
use crate::controller::ResourceController;
use crate::kind::ResourceKind;
use crate::payload::{CheckRequest, InRequest, OutRequest};
use crate::Result;

/// Command-line arguments of the resource binary
#[derive(Parser)]
#[command(name = "certchain")]
#[command(about = "Concourse resource for a root / intermediate / leaf certificate authority")]
pub struct Cli {
    /// Hierarchy level this resource manages
    #[arg(long, env = "CERTCHAIN_KIND", value_enum)]
    pub kind: ResourceKind,

    /// Path to the cfssl binary
    #[arg(long = "cfssl-bin", env = "CFSSL_BIN", default_value = "cfssl")]
    pub cfssl_bin: PathBuf,

    /// Seconds to wait for each cfssl invocation
    #[arg(long = "signing-timeout", env = "CFSSL_TIMEOUT", default_value_t = 60)]
    pub signing_timeout: u64,

    /// Resource verb to run
    #[command(subcommand)]
    pub command: Commands,
}

/// The three resource verbs
#[derive(Clone, Subcommand)]
pub enum Commands {
    /// Report the current version if it changed (reads a request on stdin)
    Check,

    /// Write the requested version's files into DESTINATION
    In {
        /// Directory the files are written to
        destination: PathBuf,
    },

    /// Create or renew the certificate; SOURCES is the build's working tree
    Out {
        /// Build working tree handed to `out`
        sources: PathBuf,
    },
}

impl Cli {
    fn engine(&self) -> Arc<dyn SigningEngine> {
        Arc::new(CfsslEngine::new(CfsslConfig {
            binary: self.cfssl_bin.clone(),
            timeout: Duration::from_secs(self.signing_timeout),
        }))
    }
}

async fn connect(
    kind: ResourceKind,
    source: &SourceConfig,
    engine: Arc<dyn SigningEngine>,
) -> Result<ResourceController> {
    let s3 = source.s3_config()?;
    let store = S3Store::connect(&s3).await?;
    let accessor = StoreAccessor::new(Arc::new(store), source.prefix.as_deref());
    ResourceController::new(kind, source, accessor, engine)
}

async fn read_stdin() -> Result<Vec<u8>> {
    let mut input = Vec::new();
    tokio::io::stdin().read_to_end(&mut input).await?;
    Ok(input)
}

fn write_stdout(payload: &impl Serialize) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

/// Run one invocation: request on stdin, response on stdout
///
/// # Errors
///
/// Any [`ResourceError`](crate::ResourceError); the caller reports it and
/// exits non-zero.
pub async fn run(cli: &Cli) -> Result<()> {
    let input = read_stdin().await?;
    let kind = cli.kind;

    match &cli.command {
        Commands::Check => {
            let request: CheckRequest = serde_json::from_slice(&input)?;
            debug!("check {kind}: {:?}", request.source);
            let controller = connect(kind, &request.source, cli.engine()).await?;
            let versions = controller.check(request.version.as_ref()).await?;
            write_stdout(&versions)
        }
        Commands::In { destination } => {
            let request: InRequest = serde_json::from_slice(&input)?;
            debug!("in {kind}: {:?}", request.source);
            let controller = connect(kind, &request.source, cli.engine()).await?;
            let response = controller
                .fetch(&request.version, &request.params, destination)
                .await?;
            write_stdout(&response)
        }
        Commands::Out { sources } => {
            let request: OutRequest = serde_json::from_slice(&input)?;
            debug!("out {kind}: {:?}", request.source);
            info!("out {kind} from {}", sources.display());
            let controller = connect(kind, &request.source, cli.engine()).await?;
            let response = controller.publish(&request.params).await?;
            write_stdout(&response)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kind_and_verb() {
        let cli = Cli::try_parse_from(["certchain", "--kind", "leaf", "in", "/tmp/dest"]).unwrap();
        assert_eq!(cli.kind, ResourceKind::Leaf);
        assert_eq!(cli.signing_timeout, 60);
        assert!(matches!(cli.command, Commands::In { ref destination } if destination.ends_with("dest")));
    }

    #[test]
    fn engine_settings_are_flags() {
        let cli = Cli::try_parse_from([
            "certchain",
            "--kind",
            "root",
            "--cfssl-bin",
            "/usr/local/bin/cfssl",
            "--signing-timeout",
            "5",
            "check",
        ])
        .unwrap();
        assert_eq!(cli.cfssl_bin, PathBuf::from("/usr/local/bin/cfssl"));
        assert_eq!(cli.signing_timeout, 5);
        assert!(matches!(cli.command, Commands::Check));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(Cli::try_parse_from(["certchain", "--kind", "subordinate", "check"]).is_err());
    }
}

//! cfssl process execution

use std::process::Stdio;
use std::time::Instant;

use certchain_common::LoggingTransformer;
use log::{debug, warn};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{CfsslConfig, ENGINE};
use crate::{Result, SigningError};

/// Secret handed to the child through its environment
pub(crate) struct EnvSecret<'a> {
    pub name: &'static str,
    pub value: &'a str,
}

impl EnvSecret<'_> {
    /// Command-line reference to this secret
    pub fn reference(&self) -> String {
        format!("env:{}", self.name)
    }
}

/// Run cfssl with `args`, feeding `input` on stdin
///
/// Returns stdout on a zero exit. Anything cfssl writes to stderr is logged;
/// on failure it becomes the error's diagnostic, unmodified.
pub(crate) async fn run(
    config: &CfsslConfig,
    args: &[&str],
    input: &[u8],
    secrets: &[EnvSecret<'_>],
) -> Result<Vec<u8>> {
    let program = config.binary.display().to_string();
    let description = format!("{ENGINE} {}", args.first().copied().unwrap_or_default());
    debug!("Running {program} {}", args.join(" "));

    let mut cmd = Command::new(&config.binary);
    cmd.args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for secret in secrets {
        cmd.env(secret.name, secret.value);
    }

    let started = Instant::now();
    let mut child = cmd.spawn().map_err(|source| SigningError::Spawn {
        program: program.clone(),
        source,
    })?;
    let mut stdin = child.stdin.take().ok_or_else(|| SigningError::Output {
        engine: ENGINE,
        reason: "stdin was not captured".to_string(),
    })?;

    let feed = async move {
        let written = stdin.write_all(input).await;
        drop(stdin);
        written
    };

    let exchange = async { tokio::join!(feed, child.wait_with_output()) };
    let (written, output) = match tokio::time::timeout(config.timeout, exchange).await {
        Ok(result) => result,
        Err(_) => {
            warn!("{description} timed out after {:?}", config.timeout);
            LoggingTransformer::log_performance_metric(&description, started.elapsed(), false);
            return Err(SigningError::Timeout {
                engine: ENGINE,
                seconds: config.timeout.as_secs(),
            });
        }
    };
    let output = output?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    LoggingTransformer::log_engine_diagnostic(ENGINE, "stderr", &stderr);
    LoggingTransformer::log_performance_metric(
        &description,
        started.elapsed(),
        output.status.success(),
    );

    if !output.status.success() {
        let diagnostic = if stderr.trim().is_empty() {
            format!("{description} exited with {}", output.status)
        } else {
            stderr.into_owned()
        };
        return Err(SigningError::Engine {
            engine: ENGINE,
            diagnostic,
        });
    }
    if let Err(e) = written {
        // The process succeeded without reading all of its input
        debug!("{description} closed stdin early: {e}");
    }

    Ok(output.stdout)
}

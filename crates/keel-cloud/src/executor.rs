use std::process::Stdio;
use std::time::Instant;

use keel_core::AwsConfig;
use tracing::debug;

use crate::aws::AwsError;

/// Runs `aws` subcommands and returns their stdout.
///
/// [`DynamoTable`](crate::DynamoTable) and [`CloudFormation`](crate::CloudFormation)
/// drive AWS through this seam only; tests substitute a `mockall` mock.
#[allow(async_fn_in_trait)]
pub trait AwsExecutor: Send + Sync {
    async fn exec(&self, args: &[String]) -> Result<String, AwsError>;
}

/// Spawns the `aws` binary, adding the configured region and profile.
#[derive(Debug, Clone, Default)]
pub struct RealExecutor {
    region: Option<String>,
    profile: Option<String>,
}

impl RealExecutor {
    pub fn from_config(config: &AwsConfig) -> Self {
        Self {
            region: config.region.clone(),
            profile: config.profile.clone(),
        }
    }

    /// Full argument list for one invocation. Flags the caller already
    /// passed win over configured ones.
    pub fn command_line(&self, args: &[String]) -> Vec<String> {
        let mut line = args.to_vec();
        for (flag, value) in [("--region", &self.region), ("--profile", &self.profile)] {
            let Some(value) = value else { continue };
            if !args.iter().any(|a| a == flag) {
                line.push(flag.to_owned());
                line.push(value.clone());
            }
        }
        line
    }
}

impl AwsExecutor for RealExecutor {
    async fn exec(&self, args: &[String]) -> Result<String, AwsError> {
        let line = self.command_line(args);
        // Service and operation only; item payloads can be large.
        let operation = args.iter().take(2).map(String::as_str).collect::<Vec<_>>().join(" ");
        let started = Instant::now();

        let output = tokio::process::Command::new("aws")
            .args(&line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| AwsError::NotFound { source: e })?;

        debug!(
            %operation,
            status = output.status.code(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "aws"
        );

        if output.status.success() {
            String::from_utf8(output.stdout).map_err(|e| AwsError::InvalidUtf8 { source: e })
        } else {
            Err(AwsError::CommandFailed {
                args: args.to_vec(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }
}

pub(crate) fn args<const N: usize>(a: [&str; N]) -> Vec<String> {
    a.iter().map(|s| (*s).to_owned()).collect()
}

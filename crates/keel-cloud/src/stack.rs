use keel_core::StackParameter;
use serde::Deserialize;

use crate::aws::AwsError;
use crate::executor::{AwsExecutor, RealExecutor, args};

/// Declarative infrastructure stacks. The service applies an update
/// all-or-nothing and rejects conflicting concurrent updates.
#[allow(async_fn_in_trait)]
pub trait StackService: Send + Sync {
    /// Current parameter values of a live stack.
    async fn describe_parameters(&self, stack: &str) -> Result<Vec<StackParameter>, StackError>;

    async fn update_stack(
        &self,
        stack: &str,
        template: &str,
        parameters: &[StackParameter],
    ) -> Result<(), StackError>;
}

/// CloudFormation, driven through the aws CLI.
pub struct CloudFormation<E: AwsExecutor = RealExecutor> {
    executor: E,
}

impl CloudFormation<RealExecutor> {
    pub fn new() -> Self {
        Self {
            executor: RealExecutor::default(),
        }
    }
}

impl Default for CloudFormation<RealExecutor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: AwsExecutor> CloudFormation<E> {
    pub fn with_executor(executor: E) -> Self {
        Self { executor }
    }
}

#[derive(Deserialize)]
struct DescribeStacksOutput {
    #[serde(rename = "Stacks", default)]
    stacks: Vec<StackDescription>,
}

#[derive(Deserialize)]
struct StackDescription {
    #[serde(rename = "Parameters", default)]
    parameters: Vec<StackParameter>,
}

impl<E: AwsExecutor> StackService for CloudFormation<E> {
    async fn describe_parameters(&self, stack: &str) -> Result<Vec<StackParameter>, StackError> {
        let output = self
            .executor
            .exec(&args([
                "cloudformation",
                "describe-stacks",
                "--stack-name",
                stack,
                "--output",
                "json",
            ]))
            .await
            .map_err(|e| StackError::Aws {
                stack: stack.to_owned(),
                source: e,
            })?;

        let parsed: DescribeStacksOutput =
            serde_json::from_str(&output).map_err(|e| StackError::Decode {
                stack: stack.to_owned(),
                source: e,
            })?;

        parsed
            .stacks
            .into_iter()
            .next()
            .map(|s| s.parameters)
            .ok_or_else(|| StackError::NotFound {
                stack: stack.to_owned(),
            })
    }

    async fn update_stack(
        &self,
        stack: &str,
        template: &str,
        parameters: &[StackParameter],
    ) -> Result<(), StackError> {
        let parameters = serde_json::to_string(parameters).map_err(|e| StackError::Decode {
            stack: stack.to_owned(),
            source: e,
        })?;

        self.executor
            .exec(&args([
                "cloudformation",
                "update-stack",
                "--stack-name",
                stack,
                "--template-body",
                template,
                "--parameters",
                &parameters,
                "--capabilities",
                "CAPABILITY_IAM",
                "--output",
                "json",
            ]))
            .await
            .map_err(|e| StackError::Aws {
                stack: stack.to_owned(),
                source: e,
            })?;

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StackError {
    #[error("stack request for {stack} failed")]
    Aws { stack: String, source: AwsError },

    #[error("stack {stack} does not exist")]
    NotFound { stack: String },

    #[error("unexpected stack payload for {stack}")]
    Decode {
        stack: String,
        source: serde_json::Error,
    },
}

impl StackError {
    /// Text reported by the orchestration service itself.
    pub fn remote_message(&self) -> String {
        match self {
            Self::Aws { source, .. } => source.remote_message(),
            other => other.to_string(),
        }
    }
}

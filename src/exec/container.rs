//! Container executor - wraps a spec in `<runtime> run` and delegates to a process executor

use super::{CommandSpec, ExecutionResult, Executor};
use crate::error::ExecError;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Exit status used by docker/podman when the runtime itself failed
const RUNTIME_FAILURE_EXIT: i32 = 125;

/// Upper bound for the best-effort `kill` after a timeout
const KILL_TIMEOUT: Duration = Duration::from_secs(10);

const IMAGE_MISSING_MARKERS: &[&str] = &[
    "pull access denied",
    "no such image",
    "manifest unknown",
    "repository does not exist",
    "not found: manifest",
];

/// Runs container-wrapped specs through an inner process executor
pub struct ContainerExecutor {
    runtime: String,
    inner: Arc<dyn Executor>,
}

impl ContainerExecutor {
    pub fn new<S: Into<String>>(runtime: S, inner: Arc<dyn Executor>) -> Self {
        Self {
            runtime: runtime.into(),
            inner,
        }
    }

    fn container_name() -> String {
        format!("reconkit-{}", Uuid::new_v4().simple())
    }

    /// Stop a container whose client was killed; the client going away does not stop it
    async fn kill_container(&self, name: &str) {
        let spec = CommandSpec::new(self.runtime.clone(), vec!["kill".to_string(), name.to_string()]);
        match self.inner.run(&spec, KILL_TIMEOUT).await {
            Ok(result) if result.success() => info!("Killed timed-out container {}", name),
            Ok(result) => debug!(
                "{} kill {} exited with {}: {}",
                self.runtime,
                name,
                result.exit_code,
                result.stderr_lossy().trim()
            ),
            Err(e) => warn!("Failed to kill container {}: {}", name, e),
        }
    }
}

fn image_missing(result: &ExecutionResult) -> Option<String> {
    if result.exit_code != RUNTIME_FAILURE_EXIT {
        return None;
    }

    let stderr = result.stderr_lossy();
    let lowered = stderr.to_lowercase();
    if IMAGE_MISSING_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        let detail = stderr
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .unwrap_or("image not found")
            .trim()
            .to_string();
        Some(detail)
    } else {
        None
    }
}

#[async_trait::async_trait]
impl Executor for ContainerExecutor {
    async fn run(&self, spec: &CommandSpec, timeout: Duration) -> Result<ExecutionResult, ExecError> {
        let container = match &spec.container {
            Some(container) => container,
            None => return self.inner.run(spec, timeout).await,
        };

        let name = Self::container_name();
        let argv = container.wrap(&self.runtime, &name, &spec.program, &spec.args);
        let wrapped = CommandSpec::new(self.runtime.clone(), argv[1..].to_vec());

        let result = self.inner.run(&wrapped, timeout).await.map_err(|e| match e {
            ExecError::BinaryNotFound { .. } => ExecError::RuntimeNotFound {
                runtime: self.runtime.clone(),
            },
            other => other,
        })?;

        if result.timed_out {
            self.kill_container(&name).await;
        }

        if let Some(detail) = image_missing(&result) {
            return Err(ExecError::ImageNotFound {
                image: container.image.clone(),
                detail,
            });
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "container"
    }
}

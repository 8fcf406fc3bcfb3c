//! Process execution - native binaries and containerised tools
//!
//! A [`CommandSpec`] is an argument vector, never a shell line. An
//! [`Executor`] runs it under a hard wall-clock timeout and always hands back
//! an [`ExecutionResult`]; non-zero exits, tool errors and timeouts are data,
//! not `Err`. Only a missing binary, runtime or image is reported as an
//! [`ExecError`], so callers can tell the operator what to install.

use crate::config::ExecutionMode;
use crate::error::ExecError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub mod container;
pub mod native;

pub use container::ContainerExecutor;
pub use native::NativeExecutor;

/// A file on the host that must be visible to the tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
    pub host_path: PathBuf,
    pub container_path: PathBuf,
    pub read_only: bool,
}

impl Mount {
    /// Read-only bind mount
    pub fn read_only<H: Into<PathBuf>, C: Into<PathBuf>>(host_path: H, container_path: C) -> Self {
        Self {
            host_path: host_path.into(),
            container_path: container_path.into(),
            read_only: true,
        }
    }

    /// `-v` argument value
    pub fn volume_arg(&self) -> String {
        let mut arg = format!("{}:{}", self.host_path.display(), self.container_path.display());
        if self.read_only {
            arg.push_str(":ro");
        }
        arg
    }
}

/// Container wrapper descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub image: String,
    pub network: Option<String>,
    pub cap_add: Vec<String>,
    pub cpus: Option<String>,
    pub memory: Option<String>,
    pub mounts: Vec<Mount>,
}

impl ContainerSpec {
    /// Wrap a native argument vector in a container-run command.
    ///
    /// The tool binary becomes the entrypoint so images with and without an
    /// `ENTRYPOINT` behave the same.
    pub fn wrap(&self, runtime: &str, name: &str, program: &str, args: &[String]) -> Vec<String> {
        let mut argv: Vec<String> = vec![
            runtime.to_string(),
            "run".to_string(),
            "--rm".to_string(),
            "--init".to_string(),
            "--name".to_string(),
            name.to_string(),
        ];

        if let Some(cpus) = &self.cpus {
            argv.push("--cpus".to_string());
            argv.push(cpus.clone());
        }
        if let Some(memory) = &self.memory {
            argv.push("--memory".to_string());
            argv.push(memory.clone());
        }
        if let Some(network) = &self.network {
            argv.push("--network".to_string());
            argv.push(network.clone());
        }
        for cap in self.cap_add.iter().filter(|c| !c.is_empty()) {
            argv.push("--cap-add".to_string());
            argv.push(cap.clone());
        }
        for mount in &self.mounts {
            argv.push("-v".to_string());
            argv.push(mount.volume_arg());
        }

        argv.push("--entrypoint".to_string());
        argv.push(program.to_string());
        argv.push(self.image.clone());
        argv.extend(args.iter().cloned());
        argv
    }
}

/// An immutable command invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Binary to run (inside the container when `container` is set)
    pub program: String,
    /// Arguments, passed verbatim without a shell
    pub args: Vec<String>,
    /// Present when the tool is configured for container execution
    pub container: Option<ContainerSpec>,
}

impl CommandSpec {
    pub fn new<S: Into<String>>(program: S, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            container: None,
        }
    }

    pub fn with_container(mut self, container: ContainerSpec) -> Self {
        self.container = Some(container);
        self
    }

    /// Which executor strategy this spec needs
    pub fn mode(&self) -> ExecutionMode {
        if self.container.is_some() {
            ExecutionMode::Container
        } else {
            ExecutionMode::Native
        }
    }

    /// Native argument vector, program first
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }
}

/// Result of one executor invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Process exit code, `-1` when killed or terminated by a signal
    pub exit_code: i32,
    pub stdout: Bytes,
    pub stderr: Bytes,
    pub timed_out: bool,
    pub duration: Duration,
    /// Set when a stream hit the capture limit
    pub output_truncated: bool,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Runs command specs
#[async_trait::async_trait]
pub trait Executor: Send + Sync {
    async fn run(&self, spec: &CommandSpec, timeout: Duration) -> Result<ExecutionResult, ExecError>;

    fn name(&self) -> &str;
}

/// Native and container strategies, chosen per spec
#[derive(Clone)]
pub struct ExecutorSet {
    native: Arc<dyn Executor>,
    container: Arc<dyn Executor>,
}

impl ExecutorSet {
    pub fn new(native: Arc<dyn Executor>, container: Arc<dyn Executor>) -> Self {
        Self { native, container }
    }

    /// Default strategies for a configuration
    pub fn from_config(config: &crate::config::AppConfig) -> Self {
        let native: Arc<dyn Executor> = Arc::new(NativeExecutor::new(config.max_output_bytes));
        let container: Arc<dyn Executor> = Arc::new(ContainerExecutor::new(
            config.container_runtime.clone(),
            Arc::clone(&native),
        ));
        Self { native, container }
    }

    pub fn for_mode(&self, mode: ExecutionMode) -> &Arc<dyn Executor> {
        match mode {
            ExecutionMode::Native => &self.native,
            ExecutionMode::Container => &self.container,
        }
    }

    /// Run a spec with the strategy it was built for
    pub async fn run(&self, spec: &CommandSpec, timeout: Duration) -> Result<ExecutionResult, ExecError> {
        let executor = self.for_mode(spec.mode());
        log::debug!("Running {} via {} executor (timeout {:?})", spec.program, executor.name(), timeout);
        executor.run(spec, timeout).await
    }
}

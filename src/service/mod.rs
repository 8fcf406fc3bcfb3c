//! Recon/enum facade
//!
//! [`ReconService`] is the only layer callers use. Every operation runs the
//! same pipeline: validate params, check scope, build the command, execute
//! it and normalise the output. Every failure comes back as a
//! [`ToolResult`]; nothing is raised to the caller.

pub mod enumeration;
pub mod recon;
pub mod registry;

use crate::config::AppConfig;
use crate::discovery::{DiscoveryEngine, IcmpProber, Prober, TcpProber};
use crate::error::ToolError;
use crate::exec::{Executor, ExecutorSet, NativeExecutor};
use crate::result::ToolResult;
use crate::scope::ScopeGuard;
use crate::tools::{CommandBuilder, OutputParser, ToolRequest};
use log::{info, warn};
use std::sync::Arc;

pub use registry::{OperationInfo, OPERATIONS};

/// Process and socket back-ends used by the facade
#[derive(Clone)]
pub struct Backends {
    pub executors: ExecutorSet,
    pub icmp: Arc<dyn Prober>,
    pub tcp: Arc<dyn Prober>,
}

impl Backends {
    /// Real back-ends for a configuration
    pub fn from_config(config: &AppConfig) -> Self {
        let executors = ExecutorSet::from_config(config);
        // ping always runs on the host
        let native: Arc<dyn Executor> = Arc::new(NativeExecutor::new(config.max_output_bytes));
        Self {
            executors,
            icmp: Arc::new(IcmpProber::new(native, config.ping_binary.clone())),
            tcp: Arc::new(TcpProber::new()),
        }
    }
}

/// The tool facade
#[derive(Clone)]
pub struct ReconService {
    config: Arc<AppConfig>,
    scope: ScopeGuard,
    builder: CommandBuilder,
    parser: OutputParser,
    backends: Backends,
    discovery: DiscoveryEngine,
}

impl ReconService {
    /// Service with the real native/container executors and probers
    pub fn new(config: AppConfig) -> Self {
        let backends = Backends::from_config(&config);
        Self::with_backends(config, backends)
    }

    /// Service with explicit back-ends
    pub fn with_backends(config: AppConfig, backends: Backends) -> Self {
        let config = Arc::new(config);
        let scope = ScopeGuard::new(config.allowed_prefix.clone());
        if scope.is_unrestricted() {
            warn!("ALLOWED_PREFIX is empty: every target is in scope. Set it outside lab use.");
        } else {
            info!("Target scope restricted to prefix '{}'", scope.allowed_prefix());
        }

        let discovery = DiscoveryEngine::new(
            Arc::clone(&backends.icmp),
            Arc::clone(&backends.tcp),
            config.max_reported_errors,
        );

        Self {
            builder: CommandBuilder::new(Arc::clone(&config)),
            parser: OutputParser::new(config.nmap_output),
            scope,
            backends,
            discovery,
            config,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn scope(&self) -> &ScopeGuard {
        &self.scope
    }

    pub fn builder(&self) -> &CommandBuilder {
        &self.builder
    }

    /// Checks shared by every external-tool operation, before anything runs
    async fn prepare(&self, request: &ToolRequest) -> crate::Result<()> {
        request.validate()?;
        if request.accepts_target_list() {
            self.scope.check_list(request.target())?;
        } else {
            self.scope.check(request.target())?;
        }

        if let Some(wordlist) = request.wordlist() {
            match tokio::fs::metadata(wordlist).await {
                Ok(meta) if meta.is_file() => {}
                _ => return Err(ToolError::MissingInput(wordlist.to_string())),
            }
        }
        Ok(())
    }

    /// validate -> scope -> build -> execute -> parse
    pub(crate) async fn run_tool(&self, request: ToolRequest) -> ToolResult {
        let operation = request.operation();

        if let Err(e) = self.prepare(&request).await {
            warn!("{} refused: {}", operation, e);
            return ToolResult::from_error(operation, &e);
        }

        let spec = self.builder.build(&request);
        info!(
            "{}: running {} ({:?} mode) against {}",
            operation,
            request.kind(),
            spec.mode(),
            request.target()
        );

        let execution = match self.backends.executors.run(&spec, request.timeout()).await {
            Ok(execution) => execution,
            Err(e) => {
                let error = ToolError::from(e);
                warn!("{} failed: {}", operation, error);
                return ToolResult::from_error(operation, &error);
            }
        };

        let result = self.parser.parse(&request, &execution);
        match &result.error {
            Some(error) => warn!("{} finished with {}: {}", operation, error.kind, error.message),
            None => info!("{} finished in {:?}", operation, execution.duration),
        }
        result
    }
}

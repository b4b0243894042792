//! The module lifecycle driver.

use crate::core::ConfigStore;
use crate::runtime::module::identity;
use crate::runtime::{
    BoxError, CancelScope, Fault, InitContext, Module, ModuleFailure, ModuleRecord,
    ModuleRecords, Phase, RuntimeError, ShutdownContext, StartMode,
};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, error, info, warn};

/// Upper bound on the shutdown phase unless configured otherwise.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

type HookResult = (usize, Result<(), BoxError>);

/// Drives an ordered list of modules through init, start and shutdown.
///
/// Init runs strictly in the order modules were added and stops at the first
/// failure. Start runs every module's start hook concurrently under one
/// cancellation scope; the first failure cancels the others. Shutdown runs
/// every module's teardown concurrently under one deadline and collects all
/// failures.
///
/// # Examples
///
/// ```rust,no_run
/// use bootkit::modules::ConfigModule;
/// use bootkit::runtime::Runtime;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// Runtime::new()
///     .with_module(ConfigModule::new())
///     .with_shutdown_timeout(Duration::from_secs(10))
///     .run()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct Runtime {
    modules: Vec<Box<dyn Module>>,
    records: ModuleRecords,
    shutdown_timeout: Duration,
}

impl Runtime {
    /// Create a runtime with no modules.
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
            records: ModuleRecords::default(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Append a module.
    pub fn with_module<M: Module>(mut self, module: M) -> Self {
        self.add_module(Box::new(module));
        self
    }

    /// Append an already boxed module.
    pub fn add_module(&mut self, module: Box<dyn Module>) {
        self.records.push(ModuleRecord {
            identity: identity(module.as_ref()),
            phase: Phase::Created,
            instance_name: module.name().map(str::to_string),
            config_path: module.config_path(),
        });
        self.modules.push(module);
    }

    /// Set the upper bound for the shutdown phase.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Live view of every module's lifecycle state.
    pub fn records(&self) -> ModuleRecords {
        self.records.clone()
    }

    /// Run until the process receives an interrupt or terminate signal, a
    /// blocking module returns, or a module fails.
    pub async fn run(self) -> Result<(), RuntimeError> {
        self.run_until(shutdown_signal()).await
    }

    /// Like [`run`](Self::run), with `signal` standing in for the process
    /// signals.
    pub async fn run_until<S>(self, signal: S) -> Result<(), RuntimeError>
    where
        S: Future<Output = ()> + Send,
    {
        let Runtime {
            mut modules,
            records,
            shutdown_timeout,
        } = self;

        let run_scope = CancelScope::new();
        let mut ctx = InitContext::new(run_scope.token());
        tokio::pin!(signal);
        let mut signalled = false;

        info!(modules = modules.len(), "initializing modules");
        let mut initialized = 0;
        for (index, module) in modules.iter_mut().enumerate() {
            if signalled {
                break;
            }

            let result = {
                let init = AssertUnwindSafe(init_module(module.as_mut(), &mut ctx)).catch_unwind();
                tokio::pin!(init);
                loop {
                    tokio::select! {
                        result = &mut init => break result,
                        _ = &mut signal, if !signalled => {
                            info!("shutdown signal received during init");
                            signalled = true;
                            run_scope.cancel();
                        }
                    }
                }
            }
            .unwrap_or_else(|panic| Err(Fault::from_panic(panic).into()));

            let module_id = identity(module.as_ref());
            records.update(index, |record| {
                record.identity = module_id.clone();
                record.instance_name = module.name().map(str::to_string);
            });

            if let Err(source) = result {
                records.advance(index, Phase::Failed);
                error!(module = %module_id, error = %source, "module failed to initialize");
                return Err(RuntimeError::Init {
                    module: module_id,
                    source,
                });
            }
            records.advance(index, Phase::Initialized);
            initialized = index + 1;
            debug!(module = %module_id, "module initialized");
        }

        // Modules after an interrupted init stay `Created` and are never shut down.
        modules.truncate(initialized);
        let modules: Vec<Arc<dyn Module>> = modules.into_iter().map(Arc::from).collect();
        let identities: Vec<String> = modules.iter().map(|m| identity(m.as_ref())).collect();
        let modes: Vec<StartMode> = if signalled {
            vec![StartMode::None; modules.len()]
        } else {
            modules.iter().map(|m| m.start_mode()).collect()
        };

        let start_scope = CancelScope::new();
        let mut starts: JoinSet<HookResult> = JoinSet::new();
        for (index, module) in modules.iter().enumerate() {
            let mode = modes[index];
            match mode {
                StartMode::None => {
                    debug!(module = %identities[index], "module has no start hook");
                    continue;
                }
                StartMode::Blocking => records.advance(index, Phase::Started),
                StartMode::Ready => {}
            }

            let module = Arc::clone(module);
            let cancel = start_scope.token();
            starts.spawn(async move {
                let hook = async {
                    match mode {
                        StartMode::Blocking => module.start(cancel).await,
                        _ => module.start_async(cancel).await,
                    }
                };
                let result = AssertUnwindSafe(hook)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| Err(Fault::from_panic(panic).into()));
                (index, result)
            });
        }
        info!(tasks = starts.len(), "modules starting");

        let mut start_failure: Option<(String, BoxError)> = None;
        while !signalled {
            tokio::select! {
                _ = &mut signal => {
                    info!("shutdown signal received");
                    break;
                }
                joined = starts.join_next(), if !starts.is_empty() => {
                    let Some(joined) = joined else { continue };
                    match joined {
                        Ok((index, Ok(()))) => {
                            if modes[index] == StartMode::Blocking {
                                info!(module = %identities[index], "blocking module returned");
                                break;
                            }
                            records.advance(index, Phase::Started);
                            info!(module = %identities[index], "module ready");
                        }
                        Ok((index, Err(source))) => {
                            records.advance(index, Phase::Failed);
                            error!(module = %identities[index], error = %source, "module failed to start");
                            start_failure = Some((identities[index].clone(), source));
                            break;
                        }
                        Err(err) => error!(error = %err, "start task ended abnormally"),
                    }
                }
            }
        }

        if start_failure.is_some() {
            start_scope.cancel();
            let deadline = Instant::now() + shutdown_timeout;
            drain_starts(&mut starts, deadline, &identities).await;
        }

        info!("shutting down modules");
        run_scope.cancel();
        start_scope.cancel();
        let deadline = Instant::now() + shutdown_timeout;
        let failures = shutdown_all(&modules, &identities, &records, deadline).await;
        drain_starts(&mut starts, deadline, &identities).await;

        match start_failure {
            Some((module, source)) => Err(RuntimeError::Start {
                module,
                source,
                shutdown: failures,
            }),
            None if !failures.is_empty() => Err(RuntimeError::Shutdown(failures)),
            None => {
                info!("all modules stopped");
                Ok(())
            }
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

async fn init_module(module: &mut dyn Module, ctx: &mut InitContext) -> Result<(), BoxError> {
    if let Some(path) = module.config_path() {
        if let Some(store) = ctx.get::<Arc<ConfigStore>>() {
            let tree = store.tree();
            if tree.exists(&path) {
                module.load_config(&tree)?;
            } else {
                debug!(path = %path, "no configuration for module");
            }
        }
    }
    module.init(ctx).await
}

/// Await leftover start tasks until `deadline`, then abort the rest.
async fn drain_starts(starts: &mut JoinSet<HookResult>, deadline: Instant, identities: &[String]) {
    loop {
        match timeout_at(deadline, starts.join_next()).await {
            Ok(Some(Ok((index, Err(err))))) => {
                debug!(module = %identities[index], error = %err, "start task returned after cancellation");
            }
            Ok(Some(_)) => {}
            Ok(None) => break,
            Err(_) => {
                warn!(tasks = starts.len(), "abandoning start tasks after deadline");
                starts.abort_all();
                break;
            }
        }
    }
}

/// Run every module's shutdown concurrently, bounded by `deadline`.
async fn shutdown_all(
    modules: &[Arc<dyn Module>],
    identities: &[String],
    records: &ModuleRecords,
    deadline: Instant,
) -> Vec<ModuleFailure> {
    let mut tasks: JoinSet<HookResult> = JoinSet::new();
    for (index, module) in modules.iter().enumerate() {
        records.advance(index, Phase::ShuttingDown);
        let module = Arc::clone(module);
        let ctx = ShutdownContext::new(deadline);
        tasks.spawn(async move {
            let result = AssertUnwindSafe(module.shutdown(ctx))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(Fault::from_panic(panic).into()));
            (index, result)
        });
    }

    let mut pending = vec![true; modules.len()];
    let mut failures = Vec::new();
    let mut timed_out = false;
    loop {
        match timeout_at(deadline, tasks.join_next()).await {
            Ok(Some(Ok((index, result)))) => {
                pending[index] = false;
                match result {
                    Ok(()) => {
                        records.advance(index, Phase::Stopped);
                        debug!(module = %identities[index], "module stopped");
                    }
                    Err(source) => {
                        records.advance(index, Phase::Failed);
                        error!(module = %identities[index], error = %source, "module failed to shut down");
                        failures.push(ModuleFailure::new(identities[index].clone(), source));
                    }
                }
            }
            Ok(Some(Err(err))) => error!(error = %err, "shutdown task ended abnormally"),
            Ok(None) => break,
            Err(_) => {
                timed_out = true;
                tasks.abort_all();
                break;
            }
        }
    }

    for (index, still_running) in pending.into_iter().enumerate() {
        if !still_running {
            continue;
        }
        records.advance(index, Phase::Failed);
        let fault = if timed_out {
            warn!(module = %identities[index], "module abandoned at shutdown deadline");
            Fault::DeadlineExceeded
        } else {
            Fault::Panicked("shutdown task was cancelled".to_string())
        };
        failures.push(ModuleFailure::new(identities[index].clone(), fault));
    }
    failures
}

/// Completes when the process receives Ctrl+C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C"),
        _ = terminate => info!("received SIGTERM"),
    }
}

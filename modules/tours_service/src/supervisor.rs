//! Process-level crash supervision
//!
//! Two kinds of failure escape request handling:
//! - panics (synchronous defects): the panic hook logs and exits with code 1,
//!   no matter what is in flight;
//! - errors from background tasks or startup (escaped asynchronous failures):
//!   the server stops accepting, in-flight requests drain, then the process
//!   exits with code 1. Without a server the exit is immediate.
//!
//! Neither path resumes normal operation; recovery is an external restart.

use crate::contract::{AppError, StorageError};
use std::any::Any;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once, OnceLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Exit code for every crash path
pub const CRASH_EXIT_CODE: i32 = 1;

static PANIC_HOOK: Once = Once::new();

/// How the process terminates
pub trait ProcessExit: Send + Sync {
    fn exit(&self, code: i32);
}

/// Terminates the real process
pub struct SystemExit;

impl ProcessExit for SystemExit {
    fn exit(&self, code: i32) {
        std::process::exit(code)
    }
}

/// What `handle_escaped_failure` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Another failure is already shutting the process down
    AlreadyTerminating,
    /// No server was attached
    Immediate,
    /// The server drained before exit
    Graceful,
}

/// Shared view of the listening server
#[derive(Debug, Clone)]
pub struct ServerHandle {
    shutdown: CancellationToken,
    drained: watch::Receiver<bool>,
}

/// Held by the serving task; reports that in-flight requests are done
#[derive(Debug)]
pub struct DrainNotifier {
    tx: watch::Sender<bool>,
}

impl ServerHandle {
    pub fn new() -> (Self, DrainNotifier) {
        let (tx, drained) = watch::channel(false);
        let handle = Self {
            shutdown: CancellationToken::new(),
            drained,
        };
        (handle, DrainNotifier { tx })
    }

    /// Resolves once the server should stop accepting connections
    pub fn shutdown_signal(&self) -> impl Future<Output = ()> + Send + 'static {
        self.shutdown.clone().cancelled_owned()
    }

    pub fn stop_accepting(&self) {
        self.shutdown.cancel();
    }

    pub fn is_stopping(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Wait until the serving task has finished; a dropped notifier counts
    pub async fn drained(&self) {
        let mut drained = self.drained.clone();
        let _ = drained.wait_for(|done| *done).await;
    }
}

impl DrainNotifier {
    pub fn finished(self) {
        let _ = self.tx.send(true);
    }
}

pub struct CrashSupervisor {
    server: OnceLock<ServerHandle>,
    terminating: AtomicBool,
    exit: Arc<dyn ProcessExit>,
}

impl CrashSupervisor {
    /// Register the process-wide panic hook and return the supervisor.
    /// Call first in `main`, before anything that can fail.
    pub fn install() -> Arc<Self> {
        Self::install_with_exit(Arc::new(SystemExit))
    }

    /// `install` with a custom exit; the hook is still registered only once
    pub fn install_with_exit(exit: Arc<dyn ProcessExit>) -> Arc<Self> {
        install_panic_hook(exit.clone());
        Arc::new(Self::with_exit(exit))
    }

    /// Supervisor without a panic hook and with a custom exit
    pub fn with_exit(exit: Arc<dyn ProcessExit>) -> Self {
        Self {
            server: OnceLock::new(),
            terminating: AtomicBool::new(false),
            exit,
        }
    }

    /// Write-once registration of the listening server
    pub fn attach_server(&self, handle: ServerHandle) -> anyhow::Result<()> {
        self.server
            .set(handle)
            .map_err(|_| anyhow::anyhow!("A server handle is already attached"))
    }

    pub fn is_terminating(&self) -> bool {
        self.terminating.load(Ordering::SeqCst)
    }

    /// Log and exit without draining anything
    pub fn terminate_immediately(&self, err: &anyhow::Error) {
        report("Uncaught failure, shutting down", failure_name(err), err);
        self.terminating.store(true, Ordering::SeqCst);
        self.exit.exit(CRASH_EXIT_CODE);
    }

    /// Terminal handling of a failure nothing else caught
    pub async fn handle_escaped_failure(&self, err: &anyhow::Error) -> Termination {
        if self.terminating.swap(true, Ordering::SeqCst) {
            tracing::warn!(error = %err, "failure while already shutting down");
            return Termination::AlreadyTerminating;
        }
        report("Unhandled asynchronous failure, shutting down", failure_name(err), err);

        match self.server.get() {
            Some(server) => {
                server.stop_accepting();
                server.drained().await;
                tracing::info!("in-flight requests drained, exiting");
                self.exit.exit(CRASH_EXIT_CODE);
                Termination::Graceful
            }
            None => {
                self.exit.exit(CRASH_EXIT_CODE);
                Termination::Immediate
            }
        }
    }

    /// Spawn a background task whose error is an escaped failure
    pub fn spawn_supervised<F>(self: &Arc<Self>, task: &'static str, future: F) -> JoinHandle<()>
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = future.await {
                tracing::debug!(task, "supervised task failed");
                supervisor.handle_escaped_failure(&err).await;
            }
        })
    }

    /// Park the caller while a crash path owns the exit
    pub async fn settle(&self) {
        if self.is_terminating() {
            std::future::pending::<()>().await;
        }
    }
}

/// Resolves on Ctrl-C or SIGTERM
pub async fn termination_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("SIGTERM received. Shutting down gracefully");
}

fn install_panic_hook(exit: Arc<dyn ProcessExit>) {
    PANIC_HOOK.call_once(move || {
        let default_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let message = panic_message(info.payload());
            let location = info
                .location()
                .map(|l| l.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            if tracing::dispatcher::has_been_set() {
                tracing::error!(
                    name = "Panic",
                    message = %message,
                    location = %location,
                    "Uncaught defect, shutting down"
                );
            }
            default_hook(info);
            exit.exit(CRASH_EXIT_CODE);
        }));
    });
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

/// Best name available for a type-erased failure
pub fn failure_name(err: &anyhow::Error) -> &'static str {
    if let Some(storage) = err.downcast_ref::<StorageError>() {
        storage.name()
    } else if let Some(app) = err.downcast_ref::<AppError>() {
        app.kind().name()
    } else if err.downcast_ref::<std::io::Error>().is_some() {
        "IoError"
    } else {
        "Error"
    }
}

/// Falls back to stderr when logging is not set up yet
fn report(headline: &str, name: &str, err: &anyhow::Error) {
    if tracing::dispatcher::has_been_set() {
        tracing::error!(name, message = %err, cause = ?err, "{}", headline);
    } else {
        eprintln!("{}: {}: {:#}", headline, name, err);
    }
}

//! Serialized dev server restarts
//!
//! At most one kill-then-fork cycle runs at a time. A request arriving while
//! a cycle is in flight queues exactly one follow-up cycle; further requests
//! arriving while that follow-up is queued are dropped.

use std::sync::{Arc, Mutex, MutexGuard};

use eden_core::ENV_NAME_ENV;
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, error, info};

use crate::error::{ProcessError, Result};
use crate::launcher::{Environment, Launcher, ProcessHandle};

/// Role label used when launching the dev server
pub const DEV_SERVER_ROLE: &str = "server";

/// Value of the environment name variable for dev servers
pub const DEVELOPMENT: &str = "development";

type Cycle = Shared<BoxFuture<'static, std::result::Result<(), String>>>;

#[derive(Default)]
struct RestartState {
    current: Option<(u64, Cycle)>,
    waiting: bool,
    server: Option<ProcessHandle>,
    next_id: u64,
}

struct Inner {
    launcher: Arc<dyn Launcher>,
    env: Environment,
    state: Mutex<RestartState>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, RestartState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn kill_then_fork(&self) -> std::result::Result<(), String> {
        let previous = self.lock().server.take();
        if let Some(previous) = previous {
            debug!(pid = ?previous.pid(), "stopping dev server");
            let state = previous.terminate().await;
            debug!(pid = ?previous.pid(), state = %state, "dev server stopped");
        }

        let handle = self.launcher.launch(DEV_SERVER_ROLE, &self.env).map_err(|e| {
            error!(error = %e, "failed to start dev server");
            e.to_string()
        })?;
        info!(pid = ?handle.pid(), "dev server started");
        self.lock().server = Some(handle);
        Ok(())
    }
}

/// Restarts the dev server on request, one cycle at a time
#[derive(Clone)]
pub struct DevServer {
    inner: Arc<Inner>,
}

impl DevServer {
    /// Create a coordinator; every forked server gets `env` plus the
    /// development environment marker
    pub fn new(launcher: Arc<dyn Launcher>, mut env: Environment) -> Self {
        env.insert(ENV_NAME_ENV.to_string(), DEVELOPMENT.to_string());
        Self {
            inner: Arc::new(Inner {
                launcher,
                env,
                state: Mutex::new(RestartState::default()),
            }),
        }
    }

    /// Environment every forked server receives
    pub fn environment(&self) -> &Environment {
        &self.inner.env
    }

    /// Pid of the live dev server
    pub fn current_pid(&self) -> Option<u32> {
        self.inner.lock().server.as_ref().and_then(ProcessHandle::pid)
    }

    /// Whether a cycle is in flight
    pub fn is_restarting(&self) -> bool {
        self.inner.lock().current.is_some()
    }

    /// Kill the running server (if any) and fork a new one.
    ///
    /// Without `create`, nothing happens until a server has been started.
    /// Returns once this request's cycle finished, or immediately when the
    /// request was coalesced into an already queued one.
    pub async fn restart(&self, create: bool) -> Result<()> {
        let started = {
            let mut state = self.inner.lock();
            if !create && state.server.is_none() && state.current.is_none() {
                debug!("no dev server running, ignoring restart");
                return Ok(());
            }
            if state.waiting {
                debug!("restart already queued");
                return Ok(());
            }
            match state.current.clone() {
                Some((_, in_flight)) => {
                    state.waiting = true;
                    Err(in_flight)
                }
                None => Ok(self.begin(&mut state)),
            }
        };

        let (id, cycle) = match started {
            Ok(started) => started,
            Err(in_flight) => {
                debug!("restart in progress, queueing one more");
                let _ = in_flight.await;
                let mut state = self.inner.lock();
                state.waiting = false;
                self.begin(&mut state)
            }
        };

        let result = cycle.await;

        {
            let mut state = self.inner.lock();
            if matches!(&state.current, Some((current, _)) if *current == id) {
                state.current = None;
            }
        }

        result.map_err(ProcessError::Restart)
    }

    /// Terminate the live server and wait for it to exit
    pub async fn shutdown(&self) {
        let server = self.inner.lock().server.take();
        if let Some(server) = server {
            info!(pid = ?server.pid(), "stopping dev server");
            server.terminate().await;
        }
    }

    /// Start a cycle and record it as current; called with the state locked
    fn begin(&self, state: &mut RestartState) -> (u64, Cycle) {
        state.next_id += 1;
        let id = state.next_id;

        let inner = self.inner.clone();
        let task = tokio::spawn(async move { inner.kill_then_fork().await });
        let cycle = async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(e.to_string()),
            }
        }
        .boxed()
        .shared();

        state.current = Some((id, cycle.clone()));
        (id, cycle)
    }
}

//! Eden Process - worker supervision and dev server restarts
//!
//! The cluster master launches one worker per role and relaunches it on
//! exit ([`Supervisor`]). In development a single coordinator owns the dev
//! server process and serializes kill-then-fork restarts ([`DevServer`]).
//! Workers resolve their role's entry point through a [`BootstrapRegistry`].

pub mod bootstrap;
pub mod error;
pub mod launcher;
pub mod restart;
pub mod supervisor;

pub use bootstrap::{Bootstrap, BootstrapRegistry, CommandBootstrap};
pub use error::{ProcessError, Result};
pub use launcher::{
    CommandLauncher, Environment, DEFAULT_GRACE, ExitNotifier, ExitState, Launcher, ProcessHandle,
};
pub use restart::{DevServer, DEVELOPMENT, DEV_SERVER_ROLE};
pub use supervisor::{wait_for_shutdown_signal, worker_environment, Supervisor, Worker};

//! CLI commands

mod install;
mod plan;
mod server;
mod start;
mod watch;

pub use install::InstallCommand;
pub use plan::PlanCommand;
pub use server::ServerCommand;
pub use start::StartCommand;
pub use watch::WatchCommand;

//! Development environment provisioning on local or tunnelled container
//! engines.
//!
//! `berth` creates one container per project, starts it, installs an agent
//! inside it and waits until that agent announces it is serving. The engine
//! is either reached through a socket on this machine or through a Unix
//! socket forwarded over SSH from a remote host.
//!
//! # Modules
//!
//! - [`target`]: Target option bags and the local/remote decision
//! - [`tunnel`]: SSH forwarding of a remote engine socket
//! - [`engine`]: Engine clients, endpoint resolution and container operations
//! - [`agent`]: Agent bootstrap and readiness detection
//! - [`provider`]: Project and workspace lifecycle operations
//! - [`config`]: Configuration system with layered precedence (CLI > env > file > defaults)
//! - [`logging`]: Diagnostics setup and project output sinks
//! - [`error`]: Semantic error types for the application

pub mod agent;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod provider;
pub mod target;
pub mod tunnel;

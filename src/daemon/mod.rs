//! Everything that talks to the daemon.
//!
//! - `types`: wire format of the daemon's HTTP API and [`DaemonError`].
//! - `client`: the [`DaemonRpcClient`] seam and its reqwest implementation.
//! - `link`: [`DaemonLink`], which tracks daemon progress and liveness.

pub mod client;
pub mod link;
pub mod types;

pub use client::*;
pub use link::DaemonLink;
pub use types::*;

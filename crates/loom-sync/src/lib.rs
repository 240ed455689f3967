//! Remote synchronization for Loom.
//!
//! [`RemoteSync`] moves commits and refs between repositories:
//!
//! - **fetch** negotiates the commits the local store lacks, verifies and
//!   admits them parents first, then force-updates remote-tracking refs.
//! - **push** refuses non-fast-forward updates unless forced and uploads
//!   only the commits the remote is missing.
//! - **pull** fetches one branch and integrates it by merge or rebase.
//!
//! Every remote call goes through the async [`Transport`] trait and is
//! bounded by [`SyncOptions::timeout`]. [`LoopbackTransport`] serves
//! in-process repositories.

pub mod engine;
pub mod error;
pub mod loopback;
pub mod negotiation;
pub mod transport;
pub mod types;

pub use engine::RemoteSync;
pub use error::{SyncError, SyncResult};
pub use loopback::{LoopbackTransport, Peer};
pub use negotiation::NegotiationEngine;
pub use transport::Transport;
pub use types::{
    FetchResult, MergeStatus, PullResult, PullStrategy, PushResult, RefSpec, RefUpdate, RemoteDescriptor,
    SyncOptions,
};

//! Remote synchronization.
//!
//! A sync round sends the signed-in user's full record set (tombstones
//! included) to a remote and applies whatever the remote returns, resolving
//! each name last-write-wins on `updated_at`:
//!
//! - **Merge**: the pure conflict rule ([`merge`]); ties keep the remote's copy
//! - **Gateway**: the remote seam ([`RemoteGateway`]) with an HTTP
//!   implementation and an in-memory one
//! - **Reconcile**: the round itself ([`Reconciler`])
//!
//! # Example
//!
//! ```ignore
//! use keeper::sync::{HttpGateway, Reconciler};
//!
//! let gateway = HttpGateway::new("http://localhost:8080", DEFAULT_TIMEOUT)?;
//! let report = Reconciler::new(&mut storage, &gateway, &session).run()?;
//! println!("applied {}", report.applied);
//! ```

mod gateway;
mod http;
mod memory;
mod merge;
mod reconcile;
mod types;

pub use gateway::RemoteGateway;
pub use http::{HttpGateway, DEFAULT_TIMEOUT};
pub use memory::MemoryRemote;
pub use merge::{merge, merge_rows, Winner};
pub use reconcile::{Reconciler, SyncStore};
pub use types::{
    format_timestamp, parse_timestamp, GatewayError, SyncPayload, SyncReport, Token, WireRecord,
};

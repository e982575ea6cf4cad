//! # HybridKV Cluster Client
//!
//! Purpose: Batch commands into atomic transactions, route them to one or
//! more cluster nodes, and reconcile what each node returns into typed,
//! order-preserving results.
//!
//! ## Design Principles
//! 1. **Builder Pattern**: `Transaction` accumulates commands and is moved
//!    into `exec`; it cannot be reused afterwards.
//! 2. **Closed Routing**: `Route` is a small enum resolved once per request.
//! 3. **Tagged Results**: `ClusterValue::Single` vs `ClusterValue::Multi` is
//!    decided by how many nodes were addressed.
//! 4. **Abort Is An Outcome**: A WATCH conflict is `ExecOutcome::Aborted`,
//!    distinct from both success and transport failure.
//! 5. **Strategy Pattern**: `Transport` and `TopologyProvider` are traits;
//!    `TcpTransport` and `StaticTopology` are the shipped implementations.
//!
//! ## Usage
//!
//! ```ignore
//! let client = ClusterClient::new(
//!     TcpTransport::new(ClientConfig::default()),
//!     StaticTopology::single("127.0.0.1:6379"),
//! );
//! let tx = Transaction::new().set("key", "foo").get("key");
//! match client.exec(tx).await? {
//!     ExecOutcome::Completed(results) => println!("{results:?}"),
//!     ExecOutcome::Aborted => println!("watched key changed"),
//! }
//! ```

mod abort;
mod command;
mod config;
mod executor;
mod pool;
mod reconcile;
mod resp;
mod routing;
mod tcp;
mod topology;
mod transaction;
mod transport;

pub use abort::{inspect, is_abort_marker, Inspection};
pub use command::Cmd;
pub use config::{ClientConfig, RetryStrategy};
pub use executor::{ClusterClient, ExecError, ExecOutcome};
pub use reconcile::{
    reconcile, reconcile_command, reconcile_flat, ClusterValue, CommandResult, ErrorPolicy,
    NodeValue, ReplyError,
};
pub use resp::RespError;
pub use routing::{Route, RoutingError};
pub use tcp::TcpTransport;
pub use topology::{SlotRange, StaticTopology, TopologyError, TopologyProvider, TopologySnapshot};
pub use transaction::{BuildError, Transaction};
pub use transport::{Completion, Transport, TransportError};

pub use hkv_common::{key_slot, NodeAddr, ServerError, Value, SLOT_COUNT};

pub mod config;
pub mod constants;
pub mod error;
pub mod framing;
pub mod node;
pub mod protocol;
pub mod sync;
pub mod transport;

pub use config::NodeConfig;
pub use error::{NodeError, TransportError};
pub use node::Node;
pub use protocol::{Inbound, Verdict};
pub use sync::{BroadcastReport, SyncCoordinator, SyncReport};
pub use transport::{Handler, PeerTransport, Reply};

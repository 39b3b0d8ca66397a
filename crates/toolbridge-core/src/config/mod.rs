//! Connection configuration
//!
//! - `ConnectionDescriptor`: Validated recipe for a single connection
//! - `ServersConfig`: Parser for the host-supplied server mapping

mod error;
mod descriptor;
mod servers;

pub use error::{ConfigError, ConfigResult};
pub use descriptor::{
    ConnectionDescriptor, NetworkParams, NetworkStyle, SubprocessParams, TransportParams,
    DEFAULT_NETWORK_TIMEOUT,
};
pub use servers::{EntryTransport, ServerEntry, ServersConfig};

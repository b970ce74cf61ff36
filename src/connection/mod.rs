//! Connection parameters
//!
//! - `ConnectionConfig`: JMX settings for nodetool
//! - `CqlConnectionConfig`: native-protocol settings for cqlsh and the
//!   schema operations

mod cql;
mod fqdn;
mod nodetool;

pub use cql::{CqlConnectionConfig, TlsConfig, VerifyMode};
pub use fqdn::local_fqdn;
pub use nodetool::{ConnectionConfig, Credentials, DEFAULT_NODETOOL_FLAGS};

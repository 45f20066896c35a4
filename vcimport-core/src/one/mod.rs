//! Target system (OpenNebula) access
//!
//! - [`TargetRecord`]: the attribute text submitted to allocate calls
//! - [`OneRepository`]: pool reads, host lookup, system configuration and
//!   allocation, implemented over XML-RPC by [`OneClient`] and in memory by
//!   [`MemoryRepository`]

mod memory;
mod record;
mod repository;
mod xmlrpc;

pub use memory::{Allocation, MemoryRepository};
pub use record::{RecordParseError, RecordValue, TargetRecord};
pub use repository::{OneRepository, PoolElement, PoolKind};
pub use xmlrpc::{DEFAULT_ENDPOINT, OneClient};

//! Remote instance probing for fediseer-rs.
//!
//! - **`NodeInfo`**: software family and registration flags
//! - **Admins**: per-software discovery of administrator accounts
//!
//! [`NodeInfoProbe`] implements the core's
//! [`MetadataProbe`](fediseer_core::MetadataProbe) seam.

pub mod admins;
pub mod client;
pub mod nodeinfo;

pub use admins::AdminStrategy;
pub use client::NodeInfoProbe;
pub use nodeinfo::{NodeInfo, WellKnown};

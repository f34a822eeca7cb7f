//! Core trust-graph logic for fediseer-rs.
//!
//! The pure modules ([`graph`], [`gate`], [`visibility`], [`reasons`],
//! [`batch`]) hold the rules. The [`services`] wire them to the database
//! inside transactions.

pub mod batch;
pub mod gate;
pub mod graph;
pub mod reasons;
pub mod services;
pub mod settings;
pub mod visibility;

pub use gate::{ActionGate, ActorFacts, TrustAction};
pub use graph::{ChainStatus, GuaranteeTree};
pub use services::*;
pub use settings::{TrustRoot, TrustSettings};

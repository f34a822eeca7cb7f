//! Database entities.

#![allow(missing_docs)]

pub mod censure;
pub mod claim;
pub mod endorsement;
pub mod guarantee;
pub mod hesitation;
pub mod instance;
pub mod instance_flag;
pub mod instance_tag;
pub mod rebuttal;
pub mod rejection;
pub mod report;
pub mod solicitation;
pub mod user;

pub use censure::Entity as Censure;
pub use claim::Entity as Claim;
pub use endorsement::Entity as Endorsement;
pub use guarantee::Entity as Guarantee;
pub use hesitation::Entity as Hesitation;
pub use instance::Entity as Instance;
pub use instance_flag::Entity as InstanceFlag;
pub use instance_tag::Entity as InstanceTag;
pub use rebuttal::Entity as Rebuttal;
pub use rejection::Entity as Rejection;
pub use report::Entity as Report;
pub use solicitation::Entity as Solicitation;
pub use user::Entity as User;

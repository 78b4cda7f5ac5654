pub mod accounts;
pub mod billing;
pub mod collaborators;
pub mod identity;
pub mod payment;
pub mod pipeline;
pub mod plans;

pub mod auth;
pub mod billing;
pub mod health;
pub mod plans;
pub mod upload;

pub mod prelude;

pub mod billings;
pub mod conversations;
pub mod identities;
pub mod users;

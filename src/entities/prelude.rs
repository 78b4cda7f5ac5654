pub use super::billings::Entity as Billings;
pub use super::conversations::Entity as Conversations;
pub use super::identities::Entity as Identities;
pub use super::users::Entity as Users;

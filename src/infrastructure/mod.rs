pub mod collaborators;
pub mod database;

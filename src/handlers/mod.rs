pub mod clients;
pub mod groups;
pub mod login;
pub mod reports;
pub mod settings;
pub mod users;
pub mod utils;
pub mod visits;

//! Domain entities persisted in SQLite and returned over the API.

pub mod account;
pub mod center;
pub mod enums;
pub mod filters;
pub mod followup;
pub mod history;
pub mod patient;
pub mod prescription;
pub mod test_request;

pub use account::*;
pub use center::*;
pub use filters::*;
pub use followup::*;
pub use history::*;
pub use patient::*;
pub use prescription::*;
pub use test_request::*;

pub mod comment;
pub mod profile;
pub mod user;

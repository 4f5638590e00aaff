pub mod profile;
pub mod source;

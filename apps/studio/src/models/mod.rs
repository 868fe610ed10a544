pub mod document;
pub mod options;
pub mod profile;

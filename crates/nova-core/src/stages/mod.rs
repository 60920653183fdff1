pub mod biblio;
pub mod host;
pub mod resolve;
pub mod validate;

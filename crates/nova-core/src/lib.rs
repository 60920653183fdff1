pub mod clients;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod services;
pub mod stages;
pub mod store;
pub mod types;

#[cfg(feature = "runtime")]
pub mod db;

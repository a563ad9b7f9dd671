pub mod analysis;
pub mod capability;
pub mod config;
pub mod error;
pub mod intake;
pub mod routes;

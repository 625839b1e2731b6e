pub mod client;
pub mod env;
pub mod factory;
pub mod model;
pub mod snapshot;

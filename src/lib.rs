// Library for the binaries and tests

pub mod aggregation;
pub mod cadvisor_repo;
pub mod config;
pub mod cycle;
pub mod docker_repo;
pub mod error;
pub mod filter;
pub mod logging;
pub mod models;
pub mod routes;
pub mod sampler;
pub mod store;
pub mod transport;
pub mod version;
pub mod writer;

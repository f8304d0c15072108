#[macro_use]
pub mod metrics;

pub mod caching;
pub mod config;
pub mod coordinator;
pub mod fetch;
pub mod logging;
pub mod pool;
pub mod services;
pub mod types;
pub mod utils;

#[cfg(test)]
pub(crate) use epg_test as test;

pub mod error;
pub mod fetch;
pub mod gateway;
pub mod metrics;
pub mod output;
pub mod probe;
pub mod speedtest;

#![deny(dead_code)]
#![deny(unused_imports)]

pub mod config;
pub mod curves;
pub mod data;
pub mod ensemble;
pub mod metrics;
pub mod pipeline;
pub mod plot;
pub mod progress;
pub mod report;
pub mod submission;

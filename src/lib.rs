pub mod agent;
pub mod audit;
pub mod compliance;
pub mod config;
pub mod context;
pub mod errors;
pub mod github;
pub mod handlers;
pub mod integration;
pub mod logging;
pub mod review;
pub mod schemas;
pub mod session;
pub mod signals;
pub mod workflow;

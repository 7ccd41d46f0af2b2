pub mod cmd;
pub mod config;
pub mod core;
pub mod k8s;

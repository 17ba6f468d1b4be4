//! Deployment orchestration for the Woosoo stack: configuration, the service
//! registry, the service lifecycle orchestrator and pre-flight validation.

pub mod config;
pub mod orchestrator;
pub mod registry;
pub mod tooling;
pub mod validator;

// Platform seams shared by the orchestrator and the OS-specific backends

pub mod host;
pub mod process;
pub mod service;

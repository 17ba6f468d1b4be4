// Windows implementations of the platform seams

pub mod elevation;
pub mod host;
pub mod process;
pub mod service;
pub mod status;

pub use host::SysinfoHostProbe;
pub use process::TokioCommandRunner;
pub use service::{NssmServiceControl, SetupError};

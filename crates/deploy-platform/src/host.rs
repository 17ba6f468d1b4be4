use std::path::Path;

use anyhow::Result;

/// Read-only facts about the host, consumed by the pre-flight validator.
pub trait HostProbe: Send + Sync {
    /// Whether the current process holds administrator rights
    fn is_elevated(&self) -> Result<bool>;

    /// Free bytes on the volume containing `path`
    fn available_disk_bytes(&self, path: &Path) -> Result<u64>;

    fn total_memory_bytes(&self) -> Result<u64>;

    fn cpu_count(&self) -> usize;

    /// Names of all running processes
    fn process_names(&self) -> Vec<String>;

    /// Whether something already accepts TCP connections on 127.0.0.1:`port`
    fn port_in_use(&self, port: u16) -> bool;
}

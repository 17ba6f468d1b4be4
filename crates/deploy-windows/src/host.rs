use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use sysinfo::{Disks, ProcessesToUpdate, System};
use tracing::debug;

use deploy_platform::host::HostProbe;

const PORT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Host facts from `sysinfo`, plus the Win32 token query for elevation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SysinfoHostProbe;

impl SysinfoHostProbe {
    pub fn new() -> Self {
        Self
    }
}

impl HostProbe for SysinfoHostProbe {
    fn is_elevated(&self) -> Result<bool> {
        crate::elevation::is_elevated()
    }

    fn available_disk_bytes(&self, path: &Path) -> Result<u64> {
        let path = std::path::absolute(path)
            .with_context(|| format!("failed to resolve {}", path.display()))?;
        let disks = Disks::new_with_refreshed_list();
        let mounts: Vec<(PathBuf, u64)> = disks
            .iter()
            .map(|disk| (disk.mount_point().to_path_buf(), disk.available_space()))
            .collect();
        debug!("{} disks detected", mounts.len());
        disk_for_path(&path, &mounts)
            .ok_or_else(|| anyhow!("no disk found containing {}", path.display()))
    }

    fn total_memory_bytes(&self) -> Result<u64> {
        let mut system = System::new();
        system.refresh_memory();
        let total = system.total_memory();
        if total == 0 {
            bail!("memory information unavailable");
        }
        Ok(total)
    }

    fn cpu_count(&self) -> usize {
        let mut system = System::new();
        system.refresh_cpu_all();
        system.cpus().len()
    }

    fn process_names(&self) -> Vec<String> {
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);
        system
            .processes()
            .values()
            .map(|process| process.name().to_string_lossy().into_owned())
            .collect()
    }

    fn port_in_use(&self, port: u16) -> bool {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        TcpStream::connect_timeout(&addr, PORT_PROBE_TIMEOUT).is_ok()
    }
}

/// Free space of the most specific mount point containing `path`.
pub fn disk_for_path(path: &Path, mounts: &[(PathBuf, u64)]) -> Option<u64> {
    mounts
        .iter()
        .filter(|(mount, _)| path.starts_with(mount))
        .max_by_key(|(mount, _)| mount.components().count())
        .map(|(_, available)| *available)
}

//! Administrator privilege detection via the process token.

use anyhow::Result;

/// Check if the current process is running with elevated (admin) privileges.
#[cfg(target_os = "windows")]
pub fn is_elevated() -> Result<bool> {
    use anyhow::Context;
    use windows::Win32::Foundation::{CloseHandle, HANDLE};
    use windows::Win32::Security::{GetTokenInformation, TokenElevation, TOKEN_ELEVATION, TOKEN_QUERY};
    use windows::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

    unsafe {
        let mut token = HANDLE::default();
        OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token)
            .context("failed to open process token")?;

        let mut elevation = TOKEN_ELEVATION::default();
        let mut ret_len = 0u32;
        let size = std::mem::size_of::<TOKEN_ELEVATION>() as u32;
        let queried = GetTokenInformation(
            token,
            TokenElevation,
            Some(&mut elevation as *mut _ as *mut _),
            size,
            &mut ret_len,
        );
        let _ = CloseHandle(token);
        queried.context("failed to query token elevation")?;

        Ok(elevation.TokenIsElevated != 0)
    }
}

#[cfg(not(target_os = "windows"))]
pub fn is_elevated() -> Result<bool> {
    anyhow::bail!("administrator check is only supported on Windows");
}

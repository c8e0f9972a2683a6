//! App-package (MSIX/AppX) identity lookup.
//!
//! `GetCurrentPackageFullName` only exists on Windows 8 and later, so it is
//! resolved from kernel32 at runtime. A missing export means the process
//! cannot have a package identity.

/// Returned by `GetCurrentPackageFullName` for processes without identity.
pub const APPMODEL_ERROR_NO_PACKAGE: i32 = 15700;

const ERROR_SUCCESS: i32 = 0;
const ERROR_INSUFFICIENT_BUFFER: i32 = 122;

/// `LONG GetCurrentPackageFullName(UINT32 *length, PWSTR name)`
type PackageFullNameFn = unsafe extern "system" fn(*mut u32, *mut u16) -> i32;

/// True when Windows assigned the current process a package identity.
pub fn has_package_identity() -> bool {
    package_full_name().is_some()
}

/// Full name of the package the current process runs under, if any.
pub fn package_full_name() -> Option<String> {
    let function = lookup_package_full_name()?;
    let name = query_package_name(|length, buffer| unsafe { function(length, buffer) });
    match &name {
        Some(name) => log::debug!("Package identity: {name}"),
        None => log::debug!("No package identity"),
    }
    name
}

#[cfg(windows)]
fn lookup_package_full_name() -> Option<PackageFullNameFn> {
    use winapi::um::libloaderapi::{GetModuleHandleW, GetProcAddress};

    let module: Vec<u16> = "kernel32.dll\0".encode_utf16().collect();
    let handle = unsafe { GetModuleHandleW(module.as_ptr()) };
    if handle.is_null() {
        log::debug!("kernel32.dll is not loaded");
        return None;
    }

    let symbol = unsafe { GetProcAddress(handle, c"GetCurrentPackageFullName".as_ptr()) };
    if symbol.is_null() {
        log::debug!("GetCurrentPackageFullName is not exported by kernel32");
        return None;
    }
    // SAFETY: the export has exactly this signature on every Windows release
    // that provides it.
    Some(unsafe { std::mem::transmute::<_, PackageFullNameFn>(symbol) })
}

#[cfg(not(windows))]
fn lookup_package_full_name() -> Option<PackageFullNameFn> {
    None
}

/// Two-call length/fill protocol shared by the appmodel name queries.
fn query_package_name(mut call: impl FnMut(*mut u32, *mut u16) -> i32) -> Option<String> {
    let mut length: u32 = 0;
    // First call only asks for the buffer length.
    let rc = call(&raw mut length, std::ptr::null_mut());
    match rc {
        APPMODEL_ERROR_NO_PACKAGE => return None,
        ERROR_INSUFFICIENT_BUFFER | ERROR_SUCCESS => {}
        rc => {
            log::debug!("GetCurrentPackageFullName failed with {rc}");
            return None;
        }
    }
    if length == 0 {
        return None;
    }

    let mut buffer = vec![0u16; length as usize];
    let rc = call(&raw mut length, buffer.as_mut_ptr());
    if rc != ERROR_SUCCESS {
        log::debug!("GetCurrentPackageFullName failed with {rc}");
        return None;
    }

    let end = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
    Some(String::from_utf16_lossy(&buffer[..end]))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Answers like an API that knows the package `name`.
    fn packaged(name: &'static str) -> impl FnMut(*mut u32, *mut u16) -> i32 {
        let wide: Vec<u16> = name.encode_utf16().chain(Some(0)).collect();
        move |length, buffer| unsafe {
            if buffer.is_null() || (*length as usize) < wide.len() {
                *length = wide.len() as u32;
                return ERROR_INSUFFICIENT_BUFFER;
            }
            std::ptr::copy_nonoverlapping(wide.as_ptr(), buffer, wide.len());
            *length = wide.len() as u32;
            ERROR_SUCCESS
        }
    }

    #[test]
    fn test_unpackaged_process() {
        let mut calls = 0;
        let name = query_package_name(|_, _| {
            calls += 1;
            APPMODEL_ERROR_NO_PACKAGE
        });
        assert_eq!(name, None);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_packaged_process_reports_full_name() {
        let name = query_package_name(packaged("Contoso.App_1.0.0.0_x64__8wekyb3d8bbwe"));
        assert_eq!(name.as_deref(), Some("Contoso.App_1.0.0.0_x64__8wekyb3d8bbwe"));
    }

    #[test]
    fn test_failed_fill_call_means_no_identity() {
        let mut calls = 0;
        let name = query_package_name(|length, _| {
            calls += 1;
            if calls == 1 {
                unsafe { *length = 8 };
                ERROR_INSUFFICIENT_BUFFER
            } else {
                87
            }
        });
        assert_eq!(name, None);
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_unexpected_error_stops_after_first_call() {
        let mut calls = 0;
        let name = query_package_name(|_, _| {
            calls += 1;
            5
        });
        assert_eq!(name, None);
        assert_eq!(calls, 1);
    }

    #[cfg(not(windows))]
    #[test]
    fn no_identity_outside_windows() {
        assert!(!has_package_identity());
        assert_eq!(package_full_name(), None);
    }

    #[cfg(windows)]
    #[test]
    fn identity_lookup_is_total() {
        // cargo test is never packaged; the call must still return cleanly.
        assert!(!has_package_identity());
    }
}

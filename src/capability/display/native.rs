//! Desktop sessions that need no display-server socket.
//!
//! On Windows the session talks to the window manager through user32/gdi32:
//! a hidden top-level window of a private class, a DIB blit into its client
//! area, and a message-queue pump plus `GdiFlush` as the round trip. Other
//! targets have no native window binding here and report the desktop as
//! unavailable rather than guessing.

use super::{DisplayBackend, DisplaySession, WindowId};
use crate::capability::plot::Canvas;
use crate::error::{HabitatError, Result};
use crate::platform::SystemProbe;

pub const SSH_MARKERS: &[&str] = &["SSH_CONNECTION", "SSH_TTY"];

pub fn connect(system: &dyn SystemProbe) -> Result<NativeSession> {
    let os = system.target_os();
    if !matches!(os.as_str(), "windows" | "macos") {
        return Err(HabitatError::UnsupportedPlatform(format!(
            "no native desktop session on {os}"
        )));
    }

    if let Some(marker) = SSH_MARKERS
        .iter()
        .find(|name| system.env_var(name).is_some_and(|v| !v.is_empty()))
    {
        return Err(HabitatError::DisplayUnavailable(format!(
            "remote shell session ({marker} is set)"
        )));
    }

    if os != "windows" || !cfg!(windows) {
        return Err(HabitatError::UnsupportedPlatform(format!(
            "no native window binding for {os}"
        )));
    }

    log::debug!("Using native {os} desktop session");
    NativeSession::open()
}

#[cfg(windows)]
pub use win32::NativeSession;

#[cfg(not(windows))]
#[derive(Debug)]
pub struct NativeSession {
    _unconstructible: (),
}

#[cfg(not(windows))]
impl NativeSession {
    fn open() -> Result<Self> {
        Err(HabitatError::UnsupportedPlatform(
            "native windows need a Windows build".to_string(),
        ))
    }
}

#[cfg(not(windows))]
impl DisplaySession for NativeSession {
    fn backend(&self) -> DisplayBackend {
        DisplayBackend::Native
    }

    fn create_window(&mut self, _width: u16, _height: u16) -> Result<WindowId> {
        Err(HabitatError::UnsupportedPlatform("native window".to_string()))
    }

    fn destroy_window(&mut self, _window: WindowId) -> Result<()> {
        Err(HabitatError::UnsupportedPlatform("native window".to_string()))
    }

    fn put_image(&mut self, _window: WindowId, _canvas: &Canvas) -> Result<()> {
        Err(HabitatError::UnsupportedPlatform("native window".to_string()))
    }

    fn round_trip(&mut self) -> Result<()> {
        Err(HabitatError::UnsupportedPlatform("native window".to_string()))
    }
}

#[cfg(windows)]
mod win32 {
    use super::*;
    use std::mem;
    use std::ptr;
    use winapi::ctypes::c_void;
    use winapi::shared::minwindef::HINSTANCE;
    use winapi::shared::windef::HWND;
    use winapi::shared::winerror::ERROR_CLASS_ALREADY_EXISTS;
    use winapi::um::errhandlingapi::GetLastError;
    use winapi::um::libloaderapi::GetModuleHandleW;
    use winapi::um::wingdi::{
        BI_RGB, BITMAPINFO, BITMAPINFOHEADER, DIB_RGB_COLORS, GdiFlush, SetDIBitsToDevice,
    };
    use winapi::um::winnt::HANDLE;
    use winapi::um::winuser::{
        CW_USEDEFAULT, CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetDC,
        GetProcessWindowStation, GetUserObjectInformationW, MSG, PM_REMOVE, PeekMessageW,
        RegisterClassW, ReleaseDC, TranslateMessage, UOI_FLAGS, USEROBJECTFLAGS, UnregisterClassW,
        WNDCLASSW, WS_OVERLAPPEDWINDOW, WSF_VISIBLE,
    };

    fn wide(value: &str) -> Vec<u16> {
        value.encode_utf16().chain(Some(0)).collect()
    }

    fn last_error(call: &str) -> HabitatError {
        let code = unsafe { GetLastError() };
        HabitatError::DisplayProtocol(format!("{call} failed with error {code}"))
    }

    #[derive(Debug)]
    pub struct NativeSession {
        instance: HINSTANCE,
        class_name: Vec<u16>,
        windows: Vec<(WindowId, HWND)>,
        next_window: u32,
    }

    impl NativeSession {
        pub(super) fn open() -> Result<Self> {
            ensure_interactive_station()?;

            let instance = unsafe { GetModuleHandleW(ptr::null()) };
            let class_name = wide(&format!("habitat-{}", std::process::id()));
            let class = WNDCLASSW {
                style: 0,
                lpfnWndProc: Some(DefWindowProcW),
                cbClsExtra: 0,
                cbWndExtra: 0,
                hInstance: instance,
                hIcon: ptr::null_mut(),
                hCursor: ptr::null_mut(),
                hbrBackground: ptr::null_mut(),
                lpszMenuName: ptr::null(),
                lpszClassName: class_name.as_ptr(),
            };
            if unsafe { RegisterClassW(&class) } == 0
                && unsafe { GetLastError() } != ERROR_CLASS_ALREADY_EXISTS
            {
                return Err(last_error("RegisterClassW"));
            }

            Ok(Self {
                instance,
                class_name,
                windows: Vec::new(),
                next_window: 0,
            })
        }

        fn handle(&self, window: WindowId) -> Result<HWND> {
            self.windows
                .iter()
                .find(|(id, _)| *id == window)
                .map(|(_, hwnd)| *hwnd)
                .ok_or_else(|| HabitatError::DisplayProtocol(format!("window {} is not open", window.0)))
        }
    }

    /// Services and scheduled tasks run on a window station nobody can see.
    fn ensure_interactive_station() -> Result<()> {
        let station = unsafe { GetProcessWindowStation() };
        if station.is_null() {
            return Err(last_error("GetProcessWindowStation"));
        }

        let mut flags: USEROBJECTFLAGS = unsafe { mem::zeroed() };
        let mut needed = 0;
        let ok = unsafe {
            GetUserObjectInformationW(
                station as HANDLE,
                UOI_FLAGS as i32,
                &mut flags as *mut USEROBJECTFLAGS as *mut c_void,
                mem::size_of::<USEROBJECTFLAGS>() as u32,
                &mut needed,
            )
        };
        if ok != 0 && flags.dwFlags & WSF_VISIBLE == 0 {
            return Err(HabitatError::DisplayUnavailable(
                "process runs on a non-interactive window station".to_string(),
            ));
        }
        Ok(())
    }

    impl DisplaySession for NativeSession {
        fn backend(&self) -> DisplayBackend {
            DisplayBackend::Native
        }

        fn create_window(&mut self, width: u16, height: u16) -> Result<WindowId> {
            let title = wide("habitat");
            // no WS_VISIBLE: the window exists for the window manager but
            // never appears on screen
            let hwnd = unsafe {
                CreateWindowExW(
                    0,
                    self.class_name.as_ptr(),
                    title.as_ptr(),
                    WS_OVERLAPPEDWINDOW,
                    CW_USEDEFAULT,
                    CW_USEDEFAULT,
                    i32::from(width.max(1)),
                    i32::from(height.max(1)),
                    ptr::null_mut(),
                    ptr::null_mut(),
                    self.instance,
                    ptr::null_mut(),
                )
            };
            if hwnd.is_null() {
                return Err(last_error("CreateWindowExW"));
            }

            self.next_window += 1;
            let window = WindowId(self.next_window);
            self.windows.push((window, hwnd));
            Ok(window)
        }

        fn destroy_window(&mut self, window: WindowId) -> Result<()> {
            let hwnd = self.handle(window)?;
            self.windows.retain(|(id, _)| *id != window);
            if unsafe { DestroyWindow(hwnd) } == 0 {
                return Err(last_error("DestroyWindow"));
            }
            Ok(())
        }

        fn put_image(&mut self, window: WindowId, canvas: &Canvas) -> Result<()> {
            let hwnd = self.handle(window)?;
            let too_large =
                || HabitatError::DisplayProtocol(format!("image {}x{} too large", canvas.width(), canvas.height()));
            let width = i32::try_from(canvas.width()).map_err(|_| too_large())?;
            let height = i32::try_from(canvas.height()).map_err(|_| too_large())?;
            let pixels = canvas.to_xrgb32(true);

            let mut info: BITMAPINFO = unsafe { mem::zeroed() };
            info.bmiHeader = BITMAPINFOHEADER {
                biSize: mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: width,
                // negative height: rows run top to bottom
                biHeight: -height,
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB,
                biSizeImage: 0,
                biXPelsPerMeter: 0,
                biYPelsPerMeter: 0,
                biClrUsed: 0,
                biClrImportant: 0,
            };

            let dc = unsafe { GetDC(hwnd) };
            if dc.is_null() {
                return Err(last_error("GetDC"));
            }
            let lines = unsafe {
                SetDIBitsToDevice(
                    dc,
                    0,
                    0,
                    width as u32,
                    height as u32,
                    0,
                    0,
                    0,
                    height as u32,
                    pixels.as_ptr() as *const c_void,
                    &info,
                    DIB_RGB_COLORS,
                )
            };
            let drawn = if lines == 0 {
                Err(last_error("SetDIBitsToDevice"))
            } else {
                Ok(())
            };
            unsafe { ReleaseDC(hwnd, dc) };
            drawn
        }

        fn round_trip(&mut self) -> Result<()> {
            let mut msg: MSG = unsafe { mem::zeroed() };
            while unsafe { PeekMessageW(&mut msg, ptr::null_mut(), 0, 0, PM_REMOVE) } != 0 {
                unsafe {
                    TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                }
            }
            if unsafe { GdiFlush() } == 0 {
                return Err(last_error("GdiFlush"));
            }
            Ok(())
        }
    }

    impl Drop for NativeSession {
        fn drop(&mut self) {
            for (_, hwnd) in self.windows.drain(..) {
                unsafe { DestroyWindow(hwnd) };
            }
            if unsafe { UnregisterClassW(self.class_name.as_ptr(), self.instance) } == 0 {
                log::debug!("Failed to unregister window class: {}", last_error("UnregisterClassW"));
            }
        }
    }
}

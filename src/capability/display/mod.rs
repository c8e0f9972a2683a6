// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Display toolkit probing.
//!
//! A probe opens a session with whichever display server the environment
//! points at, creates a throwaway window, draws a rendered figure into it,
//! forces a round trip and tears everything down again. Sessions close their connection on drop and
//! [`WindowGuard`] destroys its window on drop, so an early return or a
//! panic never leaks server resources.

pub mod native;
#[cfg(unix)]
pub mod wayland;
pub mod x11;

use super::plot::{Canvas, Figure};
use crate::error::{HabitatError, Result};
use crate::platform::SystemProbe;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayBackend {
    X11,
    Wayland,
    Native,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowId(pub u32);

pub trait DisplaySession {
    fn backend(&self) -> DisplayBackend;

    fn create_window(&mut self, width: u16, height: u16) -> Result<WindowId>;

    fn destroy_window(&mut self, window: WindowId) -> Result<()>;

    /// Copy `canvas` into the window's top-left corner.
    fn put_image(&mut self, window: WindowId, canvas: &Canvas) -> Result<()>;

    /// Block until the server has processed every request sent so far.
    fn round_trip(&mut self) -> Result<()>;
}

/// A window that is destroyed when the guard goes out of scope.
pub struct WindowGuard<'s> {
    session: &'s mut dyn DisplaySession,
    window: Option<WindowId>,
}

impl<'s> WindowGuard<'s> {
    pub fn open(session: &'s mut dyn DisplaySession, width: u16, height: u16) -> Result<Self> {
        let window = session.create_window(width, height)?;
        Ok(Self {
            session,
            window: Some(window),
        })
    }

    pub fn round_trip(&mut self) -> Result<()> {
        self.session.round_trip()
    }

    pub fn put_image(&mut self, canvas: &Canvas) -> Result<()> {
        match self.window {
            Some(window) => self.session.put_image(window, canvas),
            None => Err(HabitatError::DisplayProtocol("window already closed".to_string())),
        }
    }

    /// Destroy the window and confirm the server accepted it.
    pub fn close(mut self) -> Result<()> {
        if let Some(window) = self.window.take() {
            self.session.destroy_window(window)?;
        }
        self.session.round_trip()
    }
}

impl Drop for WindowGuard<'_> {
    fn drop(&mut self) {
        if let Some(window) = self.window.take()
            && let Err(e) = self.session.destroy_window(window)
        {
            log::debug!("Failed to destroy probe window: {e}");
        }
    }
}

/// Connect to the display the environment points at.
///
/// `DISPLAY` is tried first, then `WAYLAND_DISPLAY`, then the platform's
/// native desktop on Windows and macOS.
pub fn open_session(system: &dyn SystemProbe, timeout: Duration) -> Result<Box<dyn DisplaySession>> {
    let mut last_error = None;

    if let Some(display) = non_empty_env(system, "DISPLAY") {
        match x11::X11Session::connect(&display, timeout) {
            Ok(session) => return Ok(Box::new(session)),
            Err(e) => {
                log::debug!("X11 display {display} unusable: {e}");
                last_error = Some(e);
            }
        }
    }

    if let Some(display) = non_empty_env(system, "WAYLAND_DISPLAY") {
        match connect_wayland(system, &display, timeout) {
            Ok(session) => return Ok(session),
            Err(e) => {
                log::debug!("Wayland display {display} unusable: {e}");
                last_error = Some(e);
            }
        }
    }

    if matches!(system.target_os().as_str(), "windows" | "macos") {
        return Ok(Box::new(native::connect(system)?));
    }

    Err(last_error.unwrap_or_else(|| {
        HabitatError::DisplayUnavailable("neither DISPLAY nor WAYLAND_DISPLAY is set".to_string())
    }))
}

#[cfg(unix)]
fn connect_wayland(
    system: &dyn SystemProbe,
    display: &str,
    timeout: Duration,
) -> Result<Box<dyn DisplaySession>> {
    let runtime_dir = system.env_var("XDG_RUNTIME_DIR");
    let path = wayland::socket_path(display, runtime_dir.as_deref())?;
    Ok(Box::new(wayland::connect(&path, timeout)?))
}

#[cfg(not(unix))]
fn connect_wayland(
    _system: &dyn SystemProbe,
    display: &str,
    _timeout: Duration,
) -> Result<Box<dyn DisplaySession>> {
    Err(HabitatError::UnsupportedPlatform(format!(
        "Wayland display {display}"
    )))
}

/// Draw `figure` on whichever display the environment points at.
pub fn present_figure(
    system: &dyn SystemProbe,
    timeout: Duration,
    figure: &Figure,
) -> Result<DisplayBackend> {
    let mut session = open_session(system, timeout)?;
    draw_figure(session.as_mut(), figure)?;
    Ok(session.backend())
}

/// Open a window sized for `figure`, draw the rendered figure into it, and
/// tear the window down with a confirmed round trip.
///
/// The round trip after drawing is what proves the server accepted the
/// pixels; protocol errors for the image surface there.
pub fn draw_figure(session: &mut dyn DisplaySession, figure: &Figure) -> Result<()> {
    let backend = session.backend();
    let canvas = figure.render()?;
    let width = u16::try_from(canvas.width()).unwrap_or(u16::MAX);
    let height = u16::try_from(canvas.height()).unwrap_or(u16::MAX);

    let mut window = WindowGuard::open(session, width, height)?;
    window.put_image(&canvas)?;
    window.round_trip()?;
    log::debug!(
        "Drew {}x{} figure into {backend:?} window",
        canvas.width(),
        canvas.height()
    );

    window.close()
}

fn non_empty_env(system: &dyn SystemProbe, name: &str) -> Option<String> {
    system.env_var(name).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::probe::MockSystemProbe;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Recorder {
        created: Vec<WindowId>,
        destroyed: Vec<WindowId>,
        images: Vec<(WindowId, u32, u32)>,
        round_trips: usize,
        calls: Vec<&'static str>,
        reject_images: bool,
    }

    struct RecordingSession(Rc<RefCell<Recorder>>);

    impl DisplaySession for RecordingSession {
        fn backend(&self) -> DisplayBackend {
            DisplayBackend::Native
        }

        fn create_window(&mut self, _width: u16, _height: u16) -> Result<WindowId> {
            let mut recorder = self.0.borrow_mut();
            let window = WindowId(recorder.created.len() as u32 + 1);
            recorder.created.push(window);
            recorder.calls.push("create");
            Ok(window)
        }

        fn destroy_window(&mut self, window: WindowId) -> Result<()> {
            let mut recorder = self.0.borrow_mut();
            recorder.destroyed.push(window);
            recorder.calls.push("destroy");
            Ok(())
        }

        fn put_image(&mut self, window: WindowId, canvas: &Canvas) -> Result<()> {
            let mut recorder = self.0.borrow_mut();
            recorder.calls.push("put_image");
            if recorder.reject_images {
                return Err(HabitatError::DisplayProtocol("BadMatch".to_string()));
            }
            recorder.images.push((window, canvas.width(), canvas.height()));
            Ok(())
        }

        fn round_trip(&mut self) -> Result<()> {
            let mut recorder = self.0.borrow_mut();
            recorder.round_trips += 1;
            recorder.calls.push("round_trip");
            Ok(())
        }
    }

    #[test]
    fn test_guard_destroys_on_drop() {
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        let mut session = RecordingSession(recorder.clone());
        {
            let _window = WindowGuard::open(&mut session, 10, 10).unwrap();
        }
        let recorder = recorder.borrow();
        assert_eq!(recorder.created, vec![WindowId(1)]);
        assert_eq!(recorder.destroyed, vec![WindowId(1)]);
    }

    #[test]
    fn test_guard_close_destroys_once() {
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        let mut session = RecordingSession(recorder.clone());
        let mut window = WindowGuard::open(&mut session, 10, 10).unwrap();
        window.round_trip().unwrap();
        window.close().unwrap();

        let recorder = recorder.borrow();
        assert_eq!(recorder.destroyed.len(), 1);
        assert_eq!(recorder.round_trips, 2);
    }

    #[test]
    fn test_no_display_on_headless_linux() {
        let mut mock = MockSystemProbe::new();
        mock.expect_env_var().return_const(None);
        mock.expect_target_os().return_const("linux".to_string());

        let err = open_session(&mock, Duration::from_millis(100)).err().unwrap();
        assert!(matches!(err, HabitatError::DisplayUnavailable(_)));
    }

    #[test]
    fn test_unreachable_x_display() {
        let mut mock = MockSystemProbe::new();
        mock.expect_env_var()
            .returning(|name| (name == "DISPLAY").then(|| ":4242".to_string()));
        mock.expect_target_os().return_const("linux".to_string());

        assert!(open_session(&mock, Duration::from_millis(100)).is_err());
    }

    #[test]
    fn test_figure_pixels_reach_the_window() {
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        let mut session = RecordingSession(recorder.clone());
        let figure = Figure::sample();
        draw_figure(&mut session, &figure).unwrap();

        let recorder = recorder.borrow();
        assert_eq!(
            recorder.images,
            vec![(WindowId(1), figure.width(), figure.height())]
        );
        assert_eq!(
            recorder.calls,
            vec!["create", "put_image", "round_trip", "destroy", "round_trip"]
        );
    }

    #[test]
    fn test_rejected_image_still_destroys_window() {
        let recorder = Rc::new(RefCell::new(Recorder {
            reject_images: true,
            ..Recorder::default()
        }));
        let mut session = RecordingSession(recorder.clone());
        assert!(draw_figure(&mut session, &Figure::sample()).is_err());

        let recorder = recorder.borrow();
        assert!(recorder.images.is_empty());
        assert_eq!(recorder.destroyed, vec![WindowId(1)]);
    }

    #[test]
    fn test_closed_guard_rejects_images() {
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        let mut session = RecordingSession(recorder.clone());
        let mut window = WindowGuard::open(&mut session, 10, 10).unwrap();
        window.window = None;
        let canvas = Canvas::new(10, 10).unwrap();
        assert!(window.put_image(&canvas).is_err());
    }

    #[cfg(not(windows))]
    #[test]
    fn test_desktop_without_native_binding_is_not_presentable() {
        for os in ["macos", "windows"] {
            let mut mock = MockSystemProbe::new();
            mock.expect_env_var().return_const(None);
            mock.expect_target_os().return_const(os.to_string());

            assert!(present_figure(&mock, Duration::from_millis(100), &Figure::sample()).is_err());
        }
    }
}

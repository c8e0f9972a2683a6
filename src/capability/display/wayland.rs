//! Wayland session speaking the raw wire protocol.
//!
//! A "window" here is a bare `wl_surface` created from the compositor
//! global; it never gets a role, so nothing is mapped on screen. Pixels
//! reach it through a `wl_shm` pool backed by an anonymous temp file whose
//! descriptor travels with the `create_pool` request.

use super::{DisplayBackend, DisplaySession, WindowId};
use crate::capability::plot::Canvas;
use crate::error::{HabitatError, Result};
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DISPLAY_ID: u32 = 1;
const REGISTRY_ID: u32 = 2;

// wl_display requests / events
const DISPLAY_SYNC: u16 = 0;
const DISPLAY_GET_REGISTRY: u16 = 1;
const DISPLAY_EVENT_ERROR: u16 = 0;
const DISPLAY_EVENT_DELETE_ID: u16 = 1;

const REGISTRY_BIND: u16 = 0;
const REGISTRY_EVENT_GLOBAL: u16 = 0;
const CALLBACK_EVENT_DONE: u16 = 0;
const COMPOSITOR_CREATE_SURFACE: u16 = 0;
const SURFACE_DESTROY: u16 = 0;
const SURFACE_ATTACH: u16 = 1;
const SURFACE_DAMAGE: u16 = 2;
const SURFACE_COMMIT: u16 = 6;
const SHM_CREATE_POOL: u16 = 0;
const SHM_POOL_CREATE_BUFFER: u16 = 0;
const SHM_POOL_DESTROY: u16 = 1;
const BUFFER_DESTROY: u16 = 0;

/// `wl_shm.format.xrgb8888`
const SHM_FORMAT_XRGB8888: u32 = 1;

const COMPOSITOR_INTERFACE: &str = "wl_compositor";
const COMPOSITOR_MAX_VERSION: u32 = 4;
const SHM_INTERFACE: &str = "wl_shm";

/// A connection that can pass a file descriptor along with message bytes.
pub trait FdStream: Read + Write {
    fn send_with_fd(&mut self, bytes: &[u8], fd: BorrowedFd<'_>) -> io::Result<()>;
}

impl FdStream for UnixStream {
    fn send_with_fd(&mut self, bytes: &[u8], fd: BorrowedFd<'_>) -> io::Result<()> {
        use nix::sys::socket::{ControlMessage, MsgFlags, sendmsg};
        use std::os::fd::AsRawFd;

        let fds = [fd.as_raw_fd()];
        let sent = sendmsg::<()>(
            self.as_raw_fd(),
            &[io::IoSlice::new(bytes)],
            &[ControlMessage::ScmRights(&fds)],
            MsgFlags::empty(),
            None,
        )
        .map_err(io::Error::from)?;
        // the descriptor rides on the first byte; the rest is plain data
        self.write_all(&bytes[sent..])
    }
}

/// Socket path for a `WAYLAND_DISPLAY` value: absolute values are used as
/// is, relative ones live under `XDG_RUNTIME_DIR`.
pub fn socket_path(display: &str, runtime_dir: Option<&str>) -> Result<PathBuf> {
    let display = Path::new(display);
    if display.is_absolute() {
        return Ok(display.to_path_buf());
    }
    match runtime_dir.filter(|dir| !dir.is_empty()) {
        Some(dir) => Ok(Path::new(dir).join(display)),
        None => Err(HabitatError::DisplayUnavailable(
            "WAYLAND_DISPLAY is relative and XDG_RUNTIME_DIR is unset".to_string(),
        )),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Global {
    name: u32,
    interface: String,
    version: u32,
}

#[derive(Debug)]
struct Message {
    object: u32,
    opcode: u16,
    args: Vec<u8>,
}

pub struct WaylandSession<S: FdStream> {
    stream: S,
    next_id: u32,
    compositor: Option<u32>,
    compositor_global: Option<Global>,
    shm: Option<u32>,
    shm_global: Option<Global>,
    /// Buffers attached to a surface, released when the surface goes.
    attached: Vec<(WindowId, u32)>,
}

impl<S: FdStream> std::fmt::Debug for WaylandSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaylandSession")
            .field("next_id", &self.next_id)
            .field("compositor", &self.compositor)
            .finish_non_exhaustive()
    }
}

pub fn connect(path: &Path, timeout: Duration) -> Result<WaylandSession<UnixStream>> {
    log::debug!("Connecting to Wayland socket {}", path.display());
    let stream = UnixStream::connect(path).map_err(|e| {
        HabitatError::DisplayUnavailable(format!("cannot connect to {}: {e}", path.display()))
    })?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    WaylandSession::start(stream)
}

impl<S: FdStream> WaylandSession<S> {
    /// Request the registry and wait for the initial burst of globals.
    fn start(stream: S) -> Result<Self> {
        let mut session = Self {
            stream,
            next_id: REGISTRY_ID + 1,
            compositor: None,
            compositor_global: None,
            shm: None,
            shm_global: None,
            attached: Vec::new(),
        };
        session.send(DISPLAY_ID, DISPLAY_GET_REGISTRY, &REGISTRY_ID.to_ne_bytes())?;
        session.sync()?;

        if session.compositor_global.is_none() {
            return Err(HabitatError::DisplayProtocol(format!(
                "compositor does not advertise {COMPOSITOR_INTERFACE}"
            )));
        }
        Ok(session)
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn send(&mut self, object: u32, opcode: u16, args: &[u8]) -> Result<()> {
        let message = encode_message(object, opcode, args)?;
        self.stream.write_all(&message)?;
        Ok(())
    }

    fn send_with_fd(&mut self, object: u32, opcode: u16, args: &[u8], fd: BorrowedFd<'_>) -> Result<()> {
        let message = encode_message(object, opcode, args)?;
        self.stream.send_with_fd(&message, fd)?;
        Ok(())
    }

    fn receive(&mut self) -> Result<Message> {
        let mut header = [0u8; 8];
        self.stream.read_exact(&mut header)?;
        let object = u32::from_ne_bytes([header[0], header[1], header[2], header[3]]);
        let word = u32::from_ne_bytes([header[4], header[5], header[6], header[7]]);
        let size = (word >> 16) as usize;
        let opcode = (word & 0xffff) as u16;
        if size < 8 {
            return Err(HabitatError::DisplayProtocol(format!("bad message size {size}")));
        }

        let mut args = vec![0u8; size - 8];
        self.stream.read_exact(&mut args)?;
        Ok(Message {
            object,
            opcode,
            args,
        })
    }

    /// `wl_display.sync`, dispatching events until its callback fires.
    fn sync(&mut self) -> Result<()> {
        let callback = self.allocate_id();
        self.send(DISPLAY_ID, DISPLAY_SYNC, &callback.to_ne_bytes())?;

        loop {
            let message = self.receive()?;
            match (message.object, message.opcode) {
                (id, CALLBACK_EVENT_DONE) if id == callback => return Ok(()),
                (DISPLAY_ID, DISPLAY_EVENT_ERROR) => {
                    return Err(HabitatError::DisplayProtocol(describe_error(&message.args)));
                }
                (DISPLAY_ID, DISPLAY_EVENT_DELETE_ID) => {}
                (REGISTRY_ID, REGISTRY_EVENT_GLOBAL) => {
                    if let Some(global) = parse_global(&message.args) {
                        log::trace!("Found {} v{}", global.interface, global.version);
                        match global.interface.as_str() {
                            COMPOSITOR_INTERFACE => self.compositor_global = Some(global),
                            SHM_INTERFACE => self.shm_global = Some(global),
                            _ => {}
                        }
                    }
                }
                (object, opcode) => log::trace!("Ignoring event {opcode} on object {object}"),
            }
        }
    }

    fn bind_compositor(&mut self) -> Result<u32> {
        if let Some(id) = self.compositor {
            return Ok(id);
        }
        let global = self.compositor_global.clone();
        let id = self.bind(global, COMPOSITOR_INTERFACE, COMPOSITOR_MAX_VERSION)?;
        self.compositor = Some(id);
        Ok(id)
    }

    fn bind_shm(&mut self) -> Result<u32> {
        if let Some(id) = self.shm {
            return Ok(id);
        }
        let global = self.shm_global.clone();
        let id = self.bind(global, SHM_INTERFACE, 1)?;
        self.shm = Some(id);
        Ok(id)
    }

    fn bind(&mut self, global: Option<Global>, interface: &str, max_version: u32) -> Result<u32> {
        let Some(global) = global else {
            return Err(HabitatError::DisplayProtocol(format!("{interface} unavailable")));
        };

        let id = self.allocate_id();
        let mut args = Vec::new();
        args.extend_from_slice(&global.name.to_ne_bytes());
        push_string(&mut args, &global.interface);
        args.extend_from_slice(&global.version.min(max_version).to_ne_bytes());
        args.extend_from_slice(&id.to_ne_bytes());
        self.send(REGISTRY_ID, REGISTRY_BIND, &args)?;
        Ok(id)
    }
}

impl<S: FdStream> DisplaySession for WaylandSession<S> {
    fn backend(&self) -> DisplayBackend {
        DisplayBackend::Wayland
    }

    fn create_window(&mut self, _width: u16, _height: u16) -> Result<WindowId> {
        let compositor = self.bind_compositor()?;
        let surface = self.allocate_id();
        self.send(compositor, COMPOSITOR_CREATE_SURFACE, &surface.to_ne_bytes())?;
        Ok(WindowId(surface))
    }

    fn destroy_window(&mut self, window: WindowId) -> Result<()> {
        self.send(window.0, SURFACE_DESTROY, &[])?;
        let (released, kept): (Vec<_>, Vec<_>) =
            self.attached.drain(..).partition(|(surface, _)| *surface == window);
        self.attached = kept;
        for (_, buffer) in released {
            self.send(buffer, BUFFER_DESTROY, &[])?;
        }
        Ok(())
    }

    fn put_image(&mut self, window: WindowId, canvas: &Canvas) -> Result<()> {
        let too_large =
            || HabitatError::DisplayProtocol(format!("image {}x{} too large", canvas.width(), canvas.height()));
        let width = i32::try_from(canvas.width()).map_err(|_| too_large())?;
        let height = i32::try_from(canvas.height()).map_err(|_| too_large())?;
        let stride = width.checked_mul(4).ok_or_else(too_large)?;

        let pixels = canvas.to_xrgb32(cfg!(target_endian = "little"));
        let size = i32::try_from(pixels.len()).map_err(|_| too_large())?;
        let mut file = tempfile::tempfile()?;
        file.write_all(&pixels)?;

        let shm = self.bind_shm()?;
        let pool = self.allocate_id();
        let mut args = pool.to_ne_bytes().to_vec();
        args.extend_from_slice(&size.to_ne_bytes());
        self.send_with_fd(shm, SHM_CREATE_POOL, &args, file.as_fd())?;

        let buffer = self.allocate_id();
        let mut args = Vec::with_capacity(24);
        for value in [buffer as i32, 0, width, height, stride, SHM_FORMAT_XRGB8888 as i32] {
            args.extend_from_slice(&value.to_ne_bytes());
        }
        self.send(pool, SHM_POOL_CREATE_BUFFER, &args)?;
        self.send(pool, SHM_POOL_DESTROY, &[])?;
        self.attached.push((window, buffer));

        let mut args = buffer.to_ne_bytes().to_vec();
        args.extend_from_slice(&0i32.to_ne_bytes());
        args.extend_from_slice(&0i32.to_ne_bytes());
        self.send(window.0, SURFACE_ATTACH, &args)?;

        let mut args = Vec::with_capacity(16);
        for value in [0, 0, width, height] {
            args.extend_from_slice(&value.to_ne_bytes());
        }
        self.send(window.0, SURFACE_DAMAGE, &args)?;
        self.send(window.0, SURFACE_COMMIT, &[])
    }

    fn round_trip(&mut self) -> Result<()> {
        self.stream.flush()?;
        self.sync()
    }
}

fn encode_message(object: u32, opcode: u16, args: &[u8]) -> Result<Vec<u8>> {
    let size = 8 + args.len();
    let size = u16::try_from(size)
        .map_err(|_| HabitatError::DisplayProtocol(format!("message too large ({size} bytes)")))?;

    let mut message = Vec::with_capacity(size as usize);
    message.extend_from_slice(&object.to_ne_bytes());
    message.extend_from_slice(&((u32::from(size) << 16) | u32::from(opcode)).to_ne_bytes());
    message.extend_from_slice(args);
    Ok(message)
}

fn push_string(out: &mut Vec<u8>, value: &str) {
    let len = value.len() + 1;
    out.extend_from_slice(&(len as u32).to_ne_bytes());
    out.extend_from_slice(value.as_bytes());
    out.push(0);
    out.resize(out.len() + (4 - len % 4) % 4, 0);
}

fn read_u32(args: &[u8], at: usize) -> Option<u32> {
    let bytes = args.get(at..at + 4)?;
    Some(u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// String argument at `at`; returns the value and the offset after padding.
fn read_string(args: &[u8], at: usize) -> Option<(String, usize)> {
    let len = read_u32(args, at)? as usize;
    let start = at + 4;
    let bytes = args.get(start..start + len)?;
    let value = String::from_utf8_lossy(bytes.strip_suffix(&[0]).unwrap_or(bytes)).into_owned();
    Some((value, start + ((len + 3) & !3)))
}

fn parse_global(args: &[u8]) -> Option<Global> {
    let name = read_u32(args, 0)?;
    let (interface, next) = read_string(args, 4)?;
    let version = read_u32(args, next)?;
    Some(Global {
        name,
        interface,
        version,
    })
}

fn describe_error(args: &[u8]) -> String {
    let object = read_u32(args, 0).unwrap_or_default();
    let code = read_u32(args, 4).unwrap_or_default();
    let text = read_string(args, 8)
        .map(|(text, _)| text)
        .unwrap_or_default();
    format!("compositor error {code} on object {object}: {text}")
}

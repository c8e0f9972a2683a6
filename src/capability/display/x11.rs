//! X11 core-protocol session over a unix or TCP socket.
//!
//! Only what the probe needs: connection setup (with an optional
//! MIT-MAGIC-COOKIE-1), `CreateWindow`, `DestroyWindow`, a `PutImage`
//! through a throwaway GC and a `GetInputFocus` round trip. The window is
//! never mapped.

use super::{DisplayBackend, DisplaySession, WindowId};
use crate::capability::plot::Canvas;
use crate::error::{HabitatError, Result};
use std::fs;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;
use sysinfo::System;

const X_TCP_PORT_BASE: u16 = 6000;
const UNIX_SOCKET_DIR: &str = "/tmp/.X11-unix";
const AUTH_PROTOCOL: &str = "MIT-MAGIC-COOKIE-1";

const FAMILY_INTERNET: u16 = 0;
const FAMILY_LOCAL: u16 = 256;
const FAMILY_WILD: u16 = 65535;

const OPCODE_CREATE_WINDOW: u8 = 1;
const OPCODE_DESTROY_WINDOW: u8 = 4;
const OPCODE_GET_INPUT_FOCUS: u8 = 43;
const OPCODE_CREATE_GC: u8 = 55;
const OPCODE_FREE_GC: u8 = 60;
const OPCODE_PUT_IMAGE: u8 = 72;

const IMAGE_FORMAT_ZPIXMAP: u8 = 2;
const PUT_IMAGE_HEADER_LEN: usize = 24;

const PACKET_LEN: usize = 32;

/// A parsed `DISPLAY` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayName {
    pub target: DisplayTarget,
    pub display: u16,
    pub screen: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayTarget {
    /// `/tmp/.X11-unix/X<n>`, or an explicit socket path (XQuartz).
    Unix(PathBuf),
    Tcp(String),
}

impl DisplayName {
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = || HabitatError::DisplayUnavailable(format!("invalid DISPLAY '{value}'"));

        let (host, rest) = value.rsplit_once(':').ok_or_else(invalid)?;
        let (display, screen) = match rest.split_once('.') {
            Some((display, screen)) => (display, screen),
            None => (rest, "0"),
        };
        let display: u16 = display.parse().map_err(|_| invalid())?;
        let screen: u16 = screen.parse().map_err(|_| invalid())?;

        let target = if host.starts_with('/') {
            // launchd-style socket path; the socket file is the whole value
            // minus any screen suffix.
            let socket = match value.rsplit_once('.') {
                Some((path, suffix))
                    if suffix.chars().all(|c| c.is_ascii_digit())
                        && path.ends_with(&format!(":{display}")) =>
                {
                    path
                }
                _ => value,
            };
            DisplayTarget::Unix(PathBuf::from(socket))
        } else if host.is_empty() || host == "unix" {
            if cfg!(unix) {
                DisplayTarget::Unix(Path::new(UNIX_SOCKET_DIR).join(format!("X{display}")))
            } else {
                DisplayTarget::Tcp("localhost".to_string())
            }
        } else {
            DisplayTarget::Tcp(host.to_string())
        };

        Ok(Self {
            target,
            display,
            screen,
        })
    }
}

trait Transport: Read + Write {}
impl<T: Read + Write> Transport for T {}

pub struct X11Session {
    stream: Box<dyn Transport>,
    root: u32,
    id_base: u32,
    id_mask: u32,
    next_id: u32,
    pixmap: PixmapLayout,
}

/// What `PutImage` needs to know about the root window's pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PixmapLayout {
    depth: u8,
    bits_per_pixel: u8,
    lsb_first: bool,
    /// Longest request the server accepts, in bytes.
    max_request_bytes: usize,
}

impl std::fmt::Debug for X11Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X11Session")
            .field("root", &self.root)
            .field("id_base", &self.id_base)
            .finish_non_exhaustive()
    }
}

impl X11Session {
    pub fn connect(display: &str, timeout: Duration) -> Result<Self> {
        let name = DisplayName::parse(display)?;
        log::debug!("Connecting to X display {name:?}");

        let stream = open_stream(&name, timeout)?;
        let cookie = find_cookie(&name);
        Self::handshake(stream, cookie.as_deref())
    }

    fn handshake(mut stream: Box<dyn Transport>, cookie: Option<&[u8]>) -> Result<Self> {
        stream.write_all(&setup_request(cookie))?;

        let mut head = [0u8; 8];
        stream.read_exact(&mut head)?;
        let extra_len = u16::from_le_bytes([head[6], head[7]]) as usize * 4;
        let mut body = vec![0u8; extra_len];
        stream.read_exact(&mut body)?;

        match head[0] {
            1 => {}
            status => {
                let reason_len = head[1] as usize;
                let reason = if status == 0 {
                    String::from_utf8_lossy(&body[..reason_len.min(body.len())]).into_owned()
                } else {
                    "server requires further authentication".to_string()
                };
                return Err(HabitatError::DisplayUnavailable(format!(
                    "X server refused connection: {}",
                    reason.trim()
                )));
            }
        }

        let setup = parse_setup(&body)?;
        log::debug!("X11 setup: root window {:#x}", setup.root);
        Ok(Self {
            stream,
            root: setup.root,
            id_base: setup.id_base,
            id_mask: setup.id_mask,
            next_id: 1,
            pixmap: setup.pixmap,
        })
    }

    fn allocate_id(&mut self) -> Result<u32> {
        let step = self.id_mask & self.id_mask.wrapping_neg();
        let offset = self.next_id.checked_mul(step).filter(|o| o & !self.id_mask == 0);
        let Some(offset) = offset else {
            return Err(HabitatError::DisplayProtocol("resource ids exhausted".to_string()));
        };
        self.next_id += 1;
        Ok(self.id_base | offset)
    }

    /// Read packets until a reply or error arrives; events are skipped.
    fn await_reply(&mut self) -> Result<()> {
        loop {
            let mut packet = [0u8; PACKET_LEN];
            self.stream.read_exact(&mut packet)?;
            match packet[0] {
                0 => {
                    return Err(HabitatError::DisplayProtocol(format!(
                        "X error code {} for request opcode {}",
                        packet[1], packet[10]
                    )));
                }
                1 => {
                    let extra = u32::from_le_bytes([packet[4], packet[5], packet[6], packet[7]]) as usize * 4;
                    if extra > 0 {
                        let mut rest = vec![0u8; extra];
                        self.stream.read_exact(&mut rest)?;
                    }
                    return Ok(());
                }
                event => log::trace!("Skipping X event {event}"),
            }
        }
    }

    fn put_image_strips(&mut self, drawable: u32, gc: u32, canvas: &Canvas) -> Result<()> {
        let too_large =
            || HabitatError::DisplayProtocol(format!("image {}x{} too large", canvas.width(), canvas.height()));
        let width = u16::try_from(canvas.width()).map_err(|_| too_large())?;
        u16::try_from(canvas.height()).map_err(|_| too_large())?;

        let row_len = usize::from(width) * 4;
        let rows_per_request = self.pixmap.max_request_bytes.saturating_sub(PUT_IMAGE_HEADER_LEN) / row_len;
        if rows_per_request == 0 {
            return Err(too_large());
        }

        let pixels = canvas.to_xrgb32(self.pixmap.lsb_first);
        for (strip, rows) in pixels.chunks(rows_per_request * row_len).enumerate() {
            let height = (rows.len() / row_len) as u16;
            let dst_y = (strip * rows_per_request) as i16;
            let length = u16::try_from((PUT_IMAGE_HEADER_LEN + rows.len()) / 4).map_err(|_| too_large())?;

            let mut request = Vec::with_capacity(PUT_IMAGE_HEADER_LEN + rows.len());
            request.push(OPCODE_PUT_IMAGE);
            request.push(IMAGE_FORMAT_ZPIXMAP);
            request.extend_from_slice(&length.to_le_bytes());
            request.extend_from_slice(&drawable.to_le_bytes());
            request.extend_from_slice(&gc.to_le_bytes());
            request.extend_from_slice(&width.to_le_bytes());
            request.extend_from_slice(&height.to_le_bytes());
            request.extend_from_slice(&0i16.to_le_bytes()); // dst-x
            request.extend_from_slice(&dst_y.to_le_bytes());
            request.push(0); // left-pad
            request.push(self.pixmap.depth);
            request.extend_from_slice(&[0, 0]);
            request.extend_from_slice(rows);
            self.stream.write_all(&request)?;
        }
        Ok(())
    }
}

impl DisplaySession for X11Session {
    fn backend(&self) -> DisplayBackend {
        DisplayBackend::X11
    }

    fn create_window(&mut self, width: u16, height: u16) -> Result<WindowId> {
        let window = self.allocate_id()?;
        let mut request = Vec::with_capacity(32);
        request.push(OPCODE_CREATE_WINDOW);
        request.push(0); // depth: CopyFromParent
        request.extend_from_slice(&8u16.to_le_bytes());
        request.extend_from_slice(&window.to_le_bytes());
        request.extend_from_slice(&self.root.to_le_bytes());
        request.extend_from_slice(&0i16.to_le_bytes()); // x
        request.extend_from_slice(&0i16.to_le_bytes()); // y
        request.extend_from_slice(&width.max(1).to_le_bytes());
        request.extend_from_slice(&height.max(1).to_le_bytes());
        request.extend_from_slice(&0u16.to_le_bytes()); // border
        request.extend_from_slice(&0u16.to_le_bytes()); // class: CopyFromParent
        request.extend_from_slice(&0u32.to_le_bytes()); // visual: CopyFromParent
        request.extend_from_slice(&0u32.to_le_bytes()); // value-mask
        self.stream.write_all(&request)?;
        Ok(WindowId(window))
    }

    fn destroy_window(&mut self, window: WindowId) -> Result<()> {
        let mut request = Vec::with_capacity(8);
        request.push(OPCODE_DESTROY_WINDOW);
        request.push(0);
        request.extend_from_slice(&2u16.to_le_bytes());
        request.extend_from_slice(&window.0.to_le_bytes());
        self.stream.write_all(&request)?;
        Ok(())
    }

    fn put_image(&mut self, window: WindowId, canvas: &Canvas) -> Result<()> {
        if self.pixmap.bits_per_pixel != 32 {
            return Err(HabitatError::DisplayProtocol(format!(
                "unsupported {}bpp pixmap format for depth {}",
                self.pixmap.bits_per_pixel, self.pixmap.depth
            )));
        }

        let gc = self.allocate_id()?;
        let mut request = Vec::with_capacity(16);
        request.push(OPCODE_CREATE_GC);
        request.push(0);
        request.extend_from_slice(&4u16.to_le_bytes());
        request.extend_from_slice(&gc.to_le_bytes());
        request.extend_from_slice(&window.0.to_le_bytes());
        request.extend_from_slice(&0u32.to_le_bytes()); // value-mask
        self.stream.write_all(&request)?;

        let drawn = self.put_image_strips(window.0, gc, canvas);

        let mut request = Vec::with_capacity(8);
        request.push(OPCODE_FREE_GC);
        request.push(0);
        request.extend_from_slice(&2u16.to_le_bytes());
        request.extend_from_slice(&gc.to_le_bytes());
        self.stream.write_all(&request)?;
        drawn
    }

    fn round_trip(&mut self) -> Result<()> {
        self.stream
            .write_all(&[OPCODE_GET_INPUT_FOCUS, 0, 1, 0])?;
        self.stream.flush()?;
        self.await_reply()
    }
}

fn open_stream(name: &DisplayName, timeout: Duration) -> Result<Box<dyn Transport>> {
    match &name.target {
        DisplayTarget::Unix(path) => open_unix(path, timeout),
        DisplayTarget::Tcp(host) => {
            let port = X_TCP_PORT_BASE.checked_add(name.display).ok_or_else(|| {
                HabitatError::DisplayUnavailable(format!("display number {} out of range", name.display))
            })?;
            let addr = (host.as_str(), port)
                .to_socket_addrs()?
                .next()
                .ok_or_else(|| HabitatError::DisplayUnavailable(format!("cannot resolve {host}")))?;
            let stream = TcpStream::connect_timeout(&addr, timeout)?;
            stream.set_read_timeout(Some(timeout))?;
            stream.set_write_timeout(Some(timeout))?;
            stream.set_nodelay(true)?;
            Ok(Box::new(stream))
        }
    }
}

#[cfg(unix)]
fn open_unix(path: &Path, timeout: Duration) -> Result<Box<dyn Transport>> {
    use std::os::unix::net::UnixStream;

    let stream = UnixStream::connect(path).map_err(|e| {
        HabitatError::DisplayUnavailable(format!("cannot connect to {}: {e}", path.display()))
    })?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    Ok(Box::new(stream))
}

#[cfg(not(unix))]
fn open_unix(path: &Path, _timeout: Duration) -> Result<Box<dyn Transport>> {
    Err(HabitatError::UnsupportedPlatform(format!(
        "unix display socket {}",
        path.display()
    )))
}

fn setup_request(cookie: Option<&[u8]>) -> Vec<u8> {
    let (name, data): (&[u8], &[u8]) = match cookie {
        Some(cookie) => (AUTH_PROTOCOL.as_bytes(), cookie),
        None => (&[], &[]),
    };

    let mut request = Vec::with_capacity(12 + padded(name.len()) + padded(data.len()));
    request.push(b'l'); // little-endian
    request.push(0);
    request.extend_from_slice(&11u16.to_le_bytes());
    request.extend_from_slice(&0u16.to_le_bytes());
    request.extend_from_slice(&(name.len() as u16).to_le_bytes());
    request.extend_from_slice(&(data.len() as u16).to_le_bytes());
    request.extend_from_slice(&[0, 0]);
    push_padded(&mut request, name);
    push_padded(&mut request, data);
    request
}

struct Setup {
    root: u32,
    id_base: u32,
    id_mask: u32,
    pixmap: PixmapLayout,
}

fn parse_setup(body: &[u8]) -> Result<Setup> {
    let truncated = || HabitatError::DisplayProtocol("truncated X connection setup".to_string());
    let u32_at = |at: usize| -> Result<u32> {
        body.get(at..at + 4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .ok_or_else(truncated)
    };

    let u16_at = |at: usize| -> Result<u16> {
        body.get(at..at + 2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
            .ok_or_else(truncated)
    };
    let u8_at = |at: usize| -> Result<u8> { body.get(at).copied().ok_or_else(truncated) };

    let id_base = u32_at(4)?;
    let id_mask = u32_at(8)?;
    let vendor_len = u16_at(16)? as usize;
    let max_request_len = u16_at(18)?;
    let screens = u8_at(20)?;
    let formats = u8_at(21)? as usize;
    let image_byte_order = u8_at(22)?;

    if screens == 0 {
        return Err(HabitatError::DisplayProtocol("X server reports no screens".to_string()));
    }
    if id_mask == 0 {
        return Err(HabitatError::DisplayProtocol("empty resource id mask".to_string()));
    }

    let formats_offset = 32 + padded(vendor_len);
    let screen_offset = formats_offset + formats * 8;
    let root = u32_at(screen_offset)?;
    let depth = u8_at(screen_offset + 38)?;

    // FORMAT entries: depth, bits-per-pixel, scanline-pad, 5 unused
    let mut bits_per_pixel = None;
    for format in 0..formats {
        let at = formats_offset + format * 8;
        if u8_at(at)? == depth {
            bits_per_pixel = Some(u8_at(at + 1)?);
        }
    }
    let bits_per_pixel = bits_per_pixel.ok_or_else(|| {
        HabitatError::DisplayProtocol(format!("no pixmap format for root depth {depth}"))
    })?;

    Ok(Setup {
        root,
        id_base,
        id_mask,
        pixmap: PixmapLayout {
            depth,
            bits_per_pixel,
            lsb_first: image_byte_order == 0,
            max_request_bytes: usize::from(max_request_len) * 4,
        },
    })
}

/// Cookie for `name` from `$XAUTHORITY` or `~/.Xauthority`.
fn find_cookie(name: &DisplayName) -> Option<Vec<u8>> {
    let path = std::env::var_os("XAUTHORITY")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".Xauthority")))?;

    let data = match fs::read(&path) {
        Ok(data) => data,
        Err(e) => {
            log::debug!("No X authority from {}: {e}", path.display());
            return None;
        }
    };

    let hostname = System::host_name();
    let display = name.display.to_string();
    let is_local = matches!(name.target, DisplayTarget::Unix(_));

    parse_xauthority(&data)
        .into_iter()
        .filter(|entry| entry.name == AUTH_PROTOCOL.as_bytes())
        .filter(|entry| entry.number.is_empty() || entry.number == display.as_bytes())
        .find(|entry| match entry.family {
            FAMILY_WILD => true,
            FAMILY_LOCAL => {
                is_local
                    && hostname
                        .as_deref()
                        .is_none_or(|host| entry.address == host.as_bytes())
            }
            FAMILY_INTERNET => !is_local,
            _ => false,
        })
        .map(|entry| {
            log::debug!("Using {AUTH_PROTOCOL} from {}", path.display());
            entry.data
        })
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct XauthEntry {
    family: u16,
    address: Vec<u8>,
    number: Vec<u8>,
    name: Vec<u8>,
    data: Vec<u8>,
}

/// Entries are big-endian: family, then four length-prefixed fields.
fn parse_xauthority(mut data: &[u8]) -> Vec<XauthEntry> {
    fn take_u16(data: &mut &[u8]) -> Option<u16> {
        let (head, rest) = data.split_first_chunk::<2>()?;
        *data = rest;
        Some(u16::from_be_bytes(*head))
    }
    fn take_field(data: &mut &[u8]) -> Option<Vec<u8>> {
        let len = take_u16(data)? as usize;
        if data.len() < len {
            return None;
        }
        let (field, rest) = data.split_at(len);
        *data = rest;
        Some(field.to_vec())
    }

    let mut entries = Vec::new();
    while !data.is_empty() {
        let entry = (|| {
            Some(XauthEntry {
                family: take_u16(&mut data)?,
                address: take_field(&mut data)?,
                number: take_field(&mut data)?,
                name: take_field(&mut data)?,
                data: take_field(&mut data)?,
            })
        })();
        match entry {
            Some(entry) => entries.push(entry),
            None => break,
        }
    }
    entries
}

fn padded(len: usize) -> usize {
    (len + 3) & !3
}

fn push_padded(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(bytes);
    out.resize(out.len() + padded(bytes.len()) - bytes.len(), 0);
}

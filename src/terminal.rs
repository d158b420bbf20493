use std::io::{self, Write};

use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
};
use log::{debug, warn};

use crate::reader::{FullscreenError, FullscreenHost, Viewport};

/// Mouse capture held for the lifetime of one reader session.
///
/// Mouse movement, clicks and drags only reach the app while this exists;
/// dropping it stops the terminal from reporting them.
pub struct InputSubscription<W: Write> {
    out: W,
}

impl<W: Write> InputSubscription<W> {
    pub fn acquire(mut out: W) -> io::Result<Self> {
        execute!(out, EnableMouseCapture)?;
        debug!("reader input subscription acquired");
        Ok(Self { out })
    }
}

impl<W: Write> Drop for InputSubscription<W> {
    fn drop(&mut self) {
        if let Err(e) = execute!(self.out, DisableMouseCapture) {
            warn!("failed to release mouse capture: {e}");
        }
        debug!("reader input subscription released");
    }
}

/// Asks the terminal emulator to go fullscreen with the xterm window
/// manipulation sequence `CSI 10 ; n t`.
pub struct TerminalFullscreen<W: Write> {
    out: W,
    active: bool,
}

impl<W: Write> TerminalFullscreen<W> {
    pub fn new(out: W) -> Self {
        Self { out, active: false }
    }

    fn send(&mut self, on: bool) -> Result<(), FullscreenError> {
        let seq: &[u8] = if on { b"\x1b[10;1t" } else { b"\x1b[10;0t" };
        self.out
            .write_all(seq)
            .and_then(|_| self.out.flush())
            .map_err(|e| FullscreenError(e.to_string()))?;
        self.active = on;
        Ok(())
    }
}

impl<W: Write> FullscreenHost for TerminalFullscreen<W> {
    fn is_fullscreen(&self) -> bool {
        self.active
    }

    fn request_fullscreen(&mut self) -> Result<(), FullscreenError> {
        self.send(true)
    }

    fn exit_fullscreen(&mut self) -> Result<(), FullscreenError> {
        self.send(false)
    }
}

/// Terminal size in pixels. Falls back to cells times `font_size` when the
/// terminal does not report its pixel dimensions.
pub fn measure_viewport(font_size: (u16, u16)) -> io::Result<Viewport> {
    if let Ok(size) = crossterm::terminal::window_size() {
        if size.width > 0 && size.height > 0 {
            return Ok(Viewport::new(size.width.into(), size.height.into()));
        }
    }
    let (cols, rows) = crossterm::terminal::size()?;
    Ok(cells_to_viewport(cols, rows, font_size))
}

pub fn cells_to_viewport(cols: u16, rows: u16, font_size: (u16, u16)) -> Viewport {
    Viewport::new(
        u32::from(cols) * u32::from(font_size.0),
        u32::from(rows) * u32::from(font_size.1),
    )
}

//! View state of the chapter reader.
//!
//! The controller is pure: time is passed in as `Instant`s and the only
//! side-effecting collaborator, the fullscreen host, is handed in per call.
//! The caller drives `tick` from its event loop to fire the auto-hide timer
//! and any deferred orientation re-evaluation.

use std::time::{Duration, Instant};

use crossterm::event::KeyCode;
use log::{debug, warn};

use crate::config::ReaderConfig;
use crate::models::Page;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewMode {
    Continuous,
    Paginated,
}

impl ViewMode {
    pub fn toggled(self) -> Self {
        match self {
            ViewMode::Continuous => ViewMode::Paginated,
            ViewMode::Paginated => ViewMode::Continuous,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ViewMode::Continuous => "Continuous",
            ViewMode::Paginated => "Paginated",
        }
    }
}

/// Visible area in logical pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_landscape(&self) -> bool {
        self.width > self.height
    }

    pub fn is_compact(&self, breakpoint: u32) -> bool {
        self.width <= breakpoint
    }

    /// Mode picked for this viewport: one page at a time on a small landscape screen.
    pub fn preferred_mode(&self, breakpoint: u32) -> ViewMode {
        if self.is_compact(breakpoint) && self.is_landscape() {
            ViewMode::Paginated
        } else {
            ViewMode::Continuous
        }
    }
}

/// Side of the page area a click landed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClickZone {
    Previous,
    Next,
}

impl ClickZone {
    pub fn at(x: u32, width: u32) -> Self {
        if x < width / 2 {
            ClickZone::Previous
        } else {
            ClickZone::Next
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Exit,
}

#[derive(Debug, thiserror::Error)]
#[error("fullscreen request failed: {0}")]
pub struct FullscreenError(pub String);

/// Whatever owns the real fullscreen state.
pub trait FullscreenHost {
    fn is_fullscreen(&self) -> bool;
    fn request_fullscreen(&mut self) -> Result<(), FullscreenError>;
    fn exit_fullscreen(&mut self) -> Result<(), FullscreenError>;
}

#[derive(Clone, Copy, Debug, Default)]
struct Drag {
    start: Option<u32>,
    end: Option<u32>,
}

pub struct ReaderViewController {
    pages: Vec<Page>,
    view_mode: ViewMode,
    current_page: usize,
    controls_visible: bool,
    fullscreen: bool,
    distraction_free: bool,
    hide_deadline: Option<Instant>,
    pending_viewport: Option<(Viewport, Instant)>,
    drag: Drag,
    config: ReaderConfig,
}

impl ReaderViewController {
    pub fn new(pages: Vec<Page>, viewport: Viewport, config: ReaderConfig, now: Instant) -> Self {
        let view_mode = viewport.preferred_mode(config.compact_breakpoint);
        debug!(
            "reader opened: {} pages, {}x{} viewport, {:?}",
            pages.len(),
            viewport.width,
            viewport.height,
            view_mode
        );
        Self {
            pages,
            view_mode,
            current_page: 0,
            controls_visible: true,
            fullscreen: false,
            distraction_free: false,
            hide_deadline: Some(now + config.controls_timeout()),
            pending_viewport: None,
            drag: Drag::default(),
            config,
        }
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn current_page_index(&self) -> usize {
        self.current_page
    }

    /// `None` when the chapter has no pages.
    pub fn current_page(&self) -> Option<&Page> {
        self.pages.get(self.current_page)
    }

    pub fn controls_visible(&self) -> bool {
        self.controls_visible
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn is_distraction_free(&self) -> bool {
        self.distraction_free
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 0
    }

    pub fn has_next(&self) -> bool {
        self.current_page + 1 < self.pages.len()
    }

    pub fn hide_deadline(&self) -> Option<Instant> {
        self.hide_deadline
    }

    pub fn toggle_view_mode(&mut self) {
        self.view_mode = self.view_mode.toggled();
        debug!("view mode -> {:?}", self.view_mode);
    }

    pub fn next_page(&mut self) {
        if self.view_mode == ViewMode::Paginated && self.has_next() {
            self.current_page += 1;
        }
    }

    pub fn previous_page(&mut self) {
        if self.view_mode == ViewMode::Paginated && self.has_previous() {
            self.current_page -= 1;
        }
    }

    /// Mouse movement or a tap: show the controls and restart the hide timer.
    pub fn pointer_activity(&mut self, now: Instant) {
        if self.distraction_free {
            return;
        }
        self.controls_visible = true;
        self.hide_deadline = Some(now + self.config.controls_timeout());
    }

    pub fn handle_key(&mut self, key: KeyCode) -> Outcome {
        match key {
            KeyCode::Esc => return Outcome::Exit,
            KeyCode::Left | KeyCode::Char('a') | KeyCode::Char('A') => self.previous_page(),
            KeyCode::Right | KeyCode::Char('d') | KeyCode::Char('D') => self.next_page(),
            _ => {}
        }
        Outcome::Continue
    }

    /// Flips fullscreen through `host`; state follows the host's answer.
    pub fn toggle_fullscreen(&mut self, host: &mut dyn FullscreenHost) {
        let result = if host.is_fullscreen() {
            host.exit_fullscreen().map(|_| false)
        } else {
            host.request_fullscreen().map(|_| true)
        };
        match result {
            Ok(active) => self.fullscreen = active,
            Err(e) => warn!("{e}"),
        }
    }

    pub fn toggle_distraction_free(&mut self, now: Instant) {
        self.distraction_free = !self.distraction_free;
        if self.distraction_free {
            self.controls_visible = false;
            self.hide_deadline = None;
        } else {
            self.controls_visible = true;
            self.hide_deadline = Some(now + self.config.controls_timeout());
        }
    }

    pub fn resize(&mut self, viewport: Viewport) {
        self.pending_viewport = None;
        self.apply_viewport(viewport);
    }

    /// Re-evaluation is deferred until the viewport settles.
    pub fn orientation_changed(&mut self, viewport: Viewport, now: Instant) {
        self.pending_viewport = Some((viewport, now + self.config.orientation_settle()));
    }

    pub fn touch_start(&mut self, x: u32) {
        self.drag = Drag { start: Some(x), end: None };
    }

    pub fn touch_move(&mut self, x: u32) {
        self.drag.end = Some(x);
    }

    /// Ends a drag. Returns true when it counted as a swipe.
    pub fn touch_end(&mut self) -> bool {
        let Drag { start, end } = std::mem::take(&mut self.drag);
        let (Some(start), Some(end)) = (start, end) else {
            return false;
        };
        let distance = i64::from(start) - i64::from(end);
        let threshold = i64::from(self.config.swipe_threshold);
        if self.view_mode != ViewMode::Paginated {
            return false;
        }
        if distance > threshold {
            self.next_page();
            true
        } else if distance < -threshold {
            self.previous_page();
            true
        } else {
            false
        }
    }

    pub fn click(&mut self, x: u32, width: u32) {
        if self.view_mode != ViewMode::Paginated || self.pages.is_empty() {
            return;
        }
        match ClickZone::at(x, width) {
            ClickZone::Previous => self.previous_page(),
            ClickZone::Next => self.next_page(),
        }
    }

    /// Fires expired timers. Call on every loop iteration.
    pub fn tick(&mut self, now: Instant) {
        if let Some(deadline) = self.hide_deadline {
            if now >= deadline {
                self.controls_visible = false;
                self.hide_deadline = None;
            }
        }
        if let Some((viewport, due)) = self.pending_viewport {
            if now >= due {
                self.pending_viewport = None;
                self.apply_viewport(viewport);
            }
        }
    }

    /// Time until the next timer fires, if any is pending.
    pub fn next_timeout(&self, now: Instant) -> Option<Duration> {
        let due = [self.hide_deadline, self.pending_viewport.map(|(_, at)| at)]
            .into_iter()
            .flatten()
            .min()?;
        Some(due.saturating_duration_since(now))
    }

    fn apply_viewport(&mut self, viewport: Viewport) {
        let mode = viewport.preferred_mode(self.config.compact_breakpoint);
        if mode != self.view_mode {
            debug!("viewport {}x{} -> {:?}", viewport.width, viewport.height, mode);
            self.view_mode = mode;
        }
    }
}

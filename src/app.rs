use std::collections::HashMap;
use std::io::{self, Stdout};
use std::time::Instant;

use crossterm::event::{KeyCode, MouseButton, MouseEvent, MouseEventKind};
use log::{debug, info, warn};
use ratatui::style::Color;
use ratatui::widgets::ListState;
use ratatui_image::{picker::Picker, protocol::StatefulProtocol};
use tokio::sync::mpsc;

use crate::comments::{self, CommentNode};
use crate::config::Config;
use crate::models::{Chapter, ChapterId, CommentId, Manga, MangaId, PersonalEntry};
use crate::network::{Action, NetworkEvent};
use crate::personal;
use crate::reader::{FullscreenHost, Outcome, ReaderViewController, ViewMode, Viewport};
use crate::state::{AuthState, CommentThread};
use crate::terminal::{InputSubscription, TerminalFullscreen};

#[derive(Clone, Debug, PartialEq)]
pub enum AppState {
    Home,
    Searching,
    Loading,
    ResultsList,
    MangaDetail,
    Composing,
    Reading,
    PersonalList,
    Error(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetailFocus {
    Chapters,
    Comments,
}

pub struct ReaderSession {
    pub manga_id: MangaId,
    pub chapter_id: ChapterId,
    pub title: String,
    pub controller: ReaderViewController,
    pub scroll_offset: u16,
    page_rows: u16,
    press_x: Option<u32>,
    dragged: bool,
    _input: Option<InputSubscription<Stdout>>,
}

impl ReaderSession {
    /// Terminal rows one page occupies in continuous mode.
    pub fn page_rows(&self) -> u16 {
        self.page_rows
    }

    /// Called by the renderer with the height of the page area.
    pub fn set_page_rows(&mut self, rows: u16) {
        self.page_rows = rows.max(1);
        self.scroll_offset = self.scroll_offset.min(self.max_scroll());
    }

    /// Offset at which the last page sits at the top of the page area.
    pub fn max_scroll(&self) -> u16 {
        let pages = u16::try_from(self.controller.page_count().saturating_sub(1)).unwrap_or(u16::MAX);
        self.page_rows.saturating_mul(pages)
    }

    pub fn scroll_by(&mut self, delta: i32) {
        let next = (i32::from(self.scroll_offset) + delta).clamp(0, i32::from(self.max_scroll()));
        self.scroll_offset = next as u16;
    }
}

pub struct App {
    pub state: AppState,
    pub input: String,
    pub theme: Color,
    pub notice: Option<String>,
    pub config: Config,
    pub auth: AuthState,

    pub results_heading: String,
    pub mangas: Vec<Manga>,
    pub selected_index: usize,

    pub manga: Option<Manga>,
    pending_manga: Option<MangaId>,
    pub detail_focus: DetailFocus,
    pub chapter_list_state: ListState,
    pub thread: Option<CommentThread>,
    pub comment_list_state: ListState,
    pub reply_to: Option<CommentId>,

    pub personal: Vec<PersonalEntry>,
    pub personal_filter: usize,
    pub personal_list_state: ListState,

    pub reader: Option<ReaderSession>,
    pub viewport: Viewport,
    fullscreen: Box<dyn FullscreenHost>,
    capture_mouse: bool,

    pub image_picker: Picker,
    pub image_protocols: HashMap<String, StatefulProtocol>,

    action_tx: mpsc::UnboundedSender<Action>,
}

impl App {
    pub fn new(
        config: Config,
        image_picker: Picker,
        viewport: Viewport,
        action_tx: mpsc::UnboundedSender<Action>,
    ) -> Self {
        Self {
            state: AppState::Home,
            input: String::new(),
            theme: config.theme(),
            notice: None,
            config,
            auth: AuthState::anonymous(),
            results_heading: String::new(),
            mangas: Vec::new(),
            selected_index: 0,
            manga: None,
            pending_manga: None,
            detail_focus: DetailFocus::Chapters,
            chapter_list_state: ListState::default(),
            thread: None,
            comment_list_state: ListState::default(),
            reply_to: None,
            personal: Vec::new(),
            personal_filter: 0,
            personal_list_state: ListState::default(),
            reader: None,
            viewport,
            fullscreen: Box::new(TerminalFullscreen::new(io::stdout())),
            capture_mouse: false,
            image_picker,
            image_protocols: HashMap::new(),
            action_tx,
        }
    }

    /// Enables mouse capture for reader sessions opened from now on.
    pub fn with_mouse_capture(mut self) -> Self {
        self.capture_mouse = true;
        self
    }

    pub fn with_fullscreen_host(mut self, host: Box<dyn FullscreenHost>) -> Self {
        self.fullscreen = host;
        self
    }

    fn send(&self, action: Action) {
        if self.action_tx.send(action).is_err() {
            warn!("network loop is gone");
        }
    }

    pub fn on_network_event(&mut self, event: NetworkEvent, now: Instant) {
        match event {
            NetworkEvent::SignedIn(user) => {
                self.notice = Some(format!("Signed in as {}", user.username));
                self.auth = self.auth.signed_in(user);
            }
            NetworkEvent::SignedOut => {
                if self.auth.is_signed_in() {
                    self.notice = Some("Signed out".into());
                }
                self.auth = self.auth.signed_out();
            }
            NetworkEvent::MangasLoaded { heading, mangas } => {
                self.results_heading = heading;
                self.mangas = mangas;
                self.selected_index = 0;
                self.state = AppState::ResultsList;
            }
            NetworkEvent::MangaLoaded(manga) => {
                if self.thread.as_ref().map(CommentThread::manga_id) != Some(manga.id) {
                    self.thread = Some(CommentThread::empty(manga.id));
                    self.comment_list_state.select(None);
                }
                self.chapter_list_state
                    .select(if manga.chapters.is_empty() { None } else { Some(0) });
                if self.pending_manga == Some(manga.id) {
                    self.pending_manga = None;
                }
                self.manga = Some(manga);
                self.detail_focus = DetailFocus::Chapters;
                self.state = AppState::MangaDetail;
            }
            NetworkEvent::CommentsLoaded { manga_id, comments } => {
                let current = self.manga.as_ref().map(|m| m.id);
                if current != Some(manga_id) && self.pending_manga != Some(manga_id) {
                    return;
                }
                let thread = CommentThread::from_batch(manga_id, &comments);
                let rows = thread.total();
                let selected = match self.comment_list_state.selected() {
                    _ if rows == 0 => None,
                    Some(i) => Some(i.min(rows - 1)),
                    None => Some(0),
                };
                self.comment_list_state.select(selected);
                self.thread = Some(thread);
            }
            NetworkEvent::ChapterLoaded { manga_id, chapter_id, chapter } => {
                if self.state == AppState::Loading {
                    self.open_reader(manga_id, chapter_id, chapter, now);
                }
            }
            NetworkEvent::PageImageDownloaded(url, img) => {
                let wanted = self.reader.as_ref().is_some_and(|r| {
                    r.controller
                        .pages()
                        .iter()
                        .any(|p| p.image_url(&self.config.api_url) == url)
                });
                if wanted {
                    let protocol = self.image_picker.new_resize_protocol(img);
                    self.image_protocols.insert(url, protocol);
                }
            }
            NetworkEvent::PersonalListLoaded(entries) => {
                self.personal = entries;
                let len = self.visible_personal().len();
                self.personal_list_state
                    .select(if len == 0 { None } else { Some(0) });
                if matches!(self.state, AppState::Loading | AppState::PersonalList) {
                    self.state = AppState::PersonalList;
                }
            }
            NetworkEvent::ThemeUpdate(color) => self.theme = color,
            NetworkEvent::Notice(msg) => self.notice = Some(msg),
            NetworkEvent::Error(msg) => {
                if self.state == AppState::Loading {
                    self.state = AppState::Error(msg);
                } else {
                    self.notice = Some(msg);
                }
            }
        }
    }

    pub fn on_tick(&mut self, now: Instant) {
        if let Some(reader) = self.reader.as_mut() {
            reader.controller.tick(now);
        }
    }

    pub fn on_resize(&mut self, viewport: Viewport, now: Instant) {
        let flipped = viewport.is_landscape() != self.viewport.is_landscape();
        self.viewport = viewport;
        if let Some(reader) = self.reader.as_mut() {
            if flipped {
                reader.controller.orientation_changed(viewport, now);
            } else {
                reader.controller.resize(viewport);
            }
        }
    }

    fn open_reader(&mut self, manga_id: MangaId, chapter_id: ChapterId, chapter: Chapter, now: Instant) {
        let input = if self.capture_mouse {
            match InputSubscription::acquire(io::stdout()) {
                Ok(sub) => Some(sub),
                Err(e) => {
                    warn!("mouse capture unavailable: {e}");
                    None
                }
            }
        } else {
            None
        };

        let summary_number = self
            .manga
            .as_ref()
            .and_then(|m| m.chapters.iter().find(|c| c.id == chapter_id))
            .map(|c| c.number);
        let number = chapter.number.or(summary_number).unwrap_or(0.0);
        let title = match self.manga.as_ref() {
            Some(m) => format!("{} - Chapter {}", m.title, format_number(number)),
            None => format!("Chapter {}", format_number(number)),
        };

        self.image_protocols.clear();
        for page in &chapter.pages {
            self.send(Action::DownloadImage(page.image_url(&self.config.api_url)));
        }
        if self.auth.is_signed_in() {
            self.send(Action::MarkChapterRead { manga_id, chapter_id, number });
        }

        info!("reading {title}");
        let controller =
            ReaderViewController::new(chapter.pages, self.viewport, self.config.reader.clone(), now);
        self.reader = Some(ReaderSession {
            manga_id,
            chapter_id,
            title,
            controller,
            scroll_offset: 0,
            page_rows: self.viewport_rows().saturating_sub(2).max(1),
            press_x: None,
            dragged: false,
            _input: input,
        });
        self.state = AppState::Reading;
    }

    fn close_reader(&mut self) {
        if let Some(reader) = self.reader.take() {
            debug!("closing reader for chapter {}", reader.chapter_id);
        }
        if self.fullscreen.is_fullscreen() {
            if let Err(e) = self.fullscreen.exit_fullscreen() {
                warn!("{e}");
            }
        }
        self.image_protocols.clear();
        self.state = if self.manga.is_some() {
            AppState::MangaDetail
        } else {
            AppState::Home
        };
    }

    pub fn handle_key(&mut self, key: KeyCode, now: Instant) -> bool {
        if !matches!(self.state, AppState::Searching | AppState::Composing) {
            self.notice = None;
        }
        match self.state {
            AppState::Reading => return self.handle_reader_key(key, now),
            AppState::Searching => match key {
                KeyCode::Esc => {
                    self.state = AppState::Home;
                    self.input.clear();
                }
                KeyCode::Enter => {
                    self.state = AppState::Loading;
                    self.send(Action::Search(self.input.trim().to_string()));
                }
                KeyCode::Backspace => {
                    self.input.pop();
                }
                KeyCode::Char(c) => self.input.push(c),
                _ => {}
            },
            AppState::Composing => match key {
                KeyCode::Esc => {
                    self.input.clear();
                    self.reply_to = None;
                    self.state = AppState::MangaDetail;
                }
                KeyCode::Enter => {
                    let text = self.input.trim().to_string();
                    if let (false, Some(manga)) = (text.is_empty(), self.manga.as_ref()) {
                        self.send(Action::PostComment {
                            manga_id: manga.id,
                            text,
                            parent: self.reply_to,
                        });
                        self.input.clear();
                        self.reply_to = None;
                        self.state = AppState::MangaDetail;
                    }
                }
                KeyCode::Backspace => {
                    self.input.pop();
                }
                KeyCode::Char(c) => self.input.push(c),
                _ => {}
            },
            AppState::MangaDetail => return self.handle_detail_key(key),
            AppState::PersonalList => match key {
                KeyCode::Char('q') => return true,
                KeyCode::Esc => self.state = AppState::Home,
                KeyCode::Tab => {
                    self.personal_filter = (self.personal_filter + 1) % personal::FILTERS.len();
                    let len = self.visible_personal().len();
                    self.personal_list_state
                        .select(if len == 0 { None } else { Some(0) });
                }
                KeyCode::Char('j') | KeyCode::Down => {
                    let len = self.visible_personal().len();
                    step(&mut self.personal_list_state, len, 1);
                }
                KeyCode::Char('k') | KeyCode::Up => {
                    let len = self.visible_personal().len();
                    step(&mut self.personal_list_state, len, -1);
                }
                KeyCode::Enter => {
                    if let Some(id) = self.selected_personal().map(|e| e.id) {
                        self.open_manga(id);
                    }
                }
                KeyCode::Char('x') => {
                    if let Some(id) = self.selected_personal().map(|e| e.id) {
                        self.send(Action::RemoveFromPersonalList(id));
                    }
                }
                _ => {}
            },
            _ => match key {
                KeyCode::Char('q') => return true,
                KeyCode::Esc => self.state = AppState::Home,
                KeyCode::Char('/') => {
                    self.input.clear();
                    self.state = AppState::Searching;
                }
                KeyCode::Char('b') => {
                    self.state = AppState::Loading;
                    self.send(Action::Search(String::new()));
                }
                KeyCode::Char('R') if self.auth.is_signed_in() => {
                    self.state = AppState::Loading;
                    self.send(Action::Recommendations);
                }
                KeyCode::Char('p') if self.auth.is_signed_in() => {
                    self.state = AppState::Loading;
                    self.send(Action::FetchPersonalList);
                }
                KeyCode::Enter => {
                    if let AppState::ResultsList = self.state {
                        self.select_item()
                    }
                }
                KeyCode::Char('j') | KeyCode::Down => self.move_down(),
                KeyCode::Char('k') | KeyCode::Up => self.move_up(),
                _ => {}
            },
        }
        false
    }

    fn handle_detail_key(&mut self, key: KeyCode) -> bool {
        let Some(manga_id) = self.manga.as_ref().map(|m| m.id) else {
            self.state = AppState::Home;
            return false;
        };
        match key {
            KeyCode::Char('q') => return true,
            KeyCode::Esc => {
                self.state = if self.mangas.is_empty() {
                    AppState::Home
                } else {
                    AppState::ResultsList
                };
            }
            KeyCode::Tab => {
                self.detail_focus = match self.detail_focus {
                    DetailFocus::Chapters => DetailFocus::Comments,
                    DetailFocus::Comments => DetailFocus::Chapters,
                };
            }
            KeyCode::Char('j') | KeyCode::Down => self.move_detail(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_detail(-1),
            KeyCode::Enter if self.detail_focus == DetailFocus::Chapters => {
                let chapter_id = self
                    .manga
                    .as_ref()
                    .zip(self.chapter_list_state.selected())
                    .and_then(|(m, i)| m.chapters.get(i))
                    .map(|c| c.id);
                if let Some(chapter_id) = chapter_id {
                    self.state = AppState::Loading;
                    self.send(Action::FetchChapter { manga_id, chapter_id });
                }
            }
            KeyCode::Char('a') if self.auth.is_signed_in() => {
                self.send(Action::AddToPersonalList(manga_id));
            }
            KeyCode::Char('n') if self.auth.is_signed_in() => {
                self.input.clear();
                self.reply_to = None;
                self.state = AppState::Composing;
            }
            KeyCode::Char('r') => {
                let target = self
                    .selected_comment()
                    .filter(|(depth, _)| comments::can_reply(*depth, self.auth.is_signed_in()))
                    .map(|(_, node)| node.id());
                match target {
                    Some(id) => {
                        self.input.clear();
                        self.reply_to = Some(id);
                        self.state = AppState::Composing;
                    }
                    None if self.auth.is_signed_in() => {
                        self.notice = Some("Reply limit reached".into());
                    }
                    None => self.notice = Some("Sign in to reply".into()),
                }
            }
            KeyCode::Char('l') if self.auth.is_signed_in() => {
                if let Some(comment_id) = self.selected_comment().map(|(_, n)| n.id()) {
                    self.send(Action::LikeComment { manga_id, comment_id });
                }
            }
            KeyCode::Char('x') => {
                let owned = self
                    .selected_comment()
                    .filter(|(_, n)| self.auth.owns(&n.comment))
                    .map(|(_, n)| n.id());
                if let Some(comment_id) = owned {
                    self.send(Action::DeleteComment { manga_id, comment_id });
                }
            }
            _ => {}
        }
        false
    }

    fn handle_reader_key(&mut self, key: KeyCode, now: Instant) -> bool {
        let Some(reader) = self.reader.as_mut() else {
            self.close_reader();
            return false;
        };
        reader.controller.pointer_activity(now);
        match key {
            KeyCode::Char('q') => return true,
            KeyCode::Char('v') => reader.controller.toggle_view_mode(),
            KeyCode::Char('f') => reader.controller.toggle_fullscreen(self.fullscreen.as_mut()),
            KeyCode::Char('z') => reader.controller.toggle_distraction_free(now),
            KeyCode::Char('j') | KeyCode::Down
                if reader.controller.view_mode() == ViewMode::Continuous =>
            {
                reader.scroll_by(1);
            }
            KeyCode::Char('k') | KeyCode::Up
                if reader.controller.view_mode() == ViewMode::Continuous =>
            {
                reader.scroll_by(-1);
            }
            other => {
                if reader.controller.handle_key(other) == Outcome::Exit {
                    self.close_reader();
                }
            }
        }
        false
    }

    /// Mouse events only arrive while a reader session holds the capture.
    pub fn handle_mouse(&mut self, mouse: MouseEvent, now: Instant) {
        let font = self.image_picker.font_size();
        let width = self.viewport.width;
        let Some(reader) = self.reader.as_mut() else { return };
        let x = u32::from(mouse.column) * u32::from(font.0);
        match mouse.kind {
            MouseEventKind::Moved => reader.controller.pointer_activity(now),
            MouseEventKind::Down(MouseButton::Left) => {
                reader.controller.pointer_activity(now);
                reader.controller.touch_start(x);
                reader.press_x = Some(x);
                reader.dragged = false;
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                reader.controller.touch_move(x);
                reader.dragged = true;
            }
            MouseEventKind::Up(MouseButton::Left) => {
                let swiped = reader.controller.touch_end();
                if let (false, false, Some(at)) = (swiped, reader.dragged, reader.press_x) {
                    reader.controller.click(at, width);
                }
                reader.press_x = None;
                reader.dragged = false;
            }
            MouseEventKind::ScrollDown if reader.controller.view_mode() == ViewMode::Continuous => {
                reader.scroll_by(3);
            }
            MouseEventKind::ScrollUp if reader.controller.view_mode() == ViewMode::Continuous => {
                reader.scroll_by(-3);
            }
            _ => {}
        }
    }

    fn viewport_rows(&self) -> u16 {
        let cell_height = u32::from(self.image_picker.font_size().1.max(1));
        (self.viewport.height / cell_height).clamp(1, u32::from(u16::MAX)) as u16
    }

    fn open_manga(&mut self, id: MangaId) {
        self.state = AppState::Loading;
        self.pending_manga = Some(id);
        self.send(Action::FetchManga(id));
        self.send(Action::FetchComments(id));
    }

    fn move_down(&mut self) {
        if let AppState::ResultsList = self.state {
            if !self.mangas.is_empty() && self.selected_index < self.mangas.len() - 1 {
                self.selected_index += 1;
            }
        }
    }

    fn move_up(&mut self) {
        if let AppState::ResultsList = self.state {
            if self.selected_index > 0 {
                self.selected_index -= 1;
            }
        }
    }

    fn select_item(&mut self) {
        if let Some(id) = self.mangas.get(self.selected_index).map(|m| m.id) {
            self.open_manga(id);
        }
    }

    fn move_detail(&mut self, delta: isize) {
        match self.detail_focus {
            DetailFocus::Chapters => {
                let len = self.manga.as_ref().map_or(0, |m| m.chapters.len());
                step(&mut self.chapter_list_state, len, delta);
            }
            DetailFocus::Comments => {
                let len = self.thread.as_ref().map_or(0, CommentThread::total);
                step(&mut self.comment_list_state, len, delta);
            }
        }
    }

    pub fn selected_comment(&self) -> Option<(usize, &CommentNode)> {
        let thread = self.thread.as_ref()?;
        let index = self.comment_list_state.selected()?;
        thread.rows().into_iter().nth(index)
    }

    pub fn visible_personal(&self) -> Vec<&PersonalEntry> {
        personal::filtered_by_score(&self.personal, personal::FILTERS[self.personal_filter])
    }

    fn selected_personal(&self) -> Option<&PersonalEntry> {
        let index = self.personal_list_state.selected()?;
        self.visible_personal().into_iter().nth(index)
    }
}

fn step(state: &mut ListState, len: usize, delta: isize) {
    if len == 0 {
        state.select(None);
        return;
    }
    let current = state.selected().unwrap_or(0) as isize;
    let next = (current + delta).clamp(0, len as isize - 1);
    state.select(Some(next as usize));
}

pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    use crossterm::event::KeyModifiers;

    use crate::models::{Comment, Page, User};
    use crate::reader::FullscreenError;

    fn app() -> (App, mpsc::UnboundedReceiver<Action>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let picker = Picker::from_fontsize((10, 20));
        let app = App::new(Config::default(), picker, Viewport::new(1920, 1080), tx);
        (app, rx)
    }

    fn manga(id: MangaId) -> Manga {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "titulo": "Vagabond",
            "capitulos": [{"id": 100, "numero": 1}, {"id": 101, "numero": 2}]
        }))
        .unwrap()
    }

    fn comment(id: CommentId, parent_id: Option<CommentId>, user_id: u64) -> Comment {
        Comment {
            id,
            parent_id,
            user_id: Some(user_id),
            author_name: "x".into(),
            body: "y".into(),
            created_at: None,
            like_count: 0,
        }
    }

    fn sign_in(app: &mut App, user_id: u64) {
        let user = User { id: user_id, username: "me".into(), email: None };
        app.on_network_event(NetworkEvent::SignedIn(user), Instant::now());
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Action>) -> Vec<Action> {
        let mut out = Vec::new();
        while let Ok(a) = rx.try_recv() {
            out.push(a);
        }
        out
    }

    fn chapter(pages: usize) -> Chapter {
        Chapter {
            id: Some(100),
            number: Some(1.0),
            title: None,
            pages: (0..pages)
                .map(|i| Page { url: format!("/p/{i}.png"), number: None })
                .collect(),
        }
    }

    #[test]
    fn chapter_opens_reader_and_escape_returns_to_detail() {
        let (mut app, mut rx) = app();
        let now = Instant::now();
        app.on_network_event(NetworkEvent::MangaLoaded(manga(1)), now);
        assert_eq!(app.state, AppState::MangaDetail);

        app.handle_key(KeyCode::Enter, now);
        assert_eq!(app.state, AppState::Loading);
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [Action::FetchChapter { manga_id: 1, chapter_id: 100 }]
        ));

        app.on_network_event(
            NetworkEvent::ChapterLoaded { manga_id: 1, chapter_id: 100, chapter: chapter(2) },
            now,
        );
        assert_eq!(app.state, AppState::Reading);
        let downloads = drain(&mut rx);
        assert_eq!(downloads.len(), 2);
        assert!(matches!(&downloads[0], Action::DownloadImage(url) if url == "http://localhost:3000/p/0.png"));

        app.handle_key(KeyCode::Esc, now);
        assert_eq!(app.state, AppState::MangaDetail);
        assert!(app.reader.is_none());
    }

    #[test]
    fn signed_in_reader_marks_chapter_read() {
        let (mut app, mut rx) = app();
        let now = Instant::now();
        sign_in(&mut app, 3);
        app.on_network_event(NetworkEvent::MangaLoaded(manga(1)), now);
        app.handle_key(KeyCode::Enter, now);
        drain(&mut rx);

        app.on_network_event(
            NetworkEvent::ChapterLoaded { manga_id: 1, chapter_id: 100, chapter: chapter(0) },
            now,
        );
        let actions = drain(&mut rx);
        assert!(matches!(
            actions.as_slice(),
            [Action::MarkChapterRead { manga_id: 1, chapter_id: 100, .. }]
        ));
        assert!(app.reader.as_ref().unwrap().controller.current_page().is_none());
    }

    #[test]
    fn comments_reload_rebuilds_thread() {
        let (mut app, _rx) = app();
        let now = Instant::now();
        app.on_network_event(NetworkEvent::MangaLoaded(manga(1)), now);
        app.on_network_event(
            NetworkEvent::CommentsLoaded {
                manga_id: 1,
                comments: vec![comment(1, None, 3), comment(2, Some(1), 4), comment(3, Some(99), 3)],
            },
            now,
        );
        let thread = app.thread.as_ref().unwrap();
        assert_eq!(thread.total(), 3);
        assert_eq!(thread.roots().len(), 2);
        assert_eq!(app.comment_list_state.selected(), Some(0));

        app.on_network_event(
            NetworkEvent::CommentsLoaded { manga_id: 2, comments: vec![] },
            now,
        );
        assert_eq!(app.thread.as_ref().unwrap().total(), 3);
    }

    #[test]
    fn comments_arriving_before_manga_are_kept() {
        let (mut app, mut rx) = app();
        let now = Instant::now();
        app.on_network_event(
            NetworkEvent::MangasLoaded { heading: "Catalog".into(), mangas: vec![manga(7)] },
            now,
        );
        app.handle_key(KeyCode::Enter, now);
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [Action::FetchManga(7), Action::FetchComments(7)]
        ));

        app.on_network_event(
            NetworkEvent::CommentsLoaded { manga_id: 7, comments: vec![comment(1, None, 3)] },
            now,
        );
        app.on_network_event(NetworkEvent::MangaLoaded(manga(7)), now);
        assert_eq!(app.state, AppState::MangaDetail);
        assert_eq!(app.thread.as_ref().unwrap().total(), 1);
    }

    #[test]
    fn delete_only_own_comments() {
        let (mut app, mut rx) = app();
        let now = Instant::now();
        sign_in(&mut app, 3);
        app.on_network_event(NetworkEvent::MangaLoaded(manga(1)), now);
        app.on_network_event(
            NetworkEvent::CommentsLoaded {
                manga_id: 1,
                comments: vec![comment(1, None, 4), comment(2, None, 3)],
            },
            now,
        );
        app.handle_key(KeyCode::Tab, now);

        app.handle_key(KeyCode::Char('x'), now);
        assert!(drain(&mut rx).is_empty());

        app.handle_key(KeyCode::Char('j'), now);
        app.handle_key(KeyCode::Char('x'), now);
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [Action::DeleteComment { manga_id: 1, comment_id: 2 }]
        ));
    }

    #[test]
    fn reply_is_refused_at_max_depth() {
        let (mut app, mut rx) = app();
        let now = Instant::now();
        sign_in(&mut app, 3);
        app.on_network_event(NetworkEvent::MangaLoaded(manga(1)), now);
        let chain: Vec<Comment> = (1..=5)
            .map(|id| comment(id, if id == 1 { None } else { Some(id - 1) }, 3))
            .collect();
        app.on_network_event(NetworkEvent::CommentsLoaded { manga_id: 1, comments: chain }, now);
        app.handle_key(KeyCode::Tab, now);
        for _ in 0..4 {
            app.handle_key(KeyCode::Down, now);
        }
        assert_eq!(app.selected_comment().map(|(d, _)| d), Some(comments::MAX_DEPTH));

        app.handle_key(KeyCode::Char('r'), now);
        assert_eq!(app.state, AppState::MangaDetail);
        assert_eq!(app.notice.as_deref(), Some("Reply limit reached"));

        app.handle_key(KeyCode::Up, now);
        app.handle_key(KeyCode::Char('r'), now);
        assert_eq!(app.state, AppState::Composing);
        for c in "hola".chars() {
            app.handle_key(KeyCode::Char(c), now);
        }
        app.handle_key(KeyCode::Enter, now);
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [Action::PostComment { manga_id: 1, parent: Some(4), text }] if text == "hola"
        ));
    }

    #[test]
    fn failed_load_shows_error_screen() {
        let (mut app, _rx) = app();
        let now = Instant::now();
        app.handle_key(KeyCode::Char('b'), now);
        assert_eq!(app.state, AppState::Loading);
        app.on_network_event(NetworkEvent::Error("boom".into()), now);
        assert_eq!(app.state, AppState::Error("boom".into()));
        app.handle_key(KeyCode::Esc, now);
        assert_eq!(app.state, AppState::Home);
    }

    #[test]
    fn personal_list_cycles_filters() {
        let (mut app, _rx) = app();
        let now = Instant::now();
        let entries: Vec<PersonalEntry> = serde_json::from_value(serde_json::json!([
            {"id": 1, "titulo": "a", "mi_estado": "leyendo", "mi_puntuacion": 7},
            {"id": 2, "titulo": "b", "mi_estado": "completado", "mi_puntuacion": 9}
        ]))
        .unwrap();
        app.state = AppState::Loading;
        app.on_network_event(NetworkEvent::PersonalListLoaded(entries), now);
        assert_eq!(app.state, AppState::PersonalList);
        assert_eq!(app.visible_personal().len(), 2);
        assert_eq!(app.visible_personal()[0].id, 2);

        app.handle_key(KeyCode::Tab, now);
        let ids: Vec<u64> = app.visible_personal().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1]);
    }

    fn open_chapter(app: &mut App, pages: usize, now: Instant) {
        app.on_network_event(NetworkEvent::MangaLoaded(manga(1)), now);
        app.handle_key(KeyCode::Enter, now);
        app.on_network_event(
            NetworkEvent::ChapterLoaded { manga_id: 1, chapter_id: 100, chapter: chapter(pages) },
            now,
        );
        assert_eq!(app.state, AppState::Reading);
    }

    fn wheel(kind: MouseEventKind) -> MouseEvent {
        MouseEvent { kind, column: 5, row: 5, modifiers: KeyModifiers::NONE }
    }

    #[test]
    fn continuous_scroll_stops_at_last_page() {
        let (mut app, _rx) = app();
        let now = Instant::now();
        open_chapter(&mut app, 2, now);
        let reader = app.reader.as_mut().unwrap();
        assert_eq!(reader.controller.view_mode(), ViewMode::Continuous);
        reader.set_page_rows(40);

        for _ in 0..30_000 {
            app.handle_mouse(wheel(MouseEventKind::ScrollDown), now);
        }
        assert_eq!(app.reader.as_ref().unwrap().scroll_offset, 40);

        app.handle_key(KeyCode::Char('j'), now);
        assert_eq!(app.reader.as_ref().unwrap().scroll_offset, 40);
        app.handle_key(KeyCode::Char('k'), now);
        assert_eq!(app.reader.as_ref().unwrap().scroll_offset, 39);

        let reader = app.reader.as_mut().unwrap();
        reader.set_page_rows(20);
        assert_eq!(reader.scroll_offset, 20);
        for _ in 0..100 {
            app.handle_mouse(wheel(MouseEventKind::ScrollUp), now);
        }
        assert_eq!(app.reader.as_ref().unwrap().scroll_offset, 0);
    }

    struct SharedHost(Rc<Cell<bool>>);

    impl FullscreenHost for SharedHost {
        fn is_fullscreen(&self) -> bool {
            self.0.get()
        }

        fn request_fullscreen(&mut self) -> Result<(), FullscreenError> {
            self.0.set(true);
            Ok(())
        }

        fn exit_fullscreen(&mut self) -> Result<(), FullscreenError> {
            self.0.set(false);
            Ok(())
        }
    }

    #[test]
    fn closing_reader_leaves_fullscreen() {
        let (app, _rx) = app();
        let active = Rc::new(Cell::new(false));
        let mut app = app.with_fullscreen_host(Box::new(SharedHost(active.clone())));
        let now = Instant::now();

        open_chapter(&mut app, 1, now);
        app.handle_key(KeyCode::Char('f'), now);
        assert!(active.get());
        assert!(app.reader.as_ref().unwrap().controller.is_fullscreen());

        app.handle_key(KeyCode::Esc, now);
        assert!(!active.get());

        open_chapter(&mut app, 1, now);
        app.handle_key(KeyCode::Char('f'), now);
        assert!(active.get());
        assert!(app.reader.as_ref().unwrap().controller.is_fullscreen());
    }

    #[test]
    fn chapter_number_formatting() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(10.5), "10.5");
    }
}

use std::time::{Duration, Instant};

use crossterm::event::KeyCode;
use rmanga::config::ReaderConfig;
use rmanga::models::Page;
use rmanga::reader::{FullscreenError, FullscreenHost, Outcome, ReaderViewController, ViewMode, Viewport};

const DESKTOP: Viewport = Viewport { width: 1440, height: 900 };
const PHONE_LANDSCAPE: Viewport = Viewport { width: 740, height: 360 };

fn pages(n: usize) -> Vec<Page> {
    (1..=n)
        .map(|i| Page { url: format!("/uploads/{i}.jpg"), number: Some(i as u32) })
        .collect()
}

fn paginated(n: usize, now: Instant) -> ReaderViewController {
    ReaderViewController::new(pages(n), PHONE_LANDSCAPE, ReaderConfig::default(), now)
}

struct Window {
    fullscreen: bool,
    refuse: bool,
}

impl FullscreenHost for Window {
    fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    fn request_fullscreen(&mut self) -> Result<(), FullscreenError> {
        if self.refuse {
            return Err(FullscreenError("denied".into()));
        }
        self.fullscreen = true;
        Ok(())
    }

    fn exit_fullscreen(&mut self) -> Result<(), FullscreenError> {
        self.fullscreen = false;
        Ok(())
    }
}

#[test]
fn initial_mode_follows_the_viewport() {
    let now = Instant::now();
    let desktop = ReaderViewController::new(pages(3), DESKTOP, ReaderConfig::default(), now);
    assert_eq!(desktop.view_mode(), ViewMode::Continuous);
    assert_eq!(paginated(3, now).view_mode(), ViewMode::Paginated);
}

#[test]
fn four_nexts_over_three_pages_stop_at_the_last() {
    let mut reader = paginated(3, Instant::now());
    for _ in 0..4 {
        reader.handle_key(KeyCode::Right);
    }
    assert_eq!(reader.current_page_index(), 2);
    assert!(!reader.has_next());
}

#[test]
fn index_stays_clamped_in_both_directions() {
    let n = 6;
    let mut reader = paginated(n, Instant::now());
    for _ in 0..n + 5 {
        reader.next_page();
        assert!(reader.current_page_index() < n);
    }
    assert_eq!(reader.current_page_index(), n - 1);
    for _ in 0..n + 5 {
        reader.previous_page();
    }
    assert_eq!(reader.current_page_index(), 0);
}

#[test]
fn escape_exits_without_touching_the_page() {
    let mut reader = paginated(3, Instant::now());
    reader.next_page();
    assert_eq!(reader.handle_key(KeyCode::Esc), Outcome::Exit);
    assert_eq!(reader.current_page_index(), 1);
}

#[test]
fn controls_hide_after_inactivity_and_return_on_activity() {
    let start = Instant::now();
    let mut reader = paginated(3, start);
    assert!(reader.controls_visible());

    reader.tick(start + Duration::from_millis(2999));
    assert!(reader.controls_visible());
    reader.tick(start + Duration::from_millis(3000));
    assert!(!reader.controls_visible());

    let later = start + Duration::from_secs(10);
    reader.pointer_activity(later);
    assert!(reader.controls_visible());
    assert_eq!(reader.next_timeout(later), Some(Duration::from_millis(3000)));
}

#[test]
fn distraction_free_ignores_activity_until_turned_off() {
    let start = Instant::now();
    let mut reader = paginated(3, start);
    reader.toggle_distraction_free(start);
    assert!(!reader.controls_visible());

    reader.pointer_activity(start + Duration::from_millis(10));
    assert!(!reader.controls_visible());
    assert_eq!(reader.next_timeout(start), None);

    reader.toggle_distraction_free(start + Duration::from_millis(20));
    assert!(reader.controls_visible());
}

#[test]
fn fullscreen_state_follows_the_host() {
    let mut reader = paginated(2, Instant::now());
    let mut window = Window { fullscreen: false, refuse: false };
    reader.toggle_fullscreen(&mut window);
    assert!(reader.is_fullscreen());
    reader.toggle_fullscreen(&mut window);
    assert!(!reader.is_fullscreen());

    let mut locked = Window { fullscreen: false, refuse: true };
    reader.toggle_fullscreen(&mut locked);
    assert!(!reader.is_fullscreen());
}

#[test]
fn swipe_turns_pages_only_past_the_threshold() {
    let mut reader = paginated(3, Instant::now());
    reader.touch_start(300);
    reader.touch_move(260);
    assert!(!reader.touch_end());
    assert_eq!(reader.current_page_index(), 0);

    reader.touch_start(300);
    reader.touch_move(200);
    assert!(reader.touch_end());
    assert_eq!(reader.current_page_index(), 1);

    reader.touch_start(100);
    reader.touch_move(220);
    assert!(reader.touch_end());
    assert_eq!(reader.current_page_index(), 0);
}

#[test]
fn rotation_is_applied_after_settling() {
    let start = Instant::now();
    let mut reader = paginated(3, start);
    let portrait = Viewport::new(360, 740);
    reader.orientation_changed(portrait, start);
    assert_eq!(reader.view_mode(), ViewMode::Paginated);

    reader.tick(start + Duration::from_millis(100));
    assert_eq!(reader.view_mode(), ViewMode::Continuous);
}

#[test]
fn empty_chapter_has_no_current_page() {
    let mut reader = paginated(0, Instant::now());
    reader.next_page();
    reader.click(600, 740);
    assert!(reader.current_page().is_none());
    assert_eq!(reader.current_page_index(), 0);
}

//! Map tooltip visibility.
//!
//! One tooltip per map view. Moving the pointer off a marker does not hide the
//! tooltip right away: a [`HIDE_DELAY`] deadline is armed instead, so the
//! pointer can cross the gap between marker and tooltip. While the pointer sits
//! on the tooltip itself the tooltip is locked and no deadline runs.
//!
//! | from                 | input          | to                                  |
//! |----------------------|----------------|-------------------------------------|
//! | any                  | enter marker p | `Visible(p)`, deadline cleared       |
//! | `Visible(p)`         | leave marker   | `Visible(p)`, deadline armed         |
//! | `Visible(p)`         | deadline hit   | `Hidden`                             |
//! | `Visible(p)`         | enter tooltip  | `VisibleLocked(p)`, deadline cleared |
//! | `VisibleLocked(p)`   | leave tooltip  | `Visible(p)`, deadline armed         |
//! | `Visible*(p)`        | close          | `Hidden`, deadline cleared           |
//!
//! Time is passed in by the caller; [`HoverController::poll`] fires an
//! expired deadline.

use std::time::{Duration, Instant};

pub const HIDE_DELAY: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HoverState {
    #[default]
    Hidden,
    Visible(String),
    VisibleLocked(String),
}

impl HoverState {
    /// Place whose tooltip is on screen, if any.
    pub fn place_id(&self) -> Option<&str> {
        match self {
            HoverState::Hidden => None,
            HoverState::Visible(id) | HoverState::VisibleLocked(id) => Some(id),
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, HoverState::VisibleLocked(_))
    }
}

#[derive(Debug, Default)]
pub struct HoverController {
    state: HoverState,
    // The single outstanding hide timer.
    hide_at: Option<Instant>,
}

impl HoverController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &HoverState {
        &self.state
    }

    pub fn hide_deadline(&self) -> Option<Instant> {
        self.hide_at
    }

    pub fn enter_marker(&mut self, place_id: &str) {
        self.hide_at = None;
        self.state = HoverState::Visible(place_id.to_string());
    }

    pub fn leave_marker(&mut self, now: Instant) {
        if let HoverState::Visible(_) = self.state {
            self.arm(now);
        }
    }

    pub fn enter_tooltip(&mut self) {
        if let HoverState::Visible(id) = &self.state {
            self.state = HoverState::VisibleLocked(id.clone());
            self.hide_at = None;
        }
    }

    pub fn leave_tooltip(&mut self, now: Instant) {
        if let HoverState::VisibleLocked(id) = &self.state {
            self.state = HoverState::Visible(id.clone());
            self.arm(now);
        }
    }

    /// Explicit close, skipping the debounce.
    pub fn close(&mut self) {
        self.hide_at = None;
        self.state = HoverState::Hidden;
    }

    /// Fires the hide deadline if it has passed. Returns true when the tooltip was hidden.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.hide_at {
            Some(deadline) if now >= deadline => {
                self.hide_at = None;
                if let HoverState::Visible(_) = self.state {
                    self.state = HoverState::Hidden;
                    return true;
                }
                false
            }
            _ => false,
        }
    }

    /// Hides a tooltip whose place is no longer on the map.
    pub fn retain_visible<'a>(&mut self, mut visible_ids: impl Iterator<Item = &'a str>) {
        if let Some(id) = self.state.place_id() {
            if !visible_ids.any(|v| v == id) {
                self.close();
            }
        }
    }

    fn arm(&mut self, now: Instant) {
        self.hide_at = Some(now + HIDE_DELAY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(base: Instant, n: u64) -> Instant {
        base + Duration::from_millis(n)
    }

    fn visible(id: &str) -> HoverState {
        HoverState::Visible(id.to_string())
    }

    #[test]
    fn starts_hidden() {
        let hover = HoverController::new();
        assert_eq!(hover.state(), &HoverState::Hidden);
        assert_eq!(hover.hide_deadline(), None);
    }

    #[test]
    fn leaving_hides_after_delay() {
        let t0 = Instant::now();
        let mut hover = HoverController::new();
        hover.enter_marker("a");
        hover.leave_marker(ms(t0, 10));

        assert!(!hover.poll(ms(t0, 300)));
        assert_eq!(hover.state(), &visible("a"));

        assert!(hover.poll(ms(t0, 310)));
        assert_eq!(hover.state(), &HoverState::Hidden);
        assert_eq!(hover.hide_deadline(), None);
    }

    #[test]
    fn reentering_within_delay_never_hides() {
        let t0 = Instant::now();
        let mut hover = HoverController::new();

        hover.enter_marker("a");
        hover.leave_marker(ms(t0, 50));
        for t in (60..200).step_by(10) {
            hover.poll(ms(t0, t));
            assert_eq!(hover.state(), &visible("a"), "hidden at t={t}ms");
        }
        hover.enter_marker("a");
        for t in (200..1000).step_by(10) {
            hover.poll(ms(t0, t));
            assert_eq!(hover.state(), &visible("a"), "hidden at t={t}ms");
        }
    }

    #[test]
    fn switching_markers_skips_hidden() {
        let t0 = Instant::now();
        let mut hover = HoverController::new();
        hover.enter_marker("a");
        hover.leave_marker(ms(t0, 0));
        hover.enter_marker("b");

        assert_eq!(hover.state(), &visible("b"));
        assert_eq!(hover.hide_deadline(), None);
        assert!(!hover.poll(ms(t0, 1000)));
    }

    #[test]
    fn entering_another_marker_from_lock() {
        let mut hover = HoverController::new();
        hover.enter_marker("a");
        hover.enter_tooltip();
        hover.enter_marker("b");
        assert_eq!(hover.state(), &visible("b"));
    }

    #[test]
    fn tooltip_lock_suppresses_hide() {
        let t0 = Instant::now();
        let mut hover = HoverController::new();
        hover.enter_marker("a");
        hover.leave_marker(ms(t0, 0));
        hover.enter_tooltip();

        assert_eq!(hover.state(), &HoverState::VisibleLocked("a".to_string()));
        assert!(!hover.poll(ms(t0, 5_000)));
        assert!(hover.state().is_locked());

        // A stray marker-leave while locked must not arm the timer.
        hover.leave_marker(ms(t0, 5_000));
        assert_eq!(hover.hide_deadline(), None);
    }

    #[test]
    fn leaving_tooltip_rearms_delay() {
        let t0 = Instant::now();
        let mut hover = HoverController::new();
        hover.enter_marker("a");
        hover.enter_tooltip();
        hover.leave_tooltip(ms(t0, 1_000));

        assert_eq!(hover.state(), &visible("a"));
        assert_eq!(hover.hide_deadline(), Some(ms(t0, 1_300)));
        assert!(!hover.poll(ms(t0, 1_299)));
        assert!(hover.poll(ms(t0, 1_300)));
    }

    #[test]
    fn close_bypasses_debounce() {
        let mut hover = HoverController::new();
        hover.enter_marker("a");
        hover.enter_tooltip();
        hover.close();
        assert_eq!(hover.state(), &HoverState::Hidden);
        assert_eq!(hover.hide_deadline(), None);
    }

    #[test]
    fn rearming_replaces_previous_deadline() {
        let t0 = Instant::now();
        let mut hover = HoverController::new();
        hover.enter_marker("a");
        hover.leave_marker(ms(t0, 0));
        hover.leave_marker(ms(t0, 200));
        assert_eq!(hover.hide_deadline(), Some(ms(t0, 500)));
        assert!(!hover.poll(ms(t0, 400)));
    }

    #[test]
    fn tooltip_for_filtered_out_place_closes() {
        let mut hover = HoverController::new();
        hover.enter_marker("a");
        hover.retain_visible(["a", "b"].into_iter());
        assert_eq!(hover.state(), &visible("a"));

        hover.retain_visible(["b"].into_iter());
        assert_eq!(hover.state(), &HoverState::Hidden);
    }
}

use crate::api::{Backend, Submission};
use crate::config::Config;
use crate::dialogs::{CheckInDraft, CheckInStep, Dialog, RatingDraft, StockDraft};
use crate::error::GeolocationFailure;
use crate::events::Event;
use crate::filters::{FilterStore, StoreNotice};
use crate::hover::HoverController;
use crate::location::{LocationProvider, PositionOptions};
use crate::models::{Coordinates, Place, ACCESSORY_CATALOG, BRAND_CATALOG};
use crate::scheduler::FilterScheduler;
use crate::toast::{ToastLevel, Toasts};
use crate::viewport::{contains, Viewport};
use crossterm::event::{KeyCode, KeyEvent, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::{Margin, Rect};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum Focus {
    #[default]
    Filters,
    Places,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum PlacesState {
    Loading,
    Ready,
    /// Blocking: nothing to filter until the user retries.
    Failed(String),
}

/// One line of the filter panel.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FilterRow {
    OpenNow,
    NearMe,
    Brand(usize),
    Accessory(usize),
}

impl FilterRow {
    pub fn all() -> impl Iterator<Item = FilterRow> {
        [FilterRow::OpenNow, FilterRow::NearMe]
            .into_iter()
            .chain((0..BRAND_CATALOG.len()).map(FilterRow::Brand))
            .chain((0..ACCESSORY_CATALOG.len()).map(FilterRow::Accessory))
    }

    pub fn count() -> usize {
        2 + BRAND_CATALOG.len() + ACCESSORY_CATALOG.len()
    }

    pub fn at(index: usize) -> Option<FilterRow> {
        Self::all().nth(index)
    }
}

// What the mouse pointer is currently over on the map.
#[derive(Debug, PartialEq, Eq, Clone)]
enum Pointer {
    Outside,
    Marker(String),
    Tooltip,
}

pub struct App {
    pub config: Config,
    pub should_quit: bool,
    pub focus: Focus,
    pub filter_cursor: usize,
    pub selected_index: usize,
    pub tick_count: usize,

    pub places_state: PlacesState,
    pub all_places: Arc<[Place]>,
    /// Output of the last completed filter pass.
    pub visible: Vec<Place>,

    pub filters: FilterStore,
    pub scheduler: FilterScheduler,
    pub hover: HoverController,
    pub toasts: Toasts,
    pub dialog: Option<Dialog>,

    /// Terminal size at the last draw; the mouse handler lays out against it.
    pub frame_area: Rect,

    backend: Arc<dyn Backend>,
    events: mpsc::UnboundedSender<Event>,
    pointer: Pointer,
    scheduled_revision: Option<u64>,
    fetch_task: Option<JoinHandle<()>>,
}

impl App {
    pub fn new(
        config: Config,
        backend: Arc<dyn Backend>,
        provider: Arc<dyn LocationProvider>,
        events: mpsc::UnboundedSender<Event>,
    ) -> Self {
        let options = PositionOptions::from(&config.location);
        let toast_duration = Duration::from_millis(config.ui.toast_duration_ms);

        Self {
            should_quit: false,
            focus: Focus::Filters,
            filter_cursor: 0,
            selected_index: 0,
            tick_count: 0,
            places_state: PlacesState::Loading,
            all_places: Arc::from(Vec::new()),
            visible: Vec::new(),
            filters: FilterStore::new(provider, options, events.clone()),
            scheduler: FilterScheduler::new(events.clone()),
            hover: HoverController::new(),
            toasts: Toasts::new(toast_duration),
            dialog: None,
            frame_area: Rect::default(),
            backend,
            events,
            pointer: Pointer::Outside,
            scheduled_revision: None,
            fetch_task: None,
            config,
        }
    }

    /// Starts (or restarts) fetching the place list.
    pub fn load_places(&mut self) {
        if let Some(task) = self.fetch_task.take() {
            task.abort();
        }
        self.clear_places();
        self.places_state = PlacesState::Loading;

        let backend = Arc::clone(&self.backend);
        let tx = self.events.clone();
        self.fetch_task = Some(tokio::spawn(async move {
            let result = backend.fetch_places().await;
            let _ = tx.send(Event::PlacesLoaded(result));
        }));
    }

    pub fn handle_event(&mut self, event: Event, now: Instant) {
        match event {
            Event::Tick => self.on_tick(now),
            Event::Input(key) => self.handle_key(key, now),
            Event::Mouse(mouse) => self.handle_mouse(mouse, now),
            Event::PlacesLoaded(Ok(places)) => {
                info!("Place list ready ({} places)", places.len());
                self.fetch_task = None;
                self.all_places = Arc::from(places);
                self.places_state = PlacesState::Ready;
                self.scheduled_revision = None;
                self.sync_filters(now);
            }
            Event::PlacesLoaded(Err(e)) => {
                error!("Could not load places: {}", e);
                self.fetch_task = None;
                self.clear_places();
                self.places_state = PlacesState::Failed(e.to_string());
                self.toasts
                    .push(ToastLevel::Error, "Could not load places. Press r to retry.", now);
            }
            Event::LocationResolved { request_id, result } => {
                self.filters.on_location_resolved(request_id, result);
                self.sync_filters(now);
            }
            Event::FilterResults { generation, places } => {
                if let Some(visible) = self.scheduler.on_results(generation, places) {
                    self.visible = visible;
                    // The map is refitted; the pointer has to re-enter whatever is under it.
                    self.move_pointer(Pointer::Outside, now);
                    if self.selected_index >= self.visible.len() {
                        self.selected_index = self.visible.len().saturating_sub(1);
                    }
                    self.hover
                        .retain_visible(self.visible.iter().map(|p| p.place_id.as_str()));
                }
            }
            Event::Submitted { kind, result } => match result {
                Ok(receipt) if receipt.success => {
                    self.toasts.push(ToastLevel::Success, kind.success_message(), now);
                }
                Ok(_) => {
                    self.toasts.push(ToastLevel::Error, kind.failure_message(), now);
                }
                Err(e) => {
                    error!("{} failed: {}", kind.as_str(), e);
                    self.toasts.push(ToastLevel::Error, kind.failure_message(), now);
                }
            },
        }
    }

    pub fn on_tick(&mut self, now: Instant) {
        self.tick_count += 1;
        self.hover.poll(now);
        self.scheduler.on_tick(now);
        self.toasts.expire(now);
    }

    /// Drops the place list and everything derived from it.
    fn clear_places(&mut self) {
        self.scheduler.cancel();
        self.scheduled_revision = None;
        self.all_places = Arc::from(Vec::new());
        self.visible.clear();
        self.selected_index = 0;
        self.hover.close();
        self.pointer = Pointer::Outside;
        self.dialog = None;
    }

    pub fn selected_place(&self) -> Option<&Place> {
        self.visible.get(self.selected_index)
    }

    /// Map projection for the current frame, if the map is on screen.
    pub fn viewport(&self) -> Option<Viewport> {
        let map = crate::ui::layout(self.frame_area).map;
        let inner = map.inner(&Margin {
            horizontal: 1,
            vertical: 1,
        });
        if inner.width == 0 || inner.height == 0 {
            return None;
        }

        let user = self.filters.user_location();
        let points = self
            .visible
            .iter()
            .map(Place::coordinates)
            .chain(user);
        let fallback = user.unwrap_or(Coordinates::new(
            self.config.ui.default_lat,
            self.config.ui.default_lon,
        ));
        Some(Viewport::fit(inner, points, fallback))
    }

    /// Cancels everything still running on behalf of the view.
    pub fn shutdown(&mut self) {
        self.filters.teardown();
        self.scheduler.cancel();
        self.hover.close();
        if let Some(task) = self.fetch_task.take() {
            task.abort();
        }
        self.should_quit = true;
    }

    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) {
        if self.dialog.is_some() {
            self.handle_dialog_key(key);
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.shutdown(),
            KeyCode::Tab => {
                self.focus = match self.focus {
                    Focus::Filters => Focus::Places,
                    Focus::Places => Focus::Filters,
                };
            }
            KeyCode::Esc => {
                if self.hover.state().is_locked() {
                    self.hover.close();
                } else {
                    self.toasts.dismiss();
                }
            }
            KeyCode::Char('o') => self.filters.toggle_open_now(),
            KeyCode::Char('n') => self.filters.toggle_near_me(),
            KeyCode::Char('x') => self.filters.reset(),
            KeyCode::Char('r') => self.load_places(),
            KeyCode::Char('c') => self.open_dialog(|id| Dialog::CheckIn(CheckInDraft::new(id))),
            KeyCode::Char('s') => self.open_dialog(|id| Dialog::Stock(StockDraft::new(id))),
            KeyCode::Char('v') => self.open_dialog(|id| Dialog::Rating(RatingDraft::new(id))),
            KeyCode::Char('+') => self.quick_feedback(true, now),
            KeyCode::Char('-') => self.quick_feedback(false, now),
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-1),
            KeyCode::Char(' ') | KeyCode::Enter if self.focus == Focus::Filters => {
                if let Some(row) = FilterRow::at(self.filter_cursor) {
                    self.toggle_row(row);
                }
            }
            _ => {}
        }

        if !self.should_quit {
            self.sync_filters(now);
        }
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent, now: Instant) {
        if self.places_state != PlacesState::Ready {
            return;
        }
        let Some(view) = self.viewport() else {
            return;
        };
        let target = self.pointer_target(&view, mouse.column, mouse.row);

        match mouse.kind {
            MouseEventKind::Moved | MouseEventKind::Drag(_) => self.move_pointer(target, now),
            MouseEventKind::Down(MouseButton::Left) => match target {
                Pointer::Tooltip => {
                    self.hover.close();
                    self.pointer = Pointer::Outside;
                }
                Pointer::Marker(ref id) => {
                    if let Some(index) = self.visible.iter().position(|p| &p.place_id == id) {
                        self.selected_index = index;
                        self.focus = Focus::Places;
                    }
                    self.move_pointer(target, now);
                }
                Pointer::Outside => {}
            },
            _ => {}
        }
    }

    fn pointer_target(&self, view: &Viewport, col: u16, row: u16) -> Pointer {
        if !contains(view.area, col, row) {
            return Pointer::Outside;
        }

        let tooltip = self.hover.state().place_id().and_then(|id| {
            let place = self.visible.iter().find(|p| p.place_id == id)?;
            let cell = view.cell_of(place.coordinates())?;
            Some(view.tooltip_rect(cell, place))
        });
        if tooltip.is_some_and(|rect| contains(rect, col, row)) {
            return Pointer::Tooltip;
        }

        match view.marker_at(col, row, &self.visible) {
            Some(place) => Pointer::Marker(place.place_id.clone()),
            None => Pointer::Outside,
        }
    }

    fn move_pointer(&mut self, target: Pointer, now: Instant) {
        if target == self.pointer {
            return;
        }
        match self.pointer {
            Pointer::Marker(_) => self.hover.leave_marker(now),
            Pointer::Tooltip => self.hover.leave_tooltip(now),
            Pointer::Outside => {}
        }
        match &target {
            Pointer::Marker(id) => self.hover.enter_marker(id),
            Pointer::Tooltip => self.hover.enter_tooltip(),
            Pointer::Outside => {}
        }
        self.pointer = target;
    }

    fn move_cursor(&mut self, delta: isize) {
        let (cursor, len) = match self.focus {
            Focus::Filters => (&mut self.filter_cursor, FilterRow::count()),
            Focus::Places => (&mut self.selected_index, self.visible.len()),
        };
        if len == 0 {
            return;
        }
        *cursor = (*cursor as isize + delta).rem_euclid(len as isize) as usize;
    }

    fn toggle_row(&mut self, row: FilterRow) {
        match row {
            FilterRow::OpenNow => self.filters.toggle_open_now(),
            FilterRow::NearMe => self.filters.toggle_near_me(),
            FilterRow::Brand(i) => {
                let id = BRAND_CATALOG[i].id;
                if !self.filters.remove_brand(id) {
                    self.filters.add_brand(id);
                }
            }
            FilterRow::Accessory(i) => {
                let id = ACCESSORY_CATALOG[i].id;
                if !self.filters.remove_accessory(id) {
                    self.filters.add_accessory(id);
                }
            }
        }
    }

    fn open_dialog(&mut self, make: impl FnOnce(&str) -> Dialog) {
        if self.places_state != PlacesState::Ready {
            return;
        }
        if let Some(place) = self.selected_place() {
            let dialog = make(&place.place_id);
            self.dialog = Some(dialog);
        }
    }

    /// Thumbs up or down on the selected place. Only acknowledged locally.
    fn quick_feedback(&mut self, liked: bool, now: Instant) {
        if self.places_state != PlacesState::Ready {
            return;
        }
        let Some(place) = self.selected_place() else {
            return;
        };
        info!(place_id = %place.place_id, liked, "Quick feedback");
        if liked {
            self.toasts.push(ToastLevel::Success, "Thanks for rating this place!", now);
        } else {
            self.toasts
                .push(ToastLevel::Info, "Thanks for the feedback! We'll keep improving.", now);
        }
    }

    fn handle_dialog_key(&mut self, key: KeyEvent) {
        let Some(dialog) = self.dialog.as_mut() else {
            return;
        };
        if key.code == KeyCode::Esc {
            self.dialog = None;
            return;
        }

        let mut submission = None;
        match dialog {
            Dialog::CheckIn(draft) => match (draft.step, key.code) {
                (CheckInStep::ConfirmOpen, KeyCode::Char('y')) => draft.answer_open(true),
                (CheckInStep::ConfirmOpen, KeyCode::Char('n')) => draft.answer_open(false),
                (CheckInStep::PickBrands, KeyCode::Down | KeyCode::Char('j')) => {
                    draft.move_cursor(1)
                }
                (CheckInStep::PickBrands, KeyCode::Up | KeyCode::Char('k')) => {
                    draft.move_cursor(-1)
                }
                (CheckInStep::PickBrands, KeyCode::Char(' ')) => draft.toggle_brand(),
                (CheckInStep::Review, KeyCode::Enter) => submission = draft.submission(),
                (_, KeyCode::Enter) => draft.advance(),
                (_, KeyCode::Backspace | KeyCode::Left) => draft.back(),
                _ => {}
            },
            Dialog::Stock(draft) => match key.code {
                KeyCode::Down | KeyCode::Char('j') => draft.move_cursor(1),
                KeyCode::Up | KeyCode::Char('k') => draft.move_cursor(-1),
                KeyCode::Char(' ') => draft.toggle_stock(),
                KeyCode::Enter => submission = draft.submission(),
                _ => {}
            },
            Dialog::Rating(draft) => match key.code {
                KeyCode::Right => draft.set_stars(draft.stars.saturating_add(1)),
                KeyCode::Left if draft.stars > 0 => draft.set_stars(draft.stars - 1),
                KeyCode::Backspace => draft.pop_char(),
                KeyCode::Char(c) => draft.push_char(c),
                KeyCode::Enter => submission = draft.submission(),
                _ => {}
            },
        }

        if let Some(submission) = submission {
            self.dialog = None;
            self.submit(submission);
        }
    }

    fn submit(&self, submission: Submission) {
        let backend = Arc::clone(&self.backend);
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = submission.send(backend.as_ref()).await;
            let _ = tx.send(Event::Submitted {
                kind: submission.kind(),
                result,
            });
        });
    }

    /// Turns store notices into toasts and starts a new filter pass when the
    /// selection or the user location changed.
    fn sync_filters(&mut self, now: Instant) {
        for notice in self.filters.take_notices() {
            match notice {
                StoreNotice::LocationAcquired(_) => {
                    self.toasts.push(ToastLevel::Success, "Location found!", now);
                }
                StoreNotice::GeolocationFailed(GeolocationFailure::Unsupported) => {
                    self.toasts.push(
                        ToastLevel::Error,
                        "This device does not support geolocation.",
                        now,
                    );
                }
                StoreNotice::GeolocationFailed(failure) => {
                    self.toasts.push(ToastLevel::Error, failure.to_string(), now);
                }
            }
        }

        let revision = self.filters.revision();
        if self.places_state == PlacesState::Ready && self.scheduled_revision != Some(revision) {
            self.scheduled_revision = Some(revision);
            self.scheduler
                .schedule(self.filters.snapshot(), Arc::clone(&self.all_places), now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{FixtureBackend, SubmissionKind};
    use crate::db::Journal;
    use crate::hover::HoverState;
    use crate::location::FixedLocation;
    use crate::models::{OpenStatus, Receipt};
    use crossterm::event::{KeyEventKind, KeyEventState, KeyModifiers};

    const HOME: Coordinates = Coordinates::new(-22.9068, -43.1729);

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn mouse_move(column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind: MouseEventKind::Moved,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    fn place(id: &str, status: OpenStatus, lat: f64, lon: f64) -> Place {
        Place {
            place_id: id.to_string(),
            name: format!("Place {id}"),
            address: String::new(),
            google_rating: 4.0,
            cig_rating: 3.0,
            latitude: lat,
            longitude: lon,
            open_status: status,
            available_brands: Default::default(),
            available_accessories: Default::default(),
            reviews: Vec::new(),
        }
    }

    fn app() -> (App, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let backend = Arc::new(FixtureBackend::new(
            "unused.json",
            Duration::ZERO,
            Journal::in_memory().unwrap(),
        ));
        let app = App::new(
            Config::default(),
            backend,
            Arc::new(FixedLocation(HOME)),
            tx,
        );
        (app, rx)
    }

    /// Feeds background events back into the app until `done` holds.
    async fn pump(
        app: &mut App,
        rx: &mut mpsc::UnboundedReceiver<Event>,
        done: impl Fn(&App) -> bool,
    ) {
        while !done(app) {
            let event = rx.recv().await.unwrap();
            app.handle_event(event, Instant::now());
        }
    }

    async fn ready_app(places: Vec<Place>) -> (App, mpsc::UnboundedReceiver<Event>) {
        let (mut app, mut rx) = app();
        app.handle_event(Event::PlacesLoaded(Ok(places)), Instant::now());
        pump(&mut app, &mut rx, |a| !a.scheduler.is_filtering()).await;
        (app, rx)
    }

    fn two_places() -> Vec<Place> {
        vec![
            place("1", OpenStatus::Open, -22.90, -43.20),
            place("2", OpenStatus::Open, -22.95, -43.10),
        ]
    }

    #[tokio::test]
    async fn loaded_places_flow_through_filters() {
        let (mut app, mut rx) = app();
        let now = Instant::now();
        app.handle_event(
            Event::PlacesLoaded(Ok(vec![
                place("1", OpenStatus::Open, HOME.latitude, HOME.longitude),
                place("2", OpenStatus::Closed, HOME.latitude, HOME.longitude),
            ])),
            now,
        );
        assert!(app.scheduler.is_filtering());
        pump(&mut app, &mut rx, |a| !a.scheduler.is_filtering()).await;
        assert_eq!(app.visible.len(), 2);

        app.handle_key(key(KeyCode::Char('o')), now);
        pump(&mut app, &mut rx, |a| !a.scheduler.is_filtering()).await;
        let ids: Vec<_> = app.visible.iter().map(|p| p.place_id.as_str()).collect();
        assert_eq!(ids, vec!["1"]);
    }

    #[tokio::test]
    async fn fetch_failure_blocks_until_retry() {
        let (mut app, _rx) = app();
        app.handle_event(
            Event::PlacesLoaded(Err(crate::error::FetchError::UnexpectedStatus {
                status: 503,
                url: "http://localhost/places".to_string(),
            })),
            Instant::now(),
        );
        assert!(matches!(app.places_state, PlacesState::Failed(_)));
        assert!(!app.scheduler.is_filtering());

        app.handle_key(key(KeyCode::Char('r')), Instant::now());
        assert_eq!(app.places_state, PlacesState::Loading);
        app.shutdown();
    }

    #[tokio::test]
    async fn no_op_filter_keys_do_not_restart_filtering() {
        let (mut app, mut rx) = app();
        app.handle_event(Event::PlacesLoaded(Ok(vec![])), Instant::now());
        pump(&mut app, &mut rx, |a| !a.scheduler.is_filtering()).await;

        app.handle_key(key(KeyCode::Char('x')), Instant::now());
        assert!(!app.scheduler.is_filtering());
    }

    #[tokio::test]
    async fn near_me_resolution_shows_toast() {
        let (mut app, mut rx) = app();
        app.handle_event(Event::PlacesLoaded(Ok(vec![])), Instant::now());
        app.handle_key(key(KeyCode::Char('n')), Instant::now());
        pump(&mut app, &mut rx, |a| a.filters.user_location().is_some()).await;

        assert_eq!(
            app.toasts.latest().map(|t| t.level),
            Some(ToastLevel::Success)
        );
    }

    #[tokio::test]
    async fn brand_rows_toggle_membership() {
        let (mut app, _rx) = app();
        app.filter_cursor = 2;
        app.handle_key(key(KeyCode::Char(' ')), Instant::now());
        assert!(app.filters.selection().brands().contains(BRAND_CATALOG[0].id));
        app.handle_key(key(KeyCode::Enter), Instant::now());
        assert!(app.filters.selection().brands().is_empty());
    }

    #[tokio::test]
    async fn check_in_dialog_submits_and_toasts() {
        let (mut app, mut rx) =
            ready_app(vec![place("1", OpenStatus::Open, HOME.latitude, HOME.longitude)]).await;
        let now = Instant::now();

        app.handle_key(key(KeyCode::Char('c')), now);
        assert!(matches!(app.dialog, Some(Dialog::CheckIn(_))));
        app.handle_key(key(KeyCode::Char('y')), now);
        app.handle_key(key(KeyCode::Char(' ')), now);
        app.handle_key(key(KeyCode::Enter), now);
        app.handle_key(key(KeyCode::Enter), now);
        assert!(app.dialog.is_none());

        match rx.recv().await {
            Some(Event::Submitted { kind, result }) => {
                assert_eq!(kind, SubmissionKind::CheckIn);
                assert_eq!(result.unwrap(), Receipt { success: true });
            }
            other => panic!("expected a submission result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn pointer_drives_hover_controller() {
        let (mut app, _rx) = ready_app(two_places()).await;
        app.frame_area = Rect::new(0, 0, 160, 48);
        let view = app.viewport().unwrap();
        let (x, y) = view.cell_of(app.visible[0].coordinates()).unwrap();
        let t0 = Instant::now();

        app.handle_mouse(mouse_move(x, y), t0);
        assert_eq!(app.hover.state().place_id(), Some("1"));

        let tooltip = view.tooltip_rect((x, y), &app.visible[0]);
        app.handle_mouse(mouse_move(tooltip.x + 1, tooltip.y + 1), t0 + Duration::from_millis(50));
        assert!(app.hover.state().is_locked());

        app.on_tick(t0 + Duration::from_secs(5));
        assert_eq!(app.hover.state().place_id(), Some("1"));

        app.handle_key(key(KeyCode::Esc), t0 + Duration::from_secs(5));
        assert_eq!(app.hover.state().place_id(), None);
    }

    #[tokio::test]
    async fn shutdown_detaches_store() {
        let (mut app, _rx) = app();
        app.handle_key(key(KeyCode::Char('n')), Instant::now());
        assert!(app.filters.is_locating());

        app.handle_key(key(KeyCode::Char('q')), Instant::now());
        assert!(app.should_quit);
        assert!(!app.filters.is_locating());
    }

    #[tokio::test]
    async fn esc_dismisses_the_toast_on_screen() {
        let (mut app, _rx) = app();
        let now = Instant::now();
        app.toasts.push(ToastLevel::Success, "Location found!", now);
        app.toasts.push(ToastLevel::Error, "Could not send check-in", now);

        app.handle_key(key(KeyCode::Esc), now);
        assert_eq!(
            app.toasts.latest().map(|t| t.message.as_str()),
            Some("Location found!")
        );
    }

    #[tokio::test]
    async fn failed_refetch_drops_previous_places() {
        let (mut app, _rx) = ready_app(two_places()).await;
        app.frame_area = Rect::new(0, 0, 160, 48);
        let view = app.viewport().unwrap();
        let (x, y) = view.cell_of(app.visible[0].coordinates()).unwrap();
        let now = Instant::now();

        app.handle_event(
            Event::PlacesLoaded(Err(crate::error::FetchError::UnexpectedStatus {
                status: 503,
                url: "http://localhost/places".to_string(),
            })),
            now,
        );
        assert!(matches!(app.places_state, PlacesState::Failed(_)));
        assert!(app.visible.is_empty());
        assert!(app.selected_place().is_none());

        app.handle_key(key(KeyCode::Char('c')), now);
        assert!(app.dialog.is_none());
        app.handle_mouse(mouse_move(x, y), now);
        assert_eq!(app.hover.state(), &HoverState::Hidden);
    }

    #[tokio::test]
    async fn refetch_closes_open_tooltip() {
        let (mut app, _rx) = ready_app(two_places()).await;
        app.hover.enter_marker("1");

        app.handle_key(key(KeyCode::Char('r')), Instant::now());
        assert_eq!(app.places_state, PlacesState::Loading);
        assert!(app.visible.is_empty());
        assert_eq!(app.hover.state(), &HoverState::Hidden);
        app.shutdown();
    }

    #[tokio::test]
    async fn refitted_map_makes_pointer_reenter_marker() {
        let (mut app, mut rx) = ready_app(two_places()).await;
        app.frame_area = Rect::new(0, 0, 160, 48);
        let view = app.viewport().unwrap();
        let (x, y) = view.cell_of(app.visible[0].coordinates()).unwrap();

        app.handle_mouse(mouse_move(x, y), Instant::now());
        assert_eq!(app.hover.hide_deadline(), None);

        // Both places are open, so the list stays the same.
        app.handle_key(key(KeyCode::Char('o')), Instant::now());
        pump(&mut app, &mut rx, |a| !a.scheduler.is_filtering()).await;
        assert_eq!(app.visible.len(), 2);
        assert!(app.hover.hide_deadline().is_some());

        app.handle_mouse(mouse_move(x, y), Instant::now());
        assert_eq!(app.hover.state().place_id(), Some("1"));
        assert_eq!(app.hover.hide_deadline(), None);
    }

    #[tokio::test]
    async fn left_on_unrated_draft_keeps_it_unrated() {
        let (mut app, _rx) =
            ready_app(vec![place("1", OpenStatus::Open, HOME.latitude, HOME.longitude)]).await;
        let now = Instant::now();

        app.handle_key(key(KeyCode::Char('v')), now);
        app.handle_key(key(KeyCode::Left), now);
        let Some(Dialog::Rating(draft)) = &app.dialog else {
            panic!("expected the rating dialog");
        };
        assert_eq!(draft.stars, 0);

        app.handle_key(key(KeyCode::Right), now);
        app.handle_key(key(KeyCode::Right), now);
        app.handle_key(key(KeyCode::Left), now);
        let Some(Dialog::Rating(draft)) = &app.dialog else {
            panic!("expected the rating dialog");
        };
        assert_eq!(draft.stars, 1);
    }

    #[tokio::test]
    async fn quick_feedback_only_toasts() {
        let (mut app, _rx) =
            ready_app(vec![place("1", OpenStatus::Open, HOME.latitude, HOME.longitude)]).await;
        let now = Instant::now();

        app.handle_key(key(KeyCode::Char('+')), now);
        assert_eq!(app.toasts.latest().map(|t| t.level), Some(ToastLevel::Success));
        app.handle_key(key(KeyCode::Char('-')), now);
        assert_eq!(app.toasts.latest().map(|t| t.level), Some(ToastLevel::Info));
        assert!(app.dialog.is_none());
        assert!(!app.scheduler.is_filtering());
    }
}

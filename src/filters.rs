//! Filter selection state and the derivation of the visible place list.
//!
//! [`FilterStore`] owns the current [`FilterSelection`] and the optional
//! [`UserLocation`]. Every mutation goes through one of its named operations;
//! the derived list comes from [`FilterSnapshot::apply`], a pure function of
//! the snapshot and the place list.
//!
//! Enabling "near me" without a cached location starts one background
//! geolocation request. Its answer comes back through the event channel as
//! [`Event::LocationResolved`] and is applied by
//! [`FilterStore::on_location_resolved`]; a failure rolls the toggle back.

use crate::distance::distance_km;
use crate::error::GeolocationFailure;
use crate::events::Event;
use crate::location::{acquire_location, LocationProvider, PositionOptions};
use crate::models::{Place, UserLocation};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Places farther than this from the user fail the "near me" check.
pub const NEARBY_RADIUS_KM: f64 = 5.0;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSelection {
    brands: BTreeSet<String>,
    accessories: BTreeSet<String>,
    open_now: bool,
    near_me: bool,
}

impl FilterSelection {
    pub fn brands(&self) -> &BTreeSet<String> {
        &self.brands
    }

    pub fn accessories(&self) -> &BTreeSet<String> {
        &self.accessories
    }

    pub fn open_now(&self) -> bool {
        self.open_now
    }

    pub fn near_me(&self) -> bool {
        self.near_me
    }

    /// True when any criterion would hide something.
    pub fn is_active(&self) -> bool {
        self.open_now || self.near_me || !self.brands.is_empty() || !self.accessories.is_empty()
    }
}

/// Immutable view of the filter state, safe to move into a background pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSnapshot {
    pub selection: FilterSelection,
    pub user_location: Option<UserLocation>,
}

impl FilterSnapshot {
    /// Whether `place` passes every active criterion.
    ///
    /// Checks run cheapest first and stop at the first failure: open status,
    /// brands, accessories, then distance. Brands and accessories match when
    /// the place carries any one of the selected ids. The distance check only
    /// runs once a user location is known.
    pub fn matches(&self, place: &Place) -> bool {
        let s = &self.selection;

        if s.open_now && !place.is_open() {
            return false;
        }

        if !s.brands.is_empty() && s.brands.is_disjoint(&place.available_brands) {
            return false;
        }

        if !s.accessories.is_empty() && s.accessories.is_disjoint(&place.available_accessories) {
            return false;
        }

        if let (true, Some(user)) = (s.near_me, self.user_location) {
            let km = distance_km(user, place.coordinates());
            if km.is_nan() || km > NEARBY_RADIUS_KM {
                return false;
            }
        }

        true
    }

    /// Stable filter: survivors keep their input order.
    pub fn apply(&self, places: &[Place]) -> Vec<Place> {
        places.iter().filter(|p| self.matches(p)).cloned().collect()
    }
}

/// Something the user should hear about, drained by the front end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StoreNotice {
    LocationAcquired(UserLocation),
    GeolocationFailed(GeolocationFailure),
}

struct PendingLocation {
    request_id: u64,
    task: JoinHandle<()>,
}

pub struct FilterStore {
    selection: FilterSelection,
    user_location: Option<UserLocation>,
    revision: u64,

    provider: Arc<dyn LocationProvider>,
    options: PositionOptions,
    events: mpsc::UnboundedSender<Event>,
    pending: Option<PendingLocation>,
    next_request_id: u64,

    notices: Vec<StoreNotice>,
    torn_down: bool,
}

impl FilterStore {
    pub fn new(
        provider: Arc<dyn LocationProvider>,
        options: PositionOptions,
        events: mpsc::UnboundedSender<Event>,
    ) -> Self {
        Self {
            selection: FilterSelection::default(),
            user_location: None,
            revision: 0,
            provider,
            options,
            events,
            pending: None,
            next_request_id: 0,
            notices: Vec::new(),
            torn_down: false,
        }
    }

    pub fn selection(&self) -> &FilterSelection {
        &self.selection
    }

    pub fn user_location(&self) -> Option<UserLocation> {
        self.user_location
    }

    /// Bumped on every observable change; untouched by no-op mutations.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_locating(&self) -> bool {
        self.pending.is_some()
    }

    pub fn snapshot(&self) -> FilterSnapshot {
        FilterSnapshot {
            selection: self.selection.clone(),
            user_location: self.user_location,
        }
    }

    pub fn apply_filters(&self, places: &[Place]) -> Vec<Place> {
        self.snapshot().apply(places)
    }

    pub fn take_notices(&mut self) -> Vec<StoreNotice> {
        std::mem::take(&mut self.notices)
    }

    pub fn toggle_open_now(&mut self) {
        if self.torn_down {
            return;
        }
        self.selection.open_now = !self.selection.open_now;
        self.bump();
    }

    /// Flips "near me". Enabling it with no cached location starts a
    /// geolocation request unless one is already in flight.
    pub fn toggle_near_me(&mut self) {
        if self.torn_down {
            return;
        }

        let enabling = !self.selection.near_me;
        if enabling && self.user_location.is_none() && self.pending.is_none() {
            if !self.provider.is_supported() {
                warn!("Near-me requested but geolocation is unsupported");
                self.notices
                    .push(StoreNotice::GeolocationFailed(GeolocationFailure::Unsupported));
                return;
            }
            self.request_location();
        }

        self.selection.near_me = enabling;
        self.bump();
    }

    pub fn add_brand(&mut self, id: &str) -> bool {
        let changed = !self.torn_down && self.selection.brands.insert(id.to_string());
        if changed {
            self.bump();
        }
        changed
    }

    pub fn remove_brand(&mut self, id: &str) -> bool {
        let changed = !self.torn_down && self.selection.brands.remove(id);
        if changed {
            self.bump();
        }
        changed
    }

    pub fn add_accessory(&mut self, id: &str) -> bool {
        let changed = !self.torn_down && self.selection.accessories.insert(id.to_string());
        if changed {
            self.bump();
        }
        changed
    }

    pub fn remove_accessory(&mut self, id: &str) -> bool {
        let changed = !self.torn_down && self.selection.accessories.remove(id);
        if changed {
            self.bump();
        }
        changed
    }

    /// Back to defaults. A cached user location survives.
    pub fn reset(&mut self) {
        if self.torn_down || self.selection == FilterSelection::default() {
            return;
        }
        self.selection = FilterSelection::default();
        self.bump();
    }

    /// Applies the answer to a request started by [`toggle_near_me`](Self::toggle_near_me).
    ///
    /// Answers for a torn-down store or for a request other than the pending
    /// one are dropped. Returns whether the state changed.
    pub fn on_location_resolved(
        &mut self,
        request_id: u64,
        result: Result<UserLocation, GeolocationFailure>,
    ) -> bool {
        if self.torn_down {
            debug!(request_id, "Dropping location answer for a torn-down store");
            return false;
        }
        match self.pending.as_ref() {
            Some(p) if p.request_id == request_id => self.pending = None,
            _ => {
                debug!(request_id, "Dropping stale location answer");
                return false;
            }
        }

        match result {
            Ok(loc) => {
                info!("User location resolved - ({}, {})", loc.latitude, loc.longitude);
                self.user_location = Some(loc);
                self.notices.push(StoreNotice::LocationAcquired(loc));
            }
            Err(failure) => {
                warn!("Geolocation failed: {}", failure);
                self.selection.near_me = false;
                self.notices.push(StoreNotice::GeolocationFailed(failure));
            }
        }
        self.bump();
        true
    }

    /// Detaches the store from the view: any pending request is cancelled and
    /// every later mutation, including late location answers, is ignored.
    pub fn teardown(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.task.abort();
        }
        self.torn_down = true;
    }

    fn request_location(&mut self) {
        self.next_request_id += 1;
        let request_id = self.next_request_id;
        let provider = Arc::clone(&self.provider);
        let options = self.options;
        let tx = self.events.clone();

        debug!(request_id, "Requesting user location");
        let task = tokio::spawn(async move {
            let result = acquire_location(provider.as_ref(), options).await;
            let _ = tx.send(Event::LocationResolved { request_id, result });
        });
        self.pending = Some(PendingLocation { request_id, task });
    }

    fn bump(&mut self) {
        self.revision += 1;
    }
}

impl Drop for FilterStore {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.task.abort();
        }
    }
}

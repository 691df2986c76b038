//! Deferred filter passes.
//!
//! Filtering runs on its own task so keystrokes and pointer events keep
//! flowing through the event loop while it works. A newer selection aborts the
//! running pass and starts over; passes have no side effects, so abandoning
//! one halfway is safe. When a pass takes longer than [`INDICATOR_DELAY`] the
//! front end shows a "Filtering..." indicator until the results land.

use crate::events::Event;
use crate::filters::FilterSnapshot;
use crate::models::Place;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

pub const INDICATOR_DELAY: Duration = Duration::from_millis(50);

// Places examined between yields back to the event loop.
const YIELD_EVERY: usize = 256;

struct InFlight {
    generation: u64,
    started_at: Instant,
    task: JoinHandle<()>,
}

pub struct FilterScheduler {
    events: mpsc::UnboundedSender<Event>,
    generation: u64,
    in_flight: Option<InFlight>,
    indicator: bool,
}

impl FilterScheduler {
    pub fn new(events: mpsc::UnboundedSender<Event>) -> Self {
        Self {
            events,
            generation: 0,
            in_flight: None,
            indicator: false,
        }
    }

    /// Starts a pass over `places`, superseding any pass still running.
    pub fn schedule(
        &mut self,
        snapshot: FilterSnapshot,
        places: Arc<[Place]>,
        now: Instant,
    ) -> u64 {
        if let Some(previous) = self.in_flight.take() {
            debug!(generation = previous.generation, "Superseding filter pass");
            previous.task.abort();
        }

        self.generation += 1;
        let generation = self.generation;
        let tx = self.events.clone();

        let task = tokio::spawn(async move {
            let mut visible = Vec::new();
            for (i, place) in places.iter().enumerate() {
                if i > 0 && i % YIELD_EVERY == 0 {
                    tokio::task::yield_now().await;
                }
                if snapshot.matches(place) {
                    visible.push(place.clone());
                }
            }
            let _ = tx.send(Event::FilterResults {
                generation,
                places: visible,
            });
        });

        self.in_flight = Some(InFlight {
            generation,
            started_at: now,
            task,
        });
        generation
    }

    /// Raises the indicator once the running pass exceeds the latency budget.
    /// Returns true when the indicator changed.
    pub fn on_tick(&mut self, now: Instant) -> bool {
        let overdue = self
            .in_flight
            .as_ref()
            .is_some_and(|f| now.saturating_duration_since(f.started_at) >= INDICATOR_DELAY);
        if overdue && !self.indicator {
            self.indicator = true;
            return true;
        }
        false
    }

    /// Accepts the results of the latest pass; anything older is discarded.
    pub fn on_results(&mut self, generation: u64, places: Vec<Place>) -> Option<Vec<Place>> {
        match self.in_flight.as_ref() {
            Some(f) if f.generation == generation => {
                self.in_flight = None;
                self.indicator = false;
                Some(places)
            }
            _ => {
                debug!(generation, "Discarding stale filter results");
                None
            }
        }
    }

    pub fn is_filtering(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn show_indicator(&self) -> bool {
        self.indicator
    }

    pub fn cancel(&mut self) {
        if let Some(f) = self.in_flight.take() {
            f.task.abort();
        }
        self.indicator = false;
    }
}

impl Drop for FilterScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::FilterStore;
    use crate::location::{NoLocation, PositionOptions};
    use crate::models::OpenStatus;

    fn places(n: usize) -> Arc<[Place]> {
        (0..n)
            .map(|i| Place {
                place_id: i.to_string(),
                name: format!("Place {i}"),
                address: String::new(),
                google_rating: 0.0,
                cig_rating: 0.0,
                latitude: 0.0,
                longitude: 0.0,
                open_status: if i % 2 == 0 {
                    OpenStatus::Open
                } else {
                    OpenStatus::Closed
                },
                available_brands: Default::default(),
                available_accessories: Default::default(),
                reviews: Vec::new(),
            })
            .collect()
    }

    async fn next_results(rx: &mut mpsc::UnboundedReceiver<Event>) -> (u64, Vec<Place>) {
        match rx.recv().await {
            Some(Event::FilterResults { generation, places }) => (generation, places),
            other => panic!("expected filter results, got {other:?}"),
        }
    }

    fn open_now_snapshot() -> FilterSnapshot {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut store = FilterStore::new(Arc::new(NoLocation), PositionOptions::default(), tx);
        store.toggle_open_now();
        store.snapshot()
    }

    #[tokio::test]
    async fn pass_delivers_filtered_places_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = FilterScheduler::new(tx);
        let all = places(1000);

        let generation = scheduler.schedule(open_now_snapshot(), Arc::clone(&all), Instant::now());
        let (got_generation, visible) = next_results(&mut rx).await;
        assert_eq!(got_generation, generation);

        let accepted = scheduler.on_results(got_generation, visible).unwrap();
        assert_eq!(accepted.len(), 500);
        assert_eq!(accepted[1].place_id, "2");
        assert_eq!(accepted, open_now_snapshot().apply(&all));
        assert!(!scheduler.is_filtering());
    }

    #[tokio::test]
    async fn newer_pass_supersedes_older_one() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = FilterScheduler::new(tx);
        let all = places(10);
        let now = Instant::now();

        let first = scheduler.schedule(FilterSnapshot::default(), Arc::clone(&all), now);
        let second = scheduler.schedule(open_now_snapshot(), Arc::clone(&all), now);
        assert!(second > first);

        let (generation, visible) = next_results(&mut rx).await;
        assert_eq!(generation, second);
        assert_eq!(scheduler.on_results(generation, visible).map(|v| v.len()), Some(5));
        assert!(scheduler.on_results(first, Vec::new()).is_none());
    }

    #[tokio::test]
    async fn indicator_only_after_latency_budget() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = FilterScheduler::new(tx);
        let start = Instant::now();

        let generation = scheduler.schedule(FilterSnapshot::default(), places(3), start);
        assert!(!scheduler.on_tick(start + Duration::from_millis(20)));
        assert!(!scheduler.show_indicator());

        assert!(scheduler.on_tick(start + Duration::from_millis(60)));
        assert!(scheduler.show_indicator());
        assert!(!scheduler.on_tick(start + Duration::from_millis(80)));

        let (_, visible) = next_results(&mut rx).await;
        scheduler.on_results(generation, visible);
        assert!(!scheduler.show_indicator());
    }

    #[tokio::test]
    async fn cancel_clears_indicator() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut scheduler = FilterScheduler::new(tx);
        let start = Instant::now();
        scheduler.schedule(FilterSnapshot::default(), places(3), start);
        scheduler.on_tick(start + Duration::from_millis(100));

        scheduler.cancel();
        assert!(!scheduler.is_filtering());
        assert!(!scheduler.show_indicator());
    }
}

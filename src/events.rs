//! Event types and the main event loop driver.
//!
//! This module defines the [`Event`] enum (terminal input, ticks, and the
//! completions of background work) and the [`EventHandler`], which runs a
//! background task that polls crossterm for key and mouse events and emits
//! periodic [`Event::Tick`]s. Background tasks (place fetches, the geolocation
//! request, the deferred filter pass, submissions) never touch application
//! state directly; they post one of these events through [`EventHandler::tx`]
//! and the main loop applies it.

use crate::api::SubmissionKind;
use crate::error::{FetchError, GeolocationFailure, SubmissionError};
use crate::models::{Place, Receipt, UserLocation};
use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind, MouseEvent};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::error;

/// Events processed by the application event loop.
#[derive(Debug)]
pub enum Event {
    /// Periodic tick; drives the hover debounce, toasts and the filtering indicator.
    Tick,
    /// User key press from the terminal.
    Input(KeyEvent),
    /// Pointer motion or click from the terminal.
    Mouse(MouseEvent),
    /// The place repository answered a fetch.
    PlacesLoaded(Result<Vec<Place>, FetchError>),
    /// A geolocation request finished.
    LocationResolved {
        /// Identifies the request so stale answers can be dropped.
        request_id: u64,
        result: Result<UserLocation, GeolocationFailure>,
    },
    /// A deferred filter pass produced its visible subset.
    FilterResults {
        /// Pass generation; only the latest one is applied.
        generation: u64,
        places: Vec<Place>,
    },
    /// A check-in, stock report or rating submission finished.
    Submitted {
        kind: SubmissionKind,
        result: Result<Receipt, SubmissionError>,
    },
}

/// Multiplexes terminal input and ticks into a single event stream.
///
/// Holds an unbounded channel: the sender ([`tx`](EventHandler::tx)) can be
/// cloned and given to other tasks, while the receiver is consumed by
/// [`next`](EventHandler::next) in the main loop.
pub struct EventHandler {
    /// Sender for posting events from background tasks.
    pub tx: mpsc::UnboundedSender<Event>,
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
    /// Creates a new event handler and spawns the input/tick task.
    ///
    /// The spawned task polls crossterm with a timeout of `tick_rate_ms`; key
    /// presses become [`Event::Input`], pointer activity becomes
    /// [`Event::Mouse`], and [`Event::Tick`] is sent whenever the tick
    /// interval elapses. The task stops if the terminal can no longer be read
    /// or the receiver is dropped.
    pub fn new(tick_rate_ms: u64) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let event_tx = tx.clone();

        tokio::spawn(async move {
            let tick_rate = Duration::from_millis(tick_rate_ms);
            let mut last_tick = Instant::now();
            loop {
                let timeout = tick_rate
                    .checked_sub(last_tick.elapsed())
                    .unwrap_or(Duration::from_secs(0));

                let ready = match event::poll(timeout) {
                    Ok(ready) => ready,
                    Err(e) => {
                        error!("Terminal poll failed: {}", e);
                        break;
                    }
                };
                if ready {
                    let forwarded = match event::read() {
                        Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                            event_tx.send(Event::Input(key))
                        }
                        Ok(CrosstermEvent::Mouse(mouse)) => event_tx.send(Event::Mouse(mouse)),
                        Ok(_) => Ok(()),
                        Err(e) => {
                            error!("Terminal read failed: {}", e);
                            break;
                        }
                    };
                    if forwarded.is_err() {
                        break;
                    }
                }
                if last_tick.elapsed() >= tick_rate {
                    if event_tx.send(Event::Tick).is_err() {
                        break;
                    }
                    last_tick = Instant::now();
                }
            }
        });

        Self { tx, rx }
    }

    /// Receives the next event from the channel.
    ///
    /// Returns `None` when all senders have been dropped.
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

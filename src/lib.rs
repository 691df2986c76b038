//! Terminal finder for tobacco shops: filter a fixed place list by opening
//! status, brands, accessories and distance, and inspect places on a map.

pub mod api;
pub mod app;
pub mod config;
pub mod db;
pub mod dialogs;
pub mod distance;
pub mod error;
pub mod events;
pub mod filters;
pub mod hover;
pub mod location;
pub mod logging;
pub mod models;
pub mod scheduler;
pub mod toast;
pub mod ui;
pub mod viewport;

use crate::config::{ApiConfig, BackendKind};
use crate::db::Journal;
use crate::error::{FetchError, SubmissionError};
use crate::models::{CheckIn, Place, Rating, Receipt, StockReport};
use async_trait::async_trait;
use color_eyre::Result;
use reqwest::Client;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Supplies the full, unfiltered place list.
#[async_trait]
pub trait PlaceRepository: Send + Sync {
    async fn fetch_places(&self) -> Result<Vec<Place>, FetchError>;
}

/// Accepts crowd-sourced updates. Outcomes only ever become a toast.
#[async_trait]
pub trait SubmissionSink: Send + Sync {
    async fn submit_check_in(&self, check_in: &CheckIn) -> Result<Receipt, SubmissionError>;
    async fn submit_stock(&self, report: &StockReport) -> Result<Receipt, SubmissionError>;
    async fn submit_rating(&self, rating: &Rating) -> Result<Receipt, SubmissionError>;
}

pub trait Backend: PlaceRepository + SubmissionSink {}

impl<T: PlaceRepository + SubmissionSink> Backend for T {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionKind {
    CheckIn,
    Stock,
    Rating,
}

impl SubmissionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionKind::CheckIn => "check_in",
            SubmissionKind::Stock => "stock",
            SubmissionKind::Rating => "rating",
        }
    }

    pub fn success_message(self) -> &'static str {
        match self {
            SubmissionKind::CheckIn => "Check-in sent!",
            SubmissionKind::Stock => "Thanks for the stock update!",
            SubmissionKind::Rating => "Thanks for rating this place!",
        }
    }

    pub fn failure_message(self) -> &'static str {
        match self {
            SubmissionKind::CheckIn => "Could not send check-in",
            SubmissionKind::Stock => "Could not send stock update",
            SubmissionKind::Rating => "Could not send rating",
        }
    }
}

/// One outgoing update, whatever its kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    CheckIn(CheckIn),
    Stock(StockReport),
    Rating(Rating),
}

impl Submission {
    pub fn kind(&self) -> SubmissionKind {
        match self {
            Submission::CheckIn(_) => SubmissionKind::CheckIn,
            Submission::Stock(_) => SubmissionKind::Stock,
            Submission::Rating(_) => SubmissionKind::Rating,
        }
    }

    pub async fn send<S: SubmissionSink + ?Sized>(
        &self,
        sink: &S,
    ) -> Result<Receipt, SubmissionError> {
        match self {
            Submission::CheckIn(c) => sink.submit_check_in(c).await,
            Submission::Stock(s) => sink.submit_stock(s).await,
            Submission::Rating(r) => sink.submit_rating(r).await,
        }
    }
}

/// Builds the backend selected in `config.toml`.
pub fn backend_from_config(config: &ApiConfig) -> Result<Arc<dyn Backend>> {
    match config.backend {
        BackendKind::Fixture => {
            let journal = Journal::open(&config.journal_path)?;
            Ok(Arc::new(FixtureBackend::new(
                &config.fixture_path,
                Duration::from_millis(config.simulated_latency_ms),
                journal,
            )))
        }
        BackendKind::Http => Ok(Arc::new(HttpBackend::new(
            &config.base_url,
            Duration::from_secs(config.request_timeout_secs),
        )?)),
    }
}

/// Mock backend: places come from a JSON fixture, submissions go to the local journal.
pub struct FixtureBackend {
    fixture_path: PathBuf,
    latency: Duration,
    journal: Journal,
}

impl FixtureBackend {
    pub fn new(fixture_path: impl Into<PathBuf>, latency: Duration, journal: Journal) -> Self {
        Self {
            fixture_path: fixture_path.into(),
            latency,
            journal,
        }
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    fn record<T: Serialize>(
        &self,
        kind: SubmissionKind,
        place_id: &str,
        dto: &T,
    ) -> Result<Receipt, SubmissionError> {
        if place_id.is_empty() {
            return Err(SubmissionError::Invalid("missing place id".to_string()));
        }
        let payload = serde_json::to_string(dto)?;
        self.journal.record(kind, place_id, &payload)?;
        info!(kind = kind.as_str(), place_id, "Mock submission accepted");
        Ok(Receipt { success: true })
    }
}

#[async_trait]
impl PlaceRepository for FixtureBackend {
    async fn fetch_places(&self) -> Result<Vec<Place>, FetchError> {
        // Imitates network latency
        tokio::time::sleep(self.latency).await;

        let path = self.fixture_path.display().to_string();
        let raw = tokio::fs::read_to_string(&self.fixture_path)
            .await
            .map_err(|source| FetchError::Fixture {
                path: path.clone(),
                source,
            })?;
        let places: Vec<Place> = serde_json::from_str(&raw).map_err(|source| {
            FetchError::Deserialize {
                context: path,
                source,
            }
        })?;

        info!("Loaded {} places from fixture", places.len());
        Ok(places)
    }
}

#[async_trait]
impl SubmissionSink for FixtureBackend {
    async fn submit_check_in(&self, check_in: &CheckIn) -> Result<Receipt, SubmissionError> {
        self.record(SubmissionKind::CheckIn, &check_in.place_id, check_in)
    }

    async fn submit_stock(&self, report: &StockReport) -> Result<Receipt, SubmissionError> {
        if report.brand.is_empty() {
            return Err(SubmissionError::Invalid("missing brand".to_string()));
        }
        self.record(SubmissionKind::Stock, &report.place_id, report)
    }

    async fn submit_rating(&self, rating: &Rating) -> Result<Receipt, SubmissionError> {
        if !(1..=5).contains(&rating.stars) {
            return Err(SubmissionError::Invalid(format!(
                "rating must be 1-5 stars, got {}",
                rating.stars
            )));
        }
        self.record(SubmissionKind::Rating, &rating.place_id, rating)
    }
}

/// JSON-over-HTTP backend.
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<T: Serialize + Sync>(
        &self,
        path: &str,
        dto: &T,
    ) -> Result<Receipt, SubmissionError> {
        let url = format!("{}/{}", self.base_url, path);
        let res = self.client.post(&url).json(dto).send().await?;

        let status = res.status();
        if !status.is_success() {
            warn!("Submission to {} rejected with {}", url, status);
            return Err(SubmissionError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(res.json::<Receipt>().await?)
    }
}

#[async_trait]
impl PlaceRepository for HttpBackend {
    async fn fetch_places(&self) -> Result<Vec<Place>, FetchError> {
        let url = format!("{}/places", self.base_url);
        let res = self.client.get(&url).send().await?;

        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = res.text().await?;
        let places: Vec<Place> = serde_json::from_str(&body).map_err(|source| {
            FetchError::Deserialize {
                context: url,
                source,
            }
        })?;

        info!("Fetched {} places", places.len());
        Ok(places)
    }
}

#[async_trait]
impl SubmissionSink for HttpBackend {
    async fn submit_check_in(&self, check_in: &CheckIn) -> Result<Receipt, SubmissionError> {
        self.post("checkins", check_in).await
    }

    async fn submit_stock(&self, report: &StockReport) -> Result<Receipt, SubmissionError> {
        self.post("stock", report).await
    }

    async fn submit_rating(&self, rating: &Rating) -> Result<Receipt, SubmissionError> {
        self.post("ratings", rating).await
    }
}

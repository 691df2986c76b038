use thiserror::Error;

/// Why a location request produced no coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeolocationFailure {
    #[error("geolocation is not supported on this host")]
    Unsupported,

    /// Permission refused, lookup failed, or the request timed out.
    #[error("could not get your location; check location permissions")]
    Denied,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("could not read place fixture {path}: {source}")]
    Fixture {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("submission rejected with HTTP status {status}")]
    Rejected { status: u16 },

    #[error("submission journal error: {0}")]
    Journal(#[from] rusqlite::Error),

    #[error("could not encode submission: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid submission: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("could not serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

//! Error types shared by every client in the crate.
//!
//! Remote misbehavior never panics: search misses, missing session tokens
//! and envelope-reported failures each get their own variant so callers can
//! match on the condition they care about.

/// All errors the portal clients can produce.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The primary portal did not land on the dashboard after sign-in.
    #[error("Authorization failed! Check your email and password.")]
    AuthorizationFailed,

    /// A timetable search came back without a redirect, i.e. zero matches.
    #[error("A search for `{0}` yielded no results")]
    TimetableNotFound(String),

    /// A student search came back without a redirect, i.e. zero matches.
    #[error("A search for `{0}` yielded no results")]
    StudentNotFound(String),

    /// A session token was missing from the page that is supposed to
    /// carry it.
    #[error("No `{0}` token in the page response")]
    TokenNotFound(&'static str),

    /// The remote JSON envelope reported an error of its own.
    #[error("Remote error: {0}")]
    Remote(String),

    /// An endpoint that must answer with a success status did not.
    #[error("Unexpected status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// A page is missing markup the scraper relies on.
    #[error("Unexpected page structure: {0}")]
    Scrape(String),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Malformed JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

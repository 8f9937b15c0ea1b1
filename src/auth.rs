//! Two-stage portal login and session-token extraction.
//!
//! Stage one posts the sign-in form to the profile portal; the only success
//! signal the portal gives is where the redirect chain lands, so the check
//! is on the final URL, not the status. Stage two repeats the sign-in GET
//! with a `redirect_url` pointing into the SDO system, which mints the
//! Moodle session cookie on the same cookie store. That call has no
//! verifiable outcome of its own; it exists for the side effect.
//!
//! SDO pages embed a per-session `sesskey` and the numeric
//! `contextInstanceId` of the signed-in user in inline javascript. Both are
//! re-extracted from a fresh page before every call that needs them, because
//! the backend may rotate them between requests.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::endpoints::{Endpoints, DASHBOARD_SUFFIX};
use crate::error::{Error, Result};
use crate::session::Session;

// ── Credentials ─────────────────────────────────────────────────────────────

/// Login identifier and secret for the primary portal.
///
/// Held in memory for the lifetime of the owning [`Authenticator`] and never
/// persisted. The `Debug` impl redacts the password so a session can be
/// logged without leaking it.
#[derive(Clone)]
pub struct Credentials {
    login: String,
    password: String,
}

impl Credentials {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ── Authenticator ───────────────────────────────────────────────────────────

/// An authenticated portal session.
///
/// Constructed only through [`Authenticator::login`] (or
/// [`Authenticator::login_with`]), so holding one means the whole handshake
/// succeeded. The per-subsystem clients borrow it to share its cookies.
#[derive(Debug)]
pub struct Authenticator {
    session: Session,
    endpoints: Endpoints,
    credentials: Credentials,
}

impl Authenticator {
    /// Run the login handshake against the production portal.
    pub async fn login(credentials: Credentials) -> Result<Self> {
        Self::login_with(Endpoints::default(), credentials).await
    }

    /// Run the login handshake against explicit portal endpoints.
    pub async fn login_with(endpoints: Endpoints, credentials: Credentials) -> Result<Self> {
        let session = Session::new()?;
        let auth = Self {
            session,
            endpoints,
            credentials,
        };
        auth.sign_in().await?;
        auth.sdo_sign_in().await?;
        Ok(auth)
    }

    /// The cookie-bearing session established by the handshake.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The endpoints the handshake ran against.
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    async fn sign_in(&self) -> Result<()> {
        let form = [
            ("utf8", "✓"),
            ("user[email]", self.credentials.login.as_str()),
            ("user[password]", self.credentials.password.as_str()),
        ];
        let page = self
            .session
            .post_form(&self.endpoints.sign_in_url(), &form)
            .await?;
        // Wrong credentials re-render the sign-in form with a 200, so the
        // landing URL is the only reliable signal.
        if !page.url.as_str().ends_with(DASHBOARD_SUFFIX) {
            return Err(Error::AuthorizationFailed);
        }
        debug!("portal sign-in landed on {}", page.url);
        Ok(())
    }

    async fn sdo_sign_in(&self) -> Result<()> {
        let entry = self.endpoints.sdo_auth_entry();
        let query = [("redirect_url", entry.as_str())];
        self.session
            .get_with_query(&self.endpoints.sign_in_url(), &query)
            .await?;
        debug!("delegated sdo sign-in issued");
        Ok(())
    }
}

// ── Session tokens ──────────────────────────────────────────────────────────

fn sesskey_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""sesskey":"(.*?)""#).expect("sesskey regex is valid"))
}

fn context_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#""contextInstanceId":(\d+),"#).expect("context id regex is valid")
    })
}

/// Extract the per-session security key from an SDO page body.
///
/// Fails closed: a page without the token yields [`Error::TokenNotFound`]
/// instead of a blank value the next request would silently forward.
pub fn extract_sesskey(body: &str) -> Result<String> {
    sesskey_re()
        .captures(body)
        .map(|caps| caps[1].to_string())
        .ok_or(Error::TokenNotFound("sesskey"))
}

/// Extract the numeric context instance id (the signed-in user id on
/// user-context pages) from an SDO page body.
pub fn extract_context_id(body: &str) -> Result<u64> {
    let caps = context_id_re()
        .captures(body)
        .ok_or(Error::TokenNotFound("contextInstanceId"))?;
    caps[1]
        .parse()
        .map_err(|_| Error::TokenNotFound("contextInstanceId"))
}

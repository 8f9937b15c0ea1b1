//! Production hosts and request paths.
//!
//! One portal brand, four independently served systems: the profile portal
//! issues the primary session, the SDO (Moodle) learning system accepts it
//! through a delegated login, and the timetable and grades systems answer
//! without authentication. Base URLs are overridable so tests can point a
//! client at a local mock server; paths are fixed.

/// Primary profile portal, the origin of the session cookie.
pub const PORTAL_BASE: &str = "https://profile.tusur.ru";
/// SDO learning system (Moodle), reached through a delegated login.
pub const SDO_BASE: &str = "https://sdo.tusur.ru";
/// Public timetable system.
pub const TIMETABLE_BASE: &str = "https://timetable.tusur.ru";
/// Public grades system.
pub const GRADES_BASE: &str = "https://ocenka.tusur.ru";

pub(crate) const SIGN_IN_PATH: &str = "/en/users/sign_in";
pub(crate) const DASHBOARD_SUFFIX: &str = "dashboard";
pub(crate) const SDO_AUTH_ENTRY_PATH: &str = "/auth/edu/?id=1";
pub(crate) const AJAX_SERVICE_PATH: &str = "/lib/ajax/service.php";
pub(crate) const NOTIFICATIONS_PAGE_PATH: &str = "/message/output/popup/notifications.php";
pub(crate) const MESSAGES_PAGE_PATH: &str = "/message/index.php";
pub(crate) const PARTICIPANTS_PATH: &str = "/user/index.php";
pub(crate) const PROFILE_PATH: &str = "/user/profile.php";
pub(crate) const TIMETABLE_SEARCH_PATH: &str = "/searches/common_search";
pub(crate) const STUDENT_SEARCH_PATH: &str = "/student_search";

/// Base URLs for the authenticated half of the portal.
///
/// Both fields are scheme + host, no trailing slash.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// Primary profile portal base URL.
    pub portal: String,
    /// SDO (Moodle) base URL.
    pub sdo: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            portal: PORTAL_BASE.to_string(),
            sdo: SDO_BASE.to_string(),
        }
    }
}

impl Endpoints {
    pub(crate) fn sign_in_url(&self) -> String {
        format!("{}{}", self.portal.trim_end_matches('/'), SIGN_IN_PATH)
    }

    /// Entry URL the delegated SDO login redirects through.
    pub(crate) fn sdo_auth_entry(&self) -> String {
        format!("{}{}", self.sdo.trim_end_matches('/'), SDO_AUTH_ENTRY_PATH)
    }

    pub(crate) fn ajax_service_url(&self) -> String {
        self.sdo_page(AJAX_SERVICE_PATH)
    }

    /// Absolute URL for a fixed SDO page path.
    pub(crate) fn sdo_page(&self, path: &str) -> String {
        format!("{}{}", self.sdo.trim_end_matches('/'), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_points_at_production() {
        let endpoints = Endpoints::default();
        assert_eq!(endpoints.sign_in_url(), "https://profile.tusur.ru/en/users/sign_in");
        assert_eq!(endpoints.sdo_auth_entry(), "https://sdo.tusur.ru/auth/edu/?id=1");
        assert_eq!(endpoints.ajax_service_url(), "https://sdo.tusur.ru/lib/ajax/service.php");
    }

    #[test]
    fn trailing_slash_in_override_is_tolerated() {
        let endpoints = Endpoints {
            portal: "http://127.0.0.1:9000/".to_string(),
            sdo: "http://127.0.0.1:9000/".to_string(),
        };
        assert_eq!(endpoints.sign_in_url(), "http://127.0.0.1:9000/en/users/sign_in");
        assert_eq!(endpoints.sdo_page("/user/index.php"), "http://127.0.0.1:9000/user/index.php");
    }
}

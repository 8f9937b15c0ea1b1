//! Course rosters and user profiles scraped from SDO pages.
//!
//! The participants table renders one row per enrolled user plus aggregate
//! rows; data rows are recognized by their `user-index` id prefix and must
//! carry a profile link, which doubles as the anchor for the display name.
//! Profile pages expose their fields as definition lists, whose labels and
//! ordering shift with the viewer's interface language, so lookup is by
//! label keyword first and by position as a fallback.

use scraper::{ElementRef, Html, Node, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::Authenticator;
use crate::endpoints::{Endpoints, PARTICIPANTS_PATH, PROFILE_PATH};
use crate::error::{Error, Result};
use crate::session::Session;
use crate::text::{normalize, normalize_non_empty};

const EMAIL_LABELS: &[&str] = &["email", "почт"];
const COUNTRY_LABELS: &[&str] = &["country", "стран"];
const TOWN_LABELS: &[&str] = &["city", "town", "город"];
const TIMEZONE_LABELS: &[&str] = &["timezone", "time zone", "часов"];
const GROUPS_LABELS: &[&str] = &["group", "групп"];

// ── Types ───────────────────────────────────────────────────────────────────

/// One data row of a course participants table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Display name with avatar and initials badges stripped.
    pub name: String,
    /// Absolute profile URL.
    pub profile_url: String,
    pub role: Option<String>,
    pub group: Option<String>,
    pub last_access: Option<String>,
}

/// Labeled fields scraped from a user profile page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub email: Option<String>,
    pub country: Option<String>,
    pub town: Option<String>,
    pub timezone: Option<String>,
    pub groups: Option<String>,
}

/// Filter and paging options for a roster listing.
#[derive(Debug, Clone, Default)]
pub struct RosterQuery {
    /// Surname initial filter (`tilast`).
    pub surname: Option<String>,
    /// First-name initial filter (`tifirst`).
    pub first_name: Option<String>,
    /// Rows per page (`perpage`).
    pub per_page: Option<u32>,
    /// Zero-based page number (`page`).
    pub page: Option<u32>,
}

// ── Client ──────────────────────────────────────────────────────────────────

/// Reader for course rosters and user profiles.
#[derive(Debug, Clone)]
pub struct Directory {
    session: Session,
    endpoints: Endpoints,
}

impl Directory {
    pub fn new(auth: &Authenticator) -> Self {
        Self {
            session: auth.session().clone(),
            endpoints: auth.endpoints().clone(),
        }
    }

    /// List the participants of a course, optionally filtered and paged.
    pub async fn participants(
        &self,
        course_id: u64,
        query: &RosterQuery,
    ) -> Result<Vec<Participant>> {
        let mut params: Vec<(&str, String)> = vec![("id", course_id.to_string())];
        if let Some(surname) = &query.surname {
            params.push(("tilast", surname.clone()));
        }
        if let Some(first_name) = &query.first_name {
            params.push(("tifirst", first_name.clone()));
        }
        if let Some(per_page) = query.per_page {
            params.push(("perpage", per_page.to_string()));
        }
        if let Some(page) = query.page {
            params.push(("page", page.to_string()));
        }
        let page = self
            .session
            .get_with_query(&self.endpoints.sdo_page(PARTICIPANTS_PATH), &params)
            .await?
            .require_success()?;
        parse_participants(&page.body, &page.url)
    }

    /// Fetch one user's profile page.
    pub async fn profile(&self, user_id: u64) -> Result<UserProfile> {
        let params = [("id", user_id.to_string())];
        let page = self
            .session
            .get_with_query(&self.endpoints.sdo_page(PROFILE_PATH), &params)
            .await?
            .require_success()?;
        parse_profile(&page.body)
    }
}

// ── Roster parsing ──────────────────────────────────────────────────────────

fn parse_participants(html: &str, base: &Url) -> Result<Vec<Participant>> {
    let document = Html::parse_document(html);
    let table_sel = Selector::parse("table#participants").expect("participants selector is valid");
    let row_sel = Selector::parse(r#"tr[id^="user-index"]"#).expect("row selector is valid");
    let cell_sel = Selector::parse("td, th").expect("cell selector is valid");
    let link_sel = Selector::parse("a[href]").expect("link selector is valid");

    let table = document
        .select(&table_sel)
        .next()
        .ok_or_else(|| Error::Scrape("participants table not found".to_string()))?;

    let mut participants = Vec::new();
    for row in table.select(&row_sel) {
        let cells: Vec<ElementRef> = row.select(&cell_sel).collect();
        let found = cells.iter().enumerate().find_map(|(idx, cell)| {
            cell.select(&link_sel)
                .find(|link| {
                    link.value().attr("href").is_some_and(|href| {
                        href.contains("/user/view.php") || href.contains("/user/profile.php")
                    })
                })
                .map(|link| (idx, link))
        });
        let (name_idx, link) = match found {
            Some(found) => found,
            // Aggregate and hidden-user rows carry no profile link.
            None => continue,
        };
        let name = link_display_name(&link);
        if name.is_empty() {
            continue;
        }
        let href = link.value().attr("href").unwrap_or_default();
        let profile_url = match base.join(href) {
            Ok(resolved) => resolved.to_string(),
            Err(_) => href.to_string(),
        };
        let mut rest = cells[name_idx + 1..].iter();
        let role = rest.next().and_then(|cell| normalize_non_empty(&cell_text(cell)));
        let group = rest.next().and_then(|cell| normalize_non_empty(&cell_text(cell)));
        let last_access = rest.next().and_then(|cell| normalize_non_empty(&cell_text(cell)));
        participants.push(Participant {
            name,
            profile_url,
            role,
            group,
            last_access,
        });
    }
    Ok(participants)
}

/// Display name of a roster link: child text nodes plus non-icon child
/// elements, with avatars and initials badges skipped.
fn link_display_name(link: &ElementRef) -> String {
    let mut parts: Vec<String> = Vec::new();
    for child in link.children() {
        match child.value() {
            Node::Text(text) => parts.push(text.to_string()),
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(child) {
                    if !is_icon(&element) {
                        parts.push(cell_text(&element));
                    }
                }
            }
            _ => {}
        }
    }
    normalize(&parts.join(" "))
}

fn is_icon(element: &ElementRef) -> bool {
    let value = element.value();
    value.name() == "img"
        || value
            .attr("class")
            .is_some_and(|class| class.contains("userinitials") || class.contains("icon"))
}

fn cell_text(element: &ElementRef) -> String {
    element.text().collect::<Vec<_>>().join(" ")
}

// ── Profile parsing ─────────────────────────────────────────────────────────

struct ProfileEntry {
    label: String,
    value: String,
    link: Option<String>,
}

fn parse_profile(html: &str) -> Result<UserProfile> {
    let document = Html::parse_document(html);
    let h1_sel = Selector::parse("h1").expect("h1 selector is valid");
    let h2_sel = Selector::parse("h2").expect("h2 selector is valid");
    let name = document
        .select(&h1_sel)
        .next()
        .or_else(|| document.select(&h2_sel).next())
        .and_then(|heading| normalize_non_empty(&cell_text(&heading)))
        .ok_or_else(|| Error::Scrape("profile heading not found".to_string()))?;

    let entries = profile_entries(&document);

    let email = field(&entries, EMAIL_LABELS, 0).and_then(|entry| {
        entry
            .link
            .as_deref()
            .and_then(|href| href.strip_prefix("mailto:"))
            .map(str::to_string)
            .or_else(|| normalize_non_empty(&entry.value))
    });

    Ok(UserProfile {
        name,
        email,
        country: field(&entries, COUNTRY_LABELS, 1).and_then(|e| normalize_non_empty(&e.value)),
        town: field(&entries, TOWN_LABELS, 2).and_then(|e| normalize_non_empty(&e.value)),
        timezone: field(&entries, TIMEZONE_LABELS, 3).and_then(|e| normalize_non_empty(&e.value)),
        groups: field(&entries, GROUPS_LABELS, 4).and_then(|e| normalize_non_empty(&e.value)),
    })
}

/// Collect label/value pairs from the profile card's definition lists.
fn profile_entries(document: &Html) -> Vec<ProfileEntry> {
    let tree_sel = Selector::parse(".profile_tree").expect("profile tree selector is valid");
    let dl_sel = Selector::parse("dl").expect("dl selector is valid");
    let dt_sel = Selector::parse("dt").expect("dt selector is valid");
    let dd_sel = Selector::parse("dd").expect("dd selector is valid");
    let link_sel = Selector::parse("a[href]").expect("link selector is valid");

    let lists: Vec<ElementRef> = match document.select(&tree_sel).next() {
        Some(tree) => tree.select(&dl_sel).collect(),
        None => document.select(&dl_sel).collect(),
    };

    let mut entries = Vec::new();
    for list in lists {
        for (dt, dd) in list.select(&dt_sel).zip(list.select(&dd_sel)) {
            entries.push(ProfileEntry {
                label: normalize(&cell_text(&dt)),
                value: normalize(&cell_text(&dd)),
                link: dd
                    .select(&link_sel)
                    .next()
                    .and_then(|a| a.value().attr("href"))
                    .map(str::to_string),
            });
        }
    }
    entries
}

/// Find a profile entry by label keyword, falling back to its conventional
/// position when no label matches.
fn field<'e>(
    entries: &'e [ProfileEntry],
    labels: &[&str],
    position: usize,
) -> Option<&'e ProfileEntry> {
    entries
        .iter()
        .find(|entry| {
            let label = entry.label.to_lowercase();
            labels.iter().any(|key| label.contains(key))
        })
        .or_else(|| entries.get(position))
}

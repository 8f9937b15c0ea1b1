//! Student grade reports from the public grades system.
//!
//! Resolution mirrors the timetable search: submitting the surname, name
//! and group triple either redirects to the student's page or re-renders
//! the form, and only the redirect means a match. The student page embeds a
//! JSON-encoded `data-role` attribute whose `context_id` keys the per-course
//! grades API; the course list itself only comes back inside an API reply,
//! so the first call doubles as discovery.

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::endpoints::{GRADES_BASE, STUDENT_SEARCH_PATH};
use crate::error::{Error, Result};
use crate::session::{Page, Session};

// ── Types ───────────────────────────────────────────────────────────────────

/// Marks and related data for one course year, as the API reports them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseMarks {
    /// Course year number (1-based).
    pub course: u32,
    pub semesters: Option<Value>,
    pub marks: Option<Value>,
    pub future_exam_session: Option<Value>,
}

/// Full report: the student descriptor plus one entry per course year the
/// grades system knows about, in ascending course order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarksReport {
    pub student: Value,
    pub courses: Vec<CourseMarks>,
}

// ── Client ──────────────────────────────────────────────────────────────────

/// Client for the public grades search and API.
#[derive(Debug, Clone)]
pub struct GradesClient {
    session: Session,
    base: String,
}

impl GradesClient {
    /// Client against the production grades host.
    pub fn new() -> Result<Self> {
        Self::with_base_url(GRADES_BASE)
    }

    /// Client against an explicit base URL (scheme + host).
    pub fn with_base_url(base: impl Into<String>) -> Result<Self> {
        let base: String = base.into();
        Ok(Self {
            session: Session::new()?,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch marks for every course year the grades system lists for the
    /// student.
    ///
    /// The discovery call must succeed; after it, a failing per-course call
    /// degrades to an entry with empty fields instead of sinking the whole
    /// report.
    pub async fn get_all_marks(
        &self,
        surname: &str,
        name: &str,
        group: &str,
    ) -> Result<MarksReport> {
        let context_id = self.resolve_context_id(surname, name, group).await?;
        // Course 1 doubles as the discovery call for the course list.
        let discovery = self.fetch_marks_required(context_id, 1).await?;
        let student = discovery
            .get("student")
            .cloned()
            .ok_or_else(|| Error::Remote("grades api reply has no `student` field".to_string()))?;
        let mut course_numbers = available_courses(&discovery)?;
        course_numbers.sort_unstable();
        course_numbers.dedup();

        let mut courses = Vec::with_capacity(course_numbers.len());
        for course in course_numbers {
            let payload = match self.try_fetch_marks(context_id, course).await? {
                Some(payload) => payload,
                None => {
                    warn!("grades api gave no data for course {course}, keeping an empty entry");
                    Value::Object(serde_json::Map::new())
                }
            };
            courses.push(CourseMarks {
                course,
                semesters: section(&payload, "semesters"),
                marks: section(&payload, "marks"),
                future_exam_session: section(&payload, "future_exam_session"),
            });
        }
        Ok(MarksReport { student, courses })
    }

    /// Fetch the raw API payload for one course year.
    ///
    /// A non-success API status yields an empty object, so the call never
    /// fails for a student the search can resolve.
    pub async fn get_marks_by_course(
        &self,
        surname: &str,
        name: &str,
        group: &str,
        course: u32,
    ) -> Result<Value> {
        let context_id = self.resolve_context_id(surname, name, group).await?;
        Ok(self
            .try_fetch_marks(context_id, course)
            .await?
            .unwrap_or_else(|| Value::Object(serde_json::Map::new())))
    }

    /// Fetch the aggregate statistics payload for a student.
    pub async fn get_statistics(&self, surname: &str, name: &str, group: &str) -> Result<Value> {
        let context_id = self.resolve_context_id(surname, name, group).await?;
        let url = format!("{}/api/students/{}/statistics", self.base, context_id);
        let params = [
            ("context_id", context_id.to_string()),
            ("context_type", "student".to_string()),
            ("role", "student_search".to_string()),
        ];
        let page = self
            .session
            .get_with_query(&url, &params)
            .await?
            .require_success()?;
        Ok(serde_json::from_str(&page.body)?)
    }

    /// Search for the student and read the `context_id` off the landing
    /// page.
    async fn resolve_context_id(&self, surname: &str, name: &str, group: &str) -> Result<u64> {
        let student_url = self.resolve_student_url(surname, name, group).await?;
        let page = self.session.get(&student_url).await?;
        extract_role_context_id(&page.body)
    }

    async fn resolve_student_url(&self, surname: &str, name: &str, group: &str) -> Result<String> {
        let search_url = format!("{}{}", self.base, STUDENT_SEARCH_PATH);
        let params = [
            ("utf8", "✓"),
            ("surname", surname),
            ("name", name),
            ("group", group),
            ("commit", "Найти"),
        ];
        let page = self.session.get_with_query(&search_url, &params).await?;
        if !page.redirected_from(STUDENT_SEARCH_PATH) {
            return Err(Error::StudentNotFound(format!("{surname} {name} {group}")));
        }
        debug!("student search resolved to {}", page.url);
        Ok(page.url.to_string())
    }

    async fn fetch_marks_required(&self, context_id: u64, course: u32) -> Result<Value> {
        let page = self.marks_page(context_id, course).await?.require_success()?;
        Ok(serde_json::from_str(&page.body)?)
    }

    async fn try_fetch_marks(&self, context_id: u64, course: u32) -> Result<Option<Value>> {
        let page = self.marks_page(context_id, course).await?;
        if !page.is_success() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&page.body)?))
    }

    async fn marks_page(&self, context_id: u64, course: u32) -> Result<Page> {
        let url = format!("{}/api/students/{}", self.base, context_id);
        let params = [
            ("context_id", context_id.to_string()),
            ("context_type", "student".to_string()),
            ("course", course.to_string()),
            ("role", "student_search".to_string()),
        ];
        self.session.get_with_query(&url, &params).await
    }
}

// ── Landing-page and payload decoding ───────────────────────────────────────

/// Read the numeric `context_id` from the JSON-encoded `data-role`
/// attribute of the student page's role-token element.
fn extract_role_context_id(html: &str) -> Result<u64> {
    let document = Html::parse_document(html);
    let token_sel = Selector::parse("span.js-role-token").expect("role token selector is valid");
    let element = document
        .select(&token_sel)
        .next()
        .ok_or_else(|| Error::Scrape("student role token not found".to_string()))?;
    let data = element
        .value()
        .attr("data-role")
        .ok_or_else(|| Error::Scrape("role token has no data-role attribute".to_string()))?;
    let role: Value = serde_json::from_str(data)?;
    role.get("context_id")
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::Scrape("role token carries no numeric context_id".to_string()))
}

/// One named section of a course payload; an absent key and an explicit
/// `null` both mean "nothing here".
fn section(payload: &Value, key: &str) -> Option<Value> {
    match payload.get(key) {
        None | Some(Value::Null) => None,
        Some(value) => Some(value.clone()),
    }
}

/// Course numbers from the discovery payload. The API reports them as
/// strings or numbers depending on the backend version.
fn available_courses(payload: &Value) -> Result<Vec<u32>> {
    let list = payload
        .get("available_courses")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            Error::Remote("grades api reply has no `available_courses` list".to_string())
        })?;
    list.iter().map(course_number).collect()
}

fn course_number(value: &Value) -> Result<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| Error::Remote(format!("unexpected course number in grades api reply: {value}")))
}

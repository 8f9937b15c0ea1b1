//! Weekly timetable search and grid parsing.
//!
//! The timetable system is public and searchable by one free-text term (a
//! group number, a teacher's surname or an auditorium). A matching search
//! redirects to the timetable page; a miss re-renders the search form, and
//! that missing redirect is the only "no results" signal the backend gives.
//! The timetable itself is one table per week: day labels across the
//! header, lesson slots down the rows.

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::endpoints::{TIMETABLE_BASE, TIMETABLE_SEARCH_PATH};
use crate::error::{Error, Result};
use crate::session::Session;
use crate::text::{normalize, normalize_non_empty};

// ── Types ───────────────────────────────────────────────────────────────────

/// A single timetable slot.
///
/// A slot with nothing scheduled keeps its place in the list with every
/// field `None`, so index `i` refers to the same time row on every day of
/// the week.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub time: Option<String>,
    pub discipline: Option<String>,
    pub kind: Option<String>,
    pub teacher: Option<String>,
}

impl Lesson {
    /// Whether the slot carries no scheduled lesson at all.
    pub fn is_empty(&self) -> bool {
        self.time.is_none()
            && self.discipline.is_none()
            && self.kind.is_none()
            && self.teacher.is_none()
    }
}

/// One day column of the weekly grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySchedule {
    /// Day label as rendered in the table header.
    pub day: String,
    pub lessons: Vec<Lesson>,
}

// ── Client ──────────────────────────────────────────────────────────────────

/// Client for the public timetable system.
#[derive(Debug, Clone)]
pub struct TimetableClient {
    session: Session,
    base: String,
}

impl TimetableClient {
    /// Client against the production timetable host.
    pub fn new() -> Result<Self> {
        Self::with_base_url(TIMETABLE_BASE)
    }

    /// Client against an explicit base URL (scheme + host).
    pub fn with_base_url(base: impl Into<String>) -> Result<Self> {
        let base: String = base.into();
        Ok(Self {
            session: Session::new()?,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    /// Resolve `query` and return that week's grid, day by day.
    ///
    /// `week_id` selects a specific week; `None` means the current one.
    pub async fn get_timetable(
        &self,
        query: &str,
        week_id: Option<u32>,
    ) -> Result<Vec<DaySchedule>> {
        let timetable_url = self.resolve_timetable_url(query).await?;
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(week) = week_id {
            params.push(("week_id", week.to_string()));
        }
        let page = self.session.get_with_query(&timetable_url, &params).await?;
        parse_timetable(&page.body)
    }

    /// Run the free-text search and return the timetable URL it redirects
    /// to, or [`Error::TimetableNotFound`] when it does not redirect.
    async fn resolve_timetable_url(&self, query: &str) -> Result<String> {
        let search_url = format!("{}{}", self.base, TIMETABLE_SEARCH_PATH);
        let params = [("utf8", "✓"), ("search[common]", query), ("commit", "")];
        let page = self.session.get_with_query(&search_url, &params).await?;
        if !page.redirected_from(TIMETABLE_SEARCH_PATH) {
            return Err(Error::TimetableNotFound(query.to_string()));
        }
        debug!("timetable search for {query:?} resolved to {}", page.url);
        Ok(page.url.to_string())
    }
}

// ── Grid parsing ────────────────────────────────────────────────────────────

fn parse_timetable(html: &str) -> Result<Vec<DaySchedule>> {
    let document = Html::parse_document(html);
    let table_sel = Selector::parse("table.table").expect("table selector is valid");
    let head_sel = Selector::parse("thead th").expect("header selector is valid");
    let row_sel = Selector::parse("tbody tr").expect("row selector is valid");
    let time_sel = Selector::parse("th.time").expect("time selector is valid");
    let cell_sel = Selector::parse("td").expect("cell selector is valid");
    let discipline_sel = Selector::parse("span.discipline").expect("discipline selector is valid");
    let kind_sel = Selector::parse("span.kind").expect("kind selector is valid");
    let teacher_sel = Selector::parse("span.group").expect("teacher selector is valid");

    let table = document
        .select(&table_sel)
        .next()
        .ok_or_else(|| Error::Scrape("timetable table not found".to_string()))?;

    let mut days: Vec<String> = table
        .select(&head_sel)
        .map(|th| normalize(&cell_text(&th)))
        .collect();
    // The header starts with a blank cell above the time column.
    if days.first().is_some_and(|day| day.is_empty()) {
        days.remove(0);
    }
    if days.is_empty() {
        return Err(Error::Scrape("timetable header has no day labels".to_string()));
    }

    let mut timetable: Vec<DaySchedule> = days
        .into_iter()
        .map(|day| DaySchedule {
            day,
            lessons: Vec::new(),
        })
        .collect();

    let span_text = |cell: &ElementRef, sel: &Selector| {
        cell.select(sel)
            .next()
            .and_then(|el| normalize_non_empty(&cell_text(&el)))
    };

    for row in table.select(&row_sel) {
        let time = row
            .select(&time_sel)
            .next()
            .and_then(|th| normalize_non_empty(&cell_text(&th)));
        let cells: Vec<ElementRef> = row.select(&cell_sel).collect();
        for (day_idx, schedule) in timetable.iter_mut().enumerate() {
            let lesson = match cells.get(day_idx) {
                Some(cell) => {
                    let discipline = span_text(cell, &discipline_sel);
                    let kind = span_text(cell, &kind_sel);
                    let teacher = span_text(cell, &teacher_sel);
                    // A contentless cell yields the all-None slot, row time
                    // included, so empty slots stay aligned across days.
                    if discipline.is_none()
                        && kind.is_none()
                        && teacher.is_none()
                        && normalize(&cell_text(cell)).is_empty()
                    {
                        Lesson::default()
                    } else {
                        Lesson {
                            time: time.clone(),
                            discipline,
                            kind,
                            teacher,
                        }
                    }
                }
                // Short rows pad out with empty slots.
                None => Lesson::default(),
            };
            schedule.lessons.push(lesson);
        }
    }
    Ok(timetable)
}

fn cell_text(element: &ElementRef) -> String {
    element.text().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEEK_PAGE: &str = r#"
<html><body>
<table class="table table-bordered">
  <thead>
    <tr>
      <th></th>
      <th>Пн 26 авг.</th>
      <th>Вт 27 авг.</th>
    </tr>
  </thead>
  <tbody>
    <tr>
      <th class="time">08:50 <br> 10:25</th>
      <td class="lesson_cell">
        <span class="discipline">Математическая
            логика</span>
        <span class="kind">Лекция</span>
        <span class="group"><a href="/teachers/42">Иванов И. И.</a></span>
      </td>
      <td class="lesson_cell"> </td>
    </tr>
    <tr>
      <th class="time">10:40 <br> 12:15</th>
      <td class="lesson_cell">
        <span class="discipline">Физика</span>
      </td>
      <td class="lesson_cell">Военная подготовка</td>
    </tr>
  </tbody>
</table>
</body></html>
"#;

    #[test]
    fn parses_days_in_header_order() {
        let timetable = parse_timetable(WEEK_PAGE).unwrap();
        let days: Vec<&str> = timetable.iter().map(|d| d.day.as_str()).collect();
        assert_eq!(days, ["Пн 26 авг.", "Вт 27 авг."]);
    }

    #[test]
    fn every_day_covers_every_time_row() {
        let timetable = parse_timetable(WEEK_PAGE).unwrap();
        for day in &timetable {
            assert_eq!(day.lessons.len(), 2);
        }
    }

    #[test]
    fn scheduled_slot_is_fully_populated_and_normalized() {
        let timetable = parse_timetable(WEEK_PAGE).unwrap();
        let lesson = &timetable[0].lessons[0];
        assert_eq!(lesson.time.as_deref(), Some("08:50 10:25"));
        assert_eq!(lesson.discipline.as_deref(), Some("Математическая логика"));
        assert_eq!(lesson.kind.as_deref(), Some("Лекция"));
        assert_eq!(lesson.teacher.as_deref(), Some("Иванов И. И."));
    }

    #[test]
    fn contentless_slot_is_all_none() {
        let timetable = parse_timetable(WEEK_PAGE).unwrap();
        assert!(timetable[1].lessons[0].is_empty());
    }

    #[test]
    fn partial_slots_keep_what_they_have() {
        let timetable = parse_timetable(WEEK_PAGE).unwrap();

        let physics = &timetable[0].lessons[1];
        assert_eq!(physics.discipline.as_deref(), Some("Физика"));
        assert_eq!(physics.kind, None);
        assert_eq!(physics.teacher, None);

        // Free-text cell without the usual spans still counts as occupied.
        let note = &timetable[1].lessons[1];
        assert!(!note.is_empty());
        assert_eq!(note.time.as_deref(), Some("10:40 12:15"));
        assert_eq!(note.discipline, None);
    }

    #[test]
    fn short_rows_pad_with_empty_slots() {
        let page = r#"
<table class="table">
  <thead><tr><th></th><th>Пн</th><th>Вт</th></tr></thead>
  <tbody>
    <tr>
      <th class="time">08:50</th>
      <td><span class="discipline">Химия</span></td>
    </tr>
  </tbody>
</table>
"#;
        let timetable = parse_timetable(page).unwrap();
        assert_eq!(timetable[0].lessons[0].discipline.as_deref(), Some("Химия"));
        assert!(timetable[1].lessons[0].is_empty());
    }

    #[test]
    fn missing_table_is_a_scrape_error() {
        let err = parse_timetable("<html><body>404</body></html>").unwrap_err();
        assert!(matches!(err, Error::Scrape(_)));
    }

    #[test]
    fn headerless_table_is_a_scrape_error() {
        let page = r#"<table class="table"><thead><tr><th></th></tr></thead><tbody></tbody></table>"#;
        assert!(parse_timetable(page).is_err());
    }
}

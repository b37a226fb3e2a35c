//! Request/response types shared by the tracker integration

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use tracklane_domain::{RemoteUser, Result, TracklaneError, WorklogRecord};

/// Continuation protocol used by [`PagedClient`](super::paging::PagedClient).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    /// Cursor-based: the server hands back an opaque token per page.
    Scroll,
    /// Page-number-based: the server reports a total page count.
    Paginate,
}

/// Metadata handed to the page sink along with each page.
#[derive(Debug, Clone, Default)]
pub struct PageMeta {
    /// True on, and only on, the final page of the fetch.
    pub is_last: bool,
    /// Page number, when the paginate protocol is driving.
    pub page: Option<u32>,
    /// Cursor for the next page, when the scroll protocol is driving.
    pub cursor: Option<String>,
    /// Last-seen total page count reported by the server.
    pub total_pages: Option<u32>,
    /// Last-seen total item count reported by the server.
    pub total_count: Option<u64>,
}

/// A request template for one paged resource.
///
/// Fixed named fields instead of a free-form header/parameter bag; protocol
/// parameters (`page`, `perPage`, `scrollId`, ...) are owned by the paging
/// engine and never set here.
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) body: Option<serde_json::Value>,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) headers: Vec<(String, String)>,
}

impl PageRequest {
    /// Build a request template.
    ///
    /// # Errors
    /// `InvalidInput` when the path is empty or not rooted.
    pub fn new(method: Method, path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        if path.is_empty() || !path.starts_with('/') {
            return Err(TracklaneError::InvalidInput(format!(
                "request path must start with '/', got {path:?}"
            )));
        }

        Ok(Self { method, path, body: None, query: Vec::new(), headers: Vec::new() })
    }

    /// GET template.
    pub fn get(path: impl Into<String>) -> Result<Self> {
        Self::new(Method::GET, path)
    }

    /// POST template.
    pub fn post(path: impl Into<String>) -> Result<Self> {
        Self::new(Method::POST, path)
    }

    /// Attach a JSON body sent on every round-trip.
    #[must_use]
    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Add a caller-owned query parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add a caller-owned header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }
}

// =============================================================================
// Wire DTOs
// =============================================================================

/// A user as the tracker API serializes it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RemoteUserDto {
    pub uid: Option<i64>,
    pub login: String,
    pub display: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub dismissed: bool,
}

impl From<RemoteUserDto> for RemoteUser {
    fn from(dto: RemoteUserDto) -> Self {
        Self {
            uid: dto.uid.map(|uid| uid.to_string()).unwrap_or_default(),
            login: dto.login,
            display_name: dto.display,
            email: dto.email,
            dismissed: dto.dismissed,
        }
    }
}

/// A worklog entry as the tracker API serializes it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WorklogDto {
    pub created_by: ActorDto,
    pub issue: IssueRefDto,
    /// ISO-8601 duration, e.g. `PT1H30M`.
    pub duration: String,
    pub start: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActorDto {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IssueRefDto {
    pub key: String,
}

impl TryFrom<WorklogDto> for WorklogRecord {
    type Error = TracklaneError;

    fn try_from(dto: WorklogDto) -> Result<Self> {
        let hours = parse_iso_duration_hours(&dto.duration)?;
        let started_at = parse_tracker_timestamp(&dto.start)?;
        let queue_key = queue_of(&dto.issue.key);

        Ok(Self {
            author: dto.created_by.id,
            issue_key: dto.issue.key,
            queue_key,
            project_id: None,
            hours,
            started_at,
        })
    }
}

/// Queue key is the issue-key prefix (`ZOTA-123` → `ZOTA`).
fn queue_of(issue_key: &str) -> Option<String> {
    issue_key.split_once('-').map(|(queue, _)| queue.to_string()).filter(|q| !q.is_empty())
}

/// Parse the tracker's timestamp format, which may use a colon-free UTC
/// offset (`+0000`) that strict RFC 3339 parsing rejects.
fn parse_tracker_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }

    DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.3f%z")
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| {
            TracklaneError::InvalidInput(format!("unparseable timestamp {raw:?}: {err}"))
        })
}

/// Parse an ISO-8601 duration into fractional hours.
///
/// Calendar designators use civil time (`P1D` = 24 h, `P1W` = 7 days);
/// fractional components are accepted anywhere (`PT1.5H`).
pub(crate) fn parse_iso_duration_hours(raw: &str) -> Result<f64> {
    let invalid =
        || TracklaneError::InvalidInput(format!("unparseable ISO-8601 duration {raw:?}"));

    let rest = raw.strip_prefix('P').ok_or_else(invalid)?;
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut hours = 0.0_f64;
    let mut in_time = false;
    let mut components = 0_usize;
    let mut time_components = 0_usize;
    let mut number = String::new();

    for ch in rest.chars() {
        match ch {
            'T' if !in_time && number.is_empty() => in_time = true,
            '0'..='9' | '.' => number.push(ch),
            unit => {
                let value: f64 = number.parse().map_err(|_| invalid())?;
                number.clear();

                let factor = match (in_time, unit) {
                    (false, 'W') => 7.0 * 24.0,
                    (false, 'D') => 24.0,
                    (true, 'H') => 1.0,
                    (true, 'M') => 1.0 / 60.0,
                    (true, 'S') => 1.0 / 3600.0,
                    _ => return Err(invalid()),
                };
                hours += value * factor;
                components += 1;
                if in_time {
                    time_components += 1;
                }
            }
        }
    }

    // A trailing number, a dangling 'T', or no components at all is malformed.
    if !number.is_empty() || components == 0 || (in_time && time_components == 0) {
        return Err(invalid());
    }

    Ok(hours)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_path_must_be_rooted() {
        assert!(PageRequest::get("v2/users").is_err());
        assert!(PageRequest::get("").is_err());
        assert!(PageRequest::get("/v2/users").is_ok());
    }

    #[test]
    fn durations_parse_to_fractional_hours() {
        assert_eq!(parse_iso_duration_hours("PT1H").unwrap(), 1.0);
        assert_eq!(parse_iso_duration_hours("PT1H30M").unwrap(), 1.5);
        assert_eq!(parse_iso_duration_hours("PT90M").unwrap(), 1.5);
        assert!((parse_iso_duration_hours("PT45S").unwrap() - 0.0125).abs() < 1e-12);
        assert_eq!(parse_iso_duration_hours("P1D").unwrap(), 24.0);
        assert_eq!(parse_iso_duration_hours("P1DT6H").unwrap(), 30.0);
        assert_eq!(parse_iso_duration_hours("P1W").unwrap(), 168.0);
        assert_eq!(parse_iso_duration_hours("PT1.5H").unwrap(), 1.5);
    }

    #[test]
    fn malformed_durations_are_rejected() {
        for raw in ["", "P", "1H", "PT", "PTH", "PT1", "PT1X", "P1H", "PT1H2", "P1DT"] {
            assert!(parse_iso_duration_hours(raw).is_err(), "{raw:?} should not parse");
        }
    }

    #[test]
    fn tracker_timestamps_parse_with_and_without_offset_colon() {
        let a = parse_tracker_timestamp("2026-01-15T10:00:00.000+0000").unwrap();
        let b = parse_tracker_timestamp("2026-01-15T10:00:00+00:00").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn worklog_dto_converts_with_queue_prefix() {
        let dto = WorklogDto {
            created_by: ActorDto { id: "jdoe".into() },
            issue: IssueRefDto { key: "ZOTA-123".into() },
            duration: "PT2H".into(),
            start: "2026-01-15T10:00:00.000+0000".into(),
        };

        let record = WorklogRecord::try_from(dto).unwrap();
        assert_eq!(record.queue_key.as_deref(), Some("ZOTA"));
        assert_eq!(record.hours, 2.0);
        assert_eq!(record.author, "jdoe");
    }

    #[test]
    fn issue_key_without_queue_prefix_yields_none() {
        assert_eq!(queue_of("NOQUEUE"), None);
        assert_eq!(queue_of("-123"), None);
    }
}

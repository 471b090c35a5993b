//! Read-only course data.
//!
//! The engine never queries the backend directly. Callers prefetch a
//! [`Catalog`] snapshot (or provide their own [`SessionProvider`]) and hand it
//! to selection reconciliation and schedule generation.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::session::{classify, Session, SessionGroups};

/// Identity and display metadata of a course in a given term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseInfo {
    /// Stable id, independent of course code renames.
    pub course_id: String,
    pub course_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_title: Option<String>,
    /// Provider credit string: "5", "3-5", "1-25".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_credit: Option<String>,
    pub term_id: String,
}

impl CourseInfo {
    pub fn new(
        course_id: impl Into<String>,
        course_code: impl Into<String>,
        term_id: impl Into<String>,
    ) -> Self {
        Self {
            course_id: course_id.into(),
            course_code: course_code.into(),
            course_title: None,
            course_credit: None,
            term_id: term_id.into(),
        }
    }

    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.course_title = Some(title.into());
        self
    }

    pub fn with_credit(mut self, credit: impl Into<String>) -> Self {
        self.course_credit = Some(credit.into());
        self
    }

    /// Leading number of the credit string ("3-5" counts as 3).
    pub fn credit_value(&self) -> Option<f32> {
        let credit = self.course_credit.as_deref()?.trim();
        let end = credit
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(credit.len());
        credit[..end].parse().ok()
    }
}

/// One course in one term, with every session the provider lists for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseOffering {
    #[serde(flatten)]
    pub course: CourseInfo,
    #[serde(default)]
    pub sessions: Vec<Session>,
}

impl CourseOffering {
    pub fn new(course: CourseInfo, sessions: Vec<Session>) -> Self {
        Self { course, sessions }
    }

    pub fn course_code(&self) -> &str {
        &self.course.course_code
    }

    pub fn groups(&self) -> SessionGroups {
        classify(&self.sessions)
    }

    pub fn session(&self, session_id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == session_id)
    }

    /// Look a session up by id first, then by code (case-insensitive).
    pub fn find_session(&self, id_or_code: &str) -> Option<&Session> {
        self.session(id_or_code).or_else(|| {
            self.sessions
                .iter()
                .find(|s| s.code.eq_ignore_ascii_case(id_or_code))
        })
    }
}

/// Read-only source of course offerings and sessions.
pub trait SessionProvider {
    /// Offering for a course code, optionally pinned to a term.
    fn offering(&self, course_code: &str, term_id: Option<&str>) -> Option<CourseOffering>;

    /// A session by its opaque id, from any offering.
    fn session(&self, session_id: &str) -> Option<Session>;
}

/// In-memory snapshot of provider data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub offerings: Vec<CourseOffering>,
}

impl Catalog {
    pub fn new(offerings: Vec<CourseOffering>) -> Self {
        Self { offerings }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a catalog snapshot from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or does not parse.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let catalog = Self::from_json(&content)?;
        tracing::debug!(
            path = %path.display(),
            offerings = catalog.offerings.len(),
            "loaded catalog"
        );
        Ok(catalog)
    }

    pub fn offerings(&self) -> &[CourseOffering] {
        &self.offerings
    }

    pub fn find(&self, course_code: &str, term_id: Option<&str>) -> Option<&CourseOffering> {
        self.offerings.iter().find(|o| {
            o.course.course_code.eq_ignore_ascii_case(course_code)
                && term_id.map_or(true, |t| o.course.term_id == t)
        })
    }
}

impl SessionProvider for Catalog {
    fn offering(&self, course_code: &str, term_id: Option<&str>) -> Option<CourseOffering> {
        self.find(course_code, term_id).cloned()
    }

    fn session(&self, session_id: &str) -> Option<Session> {
        self.offerings
            .iter()
            .find_map(|o| o.session(session_id))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "offerings": [
            {
                "course_id": "c-cse142",
                "course_code": "CSE 142",
                "course_title": "Computer Programming I",
                "course_credit": "4",
                "term_id": "2025-au",
                "sessions": [
                    { "id": "1001", "code": "A", "term_id": "2025-au",
                      "meetings": [{ "days": "MWF", "time": "9:30 AM - 10:20 AM" }] },
                    { "id": "1002", "code": "AA", "term_id": "2025-au",
                      "meetings": [{ "days": "Th", "time": "8:30 AM - 9:20 AM" }] }
                ]
            }
        ]
    }"#;

    #[test]
    fn parses_catalog_json() {
        let catalog = Catalog::from_json(SAMPLE).unwrap();
        let offering = catalog.find("cse 142", None).unwrap();
        assert_eq!(offering.course.course_id, "c-cse142");
        assert_eq!(offering.sessions.len(), 2);
        assert_eq!(offering.groups().secondaries_for("1001").len(), 1);
    }

    #[test]
    fn missing_catalog_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Catalog::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, crate::error::CoreError::Io(_)));

        let path = dir.path().join("catalog.json");
        std::fs::write(&path, SAMPLE).unwrap();
        assert_eq!(Catalog::load(&path).unwrap().offerings().len(), 1);
    }

    #[test]
    fn provider_looks_up_sessions_by_id() {
        let catalog = Catalog::from_json(SAMPLE).unwrap();
        assert_eq!(catalog.session("1002").map(|s| s.code), Some("AA".to_string()));
        assert!(catalog.session("nope").is_none());
        assert!(catalog.offering("CSE 142", Some("2026-wi")).is_none());
    }

    #[test]
    fn find_session_accepts_code_or_id() {
        let catalog = Catalog::from_json(SAMPLE).unwrap();
        let offering = catalog.find("CSE 142", Some("2025-au")).unwrap();
        assert_eq!(offering.find_session("aa").map(|s| s.id.as_str()), Some("1002"));
        assert_eq!(offering.find_session("1001").map(|s| s.code.as_str()), Some("A"));
    }

    #[test]
    fn credit_value_takes_leading_number() {
        let info = CourseInfo::new("c", "X", "t").with_credit("3-5");
        assert_eq!(info.credit_value(), Some(3.0));
        assert_eq!(CourseInfo::new("c", "X", "t").with_credit("4.5").credit_value(), Some(4.5));
        assert_eq!(CourseInfo::new("c", "X", "t").credit_value(), None);
    }
}

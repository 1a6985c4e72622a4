//! Daily attendance marking per course.
//!
//! Marking is an upsert keyed on (student, date, course): re-marking the
//! same student for the same class replaces the earlier status instead of
//! producing a second record.

use anyhow::{bail, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The fixed course catalogue attendance can be marked against.
pub const COURSES: &[&str] = &[
    "Software Testing And Automation",
    "Distributed Computing",
    "Compiler Design",
    "Computer Networks",
    "Cyber Security",
    "Cryptography and CyberSecurity",
];

/// Resolves a course name case-insensitively to its catalogue spelling.
pub fn resolve_course(name: &str) -> Option<&'static str> {
    COURSES
        .iter()
        .find(|course| course.eq_ignore_ascii_case(name))
        .copied()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    /// Late arrivals still count as attended in every report.
    pub fn counts_as_attended(self) -> bool {
        matches!(self, AttendanceStatus::Present | AttendanceStatus::Late)
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttendanceStatus::Present => write!(f, "Present"),
            AttendanceStatus::Absent => write!(f, "Absent"),
            AttendanceStatus::Late => write!(f, "Late"),
        }
    }
}

impl FromStr for AttendanceStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            "late" => Ok(AttendanceStatus::Late),
            other => bail!("Unknown attendance status: {other} (expected present/absent/late)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: String,
    /// College-issued student ID (matches `Student::student_id`).
    pub student_id: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub course: String,
    /// Username of the staff member who marked it.
    pub marked_by: String,
}

/// Whether a mark created a new record or replaced an earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    Created,
    Updated,
}

/// Status counts for one course/day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DayCounts {
    pub present: usize,
    pub absent: usize,
    pub late: usize,
}

/// In-memory attendance log with the persistence handled by the caller.
#[derive(Debug, Default)]
pub struct AttendanceLog {
    records: Vec<AttendanceRecord>,
}

impl AttendanceLog {
    pub fn new(records: Vec<AttendanceRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[AttendanceRecord] {
        &self.records
    }

    /// Marks one student for a course/day, replacing any earlier mark for
    /// the same class.
    ///
    /// # Errors
    ///
    /// Returns an error if the course is not in the catalogue.
    pub fn mark(
        &mut self,
        student_id: &str,
        date: NaiveDate,
        status: AttendanceStatus,
        course: &str,
        marked_by: &str,
    ) -> Result<MarkOutcome> {
        let Some(course) = resolve_course(course) else {
            bail!("Unknown course: {course}");
        };

        if let Some(existing) = self.records.iter_mut().find(|r| {
            r.student_id == student_id && r.date == date && r.course == course
        }) {
            existing.status = status;
            existing.marked_by = marked_by.to_string();
            return Ok(MarkOutcome::Updated);
        }

        self.records.push(AttendanceRecord {
            id: Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            date,
            status,
            course: course.to_string(),
            marked_by: marked_by.to_string(),
        });
        Ok(MarkOutcome::Created)
    }

    /// Marks every given student with the same status for one course/day.
    ///
    /// Returns the number of students marked.
    pub fn mark_all(
        &mut self,
        student_ids: &[String],
        date: NaiveDate,
        status: AttendanceStatus,
        course: &str,
        marked_by: &str,
    ) -> Result<usize> {
        for student_id in student_ids {
            self.mark(student_id, date, status, course, marked_by)?;
        }
        Ok(student_ids.len())
    }

    /// Status tally for one course/day.
    pub fn day_counts(&self, date: NaiveDate, course: &str) -> DayCounts {
        let mut counts = DayCounts::default();
        for record in self
            .records
            .iter()
            .filter(|r| r.date == date && r.course.eq_ignore_ascii_case(course))
        {
            match record.status {
                AttendanceStatus::Present => counts.present += 1,
                AttendanceStatus::Absent => counts.absent += 1,
                AttendanceStatus::Late => counts.late += 1,
            }
        }
        counts
    }
}

//! Aggregated attendance reporting and CSV export.
//!
//! A `Present` or `Late` record counts as attended; percentages are rounded
//! to whole numbers and a student with no matching records reports 0%.

use crate::attendance::AttendanceRecord;
use crate::roster::Student;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::io::Write;

/// Filters applied before aggregation. Every field is optional; `None`
/// means "all". Date bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub course: Option<String>,
    pub student_id: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl ReportFilter {
    fn matches_record(&self, record: &AttendanceRecord) -> bool {
        if let Some(course) = &self.course {
            if !record.course.eq_ignore_ascii_case(course) {
                return false;
            }
        }
        if let Some(from) = self.from {
            if record.date < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if record.date > to {
                return false;
            }
        }
        true
    }

    fn matches_student(&self, student: &Student) -> bool {
        match &self.student_id {
            Some(id) => student.student_id.eq_ignore_ascii_case(id),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentReport {
    pub student_id: String,
    pub name: String,
    pub department: String,
    pub batch: String,
    pub total_classes: usize,
    pub present_classes: usize,
    pub absent_classes: usize,
    pub attendance_percentage: u32,
}

#[derive(Debug, Clone)]
pub struct CourseStat {
    pub course: String,
    pub total_records: usize,
    pub present_records: usize,
    pub percentage: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct ReportSummary {
    pub total_students: usize,
    pub average_attendance: u32,
    pub highest_attendance: u32,
    pub lowest_attendance: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct DistributionBucket {
    pub range: &'static str,
    pub count: usize,
}

fn percentage(attended: usize, total: usize) -> u32 {
    if total == 0 {
        0
    } else {
        ((attended as f64 / total as f64) * 100.0).round() as u32
    }
}

/// One report row per student passing the filter.
pub fn student_reports(
    students: &[Student],
    records: &[AttendanceRecord],
    filter: &ReportFilter,
) -> Vec<StudentReport> {
    students
        .iter()
        .filter(|student| filter.matches_student(student))
        .map(|student| {
            let matching: Vec<&AttendanceRecord> = records
                .iter()
                .filter(|r| r.student_id == student.student_id && filter.matches_record(r))
                .collect();
            let total = matching.len();
            let present = matching
                .iter()
                .filter(|r| r.status.counts_as_attended())
                .count();
            StudentReport {
                student_id: student.student_id.clone(),
                name: student.name.clone(),
                department: student.department.clone(),
                batch: student.batch.clone(),
                total_classes: total,
                present_classes: present,
                absent_classes: total - present,
                attendance_percentage: percentage(present, total),
            }
        })
        .collect()
}

/// Per-course attendance rates over the filtered records, in first-seen
/// course order.
pub fn course_stats(records: &[AttendanceRecord], filter: &ReportFilter) -> Vec<CourseStat> {
    let mut stats: Vec<CourseStat> = Vec::new();
    for record in records.iter().filter(|r| filter.matches_record(r)) {
        let stat = match stats.iter_mut().find(|s| s.course == record.course) {
            Some(stat) => stat,
            None => {
                stats.push(CourseStat {
                    course: record.course.clone(),
                    total_records: 0,
                    present_records: 0,
                    percentage: 0,
                });
                // Just pushed, so last_mut() is always present.
                stats.last_mut().unwrap()
            }
        };
        stat.total_records += 1;
        if record.status.counts_as_attended() {
            stat.present_records += 1;
        }
    }
    for stat in &mut stats {
        stat.percentage = percentage(stat.present_records, stat.total_records);
    }
    stats
}

/// Roll-up over a set of per-student reports.
pub fn summary(reports: &[StudentReport]) -> ReportSummary {
    let average = if reports.is_empty() {
        0
    } else {
        let sum: u32 = reports.iter().map(|r| r.attendance_percentage).sum();
        ((sum as f64) / (reports.len() as f64)).round() as u32
    };
    ReportSummary {
        total_students: reports.len(),
        average_attendance: average,
        highest_attendance: reports
            .iter()
            .map(|r| r.attendance_percentage)
            .max()
            .unwrap_or(0),
        lowest_attendance: reports
            .iter()
            .map(|r| r.attendance_percentage)
            .min()
            .unwrap_or(100),
    }
}

/// Buckets the per-student percentages for the distribution table.
pub fn distribution(reports: &[StudentReport]) -> Vec<DistributionBucket> {
    let count_in = |lo: u32, hi: u32| {
        reports
            .iter()
            .filter(|r| r.attendance_percentage >= lo && r.attendance_percentage <= hi)
            .count()
    };
    vec![
        DistributionBucket {
            range: "90-100%",
            count: count_in(90, 100),
        },
        DistributionBucket {
            range: "80-89%",
            count: count_in(80, 89),
        },
        DistributionBucket {
            range: "70-79%",
            count: count_in(70, 79),
        },
        DistributionBucket {
            range: "60-69%",
            count: count_in(60, 69),
        },
        DistributionBucket {
            range: "Below 60%",
            count: reports
                .iter()
                .filter(|r| r.attendance_percentage < 60)
                .count(),
        },
    ]
}

/// Writes the per-student report as CSV.
pub fn export_csv<W: Write>(writer: W, reports: &[StudentReport]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer
        .write_record([
            "Student_ID",
            "Name",
            "Department",
            "Batch",
            "Total_Classes",
            "Present_Classes",
            "Absent_Classes",
            "Attendance_Percentage",
        ])
        .context("Failed to write CSV header")?;

    for report in reports {
        csv_writer
            .write_record([
                report.student_id.as_str(),
                report.name.as_str(),
                report.department.as_str(),
                report.batch.as_str(),
                &report.total_classes.to_string(),
                &report.present_classes.to_string(),
                &report.absent_classes.to_string(),
                &format!("{}%", report.attendance_percentage),
            ])
            .with_context(|| format!("Failed to write CSV row for {}", report.student_id))?;
    }
    csv_writer.flush().context("Failed to flush CSV output")?;
    Ok(())
}

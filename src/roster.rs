//! Student roster records and operations.

use anyhow::{bail, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    /// Internal record id.
    pub id: String,
    pub name: String,
    /// College-issued student ID, unique across the roster.
    pub student_id: String,
    pub department: String,
    pub batch: String,
    pub email: String,
    pub phone: String,
    /// Path to a stored photo, if one was provided. The file itself is
    /// opaque to this tool.
    #[serde(default)]
    pub photo: Option<String>,
    pub enrollment_date: NaiveDate,
}

/// Form data for a new roster entry.
#[derive(Debug, Clone)]
pub struct NewStudent {
    pub name: String,
    pub student_id: String,
    pub department: String,
    pub batch: String,
    pub email: String,
    pub phone: String,
    pub photo: Option<String>,
    pub enrollment_date: NaiveDate,
}

/// In-memory roster with the persistence handled by the caller.
#[derive(Debug, Default)]
pub struct Roster {
    students: Vec<Student>,
}

impl Roster {
    pub fn new(students: Vec<Student>) -> Self {
        Self { students }
    }

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    /// Adds a student, rejecting duplicate college-issued IDs.
    ///
    /// # Errors
    ///
    /// Returns an error if required fields are empty or the student ID is
    /// already on the roster.
    pub fn add(&mut self, new: NewStudent) -> Result<&Student> {
        if new.name.trim().is_empty() || new.student_id.trim().is_empty() {
            bail!("Student name and ID are required");
        }
        if self.find_by_student_id(&new.student_id).is_some() {
            bail!("A student with ID {} already exists", new.student_id);
        }

        self.students.push(Student {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            student_id: new.student_id,
            department: new.department,
            batch: new.batch,
            email: new.email,
            phone: new.phone,
            photo: new.photo,
            enrollment_date: new.enrollment_date,
        });
        // Just pushed, so last() is always present.
        Ok(self.students.last().unwrap())
    }

    /// Replaces an existing record, matched by internal id.
    ///
    /// # Errors
    ///
    /// Returns an error if no record with that id exists, or if the edit
    /// would collide with another student's college-issued ID.
    pub fn update(&mut self, updated: Student) -> Result<()> {
        if self
            .students
            .iter()
            .any(|s| s.id != updated.id && s.student_id.eq_ignore_ascii_case(&updated.student_id))
        {
            bail!("A student with ID {} already exists", updated.student_id);
        }
        match self.students.iter_mut().find(|s| s.id == updated.id) {
            Some(slot) => {
                *slot = updated;
                Ok(())
            }
            None => bail!("No student record with id {}", updated.id),
        }
    }

    /// Removes a student by college-issued ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the ID is not on the roster.
    pub fn remove(&mut self, student_id: &str) -> Result<Student> {
        match self
            .students
            .iter()
            .position(|s| s.student_id.eq_ignore_ascii_case(student_id))
        {
            Some(index) => Ok(self.students.remove(index)),
            None => bail!("No student with ID {student_id}"),
        }
    }

    pub fn find_by_student_id(&self, student_id: &str) -> Option<&Student> {
        self.students
            .iter()
            .find(|s| s.student_id.eq_ignore_ascii_case(student_id))
    }

    /// Case-insensitive substring search over name, student ID and
    /// department.
    pub fn search(&self, term: &str) -> Vec<&Student> {
        let term = term.to_lowercase();
        self.students
            .iter()
            .filter(|s| {
                s.name.to_lowercase().contains(&term)
                    || s.student_id.to_lowercase().contains(&term)
                    || s.department.to_lowercase().contains(&term)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_student(name: &str, student_id: &str) -> NewStudent {
        NewStudent {
            name: name.to_string(),
            student_id: student_id.to_string(),
            department: "CSE".to_string(),
            batch: "2022-2026".to_string(),
            email: format!("{student_id}@example.edu"),
            phone: "9000000000".to_string(),
            photo: None,
            enrollment_date: NaiveDate::from_ymd_opt(2022, 8, 1).expect("valid date"),
        }
    }

    #[test]
    fn add_assigns_a_fresh_record_id() {
        let mut roster = Roster::default();
        let id = roster.add(new_student("Arun K", "CS101")).expect("add").id.clone();
        let other = roster.add(new_student("Divya R", "CS102")).expect("add");
        assert_ne!(id, other.id);
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn duplicate_student_id_is_rejected() {
        let mut roster = Roster::default();
        roster.add(new_student("Arun K", "CS101")).expect("add");
        assert!(roster.add(new_student("Someone Else", "cs101")).is_err());
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn empty_name_or_id_is_rejected() {
        let mut roster = Roster::default();
        assert!(roster.add(new_student("", "CS101")).is_err());
        assert!(roster.add(new_student("Arun K", "  ")).is_err());
    }

    #[test]
    fn update_replaces_the_matching_record() {
        let mut roster = Roster::default();
        let mut student = roster.add(new_student("Arun K", "CS101")).expect("add").clone();
        student.department = "ECE".to_string();
        roster.update(student).expect("update");
        assert_eq!(roster.students()[0].department, "ECE");
    }

    #[test]
    fn update_cannot_steal_another_students_id() {
        let mut roster = Roster::default();
        roster.add(new_student("Arun K", "CS101")).expect("add");
        let mut second = roster.add(new_student("Divya R", "CS102")).expect("add").clone();
        second.student_id = "CS101".to_string();
        assert!(roster.update(second).is_err());
    }

    #[test]
    fn remove_by_college_id() {
        let mut roster = Roster::default();
        roster.add(new_student("Arun K", "CS101")).expect("add");
        let removed = roster.remove("CS101").expect("remove");
        assert_eq!(removed.name, "Arun K");
        assert!(roster.is_empty());
        assert!(roster.remove("CS101").is_err());
    }

    #[test]
    fn search_matches_name_id_and_department() {
        let mut roster = Roster::default();
        roster.add(new_student("Arun Kumar", "CS101")).expect("add");
        roster.add(new_student("Divya R", "EC201")).expect("add");

        assert_eq!(roster.search("arun").len(), 1);
        assert_eq!(roster.search("ec2").len(), 1);
        assert_eq!(roster.search("cse").len(), 2);
        assert!(roster.search("nobody").is_empty());
    }
}

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

/// Placeholder stored in `yearLevel` / `course` when the field was never supplied.
pub const NOT_SUPPLIED: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grade {
    pub subject: String,
    pub grade: String,
}

impl Grade {
    pub fn new(subject: impl Into<String>, grade: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            grade: grade.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    pub grades: Vec<Grade>,
    #[serde(default = "not_supplied")]
    pub year_level: String,
    #[serde(default = "not_supplied")]
    pub course: String,
}

fn not_supplied() -> String {
    NOT_SUPPLIED.to_string()
}

/// Update applied to an optional field during an upsert.
///
/// On the wire an absent key is `Keep`, an explicit `null` is `Clear` and any
/// other value is `Set`. Fields using this type must carry `#[serde(default)]`
/// so that the absent case reaches `Default`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate<T> {
    Keep,
    Clear,
    Set(T),
}

impl<T> Default for FieldUpdate<T> {
    fn default() -> Self {
        FieldUpdate::Keep
    }
}

impl<T> FieldUpdate<T> {
    pub fn apply(self, current: &mut Option<T>) {
        match self {
            FieldUpdate::Keep => {}
            FieldUpdate::Clear => *current = None,
            FieldUpdate::Set(v) => *current = Some(v),
        }
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            FieldUpdate::Set(v) => Some(v),
            _ => None,
        }
    }
}

impl FieldUpdate<String> {
    /// Text fields fall back to `NOT_SUPPLIED` instead of going empty.
    fn apply_text(self, current: &mut String) {
        match self {
            FieldUpdate::Keep => {}
            FieldUpdate::Clear => *current = NOT_SUPPLIED.to_string(),
            FieldUpdate::Set(v) => *current = v,
        }
    }
}

impl<'de, T> Deserialize<'de> for FieldUpdate<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(v) => FieldUpdate::Set(v),
            None => FieldUpdate::Clear,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpsertInput {
    pub name: String,
    pub subject: String,
    pub grade: String,
    pub image: FieldUpdate<String>,
    pub year_level: FieldUpdate<String>,
    pub course: FieldUpdate<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created { id: String },
    Merged { id: String },
}

impl UpsertOutcome {
    pub fn id(&self) -> &str {
        match self {
            UpsertOutcome::Created { id } | UpsertOutcome::Merged { id } => id,
        }
    }

    pub fn created(&self) -> bool {
        matches!(self, UpsertOutcome::Created { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("submission not found: {0}")]
    NotFound(String),
    #[error("name {name:?} is already used by submission {existing_id}")]
    NameConflict { name: String, existing_id: String },
    #[error("submission {0} must keep at least one grade")]
    EmptyGrades(String),
    #[error("snapshot contains more than one submission named {0:?}")]
    DuplicateName(String),
    #[error("snapshot contains a missing or repeated submission id {0:?}")]
    DuplicateId(String),
}

impl RegistryError {
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::NotFound(_) => "not_found",
            RegistryError::NameConflict { .. } => "name_conflict",
            RegistryError::EmptyGrades(_) => "empty_grades",
            RegistryError::DuplicateName(_) => "duplicate_name",
            RegistryError::DuplicateId(_) => "duplicate_id",
        }
    }
}

/// Names are compared case-insensitively everywhere in the registry.
pub fn same_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// The authoritative list of submissions, in order of first creation.
///
/// `revision` increases by one on every successful mutation so that callers
/// can tell whether a snapshot they hold is stale.
#[derive(Debug, Clone, Default)]
pub struct SubmissionRegistry {
    submissions: Vec<Submission>,
    revision: u64,
}

impl SubmissionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> &[Submission] {
        &self.submissions
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.submissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.submissions.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Submission> {
        self.submissions.iter().find(|s| s.id == id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Submission> {
        self.submissions.iter().find(|s| same_name(&s.name, name))
    }

    /// Appends a grade to the record named `input.name`, creating the record
    /// if no name matches.
    pub fn upsert(&mut self, input: UpsertInput) -> UpsertOutcome {
        let UpsertInput {
            name,
            subject,
            grade,
            image,
            year_level,
            course,
        } = input;
        let entry = Grade::new(subject, grade);
        self.revision += 1;

        if let Some(idx) = self.submissions.iter().position(|s| same_name(&s.name, &name)) {
            let existing = &mut self.submissions[idx];
            existing.grades.push(entry);
            image.apply(&mut existing.image);
            year_level.apply_text(&mut existing.year_level);
            course.apply_text(&mut existing.course);
            return UpsertOutcome::Merged {
                id: existing.id.clone(),
            };
        }

        let mut created = Submission {
            id: Uuid::new_v4().to_string(),
            name,
            image: None,
            grades: vec![entry],
            year_level: not_supplied(),
            course: not_supplied(),
        };
        image.apply(&mut created.image);
        year_level.apply_text(&mut created.year_level);
        course.apply_text(&mut created.course);

        let id = created.id.clone();
        self.submissions.push(created);
        UpsertOutcome::Created { id }
    }

    /// Replaces the record with the same id, keeping its position.
    pub fn replace(&mut self, submission: Submission) -> Result<(), RegistryError> {
        let Some(idx) = self.submissions.iter().position(|s| s.id == submission.id) else {
            return Err(RegistryError::NotFound(submission.id));
        };
        if submission.grades.is_empty() {
            return Err(RegistryError::EmptyGrades(submission.id));
        }
        if let Some(other) = self
            .submissions
            .iter()
            .find(|s| s.id != submission.id && same_name(&s.name, &submission.name))
        {
            return Err(RegistryError::NameConflict {
                name: submission.name,
                existing_id: other.id.clone(),
            });
        }

        self.submissions[idx] = submission;
        self.revision += 1;
        Ok(())
    }

    pub fn delete(&mut self, id: &str) -> Result<Submission, RegistryError> {
        let Some(idx) = self.submissions.iter().position(|s| s.id == id) else {
            return Err(RegistryError::NotFound(id.to_string()));
        };
        let removed = self.submissions.remove(idx);
        self.revision += 1;
        Ok(removed)
    }

    /// Swaps in a stored snapshot. The registry is untouched if the snapshot
    /// repeats an id or a name, or holds a record without grades.
    pub fn restore(&mut self, records: Vec<Submission>) -> Result<usize, RegistryError> {
        let mut seen = HashSet::new();
        let mut ids = HashSet::new();
        for r in &records {
            if r.id.trim().is_empty() || !ids.insert(r.id.as_str()) {
                return Err(RegistryError::DuplicateId(r.id.clone()));
            }
            if r.grades.is_empty() {
                return Err(RegistryError::EmptyGrades(r.id.clone()));
            }
            if !seen.insert(r.name.to_lowercase()) {
                return Err(RegistryError::DuplicateName(r.name.clone()));
            }
        }
        let count = records.len();
        self.submissions = records;
        self.revision += 1;
        Ok(count)
    }
}

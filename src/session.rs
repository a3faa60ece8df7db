use crate::error::{GradeError, Result};
use crate::rows::RowStore;
use crate::tree::{self, BuildIssue, Hierarchy, Item};
use tracing::{debug, info};
use uuid::Uuid;

/// Edit context for the one course currently open.
///
/// Created on course entry, dropped on navigate-away, committed into the
/// [`RowStore`] on save. The hierarchy is a scratch copy until then.
#[derive(Debug, Clone)]
pub struct EditSession {
    pub id: String,
    pub semester: String,
    pub course: String,
    pub hierarchy: Hierarchy,
    pub issues: Vec<BuildIssue>,
    pub dirty: bool,
    max_depth: usize,
}

impl EditSession {
    pub fn open(store: &RowStore, semester: &str, course: &str, max_depth: usize) -> Self {
        let built = tree::build_tree(store.rows(), semester, course, max_depth);
        let id = Uuid::new_v4().to_string();
        info!(
            session = %id,
            semester,
            course,
            items = built.items.len(),
            issues = built.issues.len(),
            "course opened"
        );
        Self {
            id,
            semester: semester.to_string(),
            course: course.to_string(),
            hierarchy: built.items,
            issues: built.issues,
            dirty: false,
            max_depth,
        }
    }

    pub fn check_id(&self, requested: Option<&str>) -> Result<()> {
        match requested {
            Some(id) if id != self.id => Err(GradeError::StaleSession(id.to_string())),
            _ => Ok(()),
        }
    }

    /// Recompute category grades and the course total.
    pub fn total(&mut self) -> f64 {
        tree::compute_total(&mut self.hierarchy)
    }

    pub fn add(&mut self, parent: &[String], name: &str, item: Item) -> Result<()> {
        tree::add_item(&mut self.hierarchy, parent, name, item, self.max_depth)?;
        self.dirty = true;
        debug!(parent = %tree::join_path(parent), name, "item added");
        Ok(())
    }

    pub fn rename(&mut self, path: &[String], new_name: &str) -> Result<()> {
        tree::rename_item(&mut self.hierarchy, path, new_name)?;
        self.dirty = true;
        debug!(path = %tree::join_path(path), new_name, "item renamed");
        Ok(())
    }

    pub fn delete(&mut self, path: &[String]) -> Result<()> {
        tree::delete_item(&mut self.hierarchy, path)?;
        self.dirty = true;
        debug!(path = %tree::join_path(path), "item deleted");
        Ok(())
    }

    pub fn update(&mut self, path: &[String], weight: Option<f64>, grade: Option<f64>) -> Result<()> {
        tree::update_item(&mut self.hierarchy, path, weight, grade)?;
        self.dirty = true;
        Ok(())
    }

    /// Flatten the hierarchy into `store`, replacing this course's rows.
    /// Returns the number of rows written. The session stays dirty until
    /// [`EditSession::mark_saved`].
    pub fn stage(&self, store: &mut RowStore) -> usize {
        let rows = tree::flatten_tree(&self.hierarchy, &self.semester, &self.course);
        let written = rows.len();
        let removed = store.replace_course(&self.semester, &self.course, rows);
        debug!(session = %self.id, removed, written, "course staged");
        written
    }

    pub fn mark_saved(&mut self, written: usize) {
        self.dirty = false;
        info!(
            session = %self.id,
            semester = %self.semester,
            course = %self.course,
            written,
            "course saved"
        );
    }
}

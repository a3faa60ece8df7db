use serde::Serialize;
use std::collections::BTreeSet;

/// Textual stand-ins for "no value" that older exports wrote into text cells.
const PLACEHOLDER_TEXT: [&str; 2] = ["None", "nan"];

/// One persisted record: a graded item, or a sentinel keeping a course/term listed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub semester: String,
    pub course: Option<String>,
    pub path: Option<String>,
    pub weight: f64,
    pub grade: f64,
}

impl Row {
    pub fn item(semester: &str, course: &str, path: &str, weight: f64, grade: f64) -> Self {
        Self {
            semester: semester.to_string(),
            course: Some(course.to_string()),
            path: Some(path.to_string()),
            weight,
            grade,
        }
    }

    /// Placeholder row for a course with no items.
    pub fn course_sentinel(semester: &str, course: &str) -> Self {
        Self {
            semester: semester.to_string(),
            course: Some(course.to_string()),
            path: None,
            weight: 0.0,
            grade: 0.0,
        }
    }

    /// Placeholder row for a term with no courses.
    pub fn term_sentinel(semester: &str) -> Self {
        Self {
            semester: semester.to_string(),
            course: None,
            path: None,
            weight: 0.0,
            grade: 0.0,
        }
    }

    pub fn belongs_to(&self, semester: &str, course: &str) -> bool {
        self.semester == semester && self.course.as_deref() == Some(course)
    }

    /// Path carrying item content, or `None` for sentinel rows.
    pub fn item_path(&self) -> Option<&str> {
        match self.path.as_deref() {
            Some(p) if !is_placeholder(Some(p)) => Some(p),
            _ => None,
        }
    }
}

pub fn is_placeholder(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(v) => v.is_empty() || PLACEHOLDER_TEXT.contains(&v),
    }
}

/// Flat, ordered table of rows. The only durable state.
#[derive(Debug, Clone, Default)]
pub struct RowStore {
    rows: Vec<Row>,
}

impl RowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }


    /// Replace-on-save: drop every row of (semester, course), then append `new_rows`.
    /// Rows of other courses keep their relative order. Returns the number removed.
    pub fn replace_course(&mut self, semester: &str, course: &str, new_rows: Vec<Row>) -> usize {
        let before = self.rows.len();
        self.rows.retain(|r| !r.belongs_to(semester, course));
        let removed = before - self.rows.len();
        self.rows.extend(new_rows);
        removed
    }

    /// Sorted, de-duplicated term names.
    pub fn terms(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter(|r| !is_placeholder(Some(r.semester.as_str())))
            .map(|r| r.semester.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Courses of a term in first-appearance order; placeholders excluded.
    pub fn courses(&self, semester: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for r in self.rows.iter().filter(|r| r.semester == semester) {
            let Some(course) = r.course.as_deref() else {
                continue;
            };
            if is_placeholder(Some(course)) || out.iter().any(|c| c == course) {
                continue;
            }
            out.push(course.to_string());
        }
        out
    }

    pub fn create_term(&mut self, semester: &str) {
        self.rows.push(Row::term_sentinel(semester));
    }

    pub fn create_course(&mut self, semester: &str, course: &str) {
        self.rows.push(Row::course_sentinel(semester, course));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_store() -> RowStore {
        RowStore::from_rows(vec![
            Row::item("1A", "MATH135", "Midterm", 30.0, 70.0),
            Row::item("1A", "CS100", "Midterm", 30.0, 85.0),
            Row::item("1B", "CS136", "A1", 10.0, 90.0),
            Row::item("1A", "CS100", "Final", 40.0, 90.0),
            Row::item("1A", "MATH135", "Final", 50.0, 60.0),
        ])
    }

    #[test]
    fn replace_course_keeps_other_rows_in_order() {
        let mut store = sample_store();
        let others_before: Vec<Row> = store
            .rows()
            .iter()
            .filter(|r| !r.belongs_to("1A", "CS100"))
            .cloned()
            .collect();

        let removed = store.replace_course(
            "1A",
            "CS100",
            vec![Row::item("1A", "CS100", "Quiz", 5.0, 100.0)],
        );
        assert_eq!(removed, 2);

        let others_after: Vec<Row> = store
            .rows()
            .iter()
            .filter(|r| !r.belongs_to("1A", "CS100"))
            .cloned()
            .collect();
        assert_eq!(others_before, others_after);
        assert_eq!(store.rows().last().and_then(|r| r.path.as_deref()), Some("Quiz"));
        assert_eq!(store.rows().iter().filter(|r| r.belongs_to("1A", "CS100")).count(), 1);
    }

    #[test]
    fn terms_are_sorted_and_courses_keep_first_appearance() {
        let mut store = sample_store();
        store.create_term("0Z");
        store.create_course("1A", "ECON101");
        store.create_course("1A", "None");

        assert_eq!(store.terms(), vec!["0Z", "1A", "1B"]);
        assert_eq!(store.courses("1A"), vec!["MATH135", "CS100", "ECON101"]);
        assert!(store.courses("0Z").is_empty());
    }

    #[test]
    fn placeholder_paths_carry_no_item() {
        assert_eq!(Row::course_sentinel("1A", "CS100").item_path(), None);
        let mut r = Row::item("1A", "CS100", "nan", 0.0, 0.0);
        assert_eq!(r.item_path(), None);
        r.path = Some("None".into());
        assert_eq!(r.item_path(), None);
        r.path = Some("HW/HW1".into());
        assert_eq!(r.item_path(), Some("HW/HW1"));
    }
}

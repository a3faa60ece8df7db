use crate::error::{GradeError, Result};
use crate::rows::{is_placeholder, Row};
use serde::ser::{SerializeSeq, Serializer};
use serde::Serialize;
use tracing::warn;

pub const DEFAULT_MAX_DEPTH: usize = 32;
pub const PATH_SEPARATOR: char = '/';

/// A node of a course's grade hierarchy.
///
/// Category `weight` is kept for symmetry with leaves but never enters the
/// score; category `grade` is overwritten by [`compute_total`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Item {
    Leaf {
        weight: f64,
        grade: f64,
    },
    Category {
        weight: f64,
        grade: f64,
        #[serde(rename = "subItems")]
        sub_items: ItemMap,
    },
}

impl Item {
    pub fn leaf(weight: f64, grade: f64) -> Self {
        Item::Leaf { weight, grade }
    }

    pub fn category() -> Self {
        Item::Category {
            weight: 0.0,
            grade: 0.0,
            sub_items: ItemMap::new(),
        }
    }

    #[cfg(test)]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Item::Leaf { .. })
    }

    #[cfg(test)]
    pub fn grade(&self) -> f64 {
        match self {
            Item::Leaf { grade, .. } | Item::Category { grade, .. } => *grade,
        }
    }

    pub fn sub_items(&self) -> Option<&ItemMap> {
        match self {
            Item::Category { sub_items, .. } => Some(sub_items),
            Item::Leaf { .. } => None,
        }
    }
}

/// Insertion-ordered name -> item mapping. Order is display order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemMap {
    entries: Vec<(String, Item)>,
}

/// Root mapping of one (semester, course).
pub type Hierarchy = ItemMap;

impl ItemMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Item> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, item)| item)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Item> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, item)| item)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Item)> {
        self.entries.iter().map(|(n, item)| (n.as_str(), item))
    }

    #[cfg(test)]
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Insert or overwrite. An existing key keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, item: Item) -> Option<Item> {
        let name = name.into();
        match self.position(&name) {
            Some(idx) => Some(std::mem::replace(&mut self.entries[idx].1, item)),
            None => {
                self.entries.push((name, item));
                None
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Item> {
        let idx = self.position(name)?;
        Some(self.entries.remove(idx).1)
    }

    /// Rename in place. A sibling already holding `new_name` is replaced.
    pub fn rename(&mut self, old_name: &str, new_name: &str) -> bool {
        let Some(mut idx) = self.position(old_name) else {
            return false;
        };
        if old_name == new_name {
            return true;
        }
        if let Some(clash) = self.position(new_name) {
            self.entries.remove(clash);
            if clash < idx {
                idx -= 1;
            }
        }
        self.entries[idx].0 = new_name.to_string();
        true
    }
}

#[derive(Serialize)]
struct NamedItem<'a> {
    name: &'a str,
    #[serde(flatten)]
    item: &'a Item,
}

impl Serialize for ItemMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.entries.len()))?;
        for (name, item) in &self.entries {
            seq.serialize_element(&NamedItem { name, item })?;
        }
        seq.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A non-final segment named an existing leaf; later segments were
    /// attached at the leaf's level.
    LeafCollision,
    /// The final segment named an existing category; the row was dropped.
    CategoryCollision,
    /// The path was already present; the earlier row was kept.
    DuplicatePath,
    /// The path had more segments than the depth limit allows.
    TooDeep,
}

/// Non-fatal problem found while building a hierarchy from rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildIssue {
    pub kind: IssueKind,
    pub path: String,
    pub segment: String,
}

#[derive(Debug, Clone, Default)]
pub struct BuiltTree {
    pub items: Hierarchy,
    pub issues: Vec<BuildIssue>,
}

/// Build the hierarchy of one course from flat rows.
pub fn build_tree<'a, I>(rows: I, semester: &str, course: &str, max_depth: usize) -> BuiltTree
where
    I: IntoIterator<Item = &'a Row>,
{
    let mut built = BuiltTree::default();
    for row in rows.into_iter().filter(|r| r.belongs_to(semester, course)) {
        let Some(path) = row.item_path() else {
            continue;
        };
        let segments: Vec<&str> = path
            .split(PATH_SEPARATOR)
            .filter(|s| !s.is_empty())
            .collect();
        if segments.is_empty() {
            continue;
        }
        if segments.len() > max_depth {
            report(
                &mut built.issues,
                IssueKind::TooDeep,
                path,
                segments[max_depth],
            );
            continue;
        }
        place(
            &mut built.items,
            &segments,
            row,
            path,
            &mut built.issues,
        );
    }
    built
}

fn place(items: &mut ItemMap, segments: &[&str], row: &Row, path: &str, issues: &mut Vec<BuildIssue>) {
    let Some((&seg, rest)) = segments.split_first() else {
        return;
    };

    if rest.is_empty() {
        match items.get(seg) {
            None => {
                items.insert(seg, Item::leaf(row.weight, row.grade));
            }
            Some(Item::Leaf { .. }) => report(issues, IssueKind::DuplicatePath, path, seg),
            Some(Item::Category { .. }) => report(issues, IssueKind::CategoryCollision, path, seg),
        }
        return;
    }

    if !items.contains(seg) {
        items.insert(seg, Item::category());
    }
    match items.get_mut(seg) {
        Some(Item::Category { sub_items, .. }) => place(sub_items, rest, row, path, issues),
        _ => {
            // Existing leaf wins; stay at this level for the remaining segments.
            report(issues, IssueKind::LeafCollision, path, seg);
            place(items, rest, row, path, issues);
        }
    }
}

fn report(issues: &mut Vec<BuildIssue>, kind: IssueKind, path: &str, segment: &str) {
    warn!(?kind, path, segment, "malformed grade path");
    issues.push(BuildIssue {
        kind,
        path: path.to_string(),
        segment: segment.to_string(),
    });
}

/// Sum of leaf contributions (`grade * weight / 100`) below `items`.
///
/// Category nesting is organizational only: a category contributes the plain
/// sum of its children, and that sum is written into the category's `grade`.
/// Nothing is clamped or normalized.
pub fn compute_total(items: &mut ItemMap) -> f64 {
    let mut total = 0.0;
    for (_, item) in items.entries.iter_mut() {
        match item {
            Item::Leaf { weight, grade } => {
                total += *grade * (*weight / 100.0);
            }
            Item::Category {
                grade, sub_items, ..
            } => {
                let sub_total = compute_total(sub_items);
                *grade = sub_total;
                total += sub_total;
            }
        }
    }
    total
}

/// Serialize a hierarchy back into rows, depth-first in mapping order.
/// An empty hierarchy yields a single course sentinel row.
pub fn flatten_tree(items: &Hierarchy, semester: &str, course: &str) -> Vec<Row> {
    if items.is_empty() {
        return vec![Row::course_sentinel(semester, course)];
    }
    let mut rows = Vec::new();
    flatten_into(items, semester, course, "", &mut rows);
    rows
}

fn flatten_into(items: &ItemMap, semester: &str, course: &str, prefix: &str, out: &mut Vec<Row>) {
    for (name, item) in items.iter() {
        let path = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}{PATH_SEPARATOR}{name}")
        };
        match item {
            Item::Leaf { weight, grade } => {
                out.push(Row::item(semester, course, &path, *weight, *grade));
            }
            Item::Category { sub_items, .. } => {
                flatten_into(sub_items, semester, course, &path, out);
            }
        }
    }
}

pub fn join_path(path: &[String]) -> String {
    path.join("/")
}

fn level_mut<'a>(items: &'a mut ItemMap, parent: &[String]) -> Result<&'a mut ItemMap> {
    descend(items, parent, 0)
}

fn descend<'a>(items: &'a mut ItemMap, parent: &[String], depth: usize) -> Result<&'a mut ItemMap> {
    let Some(head) = parent.get(depth) else {
        return Ok(items);
    };
    match items.get_mut(head) {
        Some(Item::Category { sub_items, .. }) => descend(sub_items, parent, depth + 1),
        Some(Item::Leaf { .. }) => Err(GradeError::NotACategory(join_path(&parent[..=depth]))),
        None => Err(GradeError::NotFound(join_path(&parent[..=depth]))),
    }
}

fn split_target(path: &[String]) -> Result<(&[String], &str)> {
    match path.split_last() {
        Some((name, parent)) => Ok((parent, name.as_str())),
        None => Err(GradeError::NotFound(String::new())),
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(GradeError::EmptyName);
    }
    if name.contains(PATH_SEPARATOR) {
        return Err(GradeError::InvalidName(name.to_string()));
    }
    // A placeholder path reads back as a sentinel and the item would vanish.
    if is_placeholder(Some(name)) {
        return Err(GradeError::ReservedName(name.to_string()));
    }
    Ok(())
}

/// Look up the item at `path` (names from the root).
#[cfg(test)]
pub fn find<'a>(items: &'a ItemMap, path: &[String]) -> Option<&'a Item> {
    let (first, rest) = path.split_first()?;
    let item = items.get(first)?;
    if rest.is_empty() {
        return Some(item);
    }
    find(item.sub_items()?, rest)
}

/// Add a fresh item under `parent`. A same-named sibling is overwritten in place.
pub fn add_item(
    root: &mut Hierarchy,
    parent: &[String],
    name: &str,
    item: Item,
    max_depth: usize,
) -> Result<()> {
    validate_name(name)?;
    if parent.len() + 1 > max_depth {
        return Err(GradeError::DepthExceeded(max_depth));
    }
    let level = level_mut(root, parent)?;
    level.insert(name, item);
    Ok(())
}

pub fn rename_item(root: &mut Hierarchy, path: &[String], new_name: &str) -> Result<()> {
    validate_name(new_name)?;
    let (parent, name) = split_target(path)?;
    let level = level_mut(root, parent)?;
    if level.rename(name, new_name) {
        Ok(())
    } else {
        Err(GradeError::NotFound(join_path(path)))
    }
}

pub fn delete_item(root: &mut Hierarchy, path: &[String]) -> Result<Item> {
    let (parent, name) = split_target(path)?;
    let level = level_mut(root, parent)?;
    level
        .remove(name)
        .ok_or_else(|| GradeError::NotFound(join_path(path)))
}

/// Reweight and/or regrade. Categories accept a weight but their grade is derived.
pub fn update_item(
    root: &mut Hierarchy,
    path: &[String],
    new_weight: Option<f64>,
    new_grade: Option<f64>,
) -> Result<()> {
    let (parent, name) = split_target(path)?;
    let level = level_mut(root, parent)?;
    let item = level
        .get_mut(name)
        .ok_or_else(|| GradeError::NotFound(join_path(path)))?;
    match item {
        Item::Leaf { weight, grade } => {
            if let Some(w) = new_weight {
                *weight = w;
            }
            if let Some(g) = new_grade {
                *grade = g;
            }
        }
        Item::Category { weight, .. } => {
            if new_grade.is_some() {
                return Err(GradeError::NotALeaf(join_path(path)));
            }
            if let Some(w) = new_weight {
                *weight = w;
            }
        }
    }
    Ok(())
}

use crate::db;
use crate::rows::RowStore;
use crate::session::EditSession;
use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub store: RowStore,
    pub session: Option<EditSession>,
    pub max_depth: usize,
}

impl AppState {
    pub fn new(max_depth: usize) -> Self {
        Self {
            workspace: None,
            db: None,
            store: RowStore::new(),
            session: None,
            max_depth,
        }
    }

    /// Make `staged` the current row store. The workspace database, if one is
    /// open, is written first; on failure both stay as they were.
    pub fn install_store(&mut self, staged: RowStore) -> anyhow::Result<()> {
        if let Some(conn) = self.db.as_mut() {
            db::replace_rows(conn, staged.rows())?;
        }
        self.store = staged;
        Ok(())
    }
}

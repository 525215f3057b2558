//! LanceDB connection helpers and predicate building.

use anyhow::Result;
use lancedb::{connect, Connection, Table};

use ragstore_core::types::DeleteScope;

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

pub async fn open_table_if_exists(conn: &Connection, name: &str) -> Result<Option<Table>> {
    let names = conn.table_names().execute().await?;
    if !names.contains(&name.to_string()) {
        return Ok(None);
    }
    Ok(Some(conn.open_table(name).execute().await?))
}

pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub fn in_list<'a>(column: &str, values: impl IntoIterator<Item = &'a str>) -> String {
    let list = values.into_iter().map(quote).collect::<Vec<_>>().join(",");
    format!("{column} IN ({list})")
}

pub fn scope_predicate(scope: &DeleteScope) -> String {
    match scope {
        DeleteScope::Knowledge(id) => format!("knowledge_id = {}", quote(id)),
        DeleteScope::Document(id) => format!("document_id = {}", quote(id)),
        DeleteScope::Paragraph(id) => format!("paragraph_id = {}", quote(id)),
    }
}

//! LanceDB-backed passage store.
//!
//! [`LanceBackend`] implements the synchronous `StoreBackend` contract by
//! driving lancedb's async API on an owned tokio runtime. Every operation is
//! bounded by a timeout and surfaces as `Error::Timeout` or `Error::StoreIo`.

pub mod convert;
pub mod schema;
pub mod table;

use arrow_array::{RecordBatch, RecordBatchIterator};
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, Table};
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{debug, info};

use ragstore_core::error::{Error, Result};
use ragstore_core::store::StoreBackend;
use ragstore_core::types::{DeleteScope, PassageRecord, StoreStats};

use crate::convert::{batch_to_rows, rows_to_batch, StoredRow};
use crate::schema::vector_dimension;
use crate::table::{in_list, open_db, open_table_if_exists, quote, scope_predicate};

pub struct LanceBackend {
    runtime: Runtime,
    conn: Connection,
    table_name: String,
    /// Created on the first write; the vector width is fixed from then on.
    table: Option<Table>,
    dimension: Option<usize>,
    next_seq: i64,
    timeout: Duration,
}

impl LanceBackend {
    pub fn open(db_path: &Path, table_name: &str, timeout: Duration) -> Result<Self> {
        let runtime = Runtime::new()?;
        let uri = db_path.to_string_lossy().to_string();
        let (conn, table, dimension, next_seq) = block(&runtime, timeout, async {
            let conn = open_db(&uri).await?;
            let table = open_table_if_exists(&conn, table_name).await?;
            let (dimension, next_seq) = match &table {
                Some(t) => {
                    let schema = t.schema().await?;
                    let rows = scan(t, None).await?;
                    (vector_dimension(&schema), rows.iter().map(|r| r.seq + 1).max().unwrap_or(0))
                }
                None => (None, 0),
            };
            Ok::<_, anyhow::Error>((conn, table, dimension, next_seq))
        })?;
        info!(uri = %uri, table = table_name, exists = table.is_some(), ?dimension, "opened lance store");
        Ok(Self { runtime, conn, table_name: table_name.to_string(), table, dimension, next_seq, timeout })
    }

    fn run<T>(&self, fut: impl Future<Output = anyhow::Result<T>>) -> Result<T> {
        block(&self.runtime, self.timeout, fut)
    }

    fn rows(&self, predicate: Option<String>) -> Result<Vec<StoredRow>> {
        match &self.table {
            Some(table) => self.run(scan(table, predicate)),
            None => Ok(Vec::new()),
        }
    }
}

fn block<T>(runtime: &Runtime, timeout: Duration, fut: impl Future<Output = anyhow::Result<T>>) -> Result<T> {
    match runtime.block_on(async { tokio::time::timeout(timeout, fut).await }) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => match err.downcast::<Error>() {
            Ok(typed) => Err(typed),
            Err(other) => Err(Error::StoreIo(format!("{other:#}"))),
        },
        Err(_elapsed) => Err(Error::Timeout(timeout)),
    }
}

async fn scan(table: &Table, predicate: Option<String>) -> anyhow::Result<Vec<StoredRow>> {
    let query = table.query();
    let stream = match predicate {
        Some(p) => query.only_if(p).execute().await?,
        None => query.execute().await?,
    };
    let batches: Vec<RecordBatch> = stream.try_collect().await?;
    let mut rows = Vec::new();
    for batch in &batches {
        rows.extend(batch_to_rows(batch)?);
    }
    rows.sort_by_key(|r| r.seq);
    Ok(rows)
}

impl StoreBackend for LanceBackend {
    fn name(&self) -> &'static str {
        "lance"
    }

    fn requires_embeddings(&self) -> bool {
        true
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    fn upsert(&mut self, records: Vec<PassageRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        // Later duplicates in one batch win but keep the first slot.
        let mut order: Vec<PassageRecord> = Vec::with_capacity(records.len());
        let mut position: HashMap<String, usize> = HashMap::new();
        for record in records {
            if record.embedding.is_none() {
                return Err(Error::Configuration(format!(
                    "lance store needs an embedding for passage '{}'",
                    record.paragraph_id()
                )));
            }
            match position.get(record.paragraph_id()) {
                Some(&i) => order[i] = record,
                None => {
                    position.insert(record.paragraph_id().to_string(), order.len());
                    order.push(record);
                }
            }
        }
        let dimension = match self.dimension {
            Some(dim) => dim,
            None => order[0].embedding.as_ref().map_or(0, Vec::len),
        };

        let existing: HashMap<String, (i64, i64)> = self
            .rows(Some(in_list("paragraph_id", order.iter().map(|r| r.paragraph_id()))))?
            .into_iter()
            .map(|row| (row.record.passage.paragraph_id.clone(), (row.seq, row.created_at)))
            .collect();

        let now = Utc::now().timestamp_millis();
        let mut next_seq = self.next_seq;
        let rows: Vec<StoredRow> = order
            .into_iter()
            .map(|record| {
                let (seq, created_at) = existing.get(record.paragraph_id()).copied().unwrap_or_else(|| {
                    next_seq += 1;
                    (next_seq - 1, now)
                });
                StoredRow { record, seq, created_at }
            })
            .collect();
        let batch = rows_to_batch(&rows, dimension).map_err(|e| Error::StoreIo(format!("{e:#}")))?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));

        let table = match &self.table {
            Some(table) => {
                let table = table.clone();
                self.run(async move {
                    let mut mi = table.merge_insert(&["paragraph_id"]);
                    mi.when_matched_update_all(None).when_not_matched_insert_all();
                    let _ = mi.execute(reader).await?;
                    Ok::<_, anyhow::Error>(table)
                })?
            }
            None => {
                let conn = self.conn.clone();
                let name = self.table_name.clone();
                self.run(async move { Ok::<_, anyhow::Error>(conn.create_table(&name, reader).execute().await?) })?
            }
        };
        debug!(rows = rows.len(), table = %self.table_name, "upserted passages");
        self.table = Some(table);
        self.dimension = Some(dimension);
        self.next_seq = next_seq;
        Ok(())
    }

    fn candidates(&self, knowledge_ids: &[String]) -> Result<Vec<PassageRecord>> {
        if knowledge_ids.is_empty() {
            return Ok(Vec::new());
        }
        let predicate = format!("is_active = true AND {}", in_list("knowledge_id", knowledge_ids.iter().map(String::as_str)));
        Ok(self.rows(Some(predicate))?.into_iter().map(|r| r.record).collect())
    }

    fn get(&self, paragraph_id: &str) -> Result<Option<PassageRecord>> {
        let predicate = format!("paragraph_id = {}", quote(paragraph_id));
        Ok(self.rows(Some(predicate))?.into_iter().next().map(|r| r.record))
    }

    fn set_active(&mut self, paragraph_id: &str, active: bool) -> Result<bool> {
        let Some(table) = self.table.clone() else {
            return Ok(false);
        };
        let predicate = format!("paragraph_id = {}", quote(paragraph_id));
        self.run(async move {
            if table.count_rows(Some(predicate.clone())).await? == 0 {
                return Ok(false);
            }
            table
                .update()
                .only_if(predicate)
                .column("is_active", if active { "true" } else { "false" })
                .execute()
                .await?;
            Ok::<_, anyhow::Error>(true)
        })
    }

    fn delete(&mut self, scope: &DeleteScope) -> Result<usize> {
        let Some(table) = self.table.clone() else {
            return Ok(0);
        };
        let predicate = scope_predicate(scope);
        self.run(async move {
            let doomed = table.count_rows(Some(predicate.clone())).await?;
            if doomed > 0 {
                let _ = table.delete(&predicate).await?;
            }
            Ok::<_, anyhow::Error>(doomed)
        })
    }

    fn stats(&self) -> Result<StoreStats> {
        let rows = self.rows(None)?;
        Ok(StoreStats::from_records(self.name(), self.dimension, rows.iter().map(|r| &r.record)))
    }
}

impl std::fmt::Debug for LanceBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanceBackend")
            .field("table", &self.table_name)
            .field("dimension", &self.dimension)
            .finish()
    }
}

//! Conversion between passage records and Arrow record batches.

use anyhow::{anyhow, ensure, Result};
use arrow_array::cast::AsArray;
use arrow_array::types::{Float32Type, Int64Type, TimestampMillisecondType};
use arrow_array::{
    Array, BooleanArray, FixedSizeListArray, Int64Array, RecordBatch, StringArray, TimestampMillisecondArray,
};
use std::sync::Arc;

use ragstore_core::types::{Meta, Passage, PassageRecord};

use crate::schema::build_passage_schema;

/// A stored row: the record plus its slot bookkeeping.
#[derive(Debug, Clone)]
pub struct StoredRow {
    pub record: PassageRecord,
    pub seq: i64,
    pub created_at: i64,
}

pub fn rows_to_batch(rows: &[StoredRow], dimension: usize) -> Result<RecordBatch> {
    let dim = i32::try_from(dimension).map_err(|_| anyhow!("vector dimension {dimension} too large"))?;
    let schema = build_passage_schema(dim);

    let mut ids = Vec::with_capacity(rows.len());
    let mut texts = Vec::with_capacity(rows.len());
    let mut knowledge = Vec::with_capacity(rows.len());
    let mut documents = Vec::with_capacity(rows.len());
    let mut sources = Vec::with_capacity(rows.len());
    let mut source_types = Vec::with_capacity(rows.len());
    let mut active = Vec::with_capacity(rows.len());
    let mut metas = Vec::with_capacity(rows.len());
    let mut seqs = Vec::with_capacity(rows.len());
    let mut created = Vec::with_capacity(rows.len());
    let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(rows.len());
    for row in rows {
        let p = &row.record.passage;
        ids.push(p.paragraph_id.clone());
        texts.push(p.text.clone());
        knowledge.push(p.knowledge_id.clone());
        documents.push(p.document_id.clone());
        sources.push(p.source_id.clone());
        source_types.push(p.source_type.clone());
        active.push(p.is_active);
        metas.push(serde_json::to_string(&p.meta)?);
        seqs.push(row.seq);
        created.push(row.created_at);
        if let Some(v) = &row.record.embedding {
            ensure!(v.len() == dimension, "vector of length {} in a {dimension}-d table", v.len());
        }
        vectors.push(row.record.embedding.as_ref().map(|v| v.iter().map(|&x| Some(x)).collect()));
    }

    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(texts)),
            Arc::new(StringArray::from(knowledge)),
            Arc::new(StringArray::from(documents)),
            Arc::new(StringArray::from(sources)),
            Arc::new(StringArray::from(source_types)),
            Arc::new(BooleanArray::from(active)),
            Arc::new(StringArray::from(metas)),
            Arc::new(Int64Array::from(seqs)),
            Arc::new(TimestampMillisecondArray::from(created)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors.into_iter(), dim)),
        ],
    )?;
    Ok(batch)
}

fn string_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_string_opt::<i32>())
        .ok_or_else(|| anyhow!("column '{name}' missing or not utf8"))
}

pub fn batch_to_rows(batch: &RecordBatch) -> Result<Vec<StoredRow>> {
    let ids = string_col(batch, "paragraph_id")?;
    let texts = string_col(batch, "text")?;
    let knowledge = string_col(batch, "knowledge_id")?;
    let documents = string_col(batch, "document_id")?;
    let sources = string_col(batch, "source_id")?;
    let source_types = string_col(batch, "source_type")?;
    let metas = string_col(batch, "meta")?;
    let active = batch
        .column_by_name("is_active")
        .and_then(|c| c.as_boolean_opt())
        .ok_or_else(|| anyhow!("column 'is_active' missing or not boolean"))?;
    let seqs = batch
        .column_by_name("seq")
        .and_then(|c| c.as_primitive_opt::<Int64Type>())
        .ok_or_else(|| anyhow!("column 'seq' missing or not int64"))?;
    let created = batch
        .column_by_name("created_at")
        .and_then(|c| c.as_primitive_opt::<TimestampMillisecondType>())
        .ok_or_else(|| anyhow!("column 'created_at' missing or not a timestamp"))?;
    let vectors = batch.column_by_name(crate::schema::VECTOR_COLUMN).and_then(|c| c.as_fixed_size_list_opt());

    let mut rows = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let meta: Meta = serde_json::from_str(metas.value(i))?;
        let passage = Passage {
            paragraph_id: ids.value(i).to_string(),
            text: texts.value(i).to_string(),
            knowledge_id: knowledge.value(i).to_string(),
            document_id: documents.value(i).to_string(),
            source_id: sources.value(i).to_string(),
            source_type: source_types.value(i).to_string(),
            is_active: active.value(i),
            meta,
        };
        let embedding = match vectors {
            Some(list) if !list.is_null(i) => {
                let values = list.value(i);
                let floats = values
                    .as_primitive_opt::<Float32Type>()
                    .ok_or_else(|| anyhow!("vector items are not float32"))?;
                Some(floats.values().to_vec())
            }
            _ => None,
        };
        rows.push(StoredRow { record: PassageRecord::new(passage, embedding), seq: seqs.value(i), created_at: created.value(i) });
    }
    Ok(rows)
}

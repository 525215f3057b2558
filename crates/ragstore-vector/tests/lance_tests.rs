use std::time::Duration;

use ragstore_core::store::{DocumentStore, StoreBackend};
use ragstore_core::types::{DeleteScope, Passage};
use ragstore_core::Error;
use ragstore_embed::HashEmbedder;
use ragstore_vector::LanceBackend;

const TIMEOUT: Duration = Duration::from_secs(30);

fn passage(id: &str, kb: &str, doc: &str, text: &str) -> Passage {
    Passage::new(id, text, kb, doc)
}

#[test]
fn lance_store_round_trip_and_reopen() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let embedder = HashEmbedder::new(16)?;
    {
        let backend = LanceBackend::open(tmp.path(), "passages", TIMEOUT)?;
        assert_eq!(backend.dimension(), None);
        let mut store = DocumentStore::new(Box::new(backend));
        store.batch_save(
            vec![
                passage("p1", "kb1", "d1", "外滩是著名景点，24小时开放"),
                passage("p2", "kb1", "d1", "博物馆9点开放"),
                passage("p3", "kb2", "d2", "unrelated"),
            ],
            Some(&embedder),
        )?;
        // Overwrite keeps the slot of p1.
        store.save(passage("p1", "kb1", "d1", "外滩夜景"), Some(&embedder))?;
        assert!(store.set_active("p2", false)?);
        assert!(!store.set_active("nope", false)?);
    }

    let backend = LanceBackend::open(tmp.path(), "passages", TIMEOUT)?;
    assert_eq!(backend.dimension(), Some(16));
    let ids: Vec<_> = backend
        .candidates(&["kb1".to_string(), "kb2".to_string()])?
        .into_iter()
        .map(|r| r.passage.paragraph_id)
        .collect();
    assert_eq!(ids, vec!["p1", "p3"]);

    let p1 = backend.get("p1")?.expect("p1 stored");
    assert_eq!(p1.passage.text, "外滩夜景");
    assert_eq!(p1.embedding.map(|v| v.len()), Some(16));

    let stats = backend.stats()?;
    assert_eq!((stats.passages, stats.active, stats.knowledge_bases), (3, 2, 2));
    Ok(())
}

#[test]
fn lance_store_deletes_by_scope() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let embedder = HashEmbedder::new(8)?;
    let mut store = DocumentStore::new(Box::new(LanceBackend::open(tmp.path(), "passages", TIMEOUT)?));
    assert_eq!(store.delete_by_knowledge_id("kb1")?, 0, "delete before the table exists");
    store.batch_save(
        vec![passage("a", "kb1", "d1", "one"), passage("b", "kb1", "d2", "two"), passage("c", "kb2", "d3", "three")],
        Some(&embedder),
    )?;
    assert_eq!(store.delete(DeleteScope::Document("d2".into()))?, 1);
    assert_eq!(store.delete_by_knowledge_id("kb1")?, 1);
    assert_eq!(store.delete_by_paragraph_id("a")?, 0);
    assert_eq!(store.stats()?.passages, 1);
    Ok(())
}

#[test]
fn lance_store_rejects_other_dimensions() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut store = DocumentStore::new(Box::new(LanceBackend::open(tmp.path(), "passages", TIMEOUT)?));
    store.save(passage("a", "kb", "d", "one"), Some(&HashEmbedder::new(8)?))?;
    let err = store.save(passage("b", "kb", "d", "two"), Some(&HashEmbedder::new(4)?)).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 8, actual: 4 }));
    let err = store.save(passage("c", "kb", "d", "three"), None).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
    Ok(())
}

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ragstore_core::config::{Config, StoreBackendKind};
use ragstore_core::similarity::{cosine_similarity, keyword_overlap, token_set, BlendWeights};
use ragstore_core::store::{DocumentStore, FileBackend};
use ragstore_core::traits::{Embedder, Tokenizer};
use ragstore_core::types::{PassageInput, SearchMode};
use ragstore_core::Error;
use ragstore_embed::HashEmbedder;
use ragstore_hybrid::{format_context, RetrievalClient, Retriever, SearchRequest};
use ragstore_text::TextTokenizer;

/// Hash embeddings plus a call counter.
struct CountingEmbedder {
    inner: HashEmbedder,
    calls: AtomicUsize,
}

impl CountingEmbedder {
    fn new() -> Arc<Self> {
        Arc::new(Self { inner: HashEmbedder::new(64).unwrap(), calls: AtomicUsize::new(0) })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for CountingEmbedder {
    fn embedder_id(&self) -> &str {
        "counting"
    }

    fn embed_many(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed_many(texts)
    }
}

fn retriever() -> Retriever {
    Retriever::new(Arc::new(TextTokenizer::default()), BlendWeights::equal()).unwrap()
}

fn input(pid: &str, text: &str, kb: &str, doc: &str) -> PassageInput {
    PassageInput {
        paragraph_id: Some(pid.into()),
        text: Some(text.into()),
        knowledge_id: Some(kb.into()),
        document_id: Some(doc.into()),
        ..Default::default()
    }
}

fn client_with(embedder: Option<Arc<dyn Embedder>>) -> RetrievalClient {
    RetrievalClient::new(DocumentStore::in_memory(), embedder, retriever())
}

fn bund_client(embedder: Option<Arc<dyn Embedder>>) -> RetrievalClient {
    let mut client = client_with(embedder);
    client
        .add_documents(vec![
            input("p1", "外滩是著名景点，24小时开放", "kb1", "d1"),
            input("p2", "博物馆9点开放", "kb1", "d1"),
        ])
        .unwrap();
    client
}

fn kb(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

#[test]
fn keyword_scenario_ranks_the_bund_first() {
    let client = bund_client(None);
    let request = SearchRequest::new("外滩开放时间", kb(&["kb1"]))
        .with_mode(SearchMode::Keywords)
        .with_similarity(0.1)
        .with_top_n(5);
    let hits = client.search(request).unwrap();
    let ids: Vec<_> = hits.iter().map(|h| h.paragraph_id.as_str()).collect();
    assert_eq!(ids, vec!["p1", "p2"]);
    assert!(hits[0].similarity > hits[1].similarity);
    assert_eq!(hits[0].similarity, hits[0].comprehensive_score);
}

#[test]
fn blend_score_is_the_weighted_combination() {
    let embedder = CountingEmbedder::new();
    let client = bund_client(Some(embedder.clone() as Arc<dyn Embedder>));
    let hits = client
        .search(SearchRequest::new("外滩开放时间", kb(&["kb1"])).with_mode(SearchMode::Blend).with_similarity(0.0))
        .unwrap();
    assert_eq!(hits.len(), 2);

    let tokenizer = TextTokenizer::default();
    let q_vec = embedder.embed_one("外滩开放时间").unwrap();
    let q_tokens = token_set(tokenizer.tokenize("外滩开放时间"));
    for hit in &hits {
        let d_vec = embedder.embed_one(&hit.text).unwrap();
        let e = cosine_similarity(&q_vec, &d_vec);
        let k = keyword_overlap(&q_tokens, &token_set(tokenizer.tokenize(&hit.text)));
        assert!((hit.similarity - (e + k) / 2.0).abs() < 1e-5, "{} vs {}", hit.similarity, (e + k) / 2.0);
        assert!((hit.embedding_score.unwrap() - e).abs() < 1e-5);
        assert!((hit.keyword_score.unwrap() - k).abs() < 1e-6);
    }
}

#[test]
fn emphasis_weights_change_the_composite() {
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(64).unwrap());
    let mut store = DocumentStore::in_memory();
    store
        .save(ragstore_core::Passage::new("p1", "外滩是著名景点，24小时开放", "kb1", "d1"), Some(embedder.as_ref()))
        .unwrap();
    let weighted = Retriever::new(Arc::new(TextTokenizer::default()), BlendWeights::emphasis()).unwrap();
    let request = SearchRequest::new("外滩开放时间", kb(&["kb1"])).with_similarity(0.0);
    let hits = weighted.search(&store, Some(embedder.as_ref()), &request).unwrap();
    let hit = &hits[0];
    let (e, k) = (hit.embedding_score.unwrap(), hit.keyword_score.unwrap());
    assert!((hit.similarity - (0.7 * e + 0.3 * k)).abs() < 1e-5);
}

#[test]
fn own_text_is_always_found_by_keywords() {
    let texts = ["外滩是著名景点，24小时开放", "博物馆9点开放", "The Bund waterfront at night", "豫园 Yu Garden"];
    let mut client = client_with(None);
    for (i, text) in texts.iter().enumerate() {
        client.add_document(input(&format!("p{i}"), text, "kb", "d")).unwrap();
    }
    for (i, text) in texts.iter().enumerate() {
        let request = SearchRequest::new(*text, kb(&["kb"])).with_mode(SearchMode::Keywords).with_similarity(0.0).with_top_n(10);
        let hits = client.search(request).unwrap();
        assert!(hits.iter().any(|h| h.paragraph_id == format!("p{i}")), "p{i} not found by its own text");
    }
}

#[test]
fn results_respect_top_n_and_threshold() {
    let mut client = client_with(Some(CountingEmbedder::new() as Arc<dyn Embedder>));
    let inputs = (0..12).map(|i| input(&format!("p{i}"), &format!("开放 时间 景点 {i}"), "kb", "d")).collect();
    client.add_documents(inputs).unwrap();
    for mode in [SearchMode::Embedding, SearchMode::Keywords, SearchMode::Blend] {
        for (top_n, threshold) in [(1, 0.0), (3, 0.2), (5, 0.5), (20, 0.0)] {
            let request = SearchRequest::new("景点开放", kb(&["kb"])).with_mode(mode).with_top_n(top_n).with_similarity(threshold);
            let hits = client.search(request).unwrap();
            assert!(hits.len() <= top_n);
            assert!(hits.iter().all(|h| h.similarity >= threshold));
            assert!(hits.windows(2).all(|w| w[0].similarity >= w[1].similarity));
        }
    }
}

#[test]
fn empty_knowledge_list_skips_the_provider() {
    let embedder = CountingEmbedder::new();
    let client = bund_client(Some(embedder.clone() as Arc<dyn Embedder>));
    let before = embedder.calls();
    let hits = client.search(SearchRequest::new("外滩", vec![]).with_mode(SearchMode::Embedding)).unwrap();
    assert!(hits.is_empty());
    assert_eq!(embedder.calls(), before);
}

#[test]
fn delete_by_knowledge_is_scoped() {
    let mut client = client_with(None);
    client
        .add_documents(vec![input("a", "外滩", "kb1", "d1"), input("b", "外滩", "kb1", "d2"), input("c", "外滩", "kb2", "d3")])
        .unwrap();
    assert_eq!(client.delete_by_knowledge_id("kb1").unwrap(), 2);
    let search = |client: &RetrievalClient, kb_id: &str| {
        client
            .search(SearchRequest::new("外滩", kb(&[kb_id])).with_mode(SearchMode::Keywords).with_similarity(0.0))
            .unwrap()
    };
    assert!(search(&client, "kb1").is_empty());
    assert_eq!(search(&client, "kb2").len(), 1);
    assert_eq!(client.delete_by_knowledge_id("kb1").unwrap(), 0);
}

#[test]
fn reinserting_is_an_upsert() {
    let client_a = bund_client(Some(CountingEmbedder::new() as Arc<dyn Embedder>));
    let mut client_b = bund_client(Some(CountingEmbedder::new() as Arc<dyn Embedder>));
    client_b.add_document(input("p1", "外滩是著名景点，24小时开放", "kb1", "d1")).unwrap();
    let request = || SearchRequest::new("外滩开放时间", kb(&["kb1"])).with_similarity(0.0);
    assert_eq!(client_a.search(request()).unwrap(), client_b.search(request()).unwrap());
    assert_eq!(client_b.stats().unwrap().passages, 2);
}

#[test]
fn inactive_passages_are_never_returned() {
    let mut client = bund_client(None);
    assert!(client.set_active("p1", false).unwrap());
    let hits = client
        .search(SearchRequest::new("外滩开放时间", kb(&["kb1"])).with_mode(SearchMode::Keywords).with_similarity(0.0))
        .unwrap();
    assert!(hits.iter().all(|h| h.paragraph_id != "p1"));
    assert!(client.get("p1").unwrap().is_some(), "still stored");
}

#[test]
fn core_rejects_embedding_modes_without_provider() {
    let store = DocumentStore::in_memory();
    let request = SearchRequest::new("外滩", kb(&["kb"])).with_mode(SearchMode::Blend);
    assert!(matches!(retriever().search(&store, None, &request), Err(Error::InvalidMode(SearchMode::Blend))));
}

#[test]
fn client_degrades_to_keywords_without_provider() {
    let client = bund_client(None);
    assert_eq!(client.effective_mode(SearchMode::Embedding), SearchMode::Keywords);
    let hits = client
        .search(SearchRequest::new("外滩开放时间", kb(&["kb1"])).with_mode(SearchMode::Embedding).with_similarity(0.1))
        .unwrap();
    assert_eq!(hits[0].paragraph_id, "p1");
    assert!(hits[0].embedding_score.is_none());
}

#[test]
fn invalid_requests_fail_before_searching() {
    let client = bund_client(None);
    let zero = SearchRequest::new("外滩", kb(&["kb1"])).with_top_n(0);
    assert!(matches!(client.search(zero), Err(Error::Validation { field, .. }) if field == "top_n"));
    let high = SearchRequest::new("外滩", kb(&["kb1"])).with_similarity(1.5);
    assert!(matches!(client.search(high), Err(Error::Validation { field, .. }) if field == "similarity"));
}

#[test]
fn batch_validation_names_the_missing_field() {
    let mut client = client_with(None);
    let mut missing = input("p2", "text", "kb", "d");
    missing.document_id = None;
    let err = client.add_documents(vec![input("p1", "text", "kb", "d"), missing]).unwrap_err();
    assert!(matches!(err, Error::Validation { ref field, .. } if field == "documents[1].document_id"));
    assert_eq!(client.stats().unwrap().passages, 0, "nothing written");

    let empty_text = input("p3", "", "kb", "d");
    assert!(matches!(client.add_document(empty_text), Err(Error::Validation { .. })));
}

#[test]
fn query_dimension_must_match_store() {
    let mut store = DocumentStore::in_memory();
    let small: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(8).unwrap());
    let large: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(16).unwrap());
    store.save(ragstore_core::Passage::new("p1", "外滩", "kb", "d"), Some(small.as_ref())).unwrap();
    let request = SearchRequest::new("外滩", kb(&["kb"])).with_mode(SearchMode::Embedding);
    let err = retriever().search(&store, Some(large.as_ref()), &request).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 8, actual: 16 }));
}

#[test]
fn file_backed_client_from_settings() {
    let tmp = tempfile::tempdir().unwrap();
    let toml = format!(
        "[store]\nbackend = \"file\"\npath = \"{}\"\n[embedding]\nprovider = \"hash\"\ndimension = 32\n[search]\nmode = \"blend\"\nsimilarity = 0.0\n[tokenizer]\nvocabulary = [\"外滩\", \"开放\"]\n",
        tmp.path().join("store").display()
    );
    let settings = Config::from_toml_str(&toml, "test").unwrap().settings().unwrap();
    assert_eq!(settings.store.backend, StoreBackendKind::File);
    {
        let mut client = RetrievalClient::from_settings(&settings).unwrap();
        assert!(client.has_embedder());
        client
            .add_documents(vec![input("p1", "外滩是著名景点，24小时开放", "kb1", "d1"), input("p2", "博物馆9点开放", "kb1", "d1")])
            .unwrap();
    }
    let client = RetrievalClient::from_settings(&settings).unwrap();
    let hits = client.search(client.request("外滩开放时间", kb(&["kb1"]))).unwrap();
    assert_eq!(hits.first().map(|h| h.paragraph_id.as_str()), Some("p1"));
    assert!(format_context(&hits, 300).starts_with("[1] d1 / p1\n"));
    assert_eq!(client.stats().unwrap().backend, "file");

    // The same directory read back by the backend directly.
    let reopened = DocumentStore::new(Box::new(FileBackend::open(tmp.path().join("store")).unwrap()));
    assert_eq!(reopened.stats().unwrap().embedded, 2);
}

#[test]
fn empty_batch_is_a_no_op() {
    let embedder = CountingEmbedder::new();
    let mut client = client_with(Some(embedder.clone() as Arc<dyn Embedder>));
    assert_eq!(client.add_documents(vec![]).unwrap(), 0);
    assert_eq!(embedder.calls(), 0);
    assert_eq!(client.stats().unwrap().passages, 0);
}

#[test]
fn category_filter_applies_before_scoring() {
    let mut client = client_with(None);
    let tagged = |pid: &str, text: &str, category: Option<&str>| {
        let mut input = input(pid, text, "kb1", pid);
        if let Some(category) = category {
            let mut meta = ragstore_core::Meta::new();
            meta.insert("category".into(), category.into());
            input.meta = Some(meta);
        }
        input
    };
    client
        .add_documents(vec![
            tagged("sight", "外滩夜景开放", Some("sights")),
            tagged("food", "外滩附近的小吃开放", Some("food")),
            tagged("untagged", "外滩开放", None),
        ])
        .unwrap();

    let base = SearchRequest::new("外滩开放", kb(&["kb1"])).with_mode(SearchMode::Keywords).with_similarity(0.0);
    assert_eq!(client.search(base.clone()).unwrap().len(), 3);

    let hits = client.search(base.clone().with_category("sights")).unwrap();
    let ids: Vec<_> = hits.iter().map(|h| h.paragraph_id.as_str()).collect();
    assert_eq!(ids, vec!["sight"]);

    assert!(client.search(base.with_category("museums")).unwrap().is_empty());
}

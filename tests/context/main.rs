//! Integration tests for context construction: registration, database
//! provisioning and index reconciliation.


use couch_rust::{
    ContextBuilder, ContextError, CouchBackend, CouchError, CouchOptions, IndexDefinition,
    IndexDirection, IndexInfo, IndexOptions, InMemoryBackend,
};
use models::{Rebel, Vehicle};

fn by_age_asc() -> IndexDefinition {
    IndexDefinition::new("by_age", |i| i.index_by("age"))
}

fn by_age_desc() -> IndexDefinition {
    IndexDefinition::new("by_age", |i| i.index_by_descending("age"))
}

async fn init(
    backend: &InMemoryBackend,
    options: CouchOptions,
    index: IndexDefinition,
) -> Result<couch_rust::CouchContext<InMemoryBackend>, ContextError> {
    ContextBuilder::new(backend.clone(), options)
        .collection::<Rebel>(|c| c.index(index))
        .build()?
        .initialize()
        .await
}

async fn live_by_age(backend: &InMemoryBackend) -> Vec<IndexInfo> {
    backend
        .get_indexes("rebels")
        .await
        .unwrap()
        .into_iter()
        .filter(|i| i.name == "by_age")
        .collect()
}

/// Requests that change the index set.
fn index_writes(backend: &InMemoryBackend) -> Vec<String> {
    backend
        .requests()
        .into_iter()
        .filter(|r| r.starts_with("POST /rebels/_index") || r.starts_with("DELETE /rebels/_index"))
        .collect()
}

#[tokio::test]
async fn provisions_databases_in_declaration_order() {
    let backend = InMemoryBackend::new();
    let context = ContextBuilder::new(backend.clone(), CouchOptions::default().check_database_exists(true))
        .collection::<Rebel>(|c| c)
        .collection::<Vehicle>(|c| c)
        .build()
        .unwrap()
        .initialize()
        .await
        .unwrap();

    assert_eq!(
        backend.requests(),
        vec!["HEAD /rebels", "PUT /rebels", "HEAD /vehicles", "PUT /vehicles"]
    );

    let databases: Vec<&str> = context.bindings().iter().map(|b| b.database()).collect();
    assert_eq!(databases, vec!["rebels", "vehicles"]);
    assert!(context.database::<Vehicle>().is_ok());
}

#[tokio::test]
async fn unchecked_databases_are_bound_without_requests() {
    let backend = InMemoryBackend::new();
    let context = ContextBuilder::new(backend.clone(), CouchOptions::default())
        .collection::<Rebel>(|c| c)
        .build()
        .unwrap()
        .initialize()
        .await
        .unwrap();

    assert!(backend.requests().is_empty());

    // The database was never created, so using it fails per call
    let rebels = context.database::<Rebel>().unwrap();
    let err = rebels.find("luke").await.unwrap_err();
    assert!(matches!(err, CouchError::DatabaseMissing(db) if db == "rebels"));
}

#[tokio::test]
async fn initialize_is_idempotent() {
    let backend = InMemoryBackend::new();
    let options = CouchOptions::default()
        .check_database_exists(true)
        .override_existing_indexes(true);

    let first = init(&backend, options.clone(), by_age_asc()).await.unwrap();
    assert_eq!(
        first.reconcile_report("rebels").unwrap().created,
        vec!["by_age".to_string()]
    );

    backend.clear_requests();
    let second = init(&backend, options, by_age_asc()).await.unwrap();

    assert!(second.reconcile_report("rebels").unwrap().is_noop());
    assert!(index_writes(&backend).is_empty());
    assert_eq!(backend.requests(), vec!["HEAD /rebels", "GET /rebels/_index"]);
}

#[tokio::test]
async fn override_replaces_drifted_index() {
    let backend = InMemoryBackend::new();
    backend.create_database("rebels").await.unwrap();
    backend.create_index("rebels", &by_age_asc()).await.unwrap();
    backend.clear_requests();

    let context = init(
        &backend,
        CouchOptions::default().override_existing_indexes(true),
        by_age_desc(),
    )
    .await
    .unwrap();

    let writes = index_writes(&backend);
    assert_eq!(writes.len(), 2);
    assert!(writes[0].starts_with("DELETE /rebels/_index/_design/"));
    assert_eq!(writes[1], "POST /rebels/_index");

    let live = live_by_age(&backend).await;
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].fields, vec![("age".to_string(), IndexDirection::Desc)]);

    let report = context.reconcile_report("rebels").unwrap();
    assert_eq!(report.replaced, vec!["by_age".to_string()]);
}

#[tokio::test]
async fn without_override_drifted_index_is_left_alone() {
    let backend = InMemoryBackend::new();
    backend.create_database("rebels").await.unwrap();
    backend.create_index("rebels", &by_age_asc()).await.unwrap();
    backend.clear_requests();

    let context = init(&backend, CouchOptions::default(), by_age_desc())
        .await
        .unwrap();

    assert!(index_writes(&backend).is_empty());
    let live = live_by_age(&backend).await;
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].fields, vec![("age".to_string(), IndexDirection::Asc)]);
    assert_eq!(
        context.reconcile_report("rebels").unwrap().unchanged,
        vec!["by_age".to_string()]
    );
}

#[tokio::test]
async fn override_with_equal_fields_is_noop() {
    let backend = InMemoryBackend::new();
    backend.create_database("rebels").await.unwrap();
    backend.create_index("rebels", &by_age_desc()).await.unwrap();
    backend.clear_requests();

    init(
        &backend,
        CouchOptions::default().override_existing_indexes(true),
        by_age_desc(),
    )
    .await
    .unwrap();

    assert!(index_writes(&backend).is_empty());
}

#[tokio::test]
async fn declared_index_without_design_document_matches_any() {
    let backend = InMemoryBackend::new();
    backend.create_database("rebels").await.unwrap();
    let legacy = IndexDefinition::with_options(
        "by_age",
        |i| i.index_by("age"),
        IndexOptions::default().design_document("legacy"),
    );
    backend.create_index("rebels", &legacy).await.unwrap();
    backend.clear_requests();

    // Same fields, no design document declared: satisfied by the legacy one
    init(
        &backend,
        CouchOptions::default().override_existing_indexes(true),
        by_age_asc(),
    )
    .await
    .unwrap();
    assert!(index_writes(&backend).is_empty());

    let live = live_by_age(&backend).await;
    assert_eq!(live.len(), 1);
    assert!(live[0].in_design_document("legacy"));
}

#[tokio::test]
async fn declared_design_document_narrows_match() {
    let backend = InMemoryBackend::new();
    backend.create_database("rebels").await.unwrap();
    let legacy = IndexDefinition::with_options(
        "by_age",
        |i| i.index_by("age"),
        IndexOptions::default().design_document("legacy"),
    );
    backend.create_index("rebels", &legacy).await.unwrap();
    backend.clear_requests();

    let declared = IndexDefinition::with_options(
        "by_age",
        |i| i.index_by("age"),
        IndexOptions::default().design_document("people"),
    );
    init(&backend, CouchOptions::default(), declared).await.unwrap();

    assert_eq!(index_writes(&backend), vec!["POST /rebels/_index"]);
    let live = live_by_age(&backend).await;
    assert_eq!(live.len(), 2);
    assert!(live.iter().any(|i| i.in_design_document("people")));
}

#[tokio::test]
async fn shared_name_in_two_design_documents_converges_in_one_pass() {
    let backend = InMemoryBackend::new();
    backend.create_database("rebels").await.unwrap();
    let people_desc = IndexDefinition::with_options(
        "by_age",
        |i| i.index_by_descending("age"),
        IndexOptions::default().design_document("people"),
    );
    backend.create_index("rebels", &people_desc).await.unwrap();

    let declare = || {
        ContextBuilder::new(
            backend.clone(),
            CouchOptions::default().override_existing_indexes(true),
        )
        .collection::<Rebel>(|c| {
            c.has_index_with_options(
                "by_age",
                |i| i.index_by("age"),
                IndexOptions::default().design_document("people"),
            )
            .has_index_with_options(
                "by_age",
                |i| i.index_by_descending("age"),
                IndexOptions::default().design_document("legacy"),
            )
        })
        .build()
        .unwrap()
    };

    let context = declare().initialize().await.unwrap();
    let report = context.reconcile_report("rebels").unwrap();
    assert_eq!(report.replaced, vec!["by_age".to_string()]);
    assert_eq!(report.created, vec!["by_age".to_string()]);
    assert!(report.unchanged.is_empty());

    let live = live_by_age(&backend).await;
    assert_eq!(live.len(), 2);
    let people = live.iter().find(|i| i.in_design_document("people")).unwrap();
    assert_eq!(people.fields, vec![("age".to_string(), IndexDirection::Asc)]);
    let legacy = live.iter().find(|i| i.in_design_document("legacy")).unwrap();
    assert_eq!(legacy.fields, vec![("age".to_string(), IndexDirection::Desc)]);

    // Nothing left to do on the next start
    let context = declare().initialize().await.unwrap();
    assert!(context.reconcile_report("rebels").unwrap().is_noop());
}

#[tokio::test]
async fn indexes_are_listed_once_per_collection() {
    let backend = InMemoryBackend::new();
    ContextBuilder::new(backend.clone(), CouchOptions::default().check_database_exists(true))
        .collection::<Rebel>(|c| {
            c.has_index("by_age", |i| i.index_by("age"))
                .has_index("by_name", |i| i.index_by("name"))
                .has_index("by_name_age", |i| i.index_by("name").then_by("age"))
        })
        .build()
        .unwrap()
        .initialize()
        .await
        .unwrap();

    let listings = backend
        .requests()
        .into_iter()
        .filter(|r| r == "GET /rebels/_index")
        .count();
    assert_eq!(listings, 1);
    assert_eq!(index_writes(&backend).len(), 3);
}

#[tokio::test]
async fn ambiguous_live_indexes_fail_initialization() {
    let backend = InMemoryBackend::new();
    backend.create_database("rebels").await.unwrap();
    // Two auto-named design documents now both hold "by_age"
    backend.create_index("rebels", &by_age_asc()).await.unwrap();
    backend.create_index("rebels", &by_age_desc()).await.unwrap();

    let err = init(
        &backend,
        CouchOptions::default().override_existing_indexes(true),
        by_age_desc(),
    )
    .await
    .err()
    .unwrap();

    match err {
        ContextError::Reconciliation {
            database,
            index,
            source,
        } => {
            assert_eq!(database, "rebels");
            assert_eq!(index, "by_age");
            assert!(matches!(source, CouchError::AmbiguousIndex { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn missing_database_fails_reconciliation() {
    let backend = InMemoryBackend::new();

    let err = init(&backend, CouchOptions::default(), by_age_asc())
        .await
        .err()
        .unwrap();

    assert!(matches!(
        err,
        ContextError::IndexListing { ref database, source: CouchError::DatabaseMissing(_) } if database == "rebels"
    ));
    assert!(err.to_string().contains("rebels"));
}

#[tokio::test]
async fn invalid_declarations_fail_before_any_request() {
    let backend = InMemoryBackend::new();

    let bad_name = ContextBuilder::new(backend.clone(), CouchOptions::default().check_database_exists(true))
        .collection_named::<Rebel>("Rebels", |c| c)
        .build()
        .err()
        .unwrap();
    assert!(matches!(
        bad_name,
        ContextError::Configuration { ref collection, .. } if collection == "Rebels"
    ));

    let twice = ContextBuilder::new(backend.clone(), CouchOptions::default())
        .collection::<Rebel>(|c| c)
        .collection_named::<Rebel>("rebels_archive", |c| c)
        .build()
        .err()
        .unwrap();
    assert!(twice.to_string().contains("more than once"));

    let same_database = ContextBuilder::new(backend.clone(), CouchOptions::default())
        .collection::<Rebel>(|c| c)
        .collection_named::<Vehicle>("rebels", |c| c)
        .build()
        .err()
        .unwrap();
    assert!(matches!(same_database, ContextError::Configuration { .. }));

    let duplicate_index = ContextBuilder::new(backend.clone(), CouchOptions::default())
        .collection::<Rebel>(|c| c.index(by_age_asc()).index(by_age_desc()))
        .build()
        .err()
        .unwrap();
    assert!(duplicate_index.to_string().contains("by_age"));

    let shared_name = ContextBuilder::new(backend.clone(), CouchOptions::default())
        .collection::<Rebel>(|c| {
            c.has_index("by_age", |i| i.index_by("age")).has_index_with_options(
                "by_age",
                |i| i.index_by_descending("age"),
                IndexOptions::default().design_document("people"),
            )
        })
        .build()
        .err()
        .unwrap();
    assert!(matches!(
        shared_name,
        ContextError::Configuration { ref message, .. } if message.contains("without a design document")
    ));

    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn unregistered_type_is_a_configuration_error() {
    let backend = InMemoryBackend::new();
    let context = ContextBuilder::new(backend, CouchOptions::default())
        .collection::<Rebel>(|c| c)
        .build()
        .unwrap()
        .initialize()
        .await
        .unwrap();

    let err = context.database::<Vehicle>().err().unwrap();
    assert!(matches!(err, CouchError::Configuration(_)));
}

#[tokio::test]
async fn pending_context_exposes_bindings() {
    let pending = ContextBuilder::new(InMemoryBackend::new(), CouchOptions::default())
        .collection::<Rebel>(|c| c.index(by_age_asc()))
        .collection::<Vehicle>(|c| c)
        .build()
        .unwrap();

    let bindings = pending.bindings();
    assert_eq!(bindings.len(), 2);
    assert_eq!(bindings[0].database(), "rebels");
    assert_eq!(bindings[0].indexes(), &[by_age_asc()]);
    assert!(bindings[0].document_type().ends_with("Rebel"));
    assert_eq!(bindings[1].database(), "vehicles");
    assert!(bindings[1].indexes().is_empty());
}

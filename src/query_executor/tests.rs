use super::*;
use crate::errors::QueryError;
use crate::listing::{ListOperationOptions, OrderByField};
use crate::metadata::{
    ArtifactId, ArtifactState, ArtifactStructType, ContextId, EventStep, EventType,
    ExecutionState, PropertyType, TypeId, TypeKind, Value,
};
use crate::metadata_source::{MetadataSource, SqliteMetadataSource};
use crate::query::QueryConfig;
use crate::record_set::NULL_VALUE;
use tempfile::NamedTempFile;

fn sqlite_uri(path: impl AsRef<std::path::Path>) -> String {
    format!(
        "sqlite://{}",
        path.as_ref()
            .to_str()
            .expect("cannot convert the path to UTF-8")
    )
}

async fn connect(file: &NamedTempFile) -> SqliteMetadataSource {
    SqliteMetadataSource::connect(&sqlite_uri(file.path()))
        .await
        .unwrap()
}

fn executor(source: &mut SqliteMetadataSource) -> QueryExecutor<'_, SqliteMetadataSource> {
    QueryExecutor::new(source, QueryConfig::sqlite())
}

async fn initialized_source() -> (NamedTempFile, SqliteMetadataSource) {
    let file = NamedTempFile::new().unwrap();
    let mut source = connect(&file).await;
    executor(&mut source)
        .init_metadata_source(&InitOptions::default())
        .await
        .unwrap();
    (file, source)
}

#[tokio::test]
async fn initialization_works() {
    let (_file, mut source) = initialized_source().await;

    source.begin().await.unwrap();
    let version = executor(&mut source).get_schema_version().await.unwrap();
    source.commit().await.unwrap();
    assert_eq!(version, QueryConfig::sqlite().schema_version());

    // Re-running init on an up-to-date database is a no-op that succeeds.
    executor(&mut source)
        .init_metadata_source(&InitOptions::default())
        .await
        .unwrap();

    source.begin().await.unwrap();
    let version = executor(&mut source).get_schema_version().await.unwrap();
    source.commit().await.unwrap();
    assert_eq!(version, QueryConfig::sqlite().schema_version());
}

#[tokio::test]
async fn transaction_discipline_is_enforced() {
    let (_file, mut source) = initialized_source().await;

    // Operations require an open transaction.
    assert!(matches!(
        executor(&mut source)
            .select_artifacts_by_id(&[ArtifactId::new(1)])
            .await,
        Err(QueryError::FailedPrecondition { .. })
    ));

    source.begin().await.unwrap();
    assert!(matches!(
        source.begin().await,
        Err(QueryError::FailedPrecondition { .. })
    ));
    source.rollback().await.unwrap();
    assert!(matches!(
        source.commit().await,
        Err(QueryError::FailedPrecondition { .. })
    ));
}

#[tokio::test]
async fn select_types_by_id_filters_by_kind() {
    let (_file, mut source) = initialized_source().await;
    source.begin().await.unwrap();
    let mut ex = executor(&mut source);

    let a1 = ex
        .insert_artifact_type("artifact_type_1", None, None)
        .await
        .unwrap();
    let a2 = ex
        .insert_artifact_type("artifact_type_2", None, None)
        .await
        .unwrap();
    let e1 = ex
        .insert_execution_type("execution_type_1", None, None, None, None)
        .await
        .unwrap();
    let e2 = ex
        .insert_execution_type("execution_type_2", None, None, None, None)
        .await
        .unwrap();
    let c1 = ex
        .insert_context_type("context_type_1", None, None)
        .await
        .unwrap();

    let artifacts = ex
        .select_types_by_id(&[a1, a2], TypeKind::Artifact)
        .await
        .unwrap();
    assert_eq!(artifacts.records.len(), 2);
    let name = artifacts.column_index("name").unwrap();
    let mut names: Vec<_> = artifacts
        .records
        .iter()
        .map(|r| r.values[name].clone())
        .collect();
    names.sort();
    assert_eq!(names, vec!["artifact_type_1", "artifact_type_2"]);
    assert_eq!(artifacts.cell(0, "version"), Some(NULL_VALUE));
    assert_eq!(artifacts.cell(0, "description"), Some(NULL_VALUE));

    let executions = ex
        .select_types_by_id(&[e1, e2], TypeKind::Execution)
        .await
        .unwrap();
    assert_eq!(executions.records.len(), 2);
    assert_eq!(executions.cell(0, "input_type"), Some(NULL_VALUE));

    let contexts = ex.select_types_by_id(&[c1], TypeKind::Context).await.unwrap();
    assert_eq!(contexts.records.len(), 1);

    // A mixed-kind id list yields only the rows of the requested kind.
    let mixed = ex
        .select_types_by_id(&[a1, c1], TypeKind::Artifact)
        .await
        .unwrap();
    assert_eq!(mixed.records.len(), 1);
    assert_eq!(mixed.cell(0, "name"), Some("artifact_type_1"));

    // Execution types store their structural signature documents verbatim.
    let documented = ex
        .insert_execution_type(
            "execution_type_3",
            None,
            Some("trains models"),
            Some(&ArtifactStructType::new(r#"{"simple": "DataSet"}"#)),
            Some(&ArtifactStructType::new(r#"{"simple": "SavedModel"}"#)),
        )
        .await
        .unwrap();
    let types = ex
        .select_types_by_id(&[documented], TypeKind::Execution)
        .await
        .unwrap();
    assert_eq!(types.cell(0, "description"), Some("trains models"));
    assert_eq!(types.cell(0, "input_type"), Some(r#"{"simple": "DataSet"}"#));
    assert_eq!(
        types.cell(0, "output_type"),
        Some(r#"{"simple": "SavedModel"}"#)
    );

    source.commit().await.unwrap();
}

#[tokio::test]
async fn type_name_and_version_lookup_works() {
    let (_file, mut source) = initialized_source().await;
    source.begin().await.unwrap();
    let mut ex = executor(&mut source);

    let unversioned = ex.insert_artifact_type("DataSet", None, None).await.unwrap();
    let versioned = ex
        .insert_artifact_type("DataSet", Some("v1"), None)
        .await
        .unwrap();
    assert_ne!(unversioned, versioned);

    // A NULL version is a distinct key from every non-NULL version.
    let found = ex
        .type_id_by_name_and_version("DataSet", None, TypeKind::Artifact)
        .await
        .unwrap();
    assert_eq!(found, unversioned);
    let found = ex
        .type_id_by_name_and_version("DataSet", Some("v1"), TypeKind::Artifact)
        .await
        .unwrap();
    assert_eq!(found, versioned);

    assert!(matches!(
        ex.type_id_by_name_and_version("DataSet", Some("v2"), TypeKind::Artifact)
            .await,
        Err(QueryError::NotFound { .. })
    ));
    assert!(matches!(
        ex.type_id_by_name_and_version("DataSet", None, TypeKind::Execution)
            .await,
        Err(QueryError::NotFound { .. })
    ));

    source.commit().await.unwrap();
}

#[tokio::test]
async fn duplicate_versioned_type_is_rejected() {
    let (_file, mut source) = initialized_source().await;
    source.begin().await.unwrap();
    let mut ex = executor(&mut source);

    ex.insert_artifact_type("DataSet", Some("v1"), None)
        .await
        .unwrap();
    assert!(matches!(
        ex.insert_artifact_type("DataSet", Some("v1"), None).await,
        Err(QueryError::AlreadyExists { .. })
    ));

    // The same (name, version) under another kind is a different key.
    ex.insert_execution_type("DataSet", Some("v1"), None, None, None)
        .await
        .unwrap();

    source.rollback().await.unwrap();
}

#[tokio::test]
async fn type_properties_work() {
    let (_file, mut source) = initialized_source().await;
    source.begin().await.unwrap();
    let mut ex = executor(&mut source);

    let t0 = ex.insert_artifact_type("DataSet", None, None).await.unwrap();
    ex.insert_type_property(t0, "day", PropertyType::Int)
        .await
        .unwrap();
    ex.insert_type_property(t0, "split", PropertyType::String)
        .await
        .unwrap();
    assert!(matches!(
        ex.insert_type_property(t0, "day", PropertyType::Double).await,
        Err(QueryError::AlreadyExists { .. })
    ));

    let properties = ex.select_properties_by_type_id(&[t0]).await.unwrap();
    assert_eq!(properties.records.len(), 2);
    let data_type = properties.column_index("data_type").unwrap();
    let name = properties.column_index("name").unwrap();
    let mut rows: Vec<_> = properties
        .records
        .iter()
        .map(|r| (r.values[name].clone(), r.values[data_type].clone()))
        .collect();
    rows.sort();
    assert_eq!(
        rows,
        vec![
            ("day".to_owned(), "1".to_owned()),
            ("split".to_owned(), "3".to_owned())
        ]
    );

    assert_eq!(
        ex.select_properties_by_type_id(&[]).await.unwrap().records.len(),
        0
    );

    source.commit().await.unwrap();
}

#[tokio::test]
async fn parent_type_links_are_soft() {
    let (_file, mut source) = initialized_source().await;

    // An empty input short-circuits before touching the source: it succeeds
    // even without an open transaction.
    assert_eq!(
        executor(&mut source)
            .select_parent_types_by_type_id(&[])
            .await
            .unwrap()
            .records
            .len(),
        0
    );
    assert!(matches!(
        executor(&mut source)
            .select_parent_types_by_type_id(&[TypeId::new(1)])
            .await,
        Err(QueryError::FailedPrecondition { .. })
    ));

    source.begin().await.unwrap();
    let mut ex = executor(&mut source);

    let a = ex.insert_artifact_type("a", None, None).await.unwrap();
    let pa = ex.insert_artifact_type("pa", None, None).await.unwrap();
    let e = ex
        .insert_execution_type("e", None, None, None, None)
        .await
        .unwrap();
    let pe = ex
        .insert_execution_type("pe", None, None, None, None)
        .await
        .unwrap();
    let ct = ex.insert_context_type("c", None, None).await.unwrap();

    // One parent that exists and one that names no stored type at all.
    let nx = TypeId::new(pe.get() + e.get());
    ex.insert_parent_type(a, pa).await.unwrap();
    ex.insert_parent_type(e, pe).await.unwrap();
    ex.insert_parent_type(e, nx).await.unwrap();
    assert!(matches!(
        ex.insert_parent_type(e, pe).await,
        Err(QueryError::AlreadyExists { .. })
    ));

    let links = ex.select_parent_types_by_type_id(&[e]).await.unwrap();
    assert_eq!(links.records.len(), 2);
    let parent = links.column_index("parent_type_id").unwrap();
    let mut parents: Vec<_> = links
        .records
        .iter()
        .map(|r| r.values[parent].clone())
        .collect();
    parents.sort();
    let mut expected = vec![pe.get().to_string(), nx.get().to_string()];
    expected.sort();
    assert_eq!(parents, expected);

    assert_eq!(
        ex.select_parent_types_by_type_id(&[ct])
            .await
            .unwrap()
            .records
            .len(),
        0
    );

    ex.delete_parent_type(e, nx).await.unwrap();
    assert_eq!(
        ex.select_parent_types_by_type_id(&[e]).await.unwrap().records.len(),
        1
    );
    // Deleting an absent link is a no-op.
    ex.delete_parent_type(e, nx).await.unwrap();

    source.commit().await.unwrap();
}

#[tokio::test]
async fn artifact_round_trip_works() {
    let (_file, mut source) = initialized_source().await;
    source.begin().await.unwrap();
    let mut ex = executor(&mut source);

    let type_id = ex.insert_artifact_type("DataSet", None, None).await.unwrap();
    let nameless = ex
        .insert_artifact(type_id, Some("path/to/data"), None, None, 100, 100)
        .await
        .unwrap();
    let named = ex
        .insert_artifact(
            type_id,
            Some("it's quoted"),
            Some(ArtifactState::Pending),
            Some("mnist"),
            200,
            200,
        )
        .await
        .unwrap();

    // NULL columns come back as the sentinel; cells are looked up by name.
    let artifacts = ex.select_artifacts_by_id(&[nameless]).await.unwrap();
    assert_eq!(artifacts.records.len(), 1);
    assert_eq!(artifacts.cell(0, "name"), Some(NULL_VALUE));
    assert_eq!(artifacts.cell(0, "state"), Some(NULL_VALUE));
    assert_eq!(artifacts.cell(0, "uri"), Some("path/to/data"));
    assert_eq!(artifacts.cell(0, "create_time_since_epoch"), Some("100"));

    // Escaped strings survive the round trip.
    let artifacts = ex.select_artifacts_by_uri("it's quoted").await.unwrap();
    assert_eq!(artifacts.records.len(), 1);
    assert_eq!(
        artifacts.cell(0, "id"),
        Some(named.get().to_string().as_str())
    );

    let artifacts = ex
        .select_artifact_by_type_id_and_name(type_id, "mnist")
        .await
        .unwrap();
    assert_eq!(artifacts.records.len(), 1);

    ex.update_artifact(
        named,
        type_id,
        Some("path/to/model"),
        Some(ArtifactState::Live),
        300,
    )
    .await
    .unwrap();
    let artifacts = ex.select_artifacts_by_id(&[named]).await.unwrap();
    assert_eq!(artifacts.cell(0, "uri"), Some("path/to/model"));
    assert_eq!(artifacts.cell(0, "state"), Some("2"));
    assert_eq!(artifacts.cell(0, "last_update_time_since_epoch"), Some("300"));
    assert_eq!(artifacts.cell(0, "create_time_since_epoch"), Some("200"));

    // A duplicate (type_id, name) pair is rejected.
    assert!(matches!(
        ex.insert_artifact(type_id, None, None, Some("mnist"), 400, 400)
            .await,
        Err(QueryError::AlreadyExists { .. })
    ));

    source.commit().await.unwrap();
}

#[tokio::test]
async fn property_rows_hold_exactly_one_typed_value() {
    let (_file, mut source) = initialized_source().await;
    source.begin().await.unwrap();
    let mut ex = executor(&mut source);

    let type_id = ex.insert_artifact_type("DataSet", None, None).await.unwrap();
    let artifact = ex
        .insert_artifact(type_id, None, None, None, 0, 0)
        .await
        .unwrap();

    ex.insert_artifact_property(artifact, "day", &Value::Int(1), false)
        .await
        .unwrap();
    ex.insert_artifact_property(artifact, "ratio", &Value::Double(1.5), false)
        .await
        .unwrap();
    ex.insert_artifact_property(artifact, "split", &Value::from("train"), true)
        .await
        .unwrap();
    assert!(matches!(
        ex.insert_artifact_property(artifact, "day", &Value::Int(2), false)
            .await,
        Err(QueryError::AlreadyExists { .. })
    ));

    let properties = ex
        .select_artifact_properties_by_artifact_id(&[artifact])
        .await
        .unwrap();
    assert_eq!(properties.records.len(), 3);
    let name = properties.column_index("name").unwrap();
    for (i, record) in properties.records.iter().enumerate() {
        let cell = |column: &str| properties.cell(i, column).unwrap().to_owned();
        match record.values[name].as_str() {
            "day" => {
                assert_eq!(cell("int_value"), "1");
                assert_eq!(cell("double_value"), NULL_VALUE);
                assert_eq!(cell("string_value"), NULL_VALUE);
                assert_eq!(cell("is_custom_property"), "0");
            }
            "ratio" => {
                assert_eq!(cell("int_value"), NULL_VALUE);
                assert_eq!(cell("double_value"), "1.5");
                assert_eq!(cell("string_value"), NULL_VALUE);
            }
            "split" => {
                assert_eq!(cell("string_value"), "train");
                assert_eq!(cell("is_custom_property"), "1");
            }
            other => panic!("unexpected property {:?}", other),
        }
    }

    // Updating to another value type clears the previously populated column.
    ex.update_artifact_property(artifact, "day", &Value::from("monday"))
        .await
        .unwrap();
    let properties = ex
        .select_artifact_properties_by_artifact_id(&[artifact])
        .await
        .unwrap();
    let name = properties.column_index("name").unwrap();
    let day = properties
        .records
        .iter()
        .position(|r| r.values[name] == "day")
        .unwrap();
    assert_eq!(properties.cell(day, "int_value"), Some(NULL_VALUE));
    assert_eq!(properties.cell(day, "string_value"), Some("monday"));

    ex.delete_artifact_property(artifact, "ratio").await.unwrap();
    let properties = ex
        .select_artifact_properties_by_artifact_id(&[artifact])
        .await
        .unwrap();
    assert_eq!(properties.records.len(), 2);

    source.commit().await.unwrap();
}

#[tokio::test]
async fn execution_round_trip_works() {
    let (_file, mut source) = initialized_source().await;
    source.begin().await.unwrap();
    let mut ex = executor(&mut source);

    let type_id = ex
        .insert_execution_type("Trainer", None, None, None, None)
        .await
        .unwrap();
    let execution = ex
        .insert_execution(type_id, Some(ExecutionState::Running), None, 10, 10)
        .await
        .unwrap();

    let executions = ex.select_executions_by_id(&[execution]).await.unwrap();
    assert_eq!(executions.records.len(), 1);
    assert_eq!(executions.cell(0, "last_known_state"), Some("2"));
    assert_eq!(executions.cell(0, "name"), Some(NULL_VALUE));

    ex.update_execution(execution, type_id, Some(ExecutionState::Complete), 20)
        .await
        .unwrap();
    ex.insert_execution_property(execution, "step", &Value::Int(100), true)
        .await
        .unwrap();
    ex.update_execution_property(execution, "step", &Value::Int(200))
        .await
        .unwrap();

    let executions = ex.select_executions_by_id(&[execution]).await.unwrap();
    assert_eq!(executions.cell(0, "last_known_state"), Some("3"));
    let properties = ex
        .select_execution_properties_by_execution_id(&[execution])
        .await
        .unwrap();
    assert_eq!(properties.cell(0, "int_value"), Some("200"));

    ex.delete_execution_property(execution, "step").await.unwrap();
    ex.delete_executions_by_id(&[execution]).await.unwrap();
    assert_eq!(
        ex.select_executions_by_id(&[execution]).await.unwrap().records.len(),
        0
    );

    source.commit().await.unwrap();
}

#[tokio::test]
async fn delete_contexts_cascades_to_properties_only() {
    let (_file, mut source) = initialized_source().await;
    source.begin().await.unwrap();
    let mut ex = executor(&mut source);

    let context_type = ex.insert_context_type("experiment", None, None).await.unwrap();
    ex.insert_type_property(context_type, "property_1", PropertyType::Int)
        .await
        .unwrap();
    let c1 = ex.insert_context(context_type, "exp-1", 1, 1).await.unwrap();
    let c2 = ex.insert_context(context_type, "exp-2", 2, 2).await.unwrap();
    ex.insert_context_property(c1, "property_1", &Value::Int(3), false)
        .await
        .unwrap();
    ex.insert_context_property(c2, "property_1", &Value::Int(3), false)
        .await
        .unwrap();

    let artifact_type = ex.insert_artifact_type("DataSet", None, None).await.unwrap();
    let artifact = ex
        .insert_artifact(artifact_type, None, None, None, 0, 0)
        .await
        .unwrap();
    let execution_type = ex
        .insert_execution_type("Trainer", None, None, None, None)
        .await
        .unwrap();
    let execution = ex
        .insert_execution(execution_type, None, None, 0, 0)
        .await
        .unwrap();
    ex.insert_attribution(c1, artifact).await.unwrap();
    ex.insert_association(c1, execution).await.unwrap();

    // Deleting nothing leaves both contexts intact.
    ex.delete_contexts_by_id(&[]).await.unwrap();
    assert_eq!(
        ex.select_contexts_by_id(&[c1, c2]).await.unwrap().records.len(),
        2
    );

    // Deleting c1 removes the context and its properties, but the
    // attribution and association rows deliberately stay.
    ex.delete_contexts_by_id(&[c1]).await.unwrap();
    let contexts = ex.select_contexts_by_id(&[c1, c2]).await.unwrap();
    assert_eq!(contexts.records.len(), 1);
    assert_eq!(
        contexts.cell(0, "id"),
        Some(c2.get().to_string().as_str())
    );
    assert_eq!(
        ex.select_context_properties_by_context_id(&[c1])
            .await
            .unwrap()
            .records
            .len(),
        0
    );
    assert_eq!(
        ex.select_context_properties_by_context_id(&[c2])
            .await
            .unwrap()
            .records
            .len(),
        1
    );
    assert_eq!(
        ex.select_attributions_by_context_ids(&[c1]).await.unwrap().records.len(),
        1
    );
    assert_eq!(
        ex.select_associations_by_context_ids(&[c1]).await.unwrap().records.len(),
        1
    );

    // Deleting an id that names no context is a successful no-op.
    ex.delete_contexts_by_id(&[ContextId::new(c2.get() + 1)])
        .await
        .unwrap();
    assert_eq!(
        ex.select_contexts_by_id(&[c2]).await.unwrap().records.len(),
        1
    );

    // The orphaned links are removed by the explicit link deletes.
    ex.delete_attributions_by_context_ids(&[c1]).await.unwrap();
    ex.delete_associations_by_context_ids(&[c1]).await.unwrap();
    assert_eq!(
        ex.select_attributions_by_context_ids(&[c1]).await.unwrap().records.len(),
        0
    );
    assert_eq!(
        ex.select_associations_by_context_ids(&[c1]).await.unwrap().records.len(),
        0
    );

    ex.update_context(c2, context_type, "exp-2-renamed", 9)
        .await
        .unwrap();
    let found = ex
        .select_context_by_type_id_and_name(context_type, "exp-2-renamed")
        .await
        .unwrap();
    assert_eq!(found.records.len(), 1);
    assert_eq!(found.cell(0, "last_update_time_since_epoch"), Some("9"));

    source.commit().await.unwrap();
}

#[tokio::test]
async fn delete_artifacts_keeps_events() {
    let (_file, mut source) = initialized_source().await;
    source.begin().await.unwrap();
    let mut ex = executor(&mut source);

    let artifact_type = ex.insert_artifact_type("DataSet", None, None).await.unwrap();
    let artifact = ex
        .insert_artifact(artifact_type, None, None, None, 0, 0)
        .await
        .unwrap();
    ex.insert_artifact_property(artifact, "day", &Value::Int(1), false)
        .await
        .unwrap();
    let execution_type = ex
        .insert_execution_type("Trainer", None, None, None, None)
        .await
        .unwrap();
    let execution = ex
        .insert_execution(execution_type, None, None, 0, 0)
        .await
        .unwrap();
    ex.insert_event(artifact, execution, EventType::Input, 5)
        .await
        .unwrap();

    ex.delete_artifacts_by_id(&[artifact]).await.unwrap();
    assert_eq!(
        ex.select_artifacts_by_id(&[artifact]).await.unwrap().records.len(),
        0
    );
    assert_eq!(
        ex.select_artifact_properties_by_artifact_id(&[artifact])
            .await
            .unwrap()
            .records
            .len(),
        0
    );
    assert_eq!(
        ex.select_events_by_artifact_ids(&[artifact]).await.unwrap().records.len(),
        1
    );

    ex.delete_events_by_artifact_ids(&[artifact]).await.unwrap();
    assert_eq!(
        ex.select_events_by_artifact_ids(&[artifact]).await.unwrap().records.len(),
        0
    );

    source.commit().await.unwrap();
}

#[tokio::test]
async fn events_and_paths_work() {
    let (_file, mut source) = initialized_source().await;
    source.begin().await.unwrap();
    let mut ex = executor(&mut source);

    let artifact_type = ex.insert_artifact_type("DataSet", None, None).await.unwrap();
    let artifact = ex
        .insert_artifact(artifact_type, None, None, None, 0, 0)
        .await
        .unwrap();
    let execution_type = ex
        .insert_execution_type("Trainer", None, None, None, None)
        .await
        .unwrap();
    let execution = ex
        .insert_execution(execution_type, None, None, 0, 0)
        .await
        .unwrap();

    let event = ex
        .insert_event(artifact, execution, EventType::DeclaredOutput, 1234)
        .await
        .unwrap();
    ex.insert_event_path(event, &EventStep::Index(0)).await.unwrap();
    ex.insert_event_path(event, &EventStep::Key("model".to_owned()))
        .await
        .unwrap();

    let events = ex.select_events_by_artifact_ids(&[artifact]).await.unwrap();
    assert_eq!(events.records.len(), 1);
    assert_eq!(events.cell(0, "type"), Some("1"));
    assert_eq!(events.cell(0, "milliseconds_since_epoch"), Some("1234"));
    let events = ex.select_events_by_execution_ids(&[execution]).await.unwrap();
    assert_eq!(events.records.len(), 1);

    // Each step row carries either an index or a key, never both.
    let paths = ex.select_event_paths_by_event_ids(&[event]).await.unwrap();
    assert_eq!(paths.records.len(), 2);
    let is_index = paths.column_index("is_index_step").unwrap();
    for (i, record) in paths.records.iter().enumerate() {
        if record.values[is_index] == "1" {
            assert_eq!(paths.cell(i, "step_index"), Some("0"));
            assert_eq!(paths.cell(i, "step_key"), Some(NULL_VALUE));
        } else {
            assert_eq!(paths.cell(i, "step_index"), Some(NULL_VALUE));
            assert_eq!(paths.cell(i, "step_key"), Some("model"));
        }
    }

    ex.delete_event_paths_by_event_ids(&[event]).await.unwrap();
    ex.delete_events_by_execution_ids(&[execution]).await.unwrap();
    assert_eq!(
        ex.select_events_by_artifact_ids(&[artifact]).await.unwrap().records.len(),
        0
    );
    assert_eq!(
        ex.select_event_paths_by_event_ids(&[event]).await.unwrap().records.len(),
        0
    );

    source.commit().await.unwrap();
}

#[tokio::test]
async fn attributions_and_associations_are_unique_links() {
    let (_file, mut source) = initialized_source().await;
    source.begin().await.unwrap();
    let mut ex = executor(&mut source);

    let context_type = ex.insert_context_type("experiment", None, None).await.unwrap();
    let context = ex.insert_context(context_type, "exp", 0, 0).await.unwrap();
    let artifact_type = ex.insert_artifact_type("DataSet", None, None).await.unwrap();
    let artifact = ex
        .insert_artifact(artifact_type, None, None, None, 0, 0)
        .await
        .unwrap();
    let execution_type = ex
        .insert_execution_type("Trainer", None, None, None, None)
        .await
        .unwrap();
    let execution = ex
        .insert_execution(execution_type, None, None, 0, 0)
        .await
        .unwrap();

    ex.insert_attribution(context, artifact).await.unwrap();
    assert!(matches!(
        ex.insert_attribution(context, artifact).await,
        Err(QueryError::AlreadyExists { .. })
    ));
    ex.insert_association(context, execution).await.unwrap();
    assert!(matches!(
        ex.insert_association(context, execution).await,
        Err(QueryError::AlreadyExists { .. })
    ));

    assert_eq!(
        ex.select_attributions_by_artifact_ids(&[artifact])
            .await
            .unwrap()
            .records
            .len(),
        1
    );
    assert_eq!(
        ex.select_associations_by_execution_ids(&[execution])
            .await
            .unwrap()
            .records
            .len(),
        1
    );

    ex.delete_attributions_by_artifact_ids(&[artifact]).await.unwrap();
    ex.delete_associations_by_execution_ids(&[execution])
        .await
        .unwrap();
    assert_eq!(
        ex.select_attributions_by_context_ids(&[context]).await.unwrap().records.len(),
        0
    );
    assert_eq!(
        ex.select_associations_by_context_ids(&[context]).await.unwrap().records.len(),
        0
    );

    source.commit().await.unwrap();
}

#[tokio::test]
async fn parent_context_links_work() {
    let (_file, mut source) = initialized_source().await;
    source.begin().await.unwrap();
    let mut ex = executor(&mut source);

    let context_type = ex.insert_context_type("pipeline", None, None).await.unwrap();
    let parent = ex.insert_context(context_type, "pipeline-1", 0, 0).await.unwrap();
    let child1 = ex.insert_context(context_type, "run-1", 0, 0).await.unwrap();
    let child2 = ex.insert_context(context_type, "run-2", 0, 0).await.unwrap();

    ex.insert_parent_context(child1, parent).await.unwrap();
    ex.insert_parent_context(child2, parent).await.unwrap();
    assert!(matches!(
        ex.insert_parent_context(child1, parent).await,
        Err(QueryError::AlreadyExists { .. })
    ));

    assert_eq!(
        ex.select_parent_contexts_by_context_ids(&[child1])
            .await
            .unwrap()
            .records
            .len(),
        1
    );
    assert_eq!(
        ex.select_parent_contexts_by_parent_context_ids(&[parent])
            .await
            .unwrap()
            .records
            .len(),
        2
    );

    ex.delete_parent_contexts_by_context_ids(&[child1]).await.unwrap();
    assert_eq!(
        ex.select_parent_contexts_by_parent_context_ids(&[parent])
            .await
            .unwrap()
            .records
            .len(),
        1
    );
    ex.delete_parent_contexts_by_parent_context_ids(&[parent])
        .await
        .unwrap();
    assert_eq!(
        ex.select_parent_contexts_by_context_ids(&[child2])
            .await
            .unwrap()
            .records
            .len(),
        0
    );

    source.commit().await.unwrap();
}

#[tokio::test]
async fn listing_paginates_with_a_stable_order() {
    let (_file, mut source) = initialized_source().await;
    source.begin().await.unwrap();
    let mut ex = executor(&mut source);

    let type_id = ex.insert_artifact_type("DataSet", None, None).await.unwrap();
    let mut ids = Vec::new();
    for create_time in &[100, 200, 300, 400, 400] {
        let id = ex
            .insert_artifact(type_id, None, None, None, *create_time, *create_time)
            .await
            .unwrap();
        ids.push(id.get());
    }

    // Newest first, two per page, with the id tiebreak on the equal times.
    let options = ListOperationOptions::default()
        .max_result_size(2)
        .order_by(OrderByField::CreateTime, false);
    let page1 = ex.list_artifact_ids(&options, None).await.unwrap();
    assert_eq!(page1.ids, vec![ids[4], ids[3]]);
    let token = page1.next_page_token.unwrap();

    let page2 = ex
        .list_artifact_ids(&options.clone().next_page_token(&token), None)
        .await
        .unwrap();
    assert_eq!(page2.ids, vec![ids[2], ids[1]]);
    let token = page2.next_page_token.unwrap();

    let page3 = ex
        .list_artifact_ids(&options.clone().next_page_token(&token), None)
        .await
        .unwrap();
    assert_eq!(page3.ids, vec![ids[0]]);
    assert!(page3.next_page_token.is_none());

    // Candidate ids restrict the listing.
    let candidates = [ArtifactId::new(ids[1]), ArtifactId::new(ids[3])];
    let page = ex
        .list_artifact_ids(&ListOperationOptions::default(), Some(&candidates))
        .await
        .unwrap();
    assert_eq!(page.ids, vec![ids[1], ids[3]]);

    // A filter is combined with the other predicates.
    ex.update_artifact(
        ArtifactId::new(ids[0]),
        type_id,
        Some("path/to/data"),
        None,
        500,
    )
    .await
    .unwrap();
    let page = ex
        .list_artifact_ids(
            &ListOperationOptions::default().filter_query("uri = 'path/to/data'"),
            None,
        )
        .await
        .unwrap();
    assert_eq!(page.ids, vec![ids[0]]);

    // Execution and context listings share the same planner.
    let execution_type = ex
        .insert_execution_type("Trainer", None, None, None, None)
        .await
        .unwrap();
    ex.insert_execution(execution_type, None, None, 1, 1).await.unwrap();
    ex.insert_execution(execution_type, None, None, 2, 2).await.unwrap();
    let page = ex
        .list_execution_ids(&ListOperationOptions::default(), None)
        .await
        .unwrap();
    assert_eq!(page.ids.len(), 2);
    let page = ex
        .list_context_ids(&ListOperationOptions::default(), None)
        .await
        .unwrap();
    assert!(page.ids.is_empty());

    source.commit().await.unwrap();

    // Empty candidate lists short-circuit without touching the source.
    let page = executor(&mut source)
        .list_artifact_ids(&ListOperationOptions::default(), Some(&[]))
        .await
        .unwrap();
    assert!(page.ids.is_empty() && page.next_page_token.is_none());
}

#[tokio::test]
async fn listing_rejects_bad_options() {
    let (_file, mut source) = initialized_source().await;
    source.begin().await.unwrap();
    let mut ex = executor(&mut source);

    assert!(matches!(
        ex.list_artifact_ids(&ListOperationOptions::default().max_result_size(0), None)
            .await,
        Err(QueryError::InvalidArgument { .. })
    ));
    assert!(matches!(
        ex.list_artifact_ids(
            &ListOperationOptions::default().filter_query("1; DROP TABLE `Artifact`"),
            None
        )
        .await,
        Err(QueryError::InvalidArgument { .. })
    ));
    assert!(matches!(
        ex.list_execution_ids(
            &ListOperationOptions::default().filter_query("id > 1"),
            None
        )
        .await,
        Err(QueryError::Unimplemented { .. })
    ));
    assert!(matches!(
        ex.list_context_ids(
            &ListOperationOptions::default().filter_query("id > 1"),
            None
        )
        .await,
        Err(QueryError::Unimplemented { .. })
    ));

    source.rollback().await.unwrap();
}

async fn create_legacy_tables(source: &mut SqliteMetadataSource, statements: &[&str]) {
    source.begin().await.unwrap();
    for sql in statements {
        source.execute_query(sql).await.unwrap();
    }
    source.commit().await.unwrap();
}

const LEGACY_TABLES: &[&str] = &[
    concat!(
        "CREATE TABLE `Type` (",
        " `id` INTEGER PRIMARY KEY AUTOINCREMENT,",
        " `name` VARCHAR(255) NOT NULL,",
        " `is_artifact_type` TINYINT(1) NOT NULL )"
    ),
    concat!(
        "CREATE TABLE `TypeProperty` (",
        " `type_id` INT NOT NULL,",
        " `name` VARCHAR(255) NOT NULL,",
        " `data_type` INT NULL,",
        " PRIMARY KEY (`type_id`, `name`))"
    ),
    concat!(
        "CREATE TABLE `Artifact` (",
        " `id` INTEGER PRIMARY KEY AUTOINCREMENT,",
        " `type_id` INT NOT NULL,",
        " `uri` TEXT )"
    ),
    concat!(
        "CREATE TABLE `ArtifactProperty` (",
        " `artifact_id` INT NOT NULL,",
        " `name` VARCHAR(255) NOT NULL,",
        " `is_custom_property` TINYINT(1) NOT NULL,",
        " `int_value` INT,",
        " `double_value` DOUBLE,",
        " `string_value` TEXT,",
        " PRIMARY KEY (`artifact_id`, `name`))"
    ),
    concat!(
        "CREATE TABLE `Execution` (",
        " `id` INTEGER PRIMARY KEY AUTOINCREMENT,",
        " `type_id` INT NOT NULL )"
    ),
    concat!(
        "CREATE TABLE `ExecutionProperty` (",
        " `execution_id` INT NOT NULL,",
        " `name` VARCHAR(255) NOT NULL,",
        " `is_custom_property` TINYINT(1) NOT NULL,",
        " `int_value` INT,",
        " `double_value` DOUBLE,",
        " `string_value` TEXT,",
        " PRIMARY KEY (`execution_id`, `name`))"
    ),
    concat!(
        "CREATE TABLE `Event` (",
        " `id` INTEGER PRIMARY KEY AUTOINCREMENT,",
        " `artifact_id` INT NOT NULL,",
        " `execution_id` INT NOT NULL,",
        " `type` INT NOT NULL,",
        " `milliseconds_since_epoch` INT )"
    ),
    concat!(
        "CREATE TABLE `EventPath` (",
        " `event_id` INT NOT NULL,",
        " `is_index_step` TINYINT(1) NOT NULL,",
        " `step_index` INT,",
        " `step_key` TEXT )"
    ),
];

#[tokio::test]
async fn init_migrates_a_legacy_database() {
    let file = NamedTempFile::new().unwrap();
    let mut source = connect(&file).await;
    create_legacy_tables(&mut source, LEGACY_TABLES).await;
    source.begin().await.unwrap();
    source
        .execute_query("INSERT INTO `Type` (`name`, `is_artifact_type`) VALUES ('DataSet', 1)")
        .await
        .unwrap();
    source.commit().await.unwrap();

    // Migration is opt-in.
    assert!(matches!(
        executor(&mut source)
            .init_metadata_source(&InitOptions::default())
            .await,
        Err(QueryError::FailedPrecondition { .. })
    ));

    executor(&mut source)
        .init_metadata_source(&InitOptions::default().enable_upgrade_migration())
        .await
        .unwrap();

    source.begin().await.unwrap();
    let mut ex = executor(&mut source);
    assert_eq!(
        ex.get_schema_version().await.unwrap(),
        QueryConfig::sqlite().schema_version()
    );
    // Pre-migration data survives with its kind mapped to type_kind.
    let types = ex
        .select_types_by_id(&[TypeId::new(1)], TypeKind::Artifact)
        .await
        .unwrap();
    assert_eq!(types.records.len(), 1);
    assert_eq!(types.cell(0, "name"), Some("DataSet"));
    assert_eq!(types.cell(0, "version"), Some(NULL_VALUE));
    source.commit().await.unwrap();
}

#[tokio::test]
async fn partial_legacy_schema_is_data_loss() {
    let file = NamedTempFile::new().unwrap();
    let mut source = connect(&file).await;
    create_legacy_tables(&mut source, &LEGACY_TABLES[..2]).await;

    assert!(matches!(
        executor(&mut source)
            .init_metadata_source(&InitOptions::default().enable_upgrade_migration())
            .await,
        Err(QueryError::DataLoss { .. })
    ));
}

#[tokio::test]
async fn newer_schema_is_refused() {
    let (_file, mut source) = initialized_source().await;
    let newer = QueryConfig::sqlite().schema_version() + 1;

    source.begin().await.unwrap();
    source
        .execute_query(&format!("UPDATE `MLMDEnv` SET `schema_version` = {}", newer))
        .await
        .unwrap();
    source.commit().await.unwrap();

    assert!(matches!(
        executor(&mut source)
            .init_metadata_source(&InitOptions::default().enable_upgrade_migration())
            .await,
        Err(QueryError::FailedPrecondition { .. })
    ));

    source.begin().await.unwrap();
    let version = executor(&mut source).get_schema_version().await.unwrap();
    source.commit().await.unwrap();
    assert_eq!(version, newer);
}

#[tokio::test]
async fn downgrade_validates_its_target() {
    let (_file, mut source) = initialized_source().await;
    let lib_version = QueryConfig::sqlite().schema_version();

    assert!(matches!(
        executor(&mut source).downgrade_metadata_source(-1).await,
        Err(QueryError::InvalidArgument { .. })
    ));
    assert!(matches!(
        executor(&mut source)
            .downgrade_metadata_source(lib_version)
            .await,
        Err(QueryError::InvalidArgument { .. })
    ));
}

#[tokio::test]
async fn downgrade_and_reupgrade_round_trip_works() {
    let (_file, mut source) = initialized_source().await;
    let lib_version = QueryConfig::sqlite().schema_version();

    executor(&mut source)
        .downgrade_metadata_source(lib_version - 1)
        .await
        .unwrap();
    source.begin().await.unwrap();
    let version = executor(&mut source).get_schema_version().await.unwrap();
    source.commit().await.unwrap();
    assert_eq!(version, lib_version - 1);

    // Init refuses to touch the outdated database unless migration is on.
    assert!(matches!(
        executor(&mut source)
            .init_metadata_source(&InitOptions::default())
            .await,
        Err(QueryError::FailedPrecondition { .. })
    ));
    executor(&mut source)
        .init_metadata_source(&InitOptions::default().enable_upgrade_migration())
        .await
        .unwrap();

    // All the way down to the 0.13.2 layout, which has no version record,
    // and back up through every migration step.
    executor(&mut source).downgrade_metadata_source(0).await.unwrap();
    executor(&mut source)
        .init_metadata_source(&InitOptions::default().enable_upgrade_migration())
        .await
        .unwrap();

    source.begin().await.unwrap();
    let version = executor(&mut source).get_schema_version().await.unwrap();
    source.commit().await.unwrap();
    assert_eq!(version, lib_version);
}

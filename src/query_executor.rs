//! The query executor: typed metadata operations over a [`MetadataSource`],
//! plus the schema lifecycle manager.
//!
//! Every operation has the same shape: bind parameters, substitute them into
//! the named template of the [`QueryConfig`], execute, and hand back either a
//! [`RecordSet`] or the id assigned by the insert. The executor holds a
//! non-owning reference to its source; transaction demarcation is the
//! caller's responsibility except on the init and migration paths, which
//! manage their own transactions.
use crate::binder::Binder;
use crate::errors::{is_unique_violation, QueryError};
use crate::listing::{
    encode_page_token, plan_list_query, IdPage, ListOperationOptions, OrderByField,
};
use crate::metadata::{
    ArtifactId, ArtifactState, ArtifactStructType, ContextId, EventId, EventStep, EventType,
    ExecutionId, ExecutionState, PropertyType, TypeId, TypeKind, Value,
};
use crate::metadata_source::MetadataSource;
use crate::query::{render, QueryConfig};
use crate::record_set::RecordSet;

#[cfg(test)]
mod tests;

/// Options of [`QueryExecutor::init_metadata_source`].
#[derive(Debug, Default, Clone)]
pub struct InitOptions {
    enable_upgrade_migration: bool,
}

impl InitOptions {
    /// Allows init to migrate an older database forward, step by step, to the
    /// library schema version. Disabled by default.
    pub fn enable_upgrade_migration(mut self) -> Self {
        self.enable_upgrade_migration = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchemaState {
    /// No schema at all, or an `MLMDEnv` table with no version row.
    Empty,

    /// The 0.13.2 schema: all legacy tables, no `MLMDEnv`.
    Legacy,

    /// A recorded schema version.
    Version(i64),
}

/// Executes the fixed metadata operations against one [`MetadataSource`].
///
/// An executor is a cheap value object; the enclosing service creates one per
/// request. The source must outlive it and must not be shared concurrently.
#[derive(Debug)]
pub struct QueryExecutor<'a, S: MetadataSource> {
    source: &'a mut S,
    config: QueryConfig,
}

impl<'a, S: MetadataSource> QueryExecutor<'a, S> {
    /// Makes a new executor over `source`.
    pub fn new(source: &'a mut S, config: QueryConfig) -> Self {
        Self { source, config }
    }

    fn binder(&self) -> Binder<'_> {
        Binder::new(&*self.source)
    }

    async fn execute(&mut self, sql: &str) -> Result<RecordSet, QueryError> {
        self.source.execute_query(sql).await
    }

    async fn execute_insert(
        &mut self,
        sql: &str,
        conflict: impl FnOnce() -> QueryError,
    ) -> Result<i64, QueryError> {
        match self.source.execute_query(sql).await {
            Err(QueryError::Db(e)) if is_unique_violation(&e) => Err(conflict()),
            Err(e) => Err(e),
            Ok(_) => self.source.last_insert_id().await,
        }
    }

    // ---- types ----

    /// Inserts an artifact type and returns its id.
    pub async fn insert_artifact_type(
        &mut self,
        name: &str,
        version: Option<&str>,
        description: Option<&str>,
    ) -> Result<TypeId, QueryError> {
        self.insert_simple_type(TypeKind::Artifact, name, version, description)
            .await
    }

    /// Inserts a context type and returns its id.
    pub async fn insert_context_type(
        &mut self,
        name: &str,
        version: Option<&str>,
        description: Option<&str>,
    ) -> Result<TypeId, QueryError> {
        self.insert_simple_type(TypeKind::Context, name, version, description)
            .await
    }

    async fn insert_simple_type(
        &mut self,
        kind: TypeKind,
        name: &str,
        version: Option<&str>,
        description: Option<&str>,
    ) -> Result<TypeId, QueryError> {
        let b = self.binder();
        let sql = render(
            self.config.insert_type(),
            &[
                b.string(name),
                b.opt_string(version),
                b.type_kind(kind),
                b.opt_string(description),
            ],
        );
        let id = self
            .execute_insert(&sql, || QueryError::type_already_exists(kind, name))
            .await?;
        Ok(TypeId::new(id))
    }

    /// Inserts an execution type, with its input and output structural
    /// documents, and returns its id.
    pub async fn insert_execution_type(
        &mut self,
        name: &str,
        version: Option<&str>,
        description: Option<&str>,
        input_type: Option<&ArtifactStructType>,
        output_type: Option<&ArtifactStructType>,
    ) -> Result<TypeId, QueryError> {
        let kind = TypeKind::Execution;
        let b = self.binder();
        let sql = render(
            self.config.insert_execution_type(),
            &[
                b.string(name),
                b.opt_string(version),
                b.type_kind(kind),
                b.opt_string(description),
                b.opt_struct_type(input_type),
                b.opt_struct_type(output_type),
            ],
        );
        let id = self
            .execute_insert(&sql, || QueryError::type_already_exists(kind, name))
            .await?;
        Ok(TypeId::new(id))
    }

    /// Selects the types in `ids` whose stored kind equals `kind`.
    ///
    /// Ids of other kinds are silently filtered out. Execution types carry
    /// the `input_type`/`output_type` columns in addition to the fixed
    /// `id, name, version, description`.
    pub async fn select_types_by_id(
        &mut self,
        ids: &[TypeId],
        kind: TypeKind,
    ) -> Result<RecordSet, QueryError> {
        if ids.is_empty() {
            return Ok(RecordSet::default());
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let template = match kind {
            TypeKind::Execution => self.config.select_execution_types_by_id(),
            _ => self.config.select_types_by_id(),
        };
        let b = self.binder();
        let sql = render(template, &[b.id_list(&ids), b.type_kind(kind)]);
        self.execute(&sql).await
    }

    /// Selects a type by name and version.
    ///
    /// An absent version is a distinct key from every present version and is
    /// compared with `IS NULL`.
    pub async fn select_type_by_name_and_version(
        &mut self,
        name: &str,
        version: Option<&str>,
        kind: TypeKind,
    ) -> Result<RecordSet, QueryError> {
        let b = self.binder();
        let sql = match version {
            Some(version) => render(
                self.config.select_type_by_name_and_version(),
                &[b.string(name), b.string(version), b.type_kind(kind)],
            ),
            None => render(
                self.config.select_type_by_name_and_null_version(),
                &[b.string(name), b.type_kind(kind)],
            ),
        };
        self.execute(&sql).await
    }

    /// Looks up the id of the type named `name` with the given version.
    pub async fn type_id_by_name_and_version(
        &mut self,
        name: &str,
        version: Option<&str>,
        kind: TypeKind,
    ) -> Result<TypeId, QueryError> {
        let record_set = self
            .select_type_by_name_and_version(name, version, kind)
            .await?;
        let index = record_set.id_column_index();
        match (index, record_set.records.first()) {
            (Some(index), Some(record)) => {
                Ok(TypeId::new(record.values[index].parse().expect("bug")))
            }
            _ => Err(QueryError::not_found(format!(
                "{} type with the name {:?} (version {:?}) is not found",
                kind, name, version
            ))),
        }
    }

    /// Declares a property of a type.
    pub async fn insert_type_property(
        &mut self,
        type_id: TypeId,
        name: &str,
        data_type: PropertyType,
    ) -> Result<(), QueryError> {
        let b = self.binder();
        let sql = render(
            self.config.insert_type_property(),
            &[b.int(type_id.get()), b.string(name), b.property_type(data_type)],
        );
        match self.source.execute_query(&sql).await {
            Err(QueryError::Db(e)) if is_unique_violation(&e) => {
                Err(QueryError::already_exists(format!(
                    "property {:?} of type {} already exists",
                    name, type_id
                )))
            }
            other => other.map(|_| ()),
        }
    }

    /// Selects the declared properties of the given types.
    pub async fn select_properties_by_type_id(
        &mut self,
        ids: &[TypeId],
    ) -> Result<RecordSet, QueryError> {
        if ids.is_empty() {
            return Ok(RecordSet::default());
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let b = self.binder();
        let sql = render(self.config.select_properties_by_type_id(), &[b.id_list(&ids)]);
        self.execute(&sql).await
    }

    /// Links a type to a parent type.
    ///
    /// The link is soft: neither id is checked against the `Type` table.
    pub async fn insert_parent_type(
        &mut self,
        type_id: TypeId,
        parent_type_id: TypeId,
    ) -> Result<(), QueryError> {
        let b = self.binder();
        let sql = render(
            self.config.insert_parent_type(),
            &[b.int(type_id.get()), b.int(parent_type_id.get())],
        );
        match self.source.execute_query(&sql).await {
            Err(QueryError::Db(e)) if is_unique_violation(&e) => {
                Err(QueryError::already_exists(format!(
                    "parent type link ({}, {}) already exists",
                    type_id, parent_type_id
                )))
            }
            other => other.map(|_| ()),
        }
    }

    /// Selects the stored parent links of the given types.
    ///
    /// Links whose parent no longer names any type are returned too; an empty
    /// input returns an empty [`RecordSet`] without touching the source.
    pub async fn select_parent_types_by_type_id(
        &mut self,
        ids: &[TypeId],
    ) -> Result<RecordSet, QueryError> {
        if ids.is_empty() {
            return Ok(RecordSet::default());
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let b = self.binder();
        let sql = render(
            self.config.select_parent_types_by_type_id(),
            &[b.id_list(&ids)],
        );
        self.execute(&sql).await
    }

    /// Removes one parent link. Removing an absent link is a no-op.
    pub async fn delete_parent_type(
        &mut self,
        type_id: TypeId,
        parent_type_id: TypeId,
    ) -> Result<(), QueryError> {
        let b = self.binder();
        let sql = render(
            self.config.delete_parent_type(),
            &[b.int(type_id.get()), b.int(parent_type_id.get())],
        );
        self.execute(&sql).await.map(|_| ())
    }

    // ---- artifacts ----

    /// Inserts an artifact and returns its id.
    pub async fn insert_artifact(
        &mut self,
        type_id: TypeId,
        uri: Option<&str>,
        state: Option<ArtifactState>,
        name: Option<&str>,
        create_time_ms: i64,
        update_time_ms: i64,
    ) -> Result<ArtifactId, QueryError> {
        let b = self.binder();
        let sql = render(
            self.config.insert_artifact(),
            &[
                b.int(type_id.get()),
                b.opt_string(uri),
                b.opt_artifact_state(state),
                b.opt_string(name),
                b.int(create_time_ms),
                b.int(update_time_ms),
            ],
        );
        let id = self
            .execute_insert(&sql, || {
                QueryError::already_exists(format!(
                    "artifact with the name {:?} already exists under type {}",
                    name, type_id
                ))
            })
            .await?;
        Ok(ArtifactId::new(id))
    }

    /// Selects artifacts by id.
    pub async fn select_artifacts_by_id(
        &mut self,
        ids: &[ArtifactId],
    ) -> Result<RecordSet, QueryError> {
        if ids.is_empty() {
            return Ok(RecordSet::default());
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let b = self.binder();
        let sql = render(self.config.select_artifacts_by_id(), &[b.id_list(&ids)]);
        self.execute(&sql).await
    }

    /// Selects artifacts recorded under `uri`.
    pub async fn select_artifacts_by_uri(&mut self, uri: &str) -> Result<RecordSet, QueryError> {
        let b = self.binder();
        let sql = render(self.config.select_artifacts_by_uri(), &[b.string(uri)]);
        self.execute(&sql).await
    }

    /// Selects the artifact named `name` under `type_id`.
    pub async fn select_artifact_by_type_id_and_name(
        &mut self,
        type_id: TypeId,
        name: &str,
    ) -> Result<RecordSet, QueryError> {
        let b = self.binder();
        let sql = render(
            self.config.select_artifact_by_type_id_and_name(),
            &[b.int(type_id.get()), b.string(name)],
        );
        self.execute(&sql).await
    }

    /// Updates an artifact in place.
    pub async fn update_artifact(
        &mut self,
        id: ArtifactId,
        type_id: TypeId,
        uri: Option<&str>,
        state: Option<ArtifactState>,
        update_time_ms: i64,
    ) -> Result<(), QueryError> {
        let b = self.binder();
        let sql = render(
            self.config.update_artifact(),
            &[
                b.int(id.get()),
                b.int(type_id.get()),
                b.opt_string(uri),
                b.opt_artifact_state(state),
                b.int(update_time_ms),
            ],
        );
        self.execute(&sql).await.map(|_| ())
    }

    /// Deletes artifacts and their property rows.
    ///
    /// Events and attributions referencing the artifacts are left in place;
    /// callers compose the dedicated delete operations when they want a wider
    /// cascade. Unknown ids are ignored and an empty input is a no-op.
    pub async fn delete_artifacts_by_id(
        &mut self,
        ids: &[ArtifactId],
    ) -> Result<(), QueryError> {
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        self.delete_items_and_properties(TypeKind::Artifact, &ids)
            .await
    }

    /// Attaches a property row to an artifact.
    pub async fn insert_artifact_property(
        &mut self,
        artifact_id: ArtifactId,
        name: &str,
        value: &Value,
        is_custom_property: bool,
    ) -> Result<(), QueryError> {
        self.insert_property_row(
            TypeKind::Artifact,
            artifact_id.get(),
            name,
            value,
            is_custom_property,
        )
        .await
    }

    /// Rewrites the value of an artifact property.
    pub async fn update_artifact_property(
        &mut self,
        artifact_id: ArtifactId,
        name: &str,
        value: &Value,
    ) -> Result<(), QueryError> {
        self.update_property_row(TypeKind::Artifact, artifact_id.get(), name, value)
            .await
    }

    /// Removes one artifact property.
    pub async fn delete_artifact_property(
        &mut self,
        artifact_id: ArtifactId,
        name: &str,
    ) -> Result<(), QueryError> {
        self.delete_property_row(TypeKind::Artifact, artifact_id.get(), name)
            .await
    }

    /// Selects the property rows of the given artifacts.
    pub async fn select_artifact_properties_by_artifact_id(
        &mut self,
        ids: &[ArtifactId],
    ) -> Result<RecordSet, QueryError> {
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        self.select_property_rows(TypeKind::Artifact, &ids).await
    }

    // ---- executions ----

    /// Inserts an execution and returns its id.
    pub async fn insert_execution(
        &mut self,
        type_id: TypeId,
        last_known_state: Option<ExecutionState>,
        name: Option<&str>,
        create_time_ms: i64,
        update_time_ms: i64,
    ) -> Result<ExecutionId, QueryError> {
        let b = self.binder();
        let sql = render(
            self.config.insert_execution(),
            &[
                b.int(type_id.get()),
                b.opt_execution_state(last_known_state),
                b.opt_string(name),
                b.int(create_time_ms),
                b.int(update_time_ms),
            ],
        );
        let id = self
            .execute_insert(&sql, || {
                QueryError::already_exists(format!(
                    "execution with the name {:?} already exists under type {}",
                    name, type_id
                ))
            })
            .await?;
        Ok(ExecutionId::new(id))
    }

    /// Selects executions by id.
    pub async fn select_executions_by_id(
        &mut self,
        ids: &[ExecutionId],
    ) -> Result<RecordSet, QueryError> {
        if ids.is_empty() {
            return Ok(RecordSet::default());
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let b = self.binder();
        let sql = render(self.config.select_executions_by_id(), &[b.id_list(&ids)]);
        self.execute(&sql).await
    }

    /// Updates an execution in place.
    pub async fn update_execution(
        &mut self,
        id: ExecutionId,
        type_id: TypeId,
        last_known_state: Option<ExecutionState>,
        update_time_ms: i64,
    ) -> Result<(), QueryError> {
        let b = self.binder();
        let sql = render(
            self.config.update_execution(),
            &[
                b.int(id.get()),
                b.int(type_id.get()),
                b.opt_execution_state(last_known_state),
                b.int(update_time_ms),
            ],
        );
        self.execute(&sql).await.map(|_| ())
    }

    /// Deletes executions and their property rows; events and associations
    /// referencing them stay.
    pub async fn delete_executions_by_id(
        &mut self,
        ids: &[ExecutionId],
    ) -> Result<(), QueryError> {
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        self.delete_items_and_properties(TypeKind::Execution, &ids)
            .await
    }

    /// Attaches a property row to an execution.
    pub async fn insert_execution_property(
        &mut self,
        execution_id: ExecutionId,
        name: &str,
        value: &Value,
        is_custom_property: bool,
    ) -> Result<(), QueryError> {
        self.insert_property_row(
            TypeKind::Execution,
            execution_id.get(),
            name,
            value,
            is_custom_property,
        )
        .await
    }

    /// Rewrites the value of an execution property.
    pub async fn update_execution_property(
        &mut self,
        execution_id: ExecutionId,
        name: &str,
        value: &Value,
    ) -> Result<(), QueryError> {
        self.update_property_row(TypeKind::Execution, execution_id.get(), name, value)
            .await
    }

    /// Removes one execution property.
    pub async fn delete_execution_property(
        &mut self,
        execution_id: ExecutionId,
        name: &str,
    ) -> Result<(), QueryError> {
        self.delete_property_row(TypeKind::Execution, execution_id.get(), name)
            .await
    }

    /// Selects the property rows of the given executions.
    pub async fn select_execution_properties_by_execution_id(
        &mut self,
        ids: &[ExecutionId],
    ) -> Result<RecordSet, QueryError> {
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        self.select_property_rows(TypeKind::Execution, &ids).await
    }

    // ---- contexts ----

    /// Inserts a context and returns its id.
    ///
    /// Context names are unique within their type; a duplicate fails with
    /// [`QueryError::AlreadyExists`].
    pub async fn insert_context(
        &mut self,
        type_id: TypeId,
        name: &str,
        create_time_ms: i64,
        update_time_ms: i64,
    ) -> Result<ContextId, QueryError> {
        let b = self.binder();
        let sql = render(
            self.config.insert_context(),
            &[
                b.int(type_id.get()),
                b.string(name),
                b.int(create_time_ms),
                b.int(update_time_ms),
            ],
        );
        let id = self
            .execute_insert(&sql, || {
                QueryError::already_exists(format!(
                    "context with the name {:?} already exists under type {}",
                    name, type_id
                ))
            })
            .await?;
        Ok(ContextId::new(id))
    }

    /// Selects contexts by id.
    pub async fn select_contexts_by_id(
        &mut self,
        ids: &[ContextId],
    ) -> Result<RecordSet, QueryError> {
        if ids.is_empty() {
            return Ok(RecordSet::default());
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let b = self.binder();
        let sql = render(self.config.select_contexts_by_id(), &[b.id_list(&ids)]);
        self.execute(&sql).await
    }

    /// Selects the context named `name` under `type_id`.
    pub async fn select_context_by_type_id_and_name(
        &mut self,
        type_id: TypeId,
        name: &str,
    ) -> Result<RecordSet, QueryError> {
        let b = self.binder();
        let sql = render(
            self.config.select_context_by_type_id_and_name(),
            &[b.int(type_id.get()), b.string(name)],
        );
        self.execute(&sql).await
    }

    /// Updates a context in place.
    pub async fn update_context(
        &mut self,
        id: ContextId,
        type_id: TypeId,
        name: &str,
        update_time_ms: i64,
    ) -> Result<(), QueryError> {
        let b = self.binder();
        let sql = render(
            self.config.update_context(),
            &[
                b.int(id.get()),
                b.int(type_id.get()),
                b.string(name),
                b.int(update_time_ms),
            ],
        );
        self.execute(&sql).await.map(|_| ())
    }

    /// Deletes contexts and their property rows.
    ///
    /// Attributions and associations referencing the contexts are deliberately
    /// left in place; deleting them is a separate operation the caller
    /// composes. Unknown ids are ignored and an empty input is a no-op.
    pub async fn delete_contexts_by_id(&mut self, ids: &[ContextId]) -> Result<(), QueryError> {
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        self.delete_items_and_properties(TypeKind::Context, &ids)
            .await
    }

    /// Attaches a property row to a context.
    pub async fn insert_context_property(
        &mut self,
        context_id: ContextId,
        name: &str,
        value: &Value,
        is_custom_property: bool,
    ) -> Result<(), QueryError> {
        self.insert_property_row(
            TypeKind::Context,
            context_id.get(),
            name,
            value,
            is_custom_property,
        )
        .await
    }

    /// Rewrites the value of a context property.
    pub async fn update_context_property(
        &mut self,
        context_id: ContextId,
        name: &str,
        value: &Value,
    ) -> Result<(), QueryError> {
        self.update_property_row(TypeKind::Context, context_id.get(), name, value)
            .await
    }

    /// Removes one context property.
    pub async fn delete_context_property(
        &mut self,
        context_id: ContextId,
        name: &str,
    ) -> Result<(), QueryError> {
        self.delete_property_row(TypeKind::Context, context_id.get(), name)
            .await
    }

    /// Selects the property rows of the given contexts.
    pub async fn select_context_properties_by_context_id(
        &mut self,
        ids: &[ContextId],
    ) -> Result<RecordSet, QueryError> {
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        self.select_property_rows(TypeKind::Context, &ids).await
    }

    // ---- shared property plumbing ----

    async fn insert_property_row(
        &mut self,
        kind: TypeKind,
        owner_id: i64,
        name: &str,
        value: &Value,
        is_custom_property: bool,
    ) -> Result<(), QueryError> {
        let b = self.binder();
        let sql = render(
            self.config.insert_property(kind),
            &[
                b.int(owner_id),
                b.string(name),
                b.boolean(is_custom_property),
                b.value_column(value),
                b.value(value),
            ],
        );
        match self.source.execute_query(&sql).await {
            Err(QueryError::Db(e)) if is_unique_violation(&e) => {
                Err(QueryError::already_exists(format!(
                    "property {:?} of {} {} already exists",
                    name, kind, owner_id
                )))
            }
            other => other.map(|_| ()),
        }
    }

    async fn update_property_row(
        &mut self,
        kind: TypeKind,
        owner_id: i64,
        name: &str,
        value: &Value,
    ) -> Result<(), QueryError> {
        let b = self.binder();
        let sql = render(
            self.config.update_property(kind),
            &[
                b.int(owner_id),
                b.string(name),
                b.value_as(value, PropertyType::Int),
                b.value_as(value, PropertyType::Double),
                b.value_as(value, PropertyType::String),
            ],
        );
        self.execute(&sql).await.map(|_| ())
    }

    async fn delete_property_row(
        &mut self,
        kind: TypeKind,
        owner_id: i64,
        name: &str,
    ) -> Result<(), QueryError> {
        let b = self.binder();
        let sql = render(
            self.config.delete_property(kind),
            &[b.int(owner_id), b.string(name)],
        );
        self.execute(&sql).await.map(|_| ())
    }

    async fn select_property_rows(
        &mut self,
        kind: TypeKind,
        ids: &[i64],
    ) -> Result<RecordSet, QueryError> {
        if ids.is_empty() {
            return Ok(RecordSet::default());
        }
        let b = self.binder();
        let sql = render(
            self.config.select_properties_by_owner_id(kind),
            &[b.id_list(ids)],
        );
        self.execute(&sql).await
    }

    async fn delete_items_and_properties(
        &mut self,
        kind: TypeKind,
        ids: &[i64],
    ) -> Result<(), QueryError> {
        if ids.is_empty() {
            return Ok(());
        }
        let b = self.binder();
        let bound_ids = b.id_list(ids);
        let delete_items = render(
            match kind {
                TypeKind::Artifact => self.config.delete_artifacts_by_id(),
                TypeKind::Execution => self.config.delete_executions_by_id(),
                TypeKind::Context => self.config.delete_contexts_by_id(),
            },
            &[bound_ids.clone()],
        );
        let delete_properties = render(
            self.config.delete_properties_by_owner_id(kind),
            &[bound_ids],
        );
        self.execute(&delete_items).await?;
        self.execute(&delete_properties).await?;
        Ok(())
    }

    // ---- events ----

    /// Records an event linking an artifact and an execution.
    pub async fn insert_event(
        &mut self,
        artifact_id: ArtifactId,
        execution_id: ExecutionId,
        ty: EventType,
        event_time_ms: i64,
    ) -> Result<EventId, QueryError> {
        let b = self.binder();
        let sql = render(
            self.config.insert_event(),
            &[
                b.int(artifact_id.get()),
                b.int(execution_id.get()),
                b.event_type(ty),
                b.int(event_time_ms),
            ],
        );
        self.execute(&sql).await?;
        let id = self.source.last_insert_id().await?;
        Ok(EventId::new(id))
    }

    /// Appends one step to the stored path of an event.
    ///
    /// A step row carries either an index or a key; the other column is NULL.
    pub async fn insert_event_path(
        &mut self,
        event_id: EventId,
        step: &EventStep,
    ) -> Result<(), QueryError> {
        let b = self.binder();
        let sql = match step {
            EventStep::Index(index) => render(
                self.config.insert_event_path_index(),
                &[b.int(event_id.get()), b.int(*index)],
            ),
            EventStep::Key(key) => render(
                self.config.insert_event_path_key(),
                &[b.int(event_id.get()), b.string(key)],
            ),
        };
        self.execute(&sql).await.map(|_| ())
    }

    /// Selects events referencing the given artifacts.
    pub async fn select_events_by_artifact_ids(
        &mut self,
        ids: &[ArtifactId],
    ) -> Result<RecordSet, QueryError> {
        if ids.is_empty() {
            return Ok(RecordSet::default());
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let b = self.binder();
        let sql = render(
            self.config.select_events_by_artifact_ids(),
            &[b.id_list(&ids)],
        );
        self.execute(&sql).await
    }

    /// Selects events referencing the given executions.
    pub async fn select_events_by_execution_ids(
        &mut self,
        ids: &[ExecutionId],
    ) -> Result<RecordSet, QueryError> {
        if ids.is_empty() {
            return Ok(RecordSet::default());
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let b = self.binder();
        let sql = render(
            self.config.select_events_by_execution_ids(),
            &[b.id_list(&ids)],
        );
        self.execute(&sql).await
    }

    /// Selects the ordered path steps of the given events.
    pub async fn select_event_paths_by_event_ids(
        &mut self,
        ids: &[EventId],
    ) -> Result<RecordSet, QueryError> {
        if ids.is_empty() {
            return Ok(RecordSet::default());
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let b = self.binder();
        let sql = render(
            self.config.select_event_paths_by_event_ids(),
            &[b.id_list(&ids)],
        );
        self.execute(&sql).await
    }

    /// Deletes events referencing the given artifacts.
    pub async fn delete_events_by_artifact_ids(
        &mut self,
        ids: &[ArtifactId],
    ) -> Result<(), QueryError> {
        if ids.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let b = self.binder();
        let sql = render(
            self.config.delete_events_by_artifact_ids(),
            &[b.id_list(&ids)],
        );
        self.execute(&sql).await.map(|_| ())
    }

    /// Deletes events referencing the given executions.
    pub async fn delete_events_by_execution_ids(
        &mut self,
        ids: &[ExecutionId],
    ) -> Result<(), QueryError> {
        if ids.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let b = self.binder();
        let sql = render(
            self.config.delete_events_by_execution_ids(),
            &[b.id_list(&ids)],
        );
        self.execute(&sql).await.map(|_| ())
    }

    /// Deletes the stored paths of the given events.
    pub async fn delete_event_paths_by_event_ids(
        &mut self,
        ids: &[EventId],
    ) -> Result<(), QueryError> {
        if ids.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let b = self.binder();
        let sql = render(
            self.config.delete_event_paths_by_event_ids(),
            &[b.id_list(&ids)],
        );
        self.execute(&sql).await.map(|_| ())
    }

    // ---- attributions and associations ----

    /// Links a context and an artifact, returning the link row id.
    pub async fn insert_attribution(
        &mut self,
        context_id: ContextId,
        artifact_id: ArtifactId,
    ) -> Result<i64, QueryError> {
        let b = self.binder();
        let sql = render(
            self.config.insert_attribution(),
            &[b.int(context_id.get()), b.int(artifact_id.get())],
        );
        self.execute_insert(&sql, || {
            QueryError::already_exists(format!(
                "attribution ({}, {}) already exists",
                context_id, artifact_id
            ))
        })
        .await
    }

    /// Selects attributions of the given contexts.
    pub async fn select_attributions_by_context_ids(
        &mut self,
        ids: &[ContextId],
    ) -> Result<RecordSet, QueryError> {
        if ids.is_empty() {
            return Ok(RecordSet::default());
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let b = self.binder();
        let sql = render(
            self.config.select_attributions_by_context_ids(),
            &[b.id_list(&ids)],
        );
        self.execute(&sql).await
    }

    /// Selects attributions of the given artifacts.
    pub async fn select_attributions_by_artifact_ids(
        &mut self,
        ids: &[ArtifactId],
    ) -> Result<RecordSet, QueryError> {
        if ids.is_empty() {
            return Ok(RecordSet::default());
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let b = self.binder();
        let sql = render(
            self.config.select_attributions_by_artifact_ids(),
            &[b.id_list(&ids)],
        );
        self.execute(&sql).await
    }

    /// Deletes attributions of the given contexts.
    pub async fn delete_attributions_by_context_ids(
        &mut self,
        ids: &[ContextId],
    ) -> Result<(), QueryError> {
        if ids.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let b = self.binder();
        let sql = render(
            self.config.delete_attributions_by_context_ids(),
            &[b.id_list(&ids)],
        );
        self.execute(&sql).await.map(|_| ())
    }

    /// Deletes attributions of the given artifacts.
    pub async fn delete_attributions_by_artifact_ids(
        &mut self,
        ids: &[ArtifactId],
    ) -> Result<(), QueryError> {
        if ids.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let b = self.binder();
        let sql = render(
            self.config.delete_attributions_by_artifact_ids(),
            &[b.id_list(&ids)],
        );
        self.execute(&sql).await.map(|_| ())
    }

    /// Links a context and an execution, returning the link row id.
    pub async fn insert_association(
        &mut self,
        context_id: ContextId,
        execution_id: ExecutionId,
    ) -> Result<i64, QueryError> {
        let b = self.binder();
        let sql = render(
            self.config.insert_association(),
            &[b.int(context_id.get()), b.int(execution_id.get())],
        );
        self.execute_insert(&sql, || {
            QueryError::already_exists(format!(
                "association ({}, {}) already exists",
                context_id, execution_id
            ))
        })
        .await
    }

    /// Selects associations of the given contexts.
    pub async fn select_associations_by_context_ids(
        &mut self,
        ids: &[ContextId],
    ) -> Result<RecordSet, QueryError> {
        if ids.is_empty() {
            return Ok(RecordSet::default());
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let b = self.binder();
        let sql = render(
            self.config.select_associations_by_context_ids(),
            &[b.id_list(&ids)],
        );
        self.execute(&sql).await
    }

    /// Selects associations of the given executions.
    pub async fn select_associations_by_execution_ids(
        &mut self,
        ids: &[ExecutionId],
    ) -> Result<RecordSet, QueryError> {
        if ids.is_empty() {
            return Ok(RecordSet::default());
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let b = self.binder();
        let sql = render(
            self.config.select_associations_by_execution_ids(),
            &[b.id_list(&ids)],
        );
        self.execute(&sql).await
    }

    /// Deletes associations of the given contexts.
    pub async fn delete_associations_by_context_ids(
        &mut self,
        ids: &[ContextId],
    ) -> Result<(), QueryError> {
        if ids.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let b = self.binder();
        let sql = render(
            self.config.delete_associations_by_context_ids(),
            &[b.id_list(&ids)],
        );
        self.execute(&sql).await.map(|_| ())
    }

    /// Deletes associations of the given executions.
    pub async fn delete_associations_by_execution_ids(
        &mut self,
        ids: &[ExecutionId],
    ) -> Result<(), QueryError> {
        if ids.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let b = self.binder();
        let sql = render(
            self.config.delete_associations_by_execution_ids(),
            &[b.id_list(&ids)],
        );
        self.execute(&sql).await.map(|_| ())
    }

    // ---- parent contexts ----

    /// Links a context to a parent context. The link is soft.
    pub async fn insert_parent_context(
        &mut self,
        context_id: ContextId,
        parent_context_id: ContextId,
    ) -> Result<(), QueryError> {
        let b = self.binder();
        let sql = render(
            self.config.insert_parent_context(),
            &[b.int(context_id.get()), b.int(parent_context_id.get())],
        );
        match self.source.execute_query(&sql).await {
            Err(QueryError::Db(e)) if is_unique_violation(&e) => {
                Err(QueryError::already_exists(format!(
                    "parent context link ({}, {}) already exists",
                    context_id, parent_context_id
                )))
            }
            other => other.map(|_| ()),
        }
    }

    /// Selects the parent links of the given child contexts.
    pub async fn select_parent_contexts_by_context_ids(
        &mut self,
        ids: &[ContextId],
    ) -> Result<RecordSet, QueryError> {
        if ids.is_empty() {
            return Ok(RecordSet::default());
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let b = self.binder();
        let sql = render(
            self.config.select_parent_contexts_by_context_ids(),
            &[b.id_list(&ids)],
        );
        self.execute(&sql).await
    }

    /// Selects the child links of the given parent contexts.
    pub async fn select_parent_contexts_by_parent_context_ids(
        &mut self,
        ids: &[ContextId],
    ) -> Result<RecordSet, QueryError> {
        if ids.is_empty() {
            return Ok(RecordSet::default());
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let b = self.binder();
        let sql = render(
            self.config.select_parent_contexts_by_parent_context_ids(),
            &[b.id_list(&ids)],
        );
        self.execute(&sql).await
    }

    /// Deletes the parent links of the given child contexts.
    pub async fn delete_parent_contexts_by_context_ids(
        &mut self,
        ids: &[ContextId],
    ) -> Result<(), QueryError> {
        if ids.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let b = self.binder();
        let sql = render(
            self.config.delete_parent_contexts_by_context_ids(),
            &[b.id_list(&ids)],
        );
        self.execute(&sql).await.map(|_| ())
    }

    /// Deletes the child links of the given parent contexts.
    pub async fn delete_parent_contexts_by_parent_context_ids(
        &mut self,
        ids: &[ContextId],
    ) -> Result<(), QueryError> {
        if ids.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = ids.iter().map(|id| id.get()).collect();
        let b = self.binder();
        let sql = render(
            self.config.delete_parent_contexts_by_parent_context_ids(),
            &[b.id_list(&ids)],
        );
        self.execute(&sql).await.map(|_| ())
    }

    // ---- listing ----

    /// Lists artifact ids, paginated and optionally filtered.
    pub async fn list_artifact_ids(
        &mut self,
        options: &ListOperationOptions,
        candidate_ids: Option<&[ArtifactId]>,
    ) -> Result<IdPage, QueryError> {
        let candidate_ids: Option<Vec<i64>> =
            candidate_ids.map(|ids| ids.iter().map(|id| id.get()).collect());
        self.list_ids(TypeKind::Artifact, options, candidate_ids.as_deref())
            .await
    }

    /// Lists execution ids, paginated. Filter queries are not supported on
    /// executions.
    pub async fn list_execution_ids(
        &mut self,
        options: &ListOperationOptions,
        candidate_ids: Option<&[ExecutionId]>,
    ) -> Result<IdPage, QueryError> {
        if options.filter_query.is_some() {
            return Err(QueryError::Unimplemented {
                operation: "filter query on execution listing",
            });
        }
        let candidate_ids: Option<Vec<i64>> =
            candidate_ids.map(|ids| ids.iter().map(|id| id.get()).collect());
        self.list_ids(TypeKind::Execution, options, candidate_ids.as_deref())
            .await
    }

    /// Lists context ids, paginated. Filter queries are not supported on
    /// contexts.
    pub async fn list_context_ids(
        &mut self,
        options: &ListOperationOptions,
        candidate_ids: Option<&[ContextId]>,
    ) -> Result<IdPage, QueryError> {
        if options.filter_query.is_some() {
            return Err(QueryError::Unimplemented {
                operation: "filter query on context listing",
            });
        }
        let candidate_ids: Option<Vec<i64>> =
            candidate_ids.map(|ids| ids.iter().map(|id| id.get()).collect());
        self.list_ids(TypeKind::Context, options, candidate_ids.as_deref())
            .await
    }

    async fn list_ids(
        &mut self,
        kind: TypeKind,
        options: &ListOperationOptions,
        candidate_ids: Option<&[i64]>,
    ) -> Result<IdPage, QueryError> {
        if let Some(ids) = candidate_ids {
            if ids.is_empty() {
                return Ok(IdPage::default());
            }
        }
        let b = self.binder();
        let bound_ids = candidate_ids.map(|ids| b.id_list(ids));
        let sql = plan_list_query(kind, options, bound_ids.as_deref())?;
        let record_set = self.execute(&sql).await?;
        if record_set.records.is_empty() {
            return Ok(IdPage::default());
        }

        let id_index = record_set.id_column_index().expect("bug");
        let value_index = if options.order_by_field == OrderByField::Id {
            id_index
        } else {
            record_set
                .column_index(options.order_by_field.field_name())
                .expect("bug")
        };
        let max = options.max_result_size as usize;
        let has_more = record_set.records.len() > max;
        let mut page = IdPage::default();
        for record in record_set.records.iter().take(max) {
            page.ids.push(record.values[id_index].parse().expect("bug"));
        }
        if has_more {
            let last = &record_set.records[max - 1];
            let last_value = last.values[value_index].parse().expect("bug");
            let last_id = last.values[id_index].parse().expect("bug");
            page.next_page_token = Some(encode_page_token(options, last_value, last_id));
        }
        Ok(page)
    }

    // ---- schema lifecycle ----

    /// Reads the stored schema version. Must be called within a transaction.
    pub async fn get_schema_version(&mut self) -> Result<i64, QueryError> {
        let record_set = self.execute(self.config.select_schema_version()).await?;
        match record_set.records.len() {
            1 => Ok(record_set.records[0].values[0].parse().expect("bug")),
            0 => Err(QueryError::not_found("schema_version is not recorded")),
            n => Err(QueryError::data_loss(format!(
                "there are {} MLMDEnv records (only one record is expected)",
                n
            ))),
        }
    }

    /// Initialises the metadata source.
    ///
    /// An empty database gets the full schema at the library version. A
    /// database at the library version is verified table by table. An older
    /// database is migrated forward when
    /// [`InitOptions::enable_upgrade_migration`] is set, each step in its own
    /// transaction; otherwise init fails with
    /// [`QueryError::FailedPrecondition`]. A newer database is refused.
    ///
    /// Re-running init on an up-to-date database is a no-op that succeeds.
    pub async fn init_metadata_source(&mut self, options: &InitOptions) -> Result<(), QueryError> {
        let lib_version = self.config.schema_version();
        assert!(lib_version > 0);

        self.source.begin().await?;
        let state = match self.probe_schema_state().await {
            Ok(state) => state,
            Err(e) => {
                let _ = self.source.rollback().await;
                return Err(e);
            }
        };
        self.source.commit().await?;

        let db_version = match state {
            SchemaState::Empty => {
                log::debug!("empty database; creating schema version {}", lib_version);
                return self.create_schema().await;
            }
            SchemaState::Legacy => 0,
            SchemaState::Version(v) => v,
        };

        if db_version == lib_version {
            return self.verify_schema().await;
        }
        if db_version > lib_version {
            return Err(QueryError::failed_precondition(format!(
                "the database schema version {} is newer than the library version {}; \
                 downgrading may lose data, upgrade the library instead",
                db_version, lib_version
            )));
        }
        if !options.enable_upgrade_migration {
            return Err(QueryError::failed_precondition(format!(
                "the database schema version {} is older than the library version {} \
                 and upgrade migration is disabled",
                db_version, lib_version
            )));
        }
        for version in (db_version + 1)..=lib_version {
            let statements = self.config.upgrade_statements(version);
            self.apply_versioned_statements(statements, version).await?;
            log::debug!("migrated the database schema to version {}", version);
        }
        Ok(())
    }

    /// Downgrades the schema to `to_version`, running the reverse migration
    /// scripts step by step.
    ///
    /// Intended for administrators; downgrading drops columns and tables and
    /// the lost data is unrecoverable.
    pub async fn downgrade_metadata_source(&mut self, to_version: i64) -> Result<(), QueryError> {
        let lib_version = self.config.schema_version();
        if to_version < 0 || to_version >= lib_version {
            return Err(QueryError::invalid_argument(format!(
                "downgrade target {} must be in 0..{}",
                to_version, lib_version
            )));
        }

        self.source.begin().await?;
        let state = match self.probe_schema_state().await {
            Ok(state) => state,
            Err(e) => {
                let _ = self.source.rollback().await;
                return Err(e);
            }
        };
        self.source.commit().await?;

        let db_version = match state {
            SchemaState::Empty => {
                return Err(QueryError::failed_precondition(
                    "cannot downgrade an uninitialised database",
                ));
            }
            SchemaState::Legacy => 0,
            SchemaState::Version(v) => v,
        };
        if db_version > lib_version {
            return Err(QueryError::failed_precondition(format!(
                "the database schema version {} is newer than the library version {}; \
                 upgrade the library before downgrading the database",
                db_version, lib_version
            )));
        }
        if db_version < to_version {
            return Err(QueryError::invalid_argument(format!(
                "the database schema version {} is already below the downgrade target {}",
                db_version, to_version
            )));
        }
        for version in ((to_version + 1)..=db_version).rev() {
            let statements = self.config.downgrade_statements(version);
            self.apply_versioned_statements(statements, version - 1)
                .await?;
            log::warn!(
                "downgraded the database schema to version {}; dropped data is unrecoverable",
                version - 1
            );
        }
        Ok(())
    }

    async fn probe_schema_state(&mut self) -> Result<SchemaState, QueryError> {
        match self.execute(self.config.select_schema_version()).await {
            Ok(record_set) => match record_set.records.len() {
                0 => Ok(SchemaState::Empty),
                1 => Ok(SchemaState::Version(
                    record_set.records[0].values[0].parse().expect("bug"),
                )),
                n => Err(QueryError::data_loss(format!(
                    "there are {} MLMDEnv records (only one record is expected)",
                    n
                ))),
            },
            Err(QueryError::Db(_)) => {
                // No MLMDEnv table: either a pre-0.13.2-style empty database
                // or the legacy schema itself.
                let mut present = 0;
                let checks = self.config.legacy_check_tables();
                for sql in checks {
                    if self.execute(sql).await.is_ok() {
                        present += 1;
                    }
                }
                if present == 0 {
                    Ok(SchemaState::Empty)
                } else if present == checks.len() {
                    Ok(SchemaState::Legacy)
                } else {
                    Err(QueryError::data_loss(format!(
                        "only {} of the {} tables of the legacy 0.13.2 schema are present",
                        present,
                        checks.len()
                    )))
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn create_schema(&mut self) -> Result<(), QueryError> {
        self.apply_versioned_statements(self.config.create_tables(), self.config.schema_version())
            .await
    }

    async fn verify_schema(&mut self) -> Result<(), QueryError> {
        self.source.begin().await?;
        for sql in self.config.check_tables() {
            if let Err(e) = self.execute(sql).await {
                let _ = self.source.rollback().await;
                return Err(e);
            }
        }
        self.source.commit().await
    }

    /// Runs `statements` and records `version`, all in one transaction.
    /// Version 0 predates the `MLMDEnv` table and is not recorded.
    async fn apply_versioned_statements(
        &mut self,
        statements: &[&str],
        version: i64,
    ) -> Result<(), QueryError> {
        self.source.begin().await?;
        for sql in statements {
            if let Err(e) = self.execute(sql).await {
                let _ = self.source.rollback().await;
                return Err(e);
            }
        }
        if version > 0 {
            if let Err(e) = self.write_schema_version(version).await {
                let _ = self.source.rollback().await;
                return Err(e);
            }
        }
        self.source.commit().await
    }

    async fn write_schema_version(&mut self, version: i64) -> Result<(), QueryError> {
        self.execute(self.config.delete_schema_version()).await?;
        let b = self.binder();
        let sql = render(self.config.insert_schema_version(), &[b.int(version)]);
        self.execute(&sql).await.map(|_| ())
    }
}

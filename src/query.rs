//! Declarative SQL templates, schema DDL and migration scripts.
//!
//! All SQL lives here as static data, keyed by operation, with `$0`-style
//! positional placeholders filled in by textual substitution. Dialect
//! differences are confined to DDL and migrations; the operation templates
//! are shared by both supported dialects.
use crate::metadata::TypeKind;

/// The schema version this library was built against.
pub const SCHEMA_VERSION: i64 = 8;

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum SqlDialect {
    Sqlite,
    Mysql,
}

/// Bundle of SQL templates for one dialect.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    dialect: SqlDialect,
}

impl QueryConfig {
    /// Makes a configuration for SQLite-compatible databases.
    pub fn sqlite() -> Self {
        Self {
            dialect: SqlDialect::Sqlite,
        }
    }

    /// Makes a configuration for MySQL-compatible databases.
    pub fn mysql() -> Self {
        Self {
            dialect: SqlDialect::Mysql,
        }
    }

    /// Gets the dialect of this configuration.
    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    /// Gets the schema version this configuration targets.
    pub fn schema_version(&self) -> i64 {
        SCHEMA_VERSION
    }

    pub(crate) fn create_tables(&self) -> &'static [&'static str] {
        match self.dialect {
            SqlDialect::Sqlite => SQLITE_CREATE_TABLES,
            SqlDialect::Mysql => MYSQL_CREATE_TABLES,
        }
    }

    /// One probe per table of the current schema; each selects every expected
    /// column so that a column-level mismatch fails verification.
    pub(crate) fn check_tables(&self) -> &'static [&'static str] {
        CHECK_TABLES
    }

    /// Probes for the characteristic tables of the legacy 0.13.2 schema.
    pub(crate) fn legacy_check_tables(&self) -> &'static [&'static str] {
        LEGACY_CHECK_TABLES
    }

    pub(crate) fn upgrade_statements(&self, to_version: i64) -> &'static [&'static str] {
        let step = migration_step(to_version);
        match self.dialect {
            SqlDialect::Sqlite => step.sqlite_upgrade,
            SqlDialect::Mysql => step.mysql_upgrade,
        }
    }

    pub(crate) fn downgrade_statements(&self, from_version: i64) -> &'static [&'static str] {
        let step = migration_step(from_version);
        match self.dialect {
            SqlDialect::Sqlite => step.sqlite_downgrade,
            SqlDialect::Mysql => step.mysql_downgrade,
        }
    }

    pub(crate) fn select_schema_version(&self) -> &'static str {
        "SELECT `schema_version` FROM `MLMDEnv`"
    }

    pub(crate) fn delete_schema_version(&self) -> &'static str {
        "DELETE FROM `MLMDEnv`"
    }

    pub(crate) fn insert_schema_version(&self) -> &'static str {
        "INSERT INTO `MLMDEnv` (`schema_version`) VALUES ($0)"
    }

    pub(crate) fn insert_type(&self) -> &'static str {
        "INSERT INTO `Type` (`name`, `version`, `type_kind`, `description`) VALUES ($0, $1, $2, $3)"
    }

    pub(crate) fn insert_execution_type(&self) -> &'static str {
        concat!(
            "INSERT INTO `Type` ",
            "(`name`, `version`, `type_kind`, `description`, `input_type`, `output_type`) ",
            "VALUES ($0, $1, $2, $3, $4, $5)"
        )
    }

    pub(crate) fn select_types_by_id(&self) -> &'static str {
        "SELECT `id`, `name`, `version`, `description` FROM `Type` WHERE `id` IN ($0) AND `type_kind` = $1"
    }

    pub(crate) fn select_execution_types_by_id(&self) -> &'static str {
        concat!(
            "SELECT `id`, `name`, `version`, `description`, `input_type`, `output_type` ",
            "FROM `Type` WHERE `id` IN ($0) AND `type_kind` = $1"
        )
    }

    pub(crate) fn select_type_by_name_and_version(&self) -> &'static str {
        concat!(
            "SELECT `id`, `name`, `version`, `description` FROM `Type` ",
            "WHERE `name` = $0 AND `version` = $1 AND `type_kind` = $2"
        )
    }

    pub(crate) fn select_type_by_name_and_null_version(&self) -> &'static str {
        concat!(
            "SELECT `id`, `name`, `version`, `description` FROM `Type` ",
            "WHERE `name` = $0 AND `version` IS NULL AND `type_kind` = $1"
        )
    }

    pub(crate) fn insert_type_property(&self) -> &'static str {
        "INSERT INTO `TypeProperty` (`type_id`, `name`, `data_type`) VALUES ($0, $1, $2)"
    }

    pub(crate) fn select_properties_by_type_id(&self) -> &'static str {
        "SELECT `type_id`, `name`, `data_type` FROM `TypeProperty` WHERE `type_id` IN ($0)"
    }

    pub(crate) fn insert_parent_type(&self) -> &'static str {
        "INSERT INTO `ParentType` (`type_id`, `parent_type_id`) VALUES ($0, $1)"
    }

    pub(crate) fn select_parent_types_by_type_id(&self) -> &'static str {
        "SELECT `type_id`, `parent_type_id` FROM `ParentType` WHERE `type_id` IN ($0)"
    }

    pub(crate) fn delete_parent_type(&self) -> &'static str {
        "DELETE FROM `ParentType` WHERE `type_id` = $0 AND `parent_type_id` = $1"
    }

    pub(crate) fn insert_artifact(&self) -> &'static str {
        concat!(
            "INSERT INTO `Artifact` ",
            "(`type_id`, `uri`, `state`, `name`, `create_time_since_epoch`, `last_update_time_since_epoch`) ",
            "VALUES ($0, $1, $2, $3, $4, $5)"
        )
    }

    pub(crate) fn select_artifacts_by_id(&self) -> &'static str {
        concat!(
            "SELECT `id`, `type_id`, `uri`, `state`, `name`, ",
            "`create_time_since_epoch`, `last_update_time_since_epoch` ",
            "FROM `Artifact` WHERE `id` IN ($0)"
        )
    }

    pub(crate) fn select_artifacts_by_uri(&self) -> &'static str {
        concat!(
            "SELECT `id`, `type_id`, `uri`, `state`, `name`, ",
            "`create_time_since_epoch`, `last_update_time_since_epoch` ",
            "FROM `Artifact` WHERE `uri` = $0"
        )
    }

    pub(crate) fn select_artifact_by_type_id_and_name(&self) -> &'static str {
        concat!(
            "SELECT `id`, `type_id`, `uri`, `state`, `name`, ",
            "`create_time_since_epoch`, `last_update_time_since_epoch` ",
            "FROM `Artifact` WHERE `type_id` = $0 AND `name` = $1"
        )
    }

    pub(crate) fn update_artifact(&self) -> &'static str {
        concat!(
            "UPDATE `Artifact` SET `type_id` = $1, `uri` = $2, `state` = $3, ",
            "`last_update_time_since_epoch` = $4 WHERE `id` = $0"
        )
    }

    pub(crate) fn delete_artifacts_by_id(&self) -> &'static str {
        "DELETE FROM `Artifact` WHERE `id` IN ($0)"
    }

    pub(crate) fn insert_execution(&self) -> &'static str {
        concat!(
            "INSERT INTO `Execution` ",
            "(`type_id`, `last_known_state`, `name`, `create_time_since_epoch`, `last_update_time_since_epoch`) ",
            "VALUES ($0, $1, $2, $3, $4)"
        )
    }

    pub(crate) fn select_executions_by_id(&self) -> &'static str {
        concat!(
            "SELECT `id`, `type_id`, `last_known_state`, `name`, ",
            "`create_time_since_epoch`, `last_update_time_since_epoch` ",
            "FROM `Execution` WHERE `id` IN ($0)"
        )
    }

    pub(crate) fn update_execution(&self) -> &'static str {
        concat!(
            "UPDATE `Execution` SET `type_id` = $1, `last_known_state` = $2, ",
            "`last_update_time_since_epoch` = $3 WHERE `id` = $0"
        )
    }

    pub(crate) fn delete_executions_by_id(&self) -> &'static str {
        "DELETE FROM `Execution` WHERE `id` IN ($0)"
    }

    pub(crate) fn insert_context(&self) -> &'static str {
        concat!(
            "INSERT INTO `Context` ",
            "(`type_id`, `name`, `create_time_since_epoch`, `last_update_time_since_epoch`) ",
            "VALUES ($0, $1, $2, $3)"
        )
    }

    pub(crate) fn select_contexts_by_id(&self) -> &'static str {
        concat!(
            "SELECT `id`, `type_id`, `name`, ",
            "`create_time_since_epoch`, `last_update_time_since_epoch` ",
            "FROM `Context` WHERE `id` IN ($0)"
        )
    }

    pub(crate) fn select_context_by_type_id_and_name(&self) -> &'static str {
        concat!(
            "SELECT `id`, `type_id`, `name`, ",
            "`create_time_since_epoch`, `last_update_time_since_epoch` ",
            "FROM `Context` WHERE `type_id` = $0 AND `name` = $1"
        )
    }

    pub(crate) fn update_context(&self) -> &'static str {
        concat!(
            "UPDATE `Context` SET `type_id` = $1, `name` = $2, ",
            "`last_update_time_since_epoch` = $3 WHERE `id` = $0"
        )
    }

    pub(crate) fn delete_contexts_by_id(&self) -> &'static str {
        "DELETE FROM `Context` WHERE `id` IN ($0)"
    }

    // Property rows: the insert names the populated value column ($3) next to
    // its literal; the update writes all three columns so that the two
    // non-populated ones return to NULL.
    pub(crate) fn insert_property(&self, kind: TypeKind) -> &'static str {
        match kind {
            TypeKind::Artifact => {
                "INSERT INTO `ArtifactProperty` (`artifact_id`, `name`, `is_custom_property`, $3) VALUES ($0, $1, $2, $4)"
            }
            TypeKind::Execution => {
                "INSERT INTO `ExecutionProperty` (`execution_id`, `name`, `is_custom_property`, $3) VALUES ($0, $1, $2, $4)"
            }
            TypeKind::Context => {
                "INSERT INTO `ContextProperty` (`context_id`, `name`, `is_custom_property`, $3) VALUES ($0, $1, $2, $4)"
            }
        }
    }

    pub(crate) fn update_property(&self, kind: TypeKind) -> &'static str {
        match kind {
            TypeKind::Artifact => {
                "UPDATE `ArtifactProperty` SET `int_value` = $2, `double_value` = $3, `string_value` = $4 WHERE `artifact_id` = $0 AND `name` = $1"
            }
            TypeKind::Execution => {
                "UPDATE `ExecutionProperty` SET `int_value` = $2, `double_value` = $3, `string_value` = $4 WHERE `execution_id` = $0 AND `name` = $1"
            }
            TypeKind::Context => {
                "UPDATE `ContextProperty` SET `int_value` = $2, `double_value` = $3, `string_value` = $4 WHERE `context_id` = $0 AND `name` = $1"
            }
        }
    }

    pub(crate) fn delete_property(&self, kind: TypeKind) -> &'static str {
        match kind {
            TypeKind::Artifact => {
                "DELETE FROM `ArtifactProperty` WHERE `artifact_id` = $0 AND `name` = $1"
            }
            TypeKind::Execution => {
                "DELETE FROM `ExecutionProperty` WHERE `execution_id` = $0 AND `name` = $1"
            }
            TypeKind::Context => {
                "DELETE FROM `ContextProperty` WHERE `context_id` = $0 AND `name` = $1"
            }
        }
    }

    pub(crate) fn select_properties_by_owner_id(&self, kind: TypeKind) -> &'static str {
        match kind {
            TypeKind::Artifact => {
                "SELECT `artifact_id`, `name`, `is_custom_property`, `int_value`, `double_value`, `string_value` FROM `ArtifactProperty` WHERE `artifact_id` IN ($0)"
            }
            TypeKind::Execution => {
                "SELECT `execution_id`, `name`, `is_custom_property`, `int_value`, `double_value`, `string_value` FROM `ExecutionProperty` WHERE `execution_id` IN ($0)"
            }
            TypeKind::Context => {
                "SELECT `context_id`, `name`, `is_custom_property`, `int_value`, `double_value`, `string_value` FROM `ContextProperty` WHERE `context_id` IN ($0)"
            }
        }
    }

    pub(crate) fn delete_properties_by_owner_id(&self, kind: TypeKind) -> &'static str {
        match kind {
            TypeKind::Artifact => "DELETE FROM `ArtifactProperty` WHERE `artifact_id` IN ($0)",
            TypeKind::Execution => "DELETE FROM `ExecutionProperty` WHERE `execution_id` IN ($0)",
            TypeKind::Context => "DELETE FROM `ContextProperty` WHERE `context_id` IN ($0)",
        }
    }

    pub(crate) fn insert_event(&self) -> &'static str {
        concat!(
            "INSERT INTO `Event` (`artifact_id`, `execution_id`, `type`, `milliseconds_since_epoch`) ",
            "VALUES ($0, $1, $2, $3)"
        )
    }

    pub(crate) fn select_events_by_artifact_ids(&self) -> &'static str {
        concat!(
            "SELECT `id`, `artifact_id`, `execution_id`, `type`, `milliseconds_since_epoch` ",
            "FROM `Event` WHERE `artifact_id` IN ($0)"
        )
    }

    pub(crate) fn select_events_by_execution_ids(&self) -> &'static str {
        concat!(
            "SELECT `id`, `artifact_id`, `execution_id`, `type`, `milliseconds_since_epoch` ",
            "FROM `Event` WHERE `execution_id` IN ($0)"
        )
    }

    pub(crate) fn delete_events_by_artifact_ids(&self) -> &'static str {
        "DELETE FROM `Event` WHERE `artifact_id` IN ($0)"
    }

    pub(crate) fn delete_events_by_execution_ids(&self) -> &'static str {
        "DELETE FROM `Event` WHERE `execution_id` IN ($0)"
    }

    pub(crate) fn insert_event_path_index(&self) -> &'static str {
        "INSERT INTO `EventPath` (`event_id`, `is_index_step`, `step_index`) VALUES ($0, 1, $1)"
    }

    pub(crate) fn insert_event_path_key(&self) -> &'static str {
        "INSERT INTO `EventPath` (`event_id`, `is_index_step`, `step_key`) VALUES ($0, 0, $1)"
    }

    pub(crate) fn select_event_paths_by_event_ids(&self) -> &'static str {
        concat!(
            "SELECT `event_id`, `is_index_step`, `step_index`, `step_key` ",
            "FROM `EventPath` WHERE `event_id` IN ($0)"
        )
    }

    pub(crate) fn delete_event_paths_by_event_ids(&self) -> &'static str {
        "DELETE FROM `EventPath` WHERE `event_id` IN ($0)"
    }

    pub(crate) fn insert_attribution(&self) -> &'static str {
        "INSERT INTO `Attribution` (`context_id`, `artifact_id`) VALUES ($0, $1)"
    }

    pub(crate) fn select_attributions_by_context_ids(&self) -> &'static str {
        "SELECT `id`, `context_id`, `artifact_id` FROM `Attribution` WHERE `context_id` IN ($0)"
    }

    pub(crate) fn select_attributions_by_artifact_ids(&self) -> &'static str {
        "SELECT `id`, `context_id`, `artifact_id` FROM `Attribution` WHERE `artifact_id` IN ($0)"
    }

    pub(crate) fn delete_attributions_by_context_ids(&self) -> &'static str {
        "DELETE FROM `Attribution` WHERE `context_id` IN ($0)"
    }

    pub(crate) fn delete_attributions_by_artifact_ids(&self) -> &'static str {
        "DELETE FROM `Attribution` WHERE `artifact_id` IN ($0)"
    }

    pub(crate) fn insert_association(&self) -> &'static str {
        "INSERT INTO `Association` (`context_id`, `execution_id`) VALUES ($0, $1)"
    }

    pub(crate) fn select_associations_by_context_ids(&self) -> &'static str {
        "SELECT `id`, `context_id`, `execution_id` FROM `Association` WHERE `context_id` IN ($0)"
    }

    pub(crate) fn select_associations_by_execution_ids(&self) -> &'static str {
        "SELECT `id`, `context_id`, `execution_id` FROM `Association` WHERE `execution_id` IN ($0)"
    }

    pub(crate) fn delete_associations_by_context_ids(&self) -> &'static str {
        "DELETE FROM `Association` WHERE `context_id` IN ($0)"
    }

    pub(crate) fn delete_associations_by_execution_ids(&self) -> &'static str {
        "DELETE FROM `Association` WHERE `execution_id` IN ($0)"
    }

    pub(crate) fn insert_parent_context(&self) -> &'static str {
        "INSERT INTO `ParentContext` (`context_id`, `parent_context_id`) VALUES ($0, $1)"
    }

    pub(crate) fn select_parent_contexts_by_context_ids(&self) -> &'static str {
        "SELECT `context_id`, `parent_context_id` FROM `ParentContext` WHERE `context_id` IN ($0)"
    }

    pub(crate) fn select_parent_contexts_by_parent_context_ids(&self) -> &'static str {
        "SELECT `context_id`, `parent_context_id` FROM `ParentContext` WHERE `parent_context_id` IN ($0)"
    }

    pub(crate) fn delete_parent_contexts_by_context_ids(&self) -> &'static str {
        "DELETE FROM `ParentContext` WHERE `context_id` IN ($0)"
    }

    pub(crate) fn delete_parent_contexts_by_parent_context_ids(&self) -> &'static str {
        "DELETE FROM `ParentContext` WHERE `parent_context_id` IN ($0)"
    }
}

/// Substitutes `$N` placeholders in `template` with `args[N]`.
///
/// A `$` not followed by a digit is copied through untouched.
pub(crate) fn render(template: &str, args: &[String]) -> String {
    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;
    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let digits = after
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or_else(|| after.len());
        if digits == 0 {
            out.push('$');
            rest = after;
        } else {
            let index: usize = after[..digits].parse().expect("bug");
            out.push_str(args.get(index).expect("bug"));
            rest = &after[digits..];
        }
    }
    out.push_str(rest);
    out
}

struct MigrationStep {
    to_version: i64,
    sqlite_upgrade: &'static [&'static str],
    mysql_upgrade: &'static [&'static str],
    sqlite_downgrade: &'static [&'static str],
    mysql_downgrade: &'static [&'static str],
}

fn migration_step(to_version: i64) -> &'static MigrationStep {
    MIGRATION_STEPS
        .iter()
        .find(|s| s.to_version == to_version)
        .expect("bug")
}

const SQLITE_CREATE_TABLES: &[&str] = &[
    concat!(
        " CREATE TABLE IF NOT EXISTS `Type` ( ",
        "   `id` INTEGER PRIMARY KEY AUTOINCREMENT, ",
        "   `name` VARCHAR(255) NOT NULL, ",
        "   `version` VARCHAR(255), ",
        "   `type_kind` TINYINT(1) NOT NULL, ",
        "   `description` TEXT, ",
        "   `input_type` TEXT, ",
        "   `output_type` TEXT",
        " ); "
    ),
    concat!(
        " CREATE TABLE IF NOT EXISTS `ParentType` ( ",
        "   `type_id` INT NOT NULL, ",
        "   `parent_type_id` INT NOT NULL, ",
        " PRIMARY KEY (`type_id`, `parent_type_id`));"
    ),
    concat!(
        " CREATE TABLE IF NOT EXISTS `TypeProperty` ( ",
        "   `type_id` INT NOT NULL, ",
        "   `name` VARCHAR(255) NOT NULL, ",
        "   `data_type` INT NULL, ",
        " PRIMARY KEY (`type_id`, `name`)); "
    ),
    concat!(
        " CREATE TABLE IF NOT EXISTS `Artifact` ( ",
        "   `id` INTEGER PRIMARY KEY AUTOINCREMENT, ",
        "   `type_id` INT NOT NULL, ",
        "   `uri` TEXT, ",
        "   `state` INT, ",
        "   `name` VARCHAR(255), ",
        "   `create_time_since_epoch` INT NOT NULL DEFAULT 0, ",
        "   `last_update_time_since_epoch` INT NOT NULL DEFAULT 0 ",
        " ); "
    ),
    concat!(
        " CREATE TABLE IF NOT EXISTS `ArtifactProperty` ( ",
        "   `artifact_id` INT NOT NULL, ",
        "   `name` VARCHAR(255) NOT NULL, ",
        "   `is_custom_property` TINYINT(1) NOT NULL, ",
        "   `int_value` INT, ",
        "   `double_value` DOUBLE, ",
        "   `string_value` TEXT, ",
        " PRIMARY KEY (`artifact_id`, `name`)); "
    ),
    concat!(
        " CREATE TABLE IF NOT EXISTS `Execution` ( ",
        "   `id` INTEGER PRIMARY KEY AUTOINCREMENT, ",
        "   `type_id` INT NOT NULL, ",
        "   `last_known_state` INT, ",
        "   `name` VARCHAR(255), ",
        "   `create_time_since_epoch` INT NOT NULL DEFAULT 0, ",
        "   `last_update_time_since_epoch` INT NOT NULL DEFAULT 0 ",
        " ); "
    ),
    concat!(
        " CREATE TABLE IF NOT EXISTS `ExecutionProperty` ( ",
        "   `execution_id` INT NOT NULL, ",
        "   `name` VARCHAR(255) NOT NULL, ",
        "   `is_custom_property` TINYINT(1) NOT NULL, ",
        "   `int_value` INT, ",
        "   `double_value` DOUBLE, ",
        "   `string_value` TEXT, ",
        " PRIMARY KEY (`execution_id`, `name`)); "
    ),
    concat!(
        " CREATE TABLE IF NOT EXISTS `Context` ( ",
        "   `id` INTEGER PRIMARY KEY AUTOINCREMENT, ",
        "   `type_id` INT NOT NULL, ",
        "   `name` VARCHAR(255) NOT NULL, ",
        "   `create_time_since_epoch` INT NOT NULL DEFAULT 0, ",
        "   `last_update_time_since_epoch` INT NOT NULL DEFAULT 0, ",
        "   UNIQUE(`type_id`, `name`) ",
        " ); "
    ),
    concat!(
        " CREATE TABLE IF NOT EXISTS `ContextProperty` ( ",
        "   `context_id` INT NOT NULL, ",
        "   `name` VARCHAR(255) NOT NULL, ",
        "   `is_custom_property` TINYINT(1) NOT NULL, ",
        "   `int_value` INT, ",
        "   `double_value` DOUBLE, ",
        "   `string_value` TEXT, ",
        " PRIMARY KEY (`context_id`, `name`)); "
    ),
    concat!(
        " CREATE TABLE IF NOT EXISTS `ParentContext` ( ",
        "   `context_id` INT NOT NULL, ",
        "   `parent_context_id` INT NOT NULL, ",
        " PRIMARY KEY (`context_id`, `parent_context_id`)); "
    ),
    concat!(
        " CREATE TABLE IF NOT EXISTS `Event` ( ",
        "   `id` INTEGER PRIMARY KEY AUTOINCREMENT, ",
        "   `artifact_id` INT NOT NULL, ",
        "   `execution_id` INT NOT NULL, ",
        "   `type` INT NOT NULL, ",
        "   `milliseconds_since_epoch` INT ",
        " ); "
    ),
    concat!(
        " CREATE TABLE IF NOT EXISTS `EventPath` ( ",
        "   `event_id` INT NOT NULL, ",
        "   `is_index_step` TINYINT(1) NOT NULL, ",
        "   `step_index` INT, ",
        "   `step_key` TEXT ",
        " ); "
    ),
    concat!(
        " CREATE TABLE IF NOT EXISTS `Association` ( ",
        "   `id` INTEGER PRIMARY KEY AUTOINCREMENT, ",
        "   `context_id` INT NOT NULL, ",
        "   `execution_id` INT NOT NULL, ",
        "   UNIQUE(`context_id`, `execution_id`) ",
        " ); "
    ),
    concat!(
        " CREATE TABLE IF NOT EXISTS `Attribution` ( ",
        "   `id` INTEGER PRIMARY KEY AUTOINCREMENT, ",
        "   `context_id` INT NOT NULL, ",
        "   `artifact_id` INT NOT NULL, ",
        "   UNIQUE(`context_id`, `artifact_id`) ",
        " ); "
    ),
    concat!(
        " CREATE TABLE IF NOT EXISTS `MLMDEnv` ( ",
        "   `schema_version` INTEGER PRIMARY KEY ",
        " ); "
    ),
    concat!(
        " CREATE UNIQUE INDEX IF NOT EXISTS `uniq_type_name_version_kind` ",
        " ON `Type`(`name`, `version`, `type_kind`); "
    ),
    concat!(
        " CREATE UNIQUE INDEX IF NOT EXISTS `uniq_artifact_type_id_name` ",
        " ON `Artifact`(`type_id`, `name`); "
    ),
    concat!(
        " CREATE UNIQUE INDEX IF NOT EXISTS `uniq_execution_type_id_name` ",
        " ON `Execution`(`type_id`, `name`); "
    ),
    concat!(
        " CREATE INDEX IF NOT EXISTS `idx_artifact_uri` ",
        " ON `Artifact`(`uri`); "
    ),
    concat!(
        " CREATE INDEX IF NOT EXISTS ",
        "   `idx_artifact_create_time_since_epoch` ",
        " ON `Artifact`(`create_time_since_epoch`); "
    ),
    concat!(
        " CREATE INDEX IF NOT EXISTS ",
        "   `idx_artifact_last_update_time_since_epoch` ",
        " ON `Artifact`(`last_update_time_since_epoch`); "
    ),
    concat!(
        " CREATE INDEX IF NOT EXISTS `idx_event_artifact_id` ",
        " ON `Event`(`artifact_id`); "
    ),
    concat!(
        " CREATE INDEX IF NOT EXISTS `idx_event_execution_id` ",
        " ON `Event`(`execution_id`); "
    ),
    concat!(
        " CREATE INDEX IF NOT EXISTS `idx_parentcontext_parent_context_id` ",
        " ON `ParentContext`(`parent_context_id`); "
    ),
    concat!(
        " CREATE INDEX IF NOT EXISTS `idx_type_name` ",
        " ON `Type`(`name`); "
    ),
    concat!(
        " CREATE INDEX IF NOT EXISTS ",
        "   `idx_execution_create_time_since_epoch` ",
        " ON `Execution`(`create_time_since_epoch`); "
    ),
    concat!(
        " CREATE INDEX IF NOT EXISTS ",
        "   `idx_execution_last_update_time_since_epoch` ",
        " ON `Execution`(`last_update_time_since_epoch`); "
    ),
    concat!(
        " CREATE INDEX IF NOT EXISTS ",
        "   `idx_context_create_time_since_epoch` ",
        " ON `Context`(`create_time_since_epoch`); "
    ),
    concat!(
        " CREATE INDEX IF NOT EXISTS ",
        "   `idx_context_last_update_time_since_epoch` ",
        " ON `Context`(`last_update_time_since_epoch`); "
    ),
];

const MYSQL_CREATE_TABLES: &[&str] = &[
    concat!(
        " CREATE TABLE IF NOT EXISTS `Type` ( ",
        "   `id` INT PRIMARY KEY AUTO_INCREMENT, ",
        "   `name` VARCHAR(255) NOT NULL, ",
        "   `version` VARCHAR(255), ",
        "   `type_kind` TINYINT(1) NOT NULL, ",
        "   `description` TEXT, ",
        "   `input_type` TEXT, ",
        "   `output_type` TEXT",
        " ); "
    ),
    concat!(
        " CREATE TABLE IF NOT EXISTS `ParentType` ( ",
        "   `type_id` INT NOT NULL, ",
        "   `parent_type_id` INT NOT NULL, ",
        " PRIMARY KEY (`type_id`, `parent_type_id`));"
    ),
    concat!(
        " CREATE TABLE IF NOT EXISTS `TypeProperty` ( ",
        "   `type_id` INT NOT NULL, ",
        "   `name` VARCHAR(255) NOT NULL, ",
        "   `data_type` INT NULL, ",
        " PRIMARY KEY (`type_id`, `name`)); "
    ),
    concat!(
        " CREATE TABLE IF NOT EXISTS `Artifact` ( ",
        "   `id` INTEGER PRIMARY KEY AUTO_INCREMENT, ",
        "   `type_id` INT NOT NULL, ",
        "   `uri` TEXT, ",
        "   `state` INT, ",
        "   `name` VARCHAR(255), ",
        "   `create_time_since_epoch` BIGINT NOT NULL DEFAULT 0, ",
        "   `last_update_time_since_epoch` BIGINT NOT NULL DEFAULT 0 ",
        " ); "
    ),
    concat!(
        " CREATE TABLE IF NOT EXISTS `ArtifactProperty` ( ",
        "   `artifact_id` INT NOT NULL, ",
        "   `name` VARCHAR(255) NOT NULL, ",
        "   `is_custom_property` TINYINT(1) NOT NULL, ",
        "   `int_value` INT, ",
        "   `double_value` DOUBLE, ",
        "   `string_value` TEXT, ",
        " PRIMARY KEY (`artifact_id`, `name`)); "
    ),
    concat!(
        " CREATE TABLE IF NOT EXISTS `Execution` ( ",
        "   `id` INTEGER PRIMARY KEY AUTO_INCREMENT, ",
        "   `type_id` INT NOT NULL, ",
        "   `last_known_state` INT, ",
        "   `name` VARCHAR(255), ",
        "   `create_time_since_epoch` BIGINT NOT NULL DEFAULT 0, ",
        "   `last_update_time_since_epoch` BIGINT NOT NULL DEFAULT 0 ",
        " ); "
    ),
    concat!(
        " CREATE TABLE IF NOT EXISTS `ExecutionProperty` ( ",
        "   `execution_id` INT NOT NULL, ",
        "   `name` VARCHAR(255) NOT NULL, ",
        "   `is_custom_property` TINYINT(1) NOT NULL, ",
        "   `int_value` INT, ",
        "   `double_value` DOUBLE, ",
        "   `string_value` TEXT, ",
        " PRIMARY KEY (`execution_id`, `name`)); "
    ),
    concat!(
        " CREATE TABLE IF NOT EXISTS `Context` ( ",
        "   `id` INTEGER PRIMARY KEY AUTO_INCREMENT, ",
        "   `type_id` INT NOT NULL, ",
        "   `name` VARCHAR(255) NOT NULL, ",
        "   `create_time_since_epoch` BIGINT NOT NULL DEFAULT 0, ",
        "   `last_update_time_since_epoch` BIGINT NOT NULL DEFAULT 0, ",
        "   UNIQUE(`type_id`, `name`) ",
        " ); "
    ),
    concat!(
        " CREATE TABLE IF NOT EXISTS `ContextProperty` ( ",
        "   `context_id` INT NOT NULL, ",
        "   `name` VARCHAR(255) NOT NULL, ",
        "   `is_custom_property` TINYINT(1) NOT NULL, ",
        "   `int_value` INT, ",
        "   `double_value` DOUBLE, ",
        "   `string_value` TEXT, ",
        " PRIMARY KEY (`context_id`, `name`)); "
    ),
    concat!(
        " CREATE TABLE IF NOT EXISTS `ParentContext` ( ",
        "   `context_id` INT NOT NULL, ",
        "   `parent_context_id` INT NOT NULL, ",
        " PRIMARY KEY (`context_id`, `parent_context_id`)); "
    ),
    concat!(
        " CREATE TABLE IF NOT EXISTS `Event` ( ",
        "   `id` INTEGER PRIMARY KEY AUTO_INCREMENT, ",
        "   `artifact_id` INT NOT NULL, ",
        "   `execution_id` INT NOT NULL, ",
        "   `type` INT NOT NULL, ",
        "   `milliseconds_since_epoch` BIGINT ",
        " ); "
    ),
    concat!(
        " CREATE TABLE IF NOT EXISTS `EventPath` ( ",
        "   `event_id` INT NOT NULL, ",
        "   `is_index_step` TINYINT(1) NOT NULL, ",
        "   `step_index` INT, ",
        "   `step_key` TEXT ",
        " ); "
    ),
    concat!(
        " CREATE TABLE IF NOT EXISTS `Association` ( ",
        "   `id` INTEGER PRIMARY KEY AUTO_INCREMENT, ",
        "   `context_id` INT NOT NULL, ",
        "   `execution_id` INT NOT NULL, ",
        "   UNIQUE(`context_id`, `execution_id`) ",
        " ); "
    ),
    concat!(
        " CREATE TABLE IF NOT EXISTS `Attribution` ( ",
        "   `id` INTEGER PRIMARY KEY AUTO_INCREMENT, ",
        "   `context_id` INT NOT NULL, ",
        "   `artifact_id` INT NOT NULL, ",
        "   UNIQUE(`context_id`, `artifact_id`) ",
        " ); "
    ),
    concat!(
        " CREATE TABLE IF NOT EXISTS `MLMDEnv` ( ",
        "   `schema_version` INTEGER PRIMARY KEY ",
        " ); "
    ),
    concat!(
        " ALTER TABLE `Type` ",
        "  ADD UNIQUE INDEX `uniq_type_name_version_kind` ",
        "             (`name`, `version`, `type_kind`), ",
        "  ADD INDEX `idx_type_name` (`name`); "
    ),
    concat!(
        " ALTER TABLE `Artifact` ",
        "  ADD UNIQUE INDEX `uniq_artifact_type_id_name` (`type_id`, `name`), ",
        "  ADD INDEX `idx_artifact_uri`(`uri`(255)), ",
        "  ADD INDEX `idx_artifact_create_time_since_epoch` ",
        "             (`create_time_since_epoch`), ",
        "  ADD INDEX `idx_artifact_last_update_time_since_epoch` ",
        "             (`last_update_time_since_epoch`); "
    ),
    concat!(
        " ALTER TABLE `Execution` ",
        "  ADD UNIQUE INDEX `uniq_execution_type_id_name` (`type_id`, `name`), ",
        "  ADD INDEX `idx_execution_create_time_since_epoch` ",
        "             (`create_time_since_epoch`), ",
        "  ADD INDEX `idx_execution_last_update_time_since_epoch` ",
        "             (`last_update_time_since_epoch`); "
    ),
    concat!(
        " ALTER TABLE `Context` ",
        "  ADD INDEX `idx_context_create_time_since_epoch` ",
        "             (`create_time_since_epoch`), ",
        "  ADD INDEX `idx_context_last_update_time_since_epoch` ",
        "             (`last_update_time_since_epoch`); "
    ),
    concat!(
        " ALTER TABLE `Event` ",
        " ADD INDEX `idx_event_artifact_id` (`artifact_id`), ",
        " ADD INDEX `idx_event_execution_id` (`execution_id`); "
    ),
    concat!(
        " ALTER TABLE `ParentContext` ",
        " ADD INDEX ",
        "   `idx_parentcontext_parent_context_id` (`parent_context_id`); "
    ),
];

const CHECK_TABLES: &[&str] = &[
    concat!(
        "SELECT `id`, `name`, `version`, `type_kind`, `description`, ",
        "`input_type`, `output_type` FROM `Type` LIMIT 1"
    ),
    "SELECT `type_id`, `name`, `data_type` FROM `TypeProperty` LIMIT 1",
    "SELECT `type_id`, `parent_type_id` FROM `ParentType` LIMIT 1",
    concat!(
        "SELECT `id`, `type_id`, `uri`, `state`, `name`, `create_time_since_epoch`, ",
        "`last_update_time_since_epoch` FROM `Artifact` LIMIT 1"
    ),
    concat!(
        "SELECT `artifact_id`, `name`, `is_custom_property`, `int_value`, ",
        "`double_value`, `string_value` FROM `ArtifactProperty` LIMIT 1"
    ),
    concat!(
        "SELECT `id`, `type_id`, `last_known_state`, `name`, `create_time_since_epoch`, ",
        "`last_update_time_since_epoch` FROM `Execution` LIMIT 1"
    ),
    concat!(
        "SELECT `execution_id`, `name`, `is_custom_property`, `int_value`, ",
        "`double_value`, `string_value` FROM `ExecutionProperty` LIMIT 1"
    ),
    concat!(
        "SELECT `id`, `type_id`, `name`, `create_time_since_epoch`, ",
        "`last_update_time_since_epoch` FROM `Context` LIMIT 1"
    ),
    concat!(
        "SELECT `context_id`, `name`, `is_custom_property`, `int_value`, ",
        "`double_value`, `string_value` FROM `ContextProperty` LIMIT 1"
    ),
    "SELECT `context_id`, `parent_context_id` FROM `ParentContext` LIMIT 1",
    concat!(
        "SELECT `id`, `artifact_id`, `execution_id`, `type`, ",
        "`milliseconds_since_epoch` FROM `Event` LIMIT 1"
    ),
    "SELECT `event_id`, `is_index_step`, `step_index`, `step_key` FROM `EventPath` LIMIT 1",
    "SELECT `id`, `context_id`, `artifact_id` FROM `Attribution` LIMIT 1",
    "SELECT `id`, `context_id`, `execution_id` FROM `Association` LIMIT 1",
    "SELECT `schema_version` FROM `MLMDEnv` LIMIT 1",
];

// The 0.13.2 schema predates MLMDEnv; these seven tables identify it.
const LEGACY_CHECK_TABLES: &[&str] = &[
    "SELECT `id`, `name`, `is_artifact_type` FROM `Type` LIMIT 1",
    "SELECT `id`, `type_id`, `uri` FROM `Artifact` LIMIT 1",
    "SELECT `id`, `type_id` FROM `Execution` LIMIT 1",
    concat!(
        "SELECT `artifact_id`, `name`, `is_custom_property`, `int_value`, ",
        "`double_value`, `string_value` FROM `ArtifactProperty` LIMIT 1"
    ),
    concat!(
        "SELECT `execution_id`, `name`, `is_custom_property`, `int_value`, ",
        "`double_value`, `string_value` FROM `ExecutionProperty` LIMIT 1"
    ),
    concat!(
        "SELECT `id`, `artifact_id`, `execution_id`, `type`, ",
        "`milliseconds_since_epoch` FROM `Event` LIMIT 1"
    ),
    "SELECT `event_id`, `is_index_step`, `step_index`, `step_key` FROM `EventPath` LIMIT 1",
];

// Reconstructed history from the 0.13.2 schema (v0) to the current v8.
// Each step is applied in its own transaction; the executor rewrites the
// stored schema_version after every step.
const MIGRATION_STEPS: &[MigrationStep] = &[
    MigrationStep {
        to_version: 1,
        sqlite_upgrade: &[
            concat!(
                " CREATE TABLE `TypeTemp` ( ",
                "   `id` INTEGER PRIMARY KEY AUTOINCREMENT, ",
                "   `name` VARCHAR(255) NOT NULL, ",
                "   `type_kind` TINYINT(1) NOT NULL ",
                " ); "
            ),
            concat!(
                " INSERT INTO `TypeTemp` (`id`, `name`, `type_kind`) ",
                " SELECT `id`, `name`, `is_artifact_type` FROM `Type`; "
            ),
            " DROP TABLE `Type`; ",
            " ALTER TABLE `TypeTemp` RENAME TO `Type`; ",
            concat!(
                " CREATE TABLE IF NOT EXISTS `MLMDEnv` ( ",
                "   `schema_version` INTEGER PRIMARY KEY ",
                " ); "
            ),
        ],
        mysql_upgrade: &[
            concat!(
                " ALTER TABLE `Type` ",
                " CHANGE COLUMN `is_artifact_type` `type_kind` TINYINT(1) NOT NULL; "
            ),
            concat!(
                " CREATE TABLE IF NOT EXISTS `MLMDEnv` ( ",
                "   `schema_version` INTEGER PRIMARY KEY ",
                " ); "
            ),
        ],
        sqlite_downgrade: &[
            concat!(
                " CREATE TABLE `TypeTemp` ( ",
                "   `id` INTEGER PRIMARY KEY AUTOINCREMENT, ",
                "   `name` VARCHAR(255) NOT NULL, ",
                "   `is_artifact_type` TINYINT(1) NOT NULL ",
                " ); "
            ),
            concat!(
                " INSERT INTO `TypeTemp` (`id`, `name`, `is_artifact_type`) ",
                " SELECT `id`, `name`, `type_kind` FROM `Type`; "
            ),
            " DROP TABLE `Type`; ",
            " ALTER TABLE `TypeTemp` RENAME TO `Type`; ",
            " DROP TABLE IF EXISTS `MLMDEnv`; ",
        ],
        mysql_downgrade: &[
            concat!(
                " ALTER TABLE `Type` ",
                " CHANGE COLUMN `type_kind` `is_artifact_type` TINYINT(1) NOT NULL; "
            ),
            " DROP TABLE IF EXISTS `MLMDEnv`; ",
        ],
    },
    MigrationStep {
        to_version: 2,
        sqlite_upgrade: &[
            concat!(
                " CREATE TABLE IF NOT EXISTS `Context` ( ",
                "   `id` INTEGER PRIMARY KEY AUTOINCREMENT, ",
                "   `type_id` INT NOT NULL, ",
                "   `name` VARCHAR(255) NOT NULL, ",
                "   UNIQUE(`type_id`, `name`) ",
                " ); "
            ),
            concat!(
                " CREATE TABLE IF NOT EXISTS `ContextProperty` ( ",
                "   `context_id` INT NOT NULL, ",
                "   `name` VARCHAR(255) NOT NULL, ",
                "   `is_custom_property` TINYINT(1) NOT NULL, ",
                "   `int_value` INT, ",
                "   `double_value` DOUBLE, ",
                "   `string_value` TEXT, ",
                " PRIMARY KEY (`context_id`, `name`)); "
            ),
            concat!(
                " CREATE TABLE IF NOT EXISTS `Association` ( ",
                "   `id` INTEGER PRIMARY KEY AUTOINCREMENT, ",
                "   `context_id` INT NOT NULL, ",
                "   `execution_id` INT NOT NULL, ",
                "   UNIQUE(`context_id`, `execution_id`) ",
                " ); "
            ),
            concat!(
                " CREATE TABLE IF NOT EXISTS `Attribution` ( ",
                "   `id` INTEGER PRIMARY KEY AUTOINCREMENT, ",
                "   `context_id` INT NOT NULL, ",
                "   `artifact_id` INT NOT NULL, ",
                "   UNIQUE(`context_id`, `artifact_id`) ",
                " ); "
            ),
        ],
        mysql_upgrade: &[
            concat!(
                " CREATE TABLE IF NOT EXISTS `Context` ( ",
                "   `id` INT PRIMARY KEY AUTO_INCREMENT, ",
                "   `type_id` INT NOT NULL, ",
                "   `name` VARCHAR(255) NOT NULL, ",
                "   UNIQUE(`type_id`, `name`) ",
                " ); "
            ),
            concat!(
                " CREATE TABLE IF NOT EXISTS `ContextProperty` ( ",
                "   `context_id` INT NOT NULL, ",
                "   `name` VARCHAR(255) NOT NULL, ",
                "   `is_custom_property` TINYINT(1) NOT NULL, ",
                "   `int_value` INT, ",
                "   `double_value` DOUBLE, ",
                "   `string_value` TEXT, ",
                " PRIMARY KEY (`context_id`, `name`)); "
            ),
            concat!(
                " CREATE TABLE IF NOT EXISTS `Association` ( ",
                "   `id` INT PRIMARY KEY AUTO_INCREMENT, ",
                "   `context_id` INT NOT NULL, ",
                "   `execution_id` INT NOT NULL, ",
                "   UNIQUE(`context_id`, `execution_id`) ",
                " ); "
            ),
            concat!(
                " CREATE TABLE IF NOT EXISTS `Attribution` ( ",
                "   `id` INT PRIMARY KEY AUTO_INCREMENT, ",
                "   `context_id` INT NOT NULL, ",
                "   `artifact_id` INT NOT NULL, ",
                "   UNIQUE(`context_id`, `artifact_id`) ",
                " ); "
            ),
        ],
        sqlite_downgrade: &[
            " DROP TABLE IF EXISTS `Attribution`; ",
            " DROP TABLE IF EXISTS `Association`; ",
            " DROP TABLE IF EXISTS `ContextProperty`; ",
            " DROP TABLE IF EXISTS `Context`; ",
        ],
        mysql_downgrade: &[
            " DROP TABLE IF EXISTS `Attribution`; ",
            " DROP TABLE IF EXISTS `Association`; ",
            " DROP TABLE IF EXISTS `ContextProperty`; ",
            " DROP TABLE IF EXISTS `Context`; ",
        ],
    },
    MigrationStep {
        to_version: 3,
        sqlite_upgrade: &[
            " ALTER TABLE `Artifact` ADD COLUMN `state` INT; ",
            " ALTER TABLE `Artifact` ADD COLUMN `name` VARCHAR(255); ",
            " ALTER TABLE `Execution` ADD COLUMN `last_known_state` INT; ",
            " ALTER TABLE `Execution` ADD COLUMN `name` VARCHAR(255); ",
            concat!(
                " CREATE UNIQUE INDEX IF NOT EXISTS `uniq_artifact_type_id_name` ",
                " ON `Artifact`(`type_id`, `name`); "
            ),
            concat!(
                " CREATE UNIQUE INDEX IF NOT EXISTS `uniq_execution_type_id_name` ",
                " ON `Execution`(`type_id`, `name`); "
            ),
        ],
        mysql_upgrade: &[
            concat!(
                " ALTER TABLE `Artifact` ",
                "  ADD COLUMN `state` INT, ",
                "  ADD COLUMN `name` VARCHAR(255), ",
                "  ADD UNIQUE INDEX `uniq_artifact_type_id_name` (`type_id`, `name`); "
            ),
            concat!(
                " ALTER TABLE `Execution` ",
                "  ADD COLUMN `last_known_state` INT, ",
                "  ADD COLUMN `name` VARCHAR(255), ",
                "  ADD UNIQUE INDEX `uniq_execution_type_id_name` (`type_id`, `name`); "
            ),
        ],
        sqlite_downgrade: &[
            concat!(
                " CREATE TABLE `ArtifactTemp` ( ",
                "   `id` INTEGER PRIMARY KEY AUTOINCREMENT, ",
                "   `type_id` INT NOT NULL, ",
                "   `uri` TEXT ",
                " ); "
            ),
            concat!(
                " INSERT INTO `ArtifactTemp` (`id`, `type_id`, `uri`) ",
                " SELECT `id`, `type_id`, `uri` FROM `Artifact`; "
            ),
            " DROP TABLE `Artifact`; ",
            " ALTER TABLE `ArtifactTemp` RENAME TO `Artifact`; ",
            concat!(
                " CREATE TABLE `ExecutionTemp` ( ",
                "   `id` INTEGER PRIMARY KEY AUTOINCREMENT, ",
                "   `type_id` INT NOT NULL ",
                " ); "
            ),
            concat!(
                " INSERT INTO `ExecutionTemp` (`id`, `type_id`) ",
                " SELECT `id`, `type_id` FROM `Execution`; "
            ),
            " DROP TABLE `Execution`; ",
            " ALTER TABLE `ExecutionTemp` RENAME TO `Execution`; ",
        ],
        mysql_downgrade: &[
            concat!(
                " ALTER TABLE `Artifact` ",
                "  DROP INDEX `uniq_artifact_type_id_name`, ",
                "  DROP COLUMN `state`, ",
                "  DROP COLUMN `name`; "
            ),
            concat!(
                " ALTER TABLE `Execution` ",
                "  DROP INDEX `uniq_execution_type_id_name`, ",
                "  DROP COLUMN `last_known_state`, ",
                "  DROP COLUMN `name`; "
            ),
        ],
    },
    MigrationStep {
        to_version: 4,
        sqlite_upgrade: &[
            " ALTER TABLE `Artifact` ADD COLUMN `create_time_since_epoch` INT NOT NULL DEFAULT 0; ",
            " ALTER TABLE `Artifact` ADD COLUMN `last_update_time_since_epoch` INT NOT NULL DEFAULT 0; ",
            " ALTER TABLE `Execution` ADD COLUMN `create_time_since_epoch` INT NOT NULL DEFAULT 0; ",
            " ALTER TABLE `Execution` ADD COLUMN `last_update_time_since_epoch` INT NOT NULL DEFAULT 0; ",
            " ALTER TABLE `Context` ADD COLUMN `create_time_since_epoch` INT NOT NULL DEFAULT 0; ",
            " ALTER TABLE `Context` ADD COLUMN `last_update_time_since_epoch` INT NOT NULL DEFAULT 0; ",
            concat!(
                " CREATE INDEX IF NOT EXISTS `idx_artifact_create_time_since_epoch` ",
                " ON `Artifact`(`create_time_since_epoch`); "
            ),
            concat!(
                " CREATE INDEX IF NOT EXISTS `idx_artifact_last_update_time_since_epoch` ",
                " ON `Artifact`(`last_update_time_since_epoch`); "
            ),
            concat!(
                " CREATE INDEX IF NOT EXISTS `idx_execution_create_time_since_epoch` ",
                " ON `Execution`(`create_time_since_epoch`); "
            ),
            concat!(
                " CREATE INDEX IF NOT EXISTS `idx_execution_last_update_time_since_epoch` ",
                " ON `Execution`(`last_update_time_since_epoch`); "
            ),
            concat!(
                " CREATE INDEX IF NOT EXISTS `idx_context_create_time_since_epoch` ",
                " ON `Context`(`create_time_since_epoch`); "
            ),
            concat!(
                " CREATE INDEX IF NOT EXISTS `idx_context_last_update_time_since_epoch` ",
                " ON `Context`(`last_update_time_since_epoch`); "
            ),
        ],
        mysql_upgrade: &[
            concat!(
                " ALTER TABLE `Artifact` ",
                "  ADD COLUMN `create_time_since_epoch` BIGINT NOT NULL DEFAULT 0, ",
                "  ADD COLUMN `last_update_time_since_epoch` BIGINT NOT NULL DEFAULT 0, ",
                "  ADD INDEX `idx_artifact_create_time_since_epoch` ",
                "             (`create_time_since_epoch`), ",
                "  ADD INDEX `idx_artifact_last_update_time_since_epoch` ",
                "             (`last_update_time_since_epoch`); "
            ),
            concat!(
                " ALTER TABLE `Execution` ",
                "  ADD COLUMN `create_time_since_epoch` BIGINT NOT NULL DEFAULT 0, ",
                "  ADD COLUMN `last_update_time_since_epoch` BIGINT NOT NULL DEFAULT 0, ",
                "  ADD INDEX `idx_execution_create_time_since_epoch` ",
                "             (`create_time_since_epoch`), ",
                "  ADD INDEX `idx_execution_last_update_time_since_epoch` ",
                "             (`last_update_time_since_epoch`); "
            ),
            concat!(
                " ALTER TABLE `Context` ",
                "  ADD COLUMN `create_time_since_epoch` BIGINT NOT NULL DEFAULT 0, ",
                "  ADD COLUMN `last_update_time_since_epoch` BIGINT NOT NULL DEFAULT 0, ",
                "  ADD INDEX `idx_context_create_time_since_epoch` ",
                "             (`create_time_since_epoch`), ",
                "  ADD INDEX `idx_context_last_update_time_since_epoch` ",
                "             (`last_update_time_since_epoch`); "
            ),
        ],
        sqlite_downgrade: &[
            concat!(
                " CREATE TABLE `ArtifactTemp` ( ",
                "   `id` INTEGER PRIMARY KEY AUTOINCREMENT, ",
                "   `type_id` INT NOT NULL, ",
                "   `uri` TEXT, ",
                "   `state` INT, ",
                "   `name` VARCHAR(255) ",
                " ); "
            ),
            concat!(
                " INSERT INTO `ArtifactTemp` (`id`, `type_id`, `uri`, `state`, `name`) ",
                " SELECT `id`, `type_id`, `uri`, `state`, `name` FROM `Artifact`; "
            ),
            " DROP TABLE `Artifact`; ",
            " ALTER TABLE `ArtifactTemp` RENAME TO `Artifact`; ",
            concat!(
                " CREATE UNIQUE INDEX IF NOT EXISTS `uniq_artifact_type_id_name` ",
                " ON `Artifact`(`type_id`, `name`); "
            ),
            concat!(
                " CREATE TABLE `ExecutionTemp` ( ",
                "   `id` INTEGER PRIMARY KEY AUTOINCREMENT, ",
                "   `type_id` INT NOT NULL, ",
                "   `last_known_state` INT, ",
                "   `name` VARCHAR(255) ",
                " ); "
            ),
            concat!(
                " INSERT INTO `ExecutionTemp` (`id`, `type_id`, `last_known_state`, `name`) ",
                " SELECT `id`, `type_id`, `last_known_state`, `name` FROM `Execution`; "
            ),
            " DROP TABLE `Execution`; ",
            " ALTER TABLE `ExecutionTemp` RENAME TO `Execution`; ",
            concat!(
                " CREATE UNIQUE INDEX IF NOT EXISTS `uniq_execution_type_id_name` ",
                " ON `Execution`(`type_id`, `name`); "
            ),
            concat!(
                " CREATE TABLE `ContextTemp` ( ",
                "   `id` INTEGER PRIMARY KEY AUTOINCREMENT, ",
                "   `type_id` INT NOT NULL, ",
                "   `name` VARCHAR(255) NOT NULL, ",
                "   UNIQUE(`type_id`, `name`) ",
                " ); "
            ),
            concat!(
                " INSERT INTO `ContextTemp` (`id`, `type_id`, `name`) ",
                " SELECT `id`, `type_id`, `name` FROM `Context`; "
            ),
            " DROP TABLE `Context`; ",
            " ALTER TABLE `ContextTemp` RENAME TO `Context`; ",
        ],
        mysql_downgrade: &[
            concat!(
                " ALTER TABLE `Artifact` ",
                "  DROP COLUMN `create_time_since_epoch`, ",
                "  DROP COLUMN `last_update_time_since_epoch`; "
            ),
            concat!(
                " ALTER TABLE `Execution` ",
                "  DROP COLUMN `create_time_since_epoch`, ",
                "  DROP COLUMN `last_update_time_since_epoch`; "
            ),
            concat!(
                " ALTER TABLE `Context` ",
                "  DROP COLUMN `create_time_since_epoch`, ",
                "  DROP COLUMN `last_update_time_since_epoch`; "
            ),
        ],
    },
    MigrationStep {
        to_version: 5,
        sqlite_upgrade: &[
            concat!(
                " CREATE TABLE IF NOT EXISTS `ParentType` ( ",
                "   `type_id` INT NOT NULL, ",
                "   `parent_type_id` INT NOT NULL, ",
                " PRIMARY KEY (`type_id`, `parent_type_id`));"
            ),
            concat!(
                " CREATE TABLE IF NOT EXISTS `ParentContext` ( ",
                "   `context_id` INT NOT NULL, ",
                "   `parent_context_id` INT NOT NULL, ",
                " PRIMARY KEY (`context_id`, `parent_context_id`)); "
            ),
        ],
        mysql_upgrade: &[
            concat!(
                " CREATE TABLE IF NOT EXISTS `ParentType` ( ",
                "   `type_id` INT NOT NULL, ",
                "   `parent_type_id` INT NOT NULL, ",
                " PRIMARY KEY (`type_id`, `parent_type_id`));"
            ),
            concat!(
                " CREATE TABLE IF NOT EXISTS `ParentContext` ( ",
                "   `context_id` INT NOT NULL, ",
                "   `parent_context_id` INT NOT NULL, ",
                " PRIMARY KEY (`context_id`, `parent_context_id`)); "
            ),
        ],
        sqlite_downgrade: &[
            " DROP TABLE IF EXISTS `ParentContext`; ",
            " DROP TABLE IF EXISTS `ParentType`; ",
        ],
        mysql_downgrade: &[
            " DROP TABLE IF EXISTS `ParentContext`; ",
            " DROP TABLE IF EXISTS `ParentType`; ",
        ],
    },
    MigrationStep {
        to_version: 6,
        sqlite_upgrade: &[
            " ALTER TABLE `Type` ADD COLUMN `version` VARCHAR(255); ",
            " ALTER TABLE `Type` ADD COLUMN `description` TEXT; ",
            concat!(
                " CREATE UNIQUE INDEX IF NOT EXISTS `uniq_type_name_version_kind` ",
                " ON `Type`(`name`, `version`, `type_kind`); "
            ),
        ],
        mysql_upgrade: &[
            concat!(
                " ALTER TABLE `Type` ",
                "  ADD COLUMN `version` VARCHAR(255), ",
                "  ADD COLUMN `description` TEXT, ",
                "  ADD UNIQUE INDEX `uniq_type_name_version_kind` ",
                "             (`name`, `version`, `type_kind`); "
            ),
        ],
        sqlite_downgrade: &[
            concat!(
                " CREATE TABLE `TypeTemp` ( ",
                "   `id` INTEGER PRIMARY KEY AUTOINCREMENT, ",
                "   `name` VARCHAR(255) NOT NULL, ",
                "   `type_kind` TINYINT(1) NOT NULL ",
                " ); "
            ),
            concat!(
                " INSERT INTO `TypeTemp` (`id`, `name`, `type_kind`) ",
                " SELECT `id`, `name`, `type_kind` FROM `Type`; "
            ),
            " DROP TABLE `Type`; ",
            " ALTER TABLE `TypeTemp` RENAME TO `Type`; ",
        ],
        mysql_downgrade: &[
            concat!(
                " ALTER TABLE `Type` ",
                "  DROP INDEX `uniq_type_name_version_kind`, ",
                "  DROP COLUMN `version`, ",
                "  DROP COLUMN `description`; "
            ),
        ],
    },
    MigrationStep {
        to_version: 7,
        sqlite_upgrade: &[
            " ALTER TABLE `Type` ADD COLUMN `input_type` TEXT; ",
            " ALTER TABLE `Type` ADD COLUMN `output_type` TEXT; ",
        ],
        mysql_upgrade: &[
            concat!(
                " ALTER TABLE `Type` ",
                "  ADD COLUMN `input_type` TEXT, ",
                "  ADD COLUMN `output_type` TEXT; "
            ),
        ],
        sqlite_downgrade: &[
            concat!(
                " CREATE TABLE `TypeTemp` ( ",
                "   `id` INTEGER PRIMARY KEY AUTOINCREMENT, ",
                "   `name` VARCHAR(255) NOT NULL, ",
                "   `version` VARCHAR(255), ",
                "   `type_kind` TINYINT(1) NOT NULL, ",
                "   `description` TEXT ",
                " ); "
            ),
            concat!(
                " INSERT INTO `TypeTemp` (`id`, `name`, `version`, `type_kind`, `description`) ",
                " SELECT `id`, `name`, `version`, `type_kind`, `description` FROM `Type`; "
            ),
            " DROP TABLE `Type`; ",
            " ALTER TABLE `TypeTemp` RENAME TO `Type`; ",
            concat!(
                " CREATE UNIQUE INDEX IF NOT EXISTS `uniq_type_name_version_kind` ",
                " ON `Type`(`name`, `version`, `type_kind`); "
            ),
        ],
        mysql_downgrade: &[
            concat!(
                " ALTER TABLE `Type` ",
                "  DROP COLUMN `input_type`, ",
                "  DROP COLUMN `output_type`; "
            ),
        ],
    },
    MigrationStep {
        to_version: 8,
        sqlite_upgrade: &[
            concat!(
                " CREATE INDEX IF NOT EXISTS `idx_artifact_uri` ",
                " ON `Artifact`(`uri`); "
            ),
            concat!(
                " CREATE INDEX IF NOT EXISTS `idx_event_artifact_id` ",
                " ON `Event`(`artifact_id`); "
            ),
            concat!(
                " CREATE INDEX IF NOT EXISTS `idx_event_execution_id` ",
                " ON `Event`(`execution_id`); "
            ),
            concat!(
                " CREATE INDEX IF NOT EXISTS `idx_parentcontext_parent_context_id` ",
                " ON `ParentContext`(`parent_context_id`); "
            ),
            concat!(
                " CREATE INDEX IF NOT EXISTS `idx_type_name` ",
                " ON `Type`(`name`); "
            ),
        ],
        mysql_upgrade: &[
            concat!(
                " ALTER TABLE `Artifact` ",
                "  ADD INDEX `idx_artifact_uri`(`uri`(255)); "
            ),
            concat!(
                " ALTER TABLE `Event` ",
                " ADD INDEX `idx_event_artifact_id` (`artifact_id`), ",
                " ADD INDEX `idx_event_execution_id` (`execution_id`); "
            ),
            concat!(
                " ALTER TABLE `ParentContext` ",
                " ADD INDEX ",
                "   `idx_parentcontext_parent_context_id` (`parent_context_id`); "
            ),
            concat!(
                " ALTER TABLE `Type` ",
                " ADD INDEX `idx_type_name` (`name`); "
            ),
        ],
        sqlite_downgrade: &[
            " DROP INDEX IF EXISTS `idx_artifact_uri`; ",
            " DROP INDEX IF EXISTS `idx_event_artifact_id`; ",
            " DROP INDEX IF EXISTS `idx_event_execution_id`; ",
            " DROP INDEX IF EXISTS `idx_parentcontext_parent_context_id`; ",
            " DROP INDEX IF EXISTS `idx_type_name`; ",
        ],
        mysql_downgrade: &[
            " ALTER TABLE `Artifact` DROP INDEX `idx_artifact_uri`; ",
            concat!(
                " ALTER TABLE `Event` ",
                " DROP INDEX `idx_event_artifact_id`, ",
                " DROP INDEX `idx_event_execution_id`; "
            ),
            " ALTER TABLE `ParentContext` DROP INDEX `idx_parentcontext_parent_context_id`; ",
            " ALTER TABLE `Type` DROP INDEX `idx_type_name`; ",
        ],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_works() {
        assert_eq!(
            render(
                "INSERT INTO `T` (`a`, `b`) VALUES ($0, $1)",
                &["1".to_owned(), "'x'".to_owned()]
            ),
            "INSERT INTO `T` (`a`, `b`) VALUES (1, 'x')"
        );
        assert_eq!(render("SELECT 1", &[]), "SELECT 1");
        assert_eq!(
            render("$1 and $0 again: $1", &["a".to_owned(), "b".to_owned()]),
            "b and a again: b"
        );
    }

    #[test]
    fn migration_steps_are_contiguous() {
        let versions: Vec<_> = MIGRATION_STEPS.iter().map(|s| s.to_version).collect();
        assert_eq!(versions, (1..=SCHEMA_VERSION).collect::<Vec<_>>());
    }

    #[test]
    fn both_dialects_target_the_same_version() {
        assert_eq!(QueryConfig::sqlite().dialect(), SqlDialect::Sqlite);
        assert_eq!(QueryConfig::mysql().dialect(), SqlDialect::Mysql);
        assert_eq!(QueryConfig::sqlite().schema_version(), SCHEMA_VERSION);
        assert_eq!(QueryConfig::mysql().schema_version(), SCHEMA_VERSION);
    }
}

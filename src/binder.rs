//! Conversion of typed parameters into SQL literals.
//!
//! Bound literals are substituted textually into the templates of
//! [`crate::query::QueryConfig`]. All string-valued inputs are routed through
//! the metadata source's escaping. Binding never fails; malformed input is a
//! contract violation of the caller.
use crate::metadata::{
    ArtifactState, ArtifactStructType, EventType, ExecutionState, PropertyType, TypeKind, Value,
};
use crate::metadata_source::EscapeString;

const NULL: &str = "NULL";

pub(crate) struct Binder<'a> {
    escaper: &'a dyn EscapeString,
}

impl<'a> Binder<'a> {
    pub fn new(escaper: &'a dyn EscapeString) -> Self {
        Self { escaper }
    }

    pub fn string(&self, s: &str) -> String {
        format!("'{}'", self.escaper.escape_string(s))
    }

    pub fn opt_string(&self, s: Option<&str>) -> String {
        s.map_or_else(|| NULL.to_owned(), |s| self.string(s))
    }

    pub fn int(&self, v: i64) -> String {
        v.to_string()
    }

    pub fn double(&self, v: f64) -> String {
        v.to_string()
    }

    pub fn boolean(&self, v: bool) -> String {
        if v { "1" } else { "0" }.to_owned()
    }

    pub fn type_kind(&self, kind: TypeKind) -> String {
        (kind as i64).to_string()
    }

    pub fn property_type(&self, ty: PropertyType) -> String {
        (ty as i64).to_string()
    }

    pub fn event_type(&self, ty: EventType) -> String {
        (ty as i64).to_string()
    }

    pub fn opt_artifact_state(&self, state: Option<ArtifactState>) -> String {
        state.map_or_else(|| NULL.to_owned(), |s| (s as i64).to_string())
    }

    pub fn opt_execution_state(&self, state: Option<ExecutionState>) -> String {
        state.map_or_else(|| NULL.to_owned(), |s| (s as i64).to_string())
    }

    /// Comma-joined literals for an `IN (...)` predicate.
    ///
    /// Callers short-circuit empty lists before binding.
    pub fn id_list(&self, ids: &[i64]) -> String {
        debug_assert!(!ids.is_empty());
        ids.iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn opt_struct_type(&self, ty: Option<&ArtifactStructType>) -> String {
        ty.map_or_else(|| NULL.to_owned(), |t| self.string(t.as_str()))
    }

    /// The populated value literal of a property.
    pub fn value(&self, v: &Value) -> String {
        match v {
            Value::Int(v) => self.int(*v),
            Value::Double(v) => self.double(*v),
            Value::String(v) => self.string(v),
        }
    }

    /// The value column a property populates, used as the discriminator in
    /// property insert templates.
    pub fn value_column(&self, v: &Value) -> String {
        match v.ty() {
            PropertyType::Int => "`int_value`",
            PropertyType::Double => "`double_value`",
            PropertyType::String => "`string_value`",
        }
        .to_owned()
    }

    /// The value literal when `v` populates `slot`, otherwise `NULL`.
    ///
    /// Property updates write all three typed columns through this, so the
    /// two non-populated columns return to NULL.
    pub fn value_as(&self, v: &Value, slot: PropertyType) -> String {
        if v.ty() == slot {
            self.value(v)
        } else {
            NULL.to_owned()
        }
    }
}

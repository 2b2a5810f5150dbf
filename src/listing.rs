//! Paginated, filterable listing of entity ids.
//!
//! One shared planner serves artifacts, executions and contexts. Pagination
//! uses a cursor over the sort key with a monotone tiebreak on `id`, so pages
//! stay stable under concurrent inserts when sorting by time.
use crate::errors::QueryError;
use crate::metadata::TypeKind;
use serde::{Deserialize, Serialize};

/// Sort key of a list operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum OrderByField {
    CreateTime,
    UpdateTime,
    Id,
}

impl OrderByField {
    pub(crate) fn field_name(self) -> &'static str {
        match self {
            Self::CreateTime => "create_time_since_epoch",
            Self::UpdateTime => "last_update_time_since_epoch",
            Self::Id => "id",
        }
    }
}

/// Options of a list operation.
#[derive(Debug, Clone)]
pub struct ListOperationOptions {
    pub(crate) max_result_size: i64,
    pub(crate) order_by_field: OrderByField,
    pub(crate) is_asc: bool,
    pub(crate) next_page_token: Option<String>,
    pub(crate) filter_query: Option<String>,
}

impl Default for ListOperationOptions {
    fn default() -> Self {
        Self {
            max_result_size: 20,
            order_by_field: OrderByField::Id,
            is_asc: true,
            next_page_token: None,
            filter_query: None,
        }
    }
}

impl ListOperationOptions {
    /// Specifies the upper bound on returned ids. Must be greater than zero.
    pub fn max_result_size(mut self, n: i64) -> Self {
        self.max_result_size = n;
        self
    }

    /// Specifies the sort key and direction.
    pub fn order_by(mut self, field: OrderByField, is_asc: bool) -> Self {
        self.order_by_field = field;
        self.is_asc = is_asc;
        self
    }

    /// Resumes listing from the token returned with a previous page.
    pub fn next_page_token(mut self, token: &str) -> Self {
        self.next_page_token = Some(token.to_owned());
        self
    }

    /// Restricts the result with a predicate expression, combined with `AND`.
    ///
    /// Only supported when listing artifacts.
    pub fn filter_query(mut self, filter: &str) -> Self {
        self.filter_query = Some(filter.to_owned());
        self
    }
}

/// One page of listed ids plus the cursor of the next page, if any.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IdPage {
    /// Listed ids, at most `max_result_size` of them, in the requested order.
    pub ids: Vec<i64>,

    /// Token resuming the listing after the last id of this page.
    pub next_page_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PageToken {
    field: OrderByField,
    is_asc: bool,
    last_value: i64,
    last_id: i64,
}

/// Builds the id-listing SELECT for one entity table.
///
/// `candidate_ids` is the pre-bound literal list for an `IN (...)` predicate;
/// the caller already short-circuited the provided-but-empty case. The query
/// fetches one row beyond `max_result_size` so the executor can tell whether
/// another page exists.
pub(crate) fn plan_list_query(
    kind: TypeKind,
    options: &ListOperationOptions,
    candidate_ids: Option<&str>,
) -> Result<String, QueryError> {
    if options.max_result_size <= 0 {
        return Err(QueryError::invalid_argument(format!(
            "max_result_size must be greater than 0, got {}",
            options.max_result_size
        )));
    }

    let field = options.order_by_field.field_name();
    let mut predicates = Vec::new();
    if let Some(ids) = candidate_ids {
        predicates.push(format!("`id` IN ({})", ids));
    }
    if let Some(filter) = &options.filter_query {
        validate_filter_query(filter)?;
        predicates.push(format!("({})", filter));
    }
    if let Some(token) = &options.next_page_token {
        let token = decode_page_token(token, options)?;
        let cmp = if options.is_asc { ">" } else { "<" };
        if options.order_by_field == OrderByField::Id {
            predicates.push(format!("`id` {} {}", cmp, token.last_id));
        } else {
            predicates.push(format!(
                "(`{f}` {c} {v} OR (`{f}` = {v} AND `id` {c} {i}))",
                f = field,
                c = cmp,
                v = token.last_value,
                i = token.last_id,
            ));
        }
    }

    let mut sql = if options.order_by_field == OrderByField::Id {
        format!("SELECT `id` FROM `{}`", kind.item_table_name())
    } else {
        format!(
            "SELECT `id`, `{}` FROM `{}`",
            field,
            kind.item_table_name()
        )
    };
    if !predicates.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" AND "));
    }
    let direction = if options.is_asc { "ASC" } else { "DESC" };
    if options.order_by_field == OrderByField::Id {
        sql.push_str(&format!(" ORDER BY `id` {}", direction));
    } else {
        sql.push_str(&format!(
            " ORDER BY `{}` {}, `id` {}",
            field, direction, direction
        ));
    }
    sql.push_str(&format!(" LIMIT {}", options.max_result_size + 1));
    Ok(sql)
}

pub(crate) fn encode_page_token(
    options: &ListOperationOptions,
    last_value: i64,
    last_id: i64,
) -> String {
    serde_json::to_string(&PageToken {
        field: options.order_by_field,
        is_asc: options.is_asc,
        last_value,
        last_id,
    })
    .expect("bug")
}

fn decode_page_token(token: &str, options: &ListOperationOptions) -> Result<PageToken, QueryError> {
    let token: PageToken = serde_json::from_str(token)
        .map_err(|e| QueryError::invalid_argument(format!("malformed page token: {}", e)))?;
    if token.field != options.order_by_field || token.is_asc != options.is_asc {
        return Err(QueryError::invalid_argument(
            "page token does not match the list options it is used with",
        ));
    }
    Ok(token)
}

const ARTIFACT_FILTER_COLUMNS: &[&str] = &[
    "id",
    "type_id",
    "uri",
    "state",
    "name",
    "create_time_since_epoch",
    "last_update_time_since_epoch",
];

const FILTER_KEYWORDS: &[&str] = &["AND", "OR", "NOT", "LIKE", "IS", "NULL"];

/// Validates a filter expression before it is appended to a listing query.
///
/// Accepts comparisons over the artifact columns, numeric and single-quoted
/// string literals, `AND`/`OR`/`NOT`/`LIKE`/`IS NULL` and parentheses.
/// Everything else, including statement separators and comments, is rejected.
pub(crate) fn validate_filter_query(filter: &str) -> Result<(), QueryError> {
    let invalid =
        |detail: &str| QueryError::invalid_argument(format!("malformed filter query: {}", detail));

    let mut chars = filter.chars().peekable();
    let mut tokens = 0usize;
    while let Some(c) = chars.next() {
        if c.is_whitespace() {
            continue;
        }
        tokens += 1;
        if c.is_ascii_alphabetic() || c == '_' {
            let mut word = c.to_string();
            while let Some(&c) = chars.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    word.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            let is_keyword = FILTER_KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(&word));
            if !is_keyword && !ARTIFACT_FILTER_COLUMNS.contains(&word.as_str()) {
                return Err(invalid(&format!("unknown identifier {:?}", word)));
            }
        } else if c.is_ascii_digit() || c == '-' {
            if c == '-' && !chars.peek().map_or(false, |c| c.is_ascii_digit()) {
                return Err(invalid("stray '-'"));
            }
            while let Some(&c) = chars.peek() {
                if c.is_ascii_digit() || c == '.' {
                    chars.next();
                } else {
                    break;
                }
            }
        } else if c == '\'' {
            let mut terminated = false;
            while let Some(c) = chars.next() {
                if c == '\'' {
                    // A doubled quote is an escaped quote inside the literal.
                    if chars.peek() == Some(&'\'') {
                        chars.next();
                    } else {
                        terminated = true;
                        break;
                    }
                }
            }
            if !terminated {
                return Err(invalid("unterminated string literal"));
            }
        } else {
            match c {
                '=' | '(' | ')' => {}
                '!' | '<' | '>' => {
                    if chars.peek() == Some(&'=') || (c == '<' && chars.peek() == Some(&'>')) {
                        chars.next();
                    } else if c == '!' {
                        return Err(invalid("stray '!'"));
                    }
                }
                _ => return Err(invalid(&format!("unexpected character {:?}", c))),
            }
        }
    }
    if tokens == 0 {
        return Err(invalid("empty expression"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_orders_and_limits() {
        let options = ListOperationOptions::default().max_result_size(10);
        let sql = plan_list_query(TypeKind::Artifact, &options, None).unwrap();
        assert_eq!(sql, "SELECT `id` FROM `Artifact` ORDER BY `id` ASC LIMIT 11");

        let options = ListOperationOptions::default()
            .max_result_size(2)
            .order_by(OrderByField::CreateTime, false);
        let sql = plan_list_query(TypeKind::Context, &options, Some("3, 4")).unwrap();
        assert_eq!(
            sql,
            concat!(
                "SELECT `id`, `create_time_since_epoch` FROM `Context` ",
                "WHERE `id` IN (3, 4) ",
                "ORDER BY `create_time_since_epoch` DESC, `id` DESC LIMIT 3"
            )
        );
    }

    #[test]
    fn plan_rejects_non_positive_max_result_size() {
        for n in &[0, -1] {
            let options = ListOperationOptions::default().max_result_size(*n);
            assert!(matches!(
                plan_list_query(TypeKind::Artifact, &options, None),
                Err(QueryError::InvalidArgument { .. })
            ));
        }
    }

    #[test]
    fn page_token_round_trip_works() {
        let options = ListOperationOptions::default().order_by(OrderByField::UpdateTime, false);
        let token = encode_page_token(&options, 1234, 7);
        let sql = plan_list_query(
            TypeKind::Execution,
            &options.clone().next_page_token(&token),
            None,
        )
        .unwrap();
        assert!(sql.contains(
            "(`last_update_time_since_epoch` < 1234 \
             OR (`last_update_time_since_epoch` = 1234 AND `id` < 7))"
        ));
    }

    #[test]
    fn mismatched_page_token_is_rejected() {
        let token = encode_page_token(
            &ListOperationOptions::default().order_by(OrderByField::CreateTime, true),
            10,
            1,
        );
        let options = ListOperationOptions::default()
            .order_by(OrderByField::UpdateTime, true)
            .next_page_token(&token);
        assert!(matches!(
            plan_list_query(TypeKind::Artifact, &options, None),
            Err(QueryError::InvalidArgument { .. })
        ));

        let options = ListOperationOptions::default().next_page_token("not json");
        assert!(matches!(
            plan_list_query(TypeKind::Artifact, &options, None),
            Err(QueryError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn filter_validation_accepts_predicates() {
        for filter in &[
            "uri = 'path/to/data'",
            "state = 2 AND type_id = 1",
            "name LIKE 'model-%' OR id > 10",
            "(create_time_since_epoch >= 1000) AND NOT (uri = 'x')",
            "name IS NULL",
            "uri = 'it''s quoted'",
        ] {
            validate_filter_query(filter).unwrap();
        }
    }

    #[test]
    fn filter_validation_rejects_suspicious_input() {
        for filter in &[
            "",
            "   ",
            "uri = 'unterminated",
            "1; DROP TABLE `Artifact`",
            "unknown_column = 1",
            "uri = \"double quoted\"",
            "id > 1 -- comment",
        ] {
            assert!(
                matches!(
                    validate_filter_query(filter),
                    Err(QueryError::InvalidArgument { .. })
                ),
                "filter {:?} should be rejected",
                filter
            );
        }
    }
}

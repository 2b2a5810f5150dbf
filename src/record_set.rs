//! Uniform tabular results returned by metadata sources.

/// Sentinel string conveying SQL `NULL` in a [`RecordSet`] cell.
pub const NULL_VALUE: &str = "__MLMD_NULL__";

/// One result row. Every cell is rendered as a string.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Record {
    /// Cell values, one per column, in [`RecordSet::column_names`] order.
    pub values: Vec<String>,
}

/// Ordered column names plus rows of string cells.
///
/// Integers are rendered in base 10, booleans as `0`/`1`, doubles in
/// round-trippable decimal, and `NULL` as [`NULL_VALUE`]. Column order is
/// backend-specified: look columns up by name, never by position.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecordSet {
    /// Column names in backend order.
    pub column_names: Vec<String>,

    /// Result rows.
    pub records: Vec<Record>,
}

impl RecordSet {
    /// Finds the position of the named column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.column_names.iter().position(|c| c == name)
    }

    /// Finds the position of the `id` column.
    pub fn id_column_index(&self) -> Option<usize> {
        self.column_index("id")
    }

    /// Looks up a cell by row number and column name.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.column_index(column)?;
        self.records.get(row).map(|r| r.values[index].as_str())
    }

    /// Tells whether a cell holds the `NULL` sentinel.
    pub fn is_null(cell: &str) -> bool {
        cell == NULL_VALUE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_set() -> RecordSet {
        RecordSet {
            column_names: vec!["name".to_owned(), "id".to_owned()],
            records: vec![Record {
                values: vec![NULL_VALUE.to_owned(), "7".to_owned()],
            }],
        }
    }

    #[test]
    fn column_lookup_works() {
        let rs = record_set();
        assert_eq!(rs.id_column_index(), Some(1));
        assert_eq!(rs.column_index("name"), Some(0));
        assert_eq!(rs.column_index("uri"), None);
    }

    #[test]
    fn cell_lookup_works() {
        let rs = record_set();
        assert_eq!(rs.cell(0, "id"), Some("7"));
        assert!(RecordSet::is_null(rs.cell(0, "name").unwrap()));
        assert_eq!(rs.cell(1, "id"), None);
    }
}

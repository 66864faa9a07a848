use std::collections::BTreeSet;

use crate::error::{MapError, MapResult};

use super::feature_table::FeatureTable;

/// The species chosen by the user. `NotMade` is distinct from an empty or non-matching choice: nothing is filtered
/// or rendered before a selection is made.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Selection {
    #[default]
    NotMade,
    Values(BTreeSet<String>),
}

impl Selection {
    pub fn from_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Selection::Values(values.into_iter().map(Into::into).collect())
    }

    pub fn values(&self) -> Option<&BTreeSet<String>> {
        match self {
            Selection::NotMade => None,
            Selection::Values(values) => Some(values),
        }
    }
}

fn require_column(table: &FeatureTable, column: &str) -> MapResult<()> {
    if table.has_column(column) {
        Ok(())
    } else {
        Err(MapError::MissingAttributeColumn {
            column: column.to_string(),
            available: table.columns.clone(),
        })
    }
}

/// Distinct non-null values of `column`, sorted. These are the options offered for selection.
pub fn distinct_values(table: &FeatureTable, column: &str) -> MapResult<Vec<String>> {
    require_column(table, column)?;
    let values: BTreeSet<String> = table
        .features
        .iter()
        .filter_map(|feature| feature.attribute(column).as_label())
        .collect();
    Ok(values.into_iter().collect())
}

/// Rows whose `column` value is one of `selected`, in their original order. An empty result is not an error, a
/// missing column is.
pub fn filter_by_values(
    table: &FeatureTable,
    column: &str,
    selected: &BTreeSet<String>,
) -> MapResult<FeatureTable> {
    require_column(table, column)?;
    let features = table
        .features
        .iter()
        .filter(|feature| {
            feature
                .attribute(column)
                .as_label()
                .map(|label| selected.contains(&label))
                .unwrap_or(false)
        })
        .cloned()
        .collect();
    Ok(FeatureTable::new(table.columns.clone(), features))
}

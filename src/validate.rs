use crate::container::Container;
use crate::data::RecordTable;
use crate::pivot::Dimension;

/// What a chart is about to read from every container.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Selection {
    pub name: String,
    pub x_var: String,
    pub y_var: String,
    pub years: Vec<String>,
    pub data: Vec<String>,
    pub z: Option<Dimension>,
}

/// The first problem found by `verify`.
///
/// `index` is the position of the offending container in the caller's list.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Diagnostic {
    #[error("{name} is not in container #{index}. Describe the container to see the available names")]
    LookupNotFound { index: usize, name: String },

    #[error(
        "{column} is not a column label in container #{index}. Here are your options: {}",
        .available.join(", ")
    )]
    ColumnNotFound {
        index: usize,
        column: String,
        available: Vec<String>,
    },

    #[error(
        "'{value}' can't be found in container #{index}. Here are your options for {column}: {}",
        .options.join(", ")
    )]
    ValueNotFound {
        index: usize,
        column: String,
        value: String,
        options: Vec<String>,
    },
}

fn require_column(index: usize, table: &RecordTable, column: &str) -> Result<usize, Diagnostic> {
    table.column_index(column).ok_or_else(|| Diagnostic::ColumnNotFound {
        index,
        column: column.to_string(),
        available: table.headers.clone(),
    })
}

fn require_values(
    index: usize,
    table: &RecordTable,
    col: usize,
    values: &[String],
) -> Result<(), Diagnostic> {
    match values.iter().find(|v| !table.contains_value(col, v)) {
        Some(missing) => Err(Diagnostic::ValueNotFound {
            index,
            column: table.headers[col].clone(),
            value: missing.clone(),
            options: table.distinct(col).into_iter().map(str::to_string).collect(),
        }),
        None => Ok(()),
    }
}

fn check(index: usize, container: &impl Container, sel: &Selection) -> Result<RecordTable, Diagnostic> {
    let table = container.records(&sel.name).ok_or_else(|| Diagnostic::LookupNotFound {
        index,
        name: sel.name.clone(),
    })?;

    let x = require_column(index, table, &sel.x_var)?;
    let y = require_column(index, table, &sel.y_var)?;
    require_values(index, table, x, &sel.years)?;
    require_values(index, table, y, &sel.data)?;

    if let Some(dim) = &sel.z {
        let z = require_column(index, table, &dim.column)?;
        require_values(index, table, z, &dim.values)?;
    }
    Ok(table.clone())
}

/// Check that every container can serve `sel` before anything is plotted.
///
/// Stops at the first problem. On success returns each container's full,
/// unfiltered record table, in container order.
pub fn verify<C: Container>(sources: &[C], sel: &Selection) -> Result<Vec<RecordTable>, Diagnostic> {
    let mut tables = Vec::with_capacity(sources.len());
    for (index, container) in sources.iter().enumerate() {
        match check(index, container, sel) {
            Ok(table) => tables.push(table),
            Err(diagnostic) => {
                log::warn!("{}", diagnostic);
                return Err(diagnostic);
            }
        }
    }
    log::debug!("selection '{}' verified against {} container(s)", sel.name, tables.len());
    Ok(tables)
}

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::data::RecordTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Alias,
    Equation,
    Parameter,
    Set,
    Variable,
}

impl SymbolKind {
    /// Order of the description tables.
    pub const ALL: [SymbolKind; 5] = [
        SymbolKind::Alias,
        SymbolKind::Equation,
        SymbolKind::Parameter,
        SymbolKind::Set,
        SymbolKind::Variable,
    ];

    pub fn plural(&self) -> &'static str {
        match self {
            SymbolKind::Alias => "aliases",
            SymbolKind::Equation => "equations",
            SymbolKind::Parameter => "parameters",
            SymbolKind::Set => "sets",
            SymbolKind::Variable => "variables",
        }
    }
}

/// A named entity of a data container.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub domain: Vec<String>,
    /// Set an alias refers to.
    #[serde(default)]
    pub alias_with: Option<String>,
    #[serde(default)]
    pub records: Option<RecordTable>,
}

impl Symbol {
    pub fn number_records(&self) -> usize {
        self.records.as_ref().map_or(0, RecordTable::len)
    }
}

/// A collection of named record tables.
pub trait Container {
    fn symbols(&self) -> &[Symbol];

    fn symbol(&self, name: &str) -> Option<&Symbol> {
        self.symbols().iter().find(|s| s.name == name)
    }

    /// Records of `name`. Aliases resolve to the records of their set.
    fn records(&self, name: &str) -> Option<&RecordTable> {
        let symbol = self.symbol(name)?;
        match (&symbol.records, symbol.kind, &symbol.alias_with) {
            (Some(records), _, _) => Some(records),
            (None, SymbolKind::Alias, Some(target)) if target != name => {
                self.symbol(target)?.records.as_ref()
            }
            _ => None,
        }
    }

    /// Summary table of every symbol of one kind.
    fn describe(&self, kind: SymbolKind) -> RecordTable {
        let of_kind = self.symbols().iter().filter(|s| s.kind == kind);
        if kind == SymbolKind::Alias {
            return RecordTable::new(
                vec!["name".into(), "alias_with".into()],
                of_kind
                    .map(|s| vec![s.name.clone(), s.alias_with.clone().unwrap_or_default()])
                    .collect(),
            );
        }
        RecordTable::new(
            vec![
                "name".into(),
                "description".into(),
                "dimension".into(),
                "domain".into(),
                "number_records".into(),
            ],
            of_kind
                .map(|s| {
                    vec![
                        s.name.clone(),
                        s.description.clone(),
                        s.domain.len().to_string(),
                        s.domain.join(","),
                        s.number_records().to_string(),
                    ]
                })
                .collect(),
        )
    }
}

/// A container snapshot held in memory, loadable from JSON.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MemoryContainer {
    pub symbols: Vec<Symbol>,
}

impl MemoryContainer {
    pub fn new(symbols: Vec<Symbol>) -> Self {
        Self { symbols }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse container JSON")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read '{}'", path.display()))?;
        Self::from_json_str(&json).with_context(|| format!("Invalid container '{}'", path.display()))
    }
}

impl Container for MemoryContainer {
    fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }
}

/// The five description tables (aliases, equations, parameters, sets,
/// variables) and a name to description map.
pub fn describe_container<C: Container + ?Sized>(
    container: &C,
) -> (Vec<RecordTable>, HashMap<String, String>) {
    let tables = SymbolKind::ALL.iter().map(|&kind| container.describe(kind)).collect();
    let names = container
        .symbols()
        .iter()
        .map(|s| (s.name.clone(), s.description.clone()))
        .collect();
    (tables, names)
}

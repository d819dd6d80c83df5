//! Masking rule compilation.

use std::collections::HashMap;

use dumpmask_core::{MaskRulesFile, MaskSettings};

use crate::error::MaskError;
use crate::template::CompiledTemplate;

/// Compiled templates for the columns of one table.
#[derive(Debug, Clone, Default)]
pub struct TableRules {
    columns: HashMap<String, CompiledTemplate>,
}

impl TableRules {
    /// Template for a column, if the column is masked.
    pub fn column(&self, name: &str) -> Option<&CompiledTemplate> {
        self.columns.get(name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// The compiled masking rule set: table -> column -> template.
///
/// Built once at startup and only read afterwards, so it can be shared
/// between workers behind an `Arc` without locking.
#[derive(Debug, Clone)]
pub struct MaskingRules {
    tables: HashMap<String, TableRules>,
    cost: u32,
}

impl MaskingRules {
    /// Compile every template of `raw`.
    ///
    /// The first template that fails to compile aborts compilation; a rule
    /// set is never returned with a rule missing.
    pub fn compile(raw: &MaskRulesFile, settings: &MaskSettings) -> Result<Self, MaskError> {
        settings.validate()?;

        if raw.is_empty() {
            tracing::warn!("Masking rules are empty; every line will pass through unchanged");
        }

        let mut tables = HashMap::with_capacity(raw.tables.len());
        for (table_name, columns) in &raw.tables {
            if columns.is_empty() {
                tracing::warn!(
                    table = %table_name,
                    "Table has no column rules; its rows will be re-serialized unchanged"
                );
            }

            let mut compiled = HashMap::with_capacity(columns.len());
            for (column_name, source) in columns {
                let template =
                    CompiledTemplate::compile(format!("{}-{}", table_name, column_name), source)
                        .map_err(|reason| MaskError::Template {
                            table: table_name.clone(),
                            column: column_name.clone(),
                            reason,
                        })?;
                compiled.insert(column_name.clone(), template);
            }
            tables.insert(table_name.clone(), TableRules { columns: compiled });
        }

        let rules = Self {
            tables,
            cost: settings.cost,
        };

        tracing::info!(
            tables = rules.table_count(),
            columns = rules.column_count(),
            hashing = rules.uses_hash(),
            cost = rules.cost,
            "Compiled masking rules"
        );

        Ok(rules)
    }

    /// Rules for a table, if any of its rows need masking.
    pub fn table(&self, name: &str) -> Option<&TableRules> {
        self.tables.get(name)
    }

    /// bcrypt cost handed to `{{ .Hashed }}`.
    pub fn cost(&self) -> u32 {
        self.cost
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn column_count(&self) -> usize {
        self.tables.values().map(TableRules::len).sum()
    }

    fn uses_hash(&self) -> bool {
        self.tables
            .values()
            .flat_map(|t| t.columns.values())
            .any(CompiledTemplate::uses_hash)
    }
}

use anyhow::{Context, Result, anyhow};
use evalexpr::{
    ContextWithMutableVariables, DefaultNumericTypes, HashMapContext, Value as EvalValue,
    build_operator_tree, eval_with_context,
};

use crate::data::{Cell, cell_to_evalexpr, normalize_column_name};

/// A computed field written as `name = expression`.
///
/// Columns are bound under their header text and under the normalized
/// (`snake_case`-ish) form of that text, so `eMonth + "-1"` and
/// `month_of_report` both resolve.
#[derive(Debug, Clone)]
pub struct DerivedColumn {
    pub name: String,
    pub expression: String,
}

impl DerivedColumn {
    pub fn parse(spec: &str) -> Result<Self> {
        let mut parts = spec.splitn(2, '=');
        let name = parts
            .next()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("Derived column is missing a name"))?;
        let expression = parts
            .next()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("Derived column '{name}' is missing an expression"))?;
        Ok(DerivedColumn {
            name: name.to_string(),
            expression: expression.to_string(),
        })
    }

    /// Variables the expression reads, in first-use order. Function names
    /// and string literals are not variables.
    pub fn referenced_names(&self) -> Result<Vec<String>> {
        let tree = build_operator_tree::<DefaultNumericTypes>(&self.expression)
            .with_context(|| format!("Parsing expression for column '{}'", self.name))?;
        let mut names: Vec<String> = Vec::new();
        for identifier in tree.iter_read_variable_identifiers() {
            if !names.iter().any(|name| name == identifier) {
                names.push(identifier.to_string());
            }
        }
        Ok(names)
    }

    pub fn evaluate(&self, headers: &[String], row: &[Cell]) -> Result<Cell> {
        let mut context = HashMapContext::new();
        for (idx, header) in headers.iter().enumerate() {
            let value = row.get(idx).map(cell_to_evalexpr).unwrap_or(EvalValue::Empty);
            let canon = normalize_column_name(header);
            if canon != *header {
                context
                    .set_value(canon, value.clone())
                    .with_context(|| format!("Binding normalized column '{header}'"))?;
            }
            context
                .set_value(header.clone(), value)
                .with_context(|| format!("Binding column '{header}'"))?;
        }

        let result = eval_with_context(&self.expression, &context)
            .with_context(|| format!("Evaluating expression for column '{}'", self.name))?;
        Ok(match result {
            EvalValue::String(s) => Cell::Text(s),
            EvalValue::Int(i) => Cell::Integer(i),
            EvalValue::Float(f) => Cell::Float(f),
            EvalValue::Boolean(b) => Cell::Boolean(b),
            EvalValue::Tuple(values) => Cell::Text(
                values
                    .into_iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join("|"),
            ),
            EvalValue::Empty => Cell::Empty,
        })
    }
}

pub fn parse_derived_columns(specs: &[String]) -> Result<Vec<DerivedColumn>> {
    specs
        .iter()
        .map(|spec| DerivedColumn::parse(spec))
        .collect()
}

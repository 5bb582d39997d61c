use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Canonical type families a free-form column type is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeFamily {
    Integer,
    Decimal,
    Temporal,
    Boolean,
    Text,
    Other,
}

impl TypeFamily {
    pub fn is_numeric(&self) -> bool {
        matches!(self, TypeFamily::Integer | TypeFamily::Decimal)
    }
}

// Checked in order: "timestamp" and "interval" are Temporal before any
// numeric pattern is tried.
static TYPE_FAMILIES: Lazy<Vec<(Regex, TypeFamily)>> = Lazy::new(|| {
    [
        (r"(?i)date|time|interval", TypeFamily::Temporal),
        (r"(?i)bool|bit\b", TypeFamily::Boolean),
        (
            r"(?i)decimal|numeric|float|double|real|money|number",
            TypeFamily::Decimal,
        ),
        (
            r"(?i)\b(?:(?:tiny|small|medium|big)?int(?:eger)?\d*|u?int\d+|(?:small|big)?serial\d*)\b",
            TypeFamily::Integer,
        ),
        (r"(?i)char|text|string|uuid|enum|json", TypeFamily::Text),
    ]
    .into_iter()
    .map(|(pattern, family)| {
        let re = Regex::new(pattern).expect("type family patterns are valid regex literals");
        (re, family)
    })
    .collect()
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn family(&self) -> TypeFamily {
        TYPE_FAMILIES
            .iter()
            .find(|(re, _)| re.is_match(&self.data_type))
            .map(|(_, family)| *family)
            .unwrap_or(TypeFamily::Other)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    pub fn first_column_of<F>(&self, predicate: F) -> Option<&ColumnDescriptor>
    where
        F: Fn(TypeFamily) -> bool,
    {
        self.columns.iter().find(|c| predicate(c.family()))
    }
}

/// Tables and columns a caller makes available to one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    #[serde(default)]
    pub tables: Vec<TableDescriptor>,
}

impl SchemaDescriptor {
    pub fn new(tables: Vec<TableDescriptor>) -> Self {
        Self { tables }
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Flat textual description used in prompts.
    pub fn describe(&self) -> String {
        if self.tables.is_empty() {
            return NO_SCHEMA.to_string();
        }

        self.tables
            .iter()
            .map(|table| {
                let columns = table
                    .columns
                    .iter()
                    .map(|col| match &col.description {
                        Some(desc) => format!("{} ({}) - {}", col.name, col.data_type, desc),
                        None => format!("{} ({})", col.name, col.data_type),
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("Table: {}\nColumns: {}", table.name, columns)
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

pub const NO_SCHEMA: &str = "No schema provided";

pub fn describe_schema(schema: Option<&SchemaDescriptor>) -> String {
    schema
        .map(SchemaDescriptor::describe)
        .unwrap_or_else(|| NO_SCHEMA.to_string())
}

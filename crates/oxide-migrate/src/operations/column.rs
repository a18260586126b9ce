//! Column definitions shared by table and column operations.

use oxide_model::reflect::PrimitiveType;
use serde::{Deserialize, Serialize};

/// A literal value, used for column defaults and seed data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Literal {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Referential action of a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferentialAction {
    #[default]
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ReferentialAction {
    /// Returns the SQL representation of the action.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

/// A column as added, created with a table, or altered.
///
/// `column_type` is the store type. When it is absent the dialect derives
/// one from `clr_type` and the facets, or from the column the model maps to
/// `table.name`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnOperation {
    pub name: String,
    pub table: String,
    pub schema: Option<String>,
    pub clr_type: Option<PrimitiveType>,
    pub column_type: Option<String>,
    pub nullable: bool,
    pub max_length: Option<u32>,
    pub unicode: Option<bool>,
    pub fixed_length: bool,
    pub precision: Option<u8>,
    pub scale: Option<u8>,
    pub row_version: bool,
    pub default_value: Option<Literal>,
    pub default_sql: Option<String>,
    pub computed_sql: Option<String>,
    pub identity: bool,
    pub collation: Option<String>,
    pub comment: Option<String>,
}

impl ColumnOperation {
    /// Creates a non-nullable column of `table`.
    #[must_use]
    pub fn new(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Sets the value type the store type is derived from.
    #[must_use]
    pub fn of_type(mut self, clr_type: PrimitiveType) -> Self {
        self.clr_type = Some(clr_type);
        self
    }

    /// Sets the store type verbatim.
    #[must_use]
    pub fn store_type(mut self, column_type: impl Into<String>) -> Self {
        self.column_type = Some(column_type.into());
        self
    }

    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    #[must_use]
    pub fn max_length(mut self, max_length: u32) -> Self {
        self.max_length = Some(max_length);
        self
    }

    #[must_use]
    pub fn ansi(mut self) -> Self {
        self.unicode = Some(false);
        self
    }

    #[must_use]
    pub fn precision(mut self, precision: u8, scale: u8) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    /// The store generates the value on insert.
    #[must_use]
    pub fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: impl Into<Literal>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    #[must_use]
    pub fn default_sql(mut self, sql: impl Into<String>) -> Self {
        self.default_sql = Some(sql.into());
        self
    }

    #[must_use]
    pub fn computed(mut self, sql: impl Into<String>) -> Self {
        self.computed_sql = Some(sql.into());
        self
    }

    #[must_use]
    pub fn collation(mut self, collation: impl Into<String>) -> Self {
        self.collation = Some(collation.into());
        self
    }

    /// Returns true when the column has a default value or expression.
    #[must_use]
    pub const fn has_default(&self) -> bool {
        self.default_value.is_some() || self.default_sql.is_some()
    }
}

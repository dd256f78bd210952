//! Core types for sqlrun

/// Placeholder rendered for SQL NULL values
pub const NULL_PLACEHOLDER: &str = "NULL";

/// A database value as returned by a driver
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// NULL value
    Null,
    /// Boolean
    Bool(bool),
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
    /// 64-bit floating point
    Float64(f64),
    /// Decimal/Numeric (stored as string for precision)
    Decimal(String),
    /// UTF-8 string
    String(String),
    /// Binary data
    Bytes(Vec<u8>),
}

impl Value {
    /// Check if the value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(v) => Some(*v as i64),
            Value::Int64(v) => Some(*v),
            Value::String(s) => s.parse::<i64>().ok(),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => f.write_str(NULL_PLACEHOLDER),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

/// A row from a result set
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Column values, in column order
    pub values: Vec<Value>,
}

impl Row {
    /// Create a new row
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Get a value by column index
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Number of values in the row
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Column metadata
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnMeta {
    /// Column name
    pub name: String,
    /// Data type (database-specific string)
    pub data_type: String,
    /// Column ordinal position (0-based)
    pub ordinal: usize,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, ordinal: usize) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            ordinal,
        }
    }
}

/// A single result produced by a statement handle
///
/// Executing text may produce a mixed sequence of result sets and update
/// counts, one per statement contained in the text. The rows of a result set
/// are not part of the outcome: they are fetched afterwards, one at a time,
/// with `Statement::next_row`.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementOutcome {
    /// A result set with these columns. May legitimately have zero columns
    /// (some back ends describe `SELECT;` that way).
    Rows(Vec<ColumnMeta>),
    /// Rows affected by a statement that returns no result set
    Affected(u64),
}

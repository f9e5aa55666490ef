/// Column data type
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnType {
    /// Unsigned 32-bit integer
    Unsigned,
    /// Unsigned 64-bit integer
    BigUnsigned,
    /// Signed integer with a display width
    Integer,
    /// Fixed-width text
    Char(u16),
    /// Variable-width text with a maximum length
    VarChar(u16),
    /// Fixed-point decimal (precision, scale)
    Decimal(u8, u8),
    /// Stored as 0/1
    Boolean,
}

impl ColumnType {
    /// SQL type name, portable across SQLite and MySQL
    pub fn sql_type(&self) -> String {
        match self {
            ColumnType::Unsigned => "INTEGER".to_string(),
            ColumnType::BigUnsigned => "BIGINT".to_string(),
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::Char(n) => format!("CHAR({})", n),
            ColumnType::VarChar(n) => format!("VARCHAR({})", n),
            ColumnType::Decimal(p, s) => format!("DECIMAL({},{})", p, s),
            ColumnType::Boolean => "TINYINT(1)".to_string(),
        }
    }
}

/// Column definition
#[derive(Debug, Clone)]
pub struct Column {
    pub name: &'static str,
    pub col_type: ColumnType,
    pub nullable: bool,
}

impl Column {
    /// Create a required (non-nullable) column
    pub const fn required(name: &'static str, col_type: ColumnType) -> Self {
        Self {
            name,
            col_type,
            nullable: false,
        }
    }
}

/// Table schema definition
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub name: &'static str,
    pub columns: &'static [Column],
    pub primary_key: &'static str,
    /// Default rows per multi-row insert
    pub batch_size: usize,
}

impl TableSchema {
    /// True when `found` lists exactly this table's columns, in order
    pub fn matches_columns(&self, found: &[String]) -> bool {
        found.len() == self.columns.len()
            && self
                .columns
                .iter()
                .zip(found)
                .all(|(col, name)| col.name.eq_ignore_ascii_case(name))
    }
}

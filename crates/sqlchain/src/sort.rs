//! Sort expressions for `ORDER BY`.

/// One `ORDER BY` term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortExpression {
    /// A column resolved against the builder, by SQL or host name.
    Column { name: String, descending: bool },
    /// Raw SQL emitted verbatim.
    Expression(String),
}

impl SortExpression {
    pub fn asc(name: impl Into<String>) -> Self {
        SortExpression::Column {
            name: name.into(),
            descending: false,
        }
    }

    pub fn desc(name: impl Into<String>) -> Self {
        SortExpression::Column {
            name: name.into(),
            descending: true,
        }
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        SortExpression::Expression(sql.into())
    }
}

impl From<&str> for SortExpression {
    /// A bare column name. A `" DESC"` suffix is resolved when the clause is built.
    fn from(name: &str) -> Self {
        SortExpression::asc(name)
    }
}

impl From<String> for SortExpression {
    fn from(name: String) -> Self {
        SortExpression::asc(name)
    }
}

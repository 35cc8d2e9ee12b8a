//! Filter expressions and the visitor used to lower them.
//!
//! Expressions are built from [`Field`] references, either through the chainable methods on
//! [`Field`] or through the [`Filter`] helpers:
//!
//! ```ignore
//! use arangolayer::expr::{Field, Filter};
//!
//! let adults = Field::new("age").gte(18);
//! let named = Filter::starts_with("name", "A").and(Filter::exists("email"));
//! let owned = Field::new("owner").eq_field(Field::of("u", "_id"));
//! ```
//!
//! - Comparison: `eq`, `ne`, `gt`, `gte`, `lt`, `lte`
//! - String: `starts_with`, `ends_with`, `contains`, `not_contains`
//! - Existence: `exists`, `not_exists`
//! - Membership: `any_of`, `none_of`
//! - Logical: `and`, `or`, `not`
//!
//! Field paths are validated against the schemas bound in a query when the expression is added
//! with [`Query::filter`](crate::query::Query::filter).

use serde_json::Value;

use crate::{error::ArangoError, field::FieldType};

/// A reference to a (possibly nested) field of a query alias.
///
/// Without an explicit alias the field refers to the most recently bound alias of the query
/// it is used in.
#[derive(Debug, Clone)]
pub struct Field {
    alias: Option<String>,
    path: Vec<String>,
    field_type: Option<FieldType>,
}

impl Field {
    /// References a field by dotted path, e.g. `address.city`.
    pub fn new(path: &str) -> Self {
        Self::path(path.split('.'))
    }

    /// References a field by explicit path segments.
    pub fn path<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            alias: None,
            path: segments.into_iter().map(Into::into).collect(),
            field_type: None,
        }
    }

    /// References a field of a specific alias (a joined collection or traversal vertex).
    pub fn of(alias: &str, path: &str) -> Self {
        Self {
            alias: Some(alias.to_string()),
            ..Self::new(path)
        }
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn segments(&self) -> &[String] {
        &self.path
    }

    /// Declared type of the field, known once the field has been resolved against a query.
    pub fn field_type(&self) -> Option<&FieldType> {
        self.field_type.as_ref()
    }

    /// The field path joined with dots, prefixed by the alias if one is set.
    pub fn dotted(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{alias}.{}", self.path.join(".")),
            None => self.path.join("."),
        }
    }

    pub(crate) fn resolved(self, alias: String, field_type: Option<FieldType>) -> Self {
        Self {
            alias: Some(alias),
            path: self.path,
            field_type,
        }
    }

    fn compare(self, op: FieldOp, value: impl Into<Value>) -> Expr {
        Expr::field(self, op, Operand::Value(value.into()))
    }

    pub fn eq(self, value: impl Into<Value>) -> Expr {
        self.compare(FieldOp::Eq, value)
    }

    pub fn ne(self, value: impl Into<Value>) -> Expr {
        self.compare(FieldOp::Ne, value)
    }

    pub fn gt(self, value: impl Into<Value>) -> Expr {
        self.compare(FieldOp::Gt, value)
    }

    pub fn gte(self, value: impl Into<Value>) -> Expr {
        self.compare(FieldOp::Gte, value)
    }

    pub fn lt(self, value: impl Into<Value>) -> Expr {
        self.compare(FieldOp::Lt, value)
    }

    pub fn lte(self, value: impl Into<Value>) -> Expr {
        self.compare(FieldOp::Lte, value)
    }

    pub fn contains(self, value: impl Into<Value>) -> Expr {
        self.compare(FieldOp::Contains, value)
    }

    pub fn not_contains(self, value: impl Into<Value>) -> Expr {
        self.compare(FieldOp::NotContains, value)
    }

    pub fn starts_with(self, value: impl Into<Value>) -> Expr {
        self.compare(FieldOp::StartsWith, value)
    }

    pub fn ends_with(self, value: impl Into<Value>) -> Expr {
        self.compare(FieldOp::EndsWith, value)
    }

    pub fn any_of(self, values: impl Into<Value>) -> Expr {
        self.compare(FieldOp::AnyOf, values)
    }

    pub fn none_of(self, values: impl Into<Value>) -> Expr {
        self.compare(FieldOp::NoneOf, values)
    }

    pub fn exists(self) -> Expr {
        Expr::Exists(self, true)
    }

    pub fn not_exists(self) -> Expr {
        Expr::Exists(self, false)
    }

    /// Compares this field with another field, e.g. for join conditions.
    pub fn compare_field(self, op: FieldOp, other: Field) -> Expr {
        Expr::field(self, op, Operand::Field(other))
    }

    pub fn eq_field(self, other: Field) -> Expr {
        self.compare_field(FieldOp::Eq, other)
    }
}

impl From<&str> for Field {
    fn from(path: &str) -> Self {
        Field::new(path)
    }
}

impl From<String> for Field {
    fn from(path: String) -> Self {
        Field::new(&path)
    }
}

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// String contains substring, or list contains element.
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    /// Field value (or any element of a list field) is one of the values.
    AnyOf,
    /// Field value (or every element of a list field) is none of the values.
    NoneOf,
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone)]
pub enum Operand {
    /// A literal; always sent as a bind parameter.
    Value(Value),
    Field(Field),
}

/// A filter expression.
#[derive(Debug, Clone)]
pub enum Expr {
    /// All expressions must match.
    And(Vec<Expr>),
    /// Any expression must match.
    Or(Vec<Expr>),
    Not(Box<Expr>),
    /// The field is present and not null (`true`), or absent or null (`false`).
    Exists(Field, bool),
    Field {
        field: Field,
        op: FieldOp,
        value: Operand,
    },
}

impl Expr {
    pub fn field(field: Field, op: FieldOp, value: Operand) -> Self {
        Expr::Field { field, op, value }
    }

    /// Combines this expression with another using logical AND.
    ///
    /// If this expression is already an AND, the other expression is appended to it.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this expression with another using logical OR.
    ///
    /// If this expression is already an OR, the other expression is appended to it.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }
}

/// Static constructors for common filter expressions.
pub struct Filter;

impl Filter {
    pub fn eq(field: impl Into<Field>, value: impl Into<Value>) -> Expr {
        field.into().eq(value)
    }

    pub fn ne(field: impl Into<Field>, value: impl Into<Value>) -> Expr {
        field.into().ne(value)
    }

    pub fn gt(field: impl Into<Field>, value: impl Into<Value>) -> Expr {
        field.into().gt(value)
    }

    pub fn gte(field: impl Into<Field>, value: impl Into<Value>) -> Expr {
        field.into().gte(value)
    }

    pub fn lt(field: impl Into<Field>, value: impl Into<Value>) -> Expr {
        field.into().lt(value)
    }

    pub fn lte(field: impl Into<Field>, value: impl Into<Value>) -> Expr {
        field.into().lte(value)
    }

    pub fn starts_with(field: impl Into<Field>, value: impl Into<Value>) -> Expr {
        field.into().starts_with(value)
    }

    pub fn ends_with(field: impl Into<Field>, value: impl Into<Value>) -> Expr {
        field.into().ends_with(value)
    }

    pub fn contains(field: impl Into<Field>, value: impl Into<Value>) -> Expr {
        field.into().contains(value)
    }

    pub fn not_contains(field: impl Into<Field>, value: impl Into<Value>) -> Expr {
        field.into().not_contains(value)
    }

    pub fn exists(field: impl Into<Field>) -> Expr {
        field.into().exists()
    }

    pub fn not_exists(field: impl Into<Field>) -> Expr {
        field.into().not_exists()
    }

    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }

    pub fn any_of(field: impl Into<Field>, values: impl Into<Value>) -> Expr {
        field.into().any_of(values)
    }

    pub fn none_of(field: impl Into<Field>, values: impl Into<Value>) -> Expr {
        field.into().none_of(values)
    }
}

pub trait QueryVisitor {
    type Output;
    type Error: Into<ArangoError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &Field,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &Field,
        op: FieldOp,
        value: &Operand,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, *op, value),
        }
    }
}

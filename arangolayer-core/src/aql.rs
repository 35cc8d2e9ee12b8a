//! Lowering of query trees to AQL.
//!
//! Compilation is pure: the same tree always produces the same text and the same bind
//! parameters. Literals never appear in the text. Every value a caller supplies is sent as a bind
//! parameter, and every attribute name is quoted with backticks.
//!
//! Bind parameter names are derived from per-kind counters in visit order:
//!
//! | kind | text | bind key |
//! |------|------|----------|
//! | value | `@value_0` | `value_0` |
//! | collection | `@@collection_0` | `@collection_0` |
//! | edge collection | `@@edges_0` | `@edges_0` |
//! | graph | `@graph_0` | `graph_0` |
//! | limit | `@offset_0, @count_0` | `offset_0`, `count_0` |

use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    error::{ArangoError, ArangoResult},
    expr::{Expr, Field, FieldOp, Operand, QueryVisitor},
    query::{Projection, ProjectionSource, Query, QueryNode, SortDirection, Traversal, TraversalTarget},
};

/// AQL keywords that cannot be used as variable names.
const KEYWORDS: &[&str] = &[
    "AGGREGATE",
    "ALL",
    "ALL_SHORTEST_PATHS",
    "AND",
    "ANY",
    "ASC",
    "AT",
    "COLLECT",
    "CURRENT",
    "DESC",
    "DISTINCT",
    "FALSE",
    "FILTER",
    "FOR",
    "GRAPH",
    "IN",
    "INBOUND",
    "INSERT",
    "INTO",
    "K_PATHS",
    "K_SHORTEST_PATHS",
    "LEAST",
    "LET",
    "LIKE",
    "LIMIT",
    "NEW",
    "NONE",
    "NOT",
    "NULL",
    "OLD",
    "OR",
    "OUTBOUND",
    "PRUNE",
    "REMOVE",
    "REPLACE",
    "RETURN",
    "SEARCH",
    "SHORTEST_PATH",
    "SORT",
    "TRUE",
    "UPDATE",
    "UPSERT",
    "WINDOW",
    "WITH",
];

/// AQL text plus the bind parameters it references.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    #[serde(rename = "query")]
    pub text: String,
    #[serde(rename = "bindVars")]
    pub bind_vars: Map<String, Value>,
}

/// Returns true if `name` can be used as an AQL variable.
pub fn is_valid_variable(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_well = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');

    starts_well
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !KEYWORDS.iter().any(|keyword| keyword.eq_ignore_ascii_case(name))
}

/// Quotes an attribute name with backticks.
pub fn quote(name: &str) -> String {
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('`');
    for c in name.chars() {
        if c == '`' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('`');
    quoted
}

#[derive(Debug, Default)]
struct Counters {
    value: usize,
    collection: usize,
    edges: usize,
    graph: usize,
    offset: usize,
    count: usize,
}

/// Compiles [`Query`] trees into [`CompiledQuery`] values.
#[derive(Debug)]
pub struct AqlCompiler {
    current: String,
    bind_vars: Map<String, Value>,
    counters: Counters,
}

impl AqlCompiler {
    /// Compiles a query.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::UnsupportedQuery`] if the tree has no AQL lowering: a node after a
    /// projection, a traversal with `min > max` or without edge collections, or a membership test
    /// against a literal that is not an array.
    pub fn compile(query: &Query) -> ArangoResult<CompiledQuery> {
        let root = query.root();
        let mut compiler = AqlCompiler {
            current: root.alias().to_string(),
            bind_vars: Map::new(),
            counters: Counters::default(),
        };

        let collection = compiler.bind_collection(root.schema().name());
        let mut statements = vec![format!("FOR {} IN {collection}", root.alias())];
        let mut projection: Option<&[Projection]> = None;

        for node in query.nodes() {
            if projection.is_some() {
                return Err(ArangoError::unsupported(node.kind(), "nodes cannot follow a projection"));
            }

            match node {
                QueryNode::Filter(expr) => {
                    let condition = compiler.visit_expr(expr)?;
                    statements.push(format!("FILTER {condition}"));
                }
                QueryNode::Sort(keys) => {
                    let keys: Vec<String> = keys
                        .iter()
                        .map(|sort| {
                            let direction = match sort.direction {
                                SortDirection::Asc => "ASC",
                                SortDirection::Desc => "DESC",
                            };
                            format!("{} {direction}", compiler.field(&sort.field))
                        })
                        .collect();
                    statements.push(format!("SORT {}", keys.join(", ")));
                }
                QueryNode::Limit { offset, count } => {
                    let limit = match offset {
                        Some(offset) => {
                            let offset = compiler.bind_counted("offset", Value::from(*offset));
                            let count = compiler.bind_counted("count", Value::from(*count));
                            format!("{offset}, {count}")
                        }
                        None => compiler.bind_counted("count", Value::from(*count)),
                    };
                    statements.push(format!("LIMIT {limit}"));
                }
                QueryNode::Project { fields, .. } => projection = Some(fields.as_slice()),
                QueryNode::Traverse(traversal) => {
                    statements.push(compiler.traversal(traversal)?);
                    compiler.current = traversal.vertex().alias().to_string();
                }
                QueryNode::Join(binding) => {
                    let collection = compiler.bind_collection(binding.schema().name());
                    statements.push(format!("FOR {} IN {collection}", binding.alias()));
                    compiler.current = binding.alias().to_string();
                }
            }
        }

        let result = match projection {
            Some(fields) => {
                let attributes: Vec<String> = fields
                    .iter()
                    .map(|projection| {
                        let source = match projection.source() {
                            ProjectionSource::Field(field) => compiler.field(field),
                            ProjectionSource::Alias(alias) => alias.clone(),
                        };
                        format!("{}: {source}", quote(projection.name()))
                    })
                    .collect();
                format!("{{{}}}", attributes.join(", "))
            }
            None => compiler.current.clone(),
        };
        statements.push(format!("RETURN {result}"));

        let compiled = CompiledQuery {
            text: statements.join(" "),
            bind_vars: compiler.bind_vars,
        };
        tracing::debug!(
            collection = root.schema().name(),
            nodes = query.len(),
            bind_vars = compiled.bind_vars.len(),
            "compiled query"
        );
        Ok(compiled)
    }

    fn bind_counted(&mut self, kind: &str, value: Value) -> String {
        let counter = match kind {
            "offset" => &mut self.counters.offset,
            "count" => &mut self.counters.count,
            "graph" => &mut self.counters.graph,
            _ => &mut self.counters.value,
        };
        let name = format!("{kind}_{counter}");
        *counter += 1;
        self.bind_vars.insert(name.clone(), value);
        format!("@{name}")
    }

    fn bind_value(&mut self, value: Value) -> String {
        self.bind_counted("value", value)
    }

    fn bind_collection(&mut self, name: &str) -> String {
        let key = format!("@collection_{}", self.counters.collection);
        self.counters.collection += 1;
        self.bind_vars.insert(key.clone(), Value::from(name));
        format!("@{key}")
    }

    fn bind_edges(&mut self, name: &str) -> String {
        let key = format!("@edges_{}", self.counters.edges);
        self.counters.edges += 1;
        self.bind_vars.insert(key.clone(), Value::from(name));
        format!("@{key}")
    }

    fn field(&self, field: &Field) -> String {
        let alias = field.alias().unwrap_or(&self.current);
        let mut rendered = alias.to_string();
        for segment in field.segments() {
            rendered.push('.');
            rendered.push_str(&quote(segment));
        }
        rendered
    }

    fn traversal(&mut self, traversal: &Traversal) -> ArangoResult<String> {
        if traversal.min_depth() > traversal.max_depth() {
            return Err(ArangoError::unsupported(
                "Traverse",
                format!("depth {}..{} is empty", traversal.min_depth(), traversal.max_depth()),
            ));
        }

        let mut variables = traversal.vertex().alias().to_string();
        if let Some(edge) = traversal.edge() {
            variables.push_str(", ");
            variables.push_str(edge.alias());
        }
        let start = traversal.start().unwrap_or(&self.current).to_string();

        let target = match traversal.target() {
            TraversalTarget::Graph(name) => {
                format!("GRAPH {}", self.bind_counted("graph", Value::from(name.as_str())))
            }
            TraversalTarget::EdgeCollections(edges) => {
                if edges.is_empty() {
                    return Err(ArangoError::unsupported("Traverse", "no edge collections to follow"));
                }
                edges
                    .iter()
                    .map(|edge| self.bind_edges(edge))
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        };

        Ok(format!(
            "FOR {variables} IN {}..{} {} {start}._id {target}",
            traversal.min_depth(),
            traversal.max_depth(),
            traversal.direction().keyword(),
        ))
    }

    fn operand(&mut self, operand: &Operand) -> String {
        match operand {
            Operand::Value(value) => self.bind_value(value.clone()),
            Operand::Field(field) => self.field(field),
        }
    }

    /// Joins sub-expressions. An empty group binds its identity value.
    fn group(&mut self, exprs: &[Expr], joiner: &str, empty: bool) -> ArangoResult<String> {
        let parts = exprs
            .iter()
            .map(|expr| self.visit_expr(expr))
            .collect::<ArangoResult<Vec<_>>>()?;

        Ok(match parts.len() {
            0 => self.bind_counted("value", Value::Bool(empty)),
            1 => parts.into_iter().next().unwrap_or_default(),
            _ => format!("({})", parts.join(joiner)),
        })
    }
}

impl QueryVisitor for AqlCompiler {
    type Output = String;
    type Error = ArangoError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        self.group(exprs, " AND ", true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        self.group(exprs, " OR ", false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(format!("NOT ({})", self.visit_expr(expr)?))
    }

    fn visit_exists(&mut self, field: &Field, should_exist: bool) -> Result<Self::Output, Self::Error> {
        let op = if should_exist { "!=" } else { "==" };
        Ok(format!("{} {op} null", self.field(field)))
    }

    fn visit_field(&mut self, field: &Field, op: FieldOp, value: &Operand) -> Result<Self::Output, Self::Error> {
        if matches!(op, FieldOp::AnyOf | FieldOp::NoneOf)
            && matches!(value, Operand::Value(v) if !v.is_array())
        {
            return Err(ArangoError::unsupported(
                "Filter",
                format!("{} needs an array of candidates", field.dotted()),
            ));
        }

        let lhs = self.field(field);
        let rhs = self.operand(value);
        let is_list = field.field_type().is_some_and(|t| t.is_list());

        Ok(match op {
            FieldOp::Eq => format!("{lhs} == {rhs}"),
            FieldOp::Ne => format!("{lhs} != {rhs}"),
            FieldOp::Gt => format!("{lhs} > {rhs}"),
            FieldOp::Gte => format!("{lhs} >= {rhs}"),
            FieldOp::Lt => format!("{lhs} < {rhs}"),
            FieldOp::Lte => format!("{lhs} <= {rhs}"),
            FieldOp::Contains if is_list => format!("{rhs} IN {lhs}"),
            FieldOp::Contains => format!("CONTAINS({lhs}, {rhs})"),
            FieldOp::NotContains if is_list => format!("{rhs} NOT IN {lhs}"),
            FieldOp::NotContains => format!("NOT CONTAINS({lhs}, {rhs})"),
            FieldOp::StartsWith => format!("STARTS_WITH({lhs}, {rhs})"),
            FieldOp::EndsWith => format!("RIGHT({lhs}, LENGTH({rhs})) == {rhs}"),
            FieldOp::AnyOf if is_list => format!("{lhs} ANY IN {rhs}"),
            FieldOp::AnyOf => format!("{lhs} IN {rhs}"),
            FieldOp::NoneOf if is_list => format!("{lhs} NONE IN {rhs}"),
            FieldOp::NoneOf => format!("{lhs} NOT IN {rhs}"),
        })
    }
}

//! Immutable query expression trees.
//!
//! A [`Query`] starts at a collection and grows one node at a time. Every builder call returns a
//! new query that shares all existing nodes with the one it was built from, so partially built
//! queries can be reused freely:
//!
//! ```ignore
//! use arangolayer::{expr::Field, query::{Query, SortDirection}};
//!
//! let adults = Query::new(&users).filter(Field::new("age").gt(18))?;
//! let page = adults.sort("name", SortDirection::Asc)?.limit(10);
//! let oldest = adults.sort("age", SortDirection::Desc)?.limit(1);
//! ```
//!
//! Nodes apply in the order they were added, like the statements of an AQL pipeline. Field
//! references are checked against the bound schemas when a node is added; a reference to an
//! undeclared field fails right there with [`ArangoError::UnknownField`].

use std::sync::Arc;

use crate::{
    aql::{self, CompiledQuery},
    error::{ArangoError, ArangoResult},
    expr::{Expr, Field, FieldOp, Operand, QueryVisitor},
    field::FieldType,
    graph::GraphDefinition,
    schema::Schema,
};

const ROOT_ALIAS: &str = "doc";

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One sort key.
#[derive(Debug, Clone)]
pub struct Sort {
    pub field: Field,
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(field: impl Into<Field>) -> Self {
        Self { field: field.into(), direction: SortDirection::Asc }
    }

    pub fn desc(field: impl Into<Field>) -> Self {
        Self { field: field.into(), direction: SortDirection::Desc }
    }
}

/// A query variable bound to the documents of a schema.
#[derive(Debug, Clone)]
pub struct Binding {
    alias: String,
    schema: Arc<Schema>,
}

impl Binding {
    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

/// Edge direction followed by a traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outbound,
    Inbound,
    Any,
}

impl Direction {
    pub fn keyword(&self) -> &'static str {
        match self {
            Direction::Outbound => "OUTBOUND",
            Direction::Inbound => "INBOUND",
            Direction::Any => "ANY",
        }
    }
}

/// What a traversal walks over: a named graph or a set of edge collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraversalTarget {
    Graph(String),
    EdgeCollections(Vec<String>),
}

impl TraversalTarget {
    pub fn graph(graph: &GraphDefinition) -> Self {
        TraversalTarget::Graph(graph.name.clone())
    }

    pub fn edges(edges: &[&Arc<Schema>]) -> Self {
        TraversalTarget::EdgeCollections(edges.iter().map(|e| e.name().to_string()).collect())
    }
}

/// A graph traversal starting at the documents of a bound alias.
#[derive(Debug, Clone)]
pub struct Traversal {
    direction: Direction,
    min_depth: u32,
    max_depth: u32,
    target: TraversalTarget,
    vertex: Binding,
    edge: Option<Binding>,
    start: Option<String>,
}

impl Traversal {
    /// Creates a one-step traversal that binds reached vertices to `alias`.
    pub fn new(
        direction: Direction,
        target: TraversalTarget,
        alias: &str,
        vertices: &Arc<Schema>,
    ) -> Self {
        Self {
            direction,
            min_depth: 1,
            max_depth: 1,
            target,
            vertex: Binding {
                alias: alias.to_string(),
                schema: Arc::clone(vertices),
            },
            edge: None,
            start: None,
        }
    }

    pub fn outbound(target: TraversalTarget, alias: &str, vertices: &Arc<Schema>) -> Self {
        Self::new(Direction::Outbound, target, alias, vertices)
    }

    pub fn inbound(target: TraversalTarget, alias: &str, vertices: &Arc<Schema>) -> Self {
        Self::new(Direction::Inbound, target, alias, vertices)
    }

    pub fn any(target: TraversalTarget, alias: &str, vertices: &Arc<Schema>) -> Self {
        Self::new(Direction::Any, target, alias, vertices)
    }

    pub fn depth(mut self, min: u32, max: u32) -> Self {
        self.min_depth = min;
        self.max_depth = max;
        self
    }

    /// Also binds the traversed edges to `alias`.
    pub fn with_edge(mut self, alias: &str, edges: &Arc<Schema>) -> Self {
        self.edge = Some(Binding {
            alias: alias.to_string(),
            schema: Arc::clone(edges),
        });
        self
    }

    /// Starts from the documents of `alias` instead of the most recently bound alias.
    pub fn from_alias(mut self, alias: &str) -> Self {
        self.start = Some(alias.to_string());
        self
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn min_depth(&self) -> u32 {
        self.min_depth
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn target(&self) -> &TraversalTarget {
        &self.target
    }

    pub fn vertex(&self) -> &Binding {
        &self.vertex
    }

    pub fn edge(&self) -> Option<&Binding> {
        self.edge.as_ref()
    }

    /// The alias the traversal starts from; always set once the traversal is part of a query.
    pub fn start(&self) -> Option<&str> {
        self.start.as_deref()
    }
}

/// What a projected attribute is taken from.
#[derive(Debug, Clone)]
pub enum ProjectionSource {
    Field(Field),
    /// The whole document bound to an alias.
    Alias(String),
}

/// One attribute of a projection.
#[derive(Debug, Clone)]
pub struct Projection {
    name: String,
    source: ProjectionSource,
}

impl Projection {
    /// Projects a field under its own (last segment) name.
    pub fn field(field: impl Into<Field>) -> Self {
        let field = field.into();
        let name = field.segments().last().cloned().unwrap_or_default();
        Self { name, source: ProjectionSource::Field(field) }
    }

    /// Projects a field under another name.
    pub fn named(name: impl Into<String>, field: impl Into<Field>) -> Self {
        Self {
            name: name.into(),
            source: ProjectionSource::Field(field.into()),
        }
    }

    /// Projects the whole document bound to `alias`.
    pub fn alias(name: impl Into<String>, alias: &str) -> Self {
        Self {
            name: name.into(),
            source: ProjectionSource::Alias(alias.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &ProjectionSource {
        &self.source
    }
}

/// A node of the query tree.
#[derive(Debug, Clone)]
pub enum QueryNode {
    Filter(Expr),
    Sort(Vec<Sort>),
    Limit { offset: Option<u64>, count: u64 },
    /// Shapes result rows; `schema` describes the projected rows.
    Project { fields: Vec<Projection>, schema: Arc<Schema> },
    Traverse(Traversal),
    Join(Binding),
}

impl QueryNode {
    pub fn kind(&self) -> &'static str {
        match self {
            QueryNode::Filter(_) => "Filter",
            QueryNode::Sort(_) => "Sort",
            QueryNode::Limit { .. } => "Limit",
            QueryNode::Project { .. } => "Project",
            QueryNode::Traverse(_) => "Traverse",
            QueryNode::Join(_) => "Join",
        }
    }
}

#[derive(Debug)]
struct Link {
    node: QueryNode,
    parent: Option<Arc<Link>>,
}

#[derive(Debug, Clone)]
pub struct Query {
    root: Binding,
    tail: Option<Arc<Link>>,
    len: usize,
}

impl Query {
    /// Starts a query over the collection of `schema`, bound to the alias `doc`.
    pub fn new(schema: &Arc<Schema>) -> Self {
        Self {
            root: Binding {
                alias: ROOT_ALIAS.to_string(),
                schema: Arc::clone(schema),
            },
            tail: None,
            len: 0,
        }
    }

    /// Starts a query with a custom root alias.
    pub fn with_alias(schema: &Arc<Schema>, alias: &str) -> ArangoResult<Self> {
        check_alias("Query", alias)?;
        let mut query = Self::new(schema);
        query.root.alias = alias.to_string();
        Ok(query)
    }

    pub fn root(&self) -> &Binding {
        &self.root
    }

    /// Number of nodes after the root.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The nodes of the query, in the order they apply.
    pub fn nodes(&self) -> Vec<&QueryNode> {
        let mut nodes = Vec::with_capacity(self.len);
        let mut cursor = self.tail.as_deref();
        while let Some(link) = cursor {
            nodes.push(&link.node);
            cursor = link.parent.as_deref();
        }
        nodes.reverse();
        nodes
    }

    /// Every alias bound by the query, root first.
    pub fn bindings(&self) -> Vec<&Binding> {
        let mut bindings = vec![&self.root];
        for node in self.nodes() {
            match node {
                QueryNode::Join(binding) => bindings.push(binding),
                QueryNode::Traverse(traversal) => {
                    bindings.push(&traversal.vertex);
                    bindings.extend(traversal.edge.as_ref());
                }
                _ => {}
            }
        }
        bindings
    }

    /// The most recently bound document alias; the default result of the query.
    pub fn current(&self) -> &Binding {
        let mut cursor = self.tail.as_deref();
        while let Some(link) = cursor {
            match &link.node {
                QueryNode::Join(binding) => return binding,
                QueryNode::Traverse(traversal) => return &traversal.vertex,
                _ => cursor = link.parent.as_deref(),
            }
        }
        &self.root
    }

    /// Schema of the result rows: the projection schema if the query ends with a projection,
    /// otherwise the schema of the current alias.
    pub fn result_schema(&self) -> &Arc<Schema> {
        match self.tail.as_deref().map(|link| &link.node) {
            Some(QueryNode::Project { schema, .. }) => schema,
            _ => &self.current().schema,
        }
    }

    /// Adds a filter.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::UnknownField`] if the expression references an undeclared field
    /// or an alias the query does not bind.
    pub fn filter(&self, expr: Expr) -> ArangoResult<Query> {
        let expr = FieldResolver { query: self }.visit_expr(&expr)?;
        Ok(self.push(QueryNode::Filter(expr)))
    }

    /// Adds a single-key sort.
    pub fn sort(&self, field: impl Into<Field>, direction: SortDirection) -> ArangoResult<Query> {
        self.sort_by([Sort { field: field.into(), direction }])
    }

    /// Adds a multi-key sort.
    pub fn sort_by(&self, keys: impl IntoIterator<Item = Sort>) -> ArangoResult<Query> {
        let keys = keys
            .into_iter()
            .map(|sort| {
                Ok(Sort {
                    field: self.resolve_field(sort.field)?,
                    direction: sort.direction,
                })
            })
            .collect::<ArangoResult<Vec<_>>>()?;
        Ok(self.push(QueryNode::Sort(keys)))
    }

    pub fn limit(&self, count: u64) -> Query {
        self.push(QueryNode::Limit { offset: None, count })
    }

    /// Skips `offset` rows, then keeps at most `count`.
    pub fn slice(&self, offset: u64, count: u64) -> Query {
        self.push(QueryNode::Limit { offset: Some(offset), count })
    }

    /// Shapes each result row into an object with the given attributes.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::UnknownField`] for unresolvable fields or aliases and
    /// [`ArangoError::UnsupportedQuery`] for an empty projection or duplicate names.
    pub fn project(&self, projections: impl IntoIterator<Item = Projection>) -> ArangoResult<Query> {
        let mut fields = Vec::new();
        let mut row_fields: Vec<(String, FieldType)> = Vec::new();

        for projection in projections {
            if projection.name.is_empty() || row_fields.iter().any(|(n, _)| *n == projection.name) {
                return Err(ArangoError::unsupported(
                    "Project",
                    format!("invalid or duplicate attribute name {:?}", projection.name),
                ));
            }

            let (source, field_type) = match projection.source {
                ProjectionSource::Field(field) => {
                    let field = self.resolve_field(field)?;
                    let field_type = field.field_type().cloned().unwrap_or_else(FieldType::any);
                    (ProjectionSource::Field(field), field_type)
                }
                ProjectionSource::Alias(alias) => {
                    if self.binding(&alias).is_none() {
                        return Err(ArangoError::unknown_field(alias, "query"));
                    }
                    (ProjectionSource::Alias(alias), FieldType::any())
                }
            };

            row_fields.push((projection.name.clone(), field_type));
            fields.push(Projection { name: projection.name, source });
        }

        if fields.is_empty() {
            return Err(ArangoError::unsupported("Project", "nothing to project"));
        }

        let schema = Schema::projection(format!("{}#projection", self.root.schema.name()), row_fields);
        Ok(self.push(QueryNode::Project { fields, schema }))
    }

    /// Adds a traversal.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::UnsupportedQuery`] if a new alias is not a valid identifier or is
    /// already bound, and [`ArangoError::UnknownField`] if the start alias is not bound.
    pub fn traverse(&self, mut traversal: Traversal) -> ArangoResult<Query> {
        let start = match traversal.start.take() {
            Some(alias) => alias,
            None => self.current().alias.clone(),
        };
        if self.binding(&start).is_none() {
            return Err(ArangoError::unknown_field(format!("{start}._id"), "query"));
        }
        traversal.start = Some(start);

        self.check_new_alias("Traverse", &traversal.vertex.alias)?;
        if let Some(edge) = &traversal.edge {
            self.check_new_alias("Traverse", &edge.alias)?;
            if edge.alias == traversal.vertex.alias {
                return Err(ArangoError::unsupported(
                    "Traverse",
                    format!("alias {} bound twice", edge.alias),
                ));
            }
        }

        Ok(self.push(QueryNode::Traverse(traversal)))
    }

    /// Iterates over another collection for every row so far.
    pub fn join(&self, alias: &str, schema: &Arc<Schema>) -> ArangoResult<Query> {
        self.check_new_alias("Join", alias)?;
        Ok(self.push(QueryNode::Join(Binding {
            alias: alias.to_string(),
            schema: Arc::clone(schema),
        })))
    }

    /// Joins another collection and filters the joined rows with `on`.
    pub fn join_on(&self, alias: &str, schema: &Arc<Schema>, on: Expr) -> ArangoResult<Query> {
        self.join(alias, schema)?.filter(on)
    }

    /// Compiles the query into AQL text and bind parameters.
    pub fn compile(&self) -> ArangoResult<CompiledQuery> {
        aql::AqlCompiler::compile(self)
    }

    fn push(&self, node: QueryNode) -> Query {
        Query {
            root: self.root.clone(),
            tail: Some(Arc::new(Link {
                node,
                parent: self.tail.clone(),
            })),
            len: self.len + 1,
        }
    }

    fn binding(&self, alias: &str) -> Option<&Binding> {
        self.bindings().into_iter().find(|binding| binding.alias == alias)
    }

    fn check_new_alias(&self, node: &str, alias: &str) -> ArangoResult<()> {
        check_alias(node, alias)?;
        if self.binding(alias).is_some() {
            return Err(ArangoError::unsupported(node, format!("alias {alias} is already bound")));
        }
        Ok(())
    }

    fn resolve_field(&self, field: Field) -> ArangoResult<Field> {
        let alias = match field.alias() {
            Some(alias) => alias.to_string(),
            None => self.current().alias.clone(),
        };
        let binding = self
            .binding(&alias)
            .ok_or_else(|| ArangoError::unknown_field(field.dotted(), "query"))?;
        let field_type = binding
            .schema
            .resolve_path(field.segments())
            .map_err(|_| ArangoError::unknown_field(field.dotted(), binding.schema.name()))?;

        Ok(field.resolved(alias, field_type))
    }
}

fn check_alias(node: &str, alias: &str) -> ArangoResult<()> {
    if aql::is_valid_variable(alias) {
        Ok(())
    } else {
        Err(ArangoError::unsupported(node, format!("{alias:?} is not a valid variable name")))
    }
}

/// Rebuilds an expression with every field resolved against a query's bindings.
struct FieldResolver<'a> {
    query: &'a Query,
}

impl QueryVisitor for FieldResolver<'_> {
    type Output = Expr;
    type Error = ArangoError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(Expr::And(
            exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        ))
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(Expr::Or(
            exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        ))
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(self.visit_expr(expr)?.not())
    }

    fn visit_exists(&mut self, field: &Field, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(Expr::Exists(self.query.resolve_field(field.clone())?, should_exist))
    }

    fn visit_field(&mut self, field: &Field, op: FieldOp, value: &Operand) -> Result<Self::Output, Self::Error> {
        let value = match value {
            Operand::Field(other) => Operand::Field(self.query.resolve_field(other.clone())?),
            Operand::Value(value) => Operand::Value(value.clone()),
        };
        Ok(Expr::field(self.query.resolve_field(field.clone())?, op, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldDescriptor;

    fn users() -> Arc<Schema> {
        Schema::document("users")
            .field(FieldDescriptor::new("name", FieldType::string()).required())
            .field(FieldDescriptor::new("age", FieldType::int()))
            .build()
            .unwrap()
    }

    fn pets() -> Arc<Schema> {
        Schema::document("pets")
            .field(FieldDescriptor::new("owner", FieldType::string()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_shares_structure() {
        let base = Query::new(&users()).filter(Field::new("age").gt(18)).unwrap();
        let sorted = base.sort("name", SortDirection::Asc).unwrap();
        let limited = base.limit(5);

        assert_eq!(base.len(), 1);
        assert_eq!(sorted.nodes().iter().map(|n| n.kind()).collect::<Vec<_>>(), ["Filter", "Sort"]);
        assert_eq!(limited.nodes().iter().map(|n| n.kind()).collect::<Vec<_>>(), ["Filter", "Limit"]);
        assert!(std::ptr::eq(sorted.nodes()[0], base.nodes()[0]));
    }

    #[test]
    fn test_unknown_field_fails_at_build_time() {
        let query = Query::new(&users());

        let err = query.filter(Field::new("email").eq("a@b")).unwrap_err();
        assert!(matches!(err, ArangoError::UnknownField { ref field, ref scope } if field == "email" && scope == "users"));

        assert!(query.sort("email", SortDirection::Asc).is_err());
        assert!(query.project([Projection::field("email")]).is_err());

        for path in ["", "name.", "a..b"] {
            assert!(matches!(
                query.filter(Field::new(path).eq("x")),
                Err(ArangoError::UnknownField { .. })
            ));
        }
    }

    #[test]
    fn test_unqualified_fields_follow_the_current_alias() {
        let query = Query::new(&users()).join("p", &pets()).unwrap();

        assert_eq!(query.current().alias(), "p");
        assert!(query.filter(Field::new("owner").eq("x")).is_ok());
        assert!(query.filter(Field::new("name").eq("x")).is_err());
        assert!(query.filter(Field::of("doc", "name").eq("x")).is_ok());
        assert!(query.filter(Field::of("q", "name").eq("x")).is_err());
    }

    #[test]
    fn test_join_rejects_bound_and_invalid_aliases() {
        let query = Query::new(&users());

        assert!(matches!(query.join("doc", &pets()), Err(ArangoError::UnsupportedQuery { .. })));
        assert!(matches!(query.join("FOR", &pets()), Err(ArangoError::UnsupportedQuery { .. })));
        assert!(matches!(query.join("1x", &pets()), Err(ArangoError::UnsupportedQuery { .. })));
    }

    #[test]
    fn test_traversal_binds_vertices_and_edges() {
        let users = users();
        let knows = Schema::edge("knows").build().unwrap();
        let query = Query::new(&users)
            .traverse(
                Traversal::outbound(TraversalTarget::edges(&[&knows]), "friend", &users)
                    .with_edge("k", &knows),
            )
            .unwrap();

        let aliases: Vec<_> = query.bindings().iter().map(|b| b.alias().to_string()).collect();
        assert_eq!(aliases, ["doc", "friend", "k"]);
        assert!(query.filter(Field::of("k", "_from").eq("users/1")).is_ok());
        assert!(query.filter(Field::of("friend", "_from").eq("users/1")).is_err());
        assert_eq!(query.result_schema().name(), "users");
    }

    #[test]
    fn test_projection_schema_describes_rows() {
        let query = Query::new(&users())
            .project([Projection::field("name"), Projection::named("years", "age")])
            .unwrap();
        let schema = query.result_schema();

        assert_eq!(schema.fields().len(), 2);
        assert_eq!(schema.field("years").map(|f| f.field_type().clone()), Some(FieldType::int()));
        assert!(!schema.field("name").unwrap().is_required());
    }
}

//! Row/value knowledge graph on petgraph.
//!
//! Row nodes hold a dataset record's attributes; value nodes stand for one
//! distinct (column, value) pair and connect every row sharing it. Edges are
//! undirected and labeled with the column name.

use std::collections::{BTreeSet, HashMap};

use petgraph::algo::connected_components;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use tracing::warn;

use tablerag_core::{Attributes, CellValue, Error, Result};

/// What a graph node represents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodeKind {
    Row { index: usize },
    Value { column: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    #[serde(flatten)]
    pub kind: NodeKind,
    pub attributes: Attributes,
}

impl GraphNode {
    pub fn is_row(&self) -> bool {
        matches!(self.kind, NodeKind::Row { .. })
    }

    /// Display label: `Row <i>` or `<column>: <value>`.
    pub fn label(&self) -> String {
        match &self.kind {
            NodeKind::Row { index } => format!("Row {}", index),
            NodeKind::Value { column } => match self.attributes.get("value") {
                Some(v) => format!("{}: {}", column, v),
                None => column.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub relation: String,
}

pub fn row_node_id(index: usize) -> String {
    format!("row_{}", index)
}

pub fn value_node_id(column: &str, rendered: &str) -> String {
    format!("{}_{}", column, rendered)
}

/// In-memory knowledge graph for the currently loaded dataset.
pub struct KnowledgeGraph {
    graph: UnGraph<GraphNode, GraphEdge>,
    rows: HashMap<String, NodeIndex>,
    /// Keyed by (column, canonical value), the value node identity.
    values: HashMap<(String, String), NodeIndex>,
    /// Textual id -> value node, for id lookups.
    value_ids: HashMap<String, NodeIndex>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self {
            graph: UnGraph::default(),
            rows: HashMap::new(),
            values: HashMap::new(),
            value_ids: HashMap::new(),
        }
    }

    /// Drop every node and edge.
    pub fn clear(&mut self) {
        self.graph.clear();
        self.rows.clear();
        self.values.clear();
        self.value_ids.clear();
    }

    /// Add the node for dataset row `index`. Each row index may be added once.
    pub fn add_row_node(&mut self, index: usize, attributes: Attributes) -> Result<NodeIndex> {
        let id = row_node_id(index);
        if self.rows.contains_key(&id) {
            return Err(Error::Consistency(format!("row node {} already exists", id)));
        }
        if self.value_ids.contains_key(&id) {
            warn!("Row node id {} collides with a value node id", id);
        }

        let idx = self.graph.add_node(GraphNode {
            id: id.clone(),
            kind: NodeKind::Row { index },
            attributes,
        });
        self.rows.insert(id, idx);
        Ok(idx)
    }

    /// Node for the (column, value) pair, created on first sight.
    pub fn get_or_add_value_node(&mut self, column: &str, value: &CellValue) -> NodeIndex {
        let rendered = value.to_string();
        let key = (column.to_string(), rendered);
        if let Some(&idx) = self.values.get(&key) {
            return idx;
        }

        let id = value_node_id(column, &key.1);
        if self.rows.contains_key(&id) || self.value_ids.contains_key(&id) {
            warn!(
                "Value node id {} for column {:?} collides with an existing node id",
                id, column
            );
        }

        let mut attributes = Attributes::new();
        attributes.insert("value".to_string(), value.clone());
        attributes.insert("type".to_string(), CellValue::text(column));

        let idx = self.graph.add_node(GraphNode {
            id: id.clone(),
            kind: NodeKind::Value {
                column: column.to_string(),
            },
            attributes,
        });
        self.values.insert(key, idx);
        self.value_ids.entry(id).or_insert(idx);
        idx
    }

    /// Connect a row to a value. Re-adding an existing pair is a no-op.
    pub fn connect(&mut self, row: NodeIndex, value: NodeIndex, relation: &str) {
        self.graph.update_edge(
            row,
            value,
            GraphEdge {
                relation: relation.to_string(),
            },
        );
    }

    pub fn row_node(&self, id: &str) -> Option<&GraphNode> {
        self.rows.get(id).map(|&idx| &self.graph[idx])
    }

    /// Any node by textual id; row nodes win over colliding value ids.
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.rows
            .get(id)
            .or_else(|| self.value_ids.get(id))
            .map(|&idx| &self.graph[idx])
    }

    /// Direct neighbors of a row node, in edge creation order (column order).
    pub fn row_neighbors(&self, id: &str) -> Option<Vec<&GraphNode>> {
        let idx = *self.rows.get(id)?;
        let mut adjacent: Vec<(usize, NodeIndex)> = self
            .graph
            .edges(idx)
            .map(|e| {
                let other = if e.source() == idx { e.target() } else { e.source() };
                (e.id().index(), other)
            })
            .collect();
        adjacent.sort_by_key(|&(edge, _)| edge);
        Some(adjacent.into_iter().map(|(_, n)| &self.graph[n]).collect())
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// All nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.graph.node_weights()
    }

    /// All edges in creation order as (row node, value node, edge).
    pub fn edges(&self) -> impl Iterator<Item = (&GraphNode, &GraphNode, &GraphEdge)> {
        self.graph
            .edge_references()
            .map(|e| (&self.graph[e.source()], &self.graph[e.target()], e.weight()))
    }

    pub fn stats(&self) -> GraphStats {
        let num_value_nodes = self.values.len();
        let node_types: BTreeSet<&str> = self
            .nodes()
            .filter_map(|n| match &n.kind {
                NodeKind::Value { column } => Some(column.as_str()),
                NodeKind::Row { .. } => None,
            })
            .collect();
        let num_components = connected_components(&self.graph);

        GraphStats {
            num_nodes: self.graph.node_count(),
            num_edges: self.graph.edge_count(),
            node_types: node_types.len(),
            // An empty graph counts as connected; num_nodes == 0 marks it empty.
            is_connected: num_components <= 1,
            num_row_nodes: self.rows.len(),
            num_value_nodes,
            num_components,
        }
    }

    /// Enumerate nodes and edges for visualization. With `types`, value
    /// nodes of other columns (and their edges) are left out; row nodes are
    /// always kept.
    pub fn snapshot(&self, types: Option<&[String]>) -> GraphSnapshot {
        let keep = |node: &GraphNode| match (&node.kind, types) {
            (NodeKind::Value { column }, Some(selected)) => selected.iter().any(|t| t == column),
            _ => true,
        };

        let nodes = self
            .nodes()
            .filter(|n| keep(*n))
            .map(|n| SnapshotNode {
                id: n.id.clone(),
                kind: if n.is_row() { "row" } else { "value" },
                label: n.label(),
                attributes: n.attributes.clone(),
            })
            .collect();

        let edges = self
            .edges()
            .filter(|(a, b, _)| keep(*a) && keep(*b))
            .map(|(a, b, e)| SnapshotEdge {
                source: a.id.clone(),
                target: b.id.clone(),
                relation: e.relation.clone(),
            })
            .collect();

        GraphSnapshot { nodes, edges }
    }
}

impl Default for KnowledgeGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub num_nodes: usize,
    pub num_edges: usize,
    /// Distinct `type` values across value nodes.
    pub node_types: usize,
    pub is_connected: bool,
    pub num_row_nodes: usize,
    pub num_value_nodes: usize,
    pub num_components: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotNode {
    pub id: String,
    pub kind: &'static str,
    pub label: String,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotEdge {
    pub source: String,
    pub target: String,
    pub relation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<SnapshotNode>,
    pub edges: Vec<SnapshotEdge>,
}

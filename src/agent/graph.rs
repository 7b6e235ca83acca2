//! Graph shape
//!
//! Nodes, the edges between them and the nodes that suspend the run for
//! human approval. Both agents share one shape:
//!
//! ```text
//! chat ──route──> search ───────────> chat
//!      ──route──> propose ─(approve)─> perform ──> chat
//!      ──route──> summary ──────────> chat        (food only)
//!      ──route──> END
//! ```

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::agent::router::{RouteTable, Step};
use crate::agent::AgentKind;
use crate::core::{EventflowError, Result};

/// A node of the agent graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    /// Calls the completion service with the agent's tools bound
    Chat,
    /// Answers a search tool call
    Search,
    /// Announces a mutation; the run suspends after it
    Propose,
    /// Executes an approved mutation
    Perform,
    /// Computes analytics over the saved menu
    Summary,
}

impl Node {
    /// Node name as known to clients of the given agent
    pub fn name(self, agent: AgentKind) -> &'static str {
        match (self, agent) {
            (Node::Chat, _) => "chat_node",
            (Node::Search, _) => "search_node",
            (Node::Propose, AgentKind::Food) => "foods_node",
            (Node::Propose, AgentKind::License) => "licenses_node",
            (Node::Perform, AgentKind::Food) => "perform_foods_node",
            (Node::Perform, AgentKind::License) => "perform_licenses_node",
            (Node::Summary, _) => "summary_node",
        }
    }
}

/// Outgoing edge of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// Always continue at this node
    To(Node),
    /// Ask the router
    Route,
}

/// Nodes, edges and interrupt points of one agent's graph
#[derive(Debug, Clone)]
pub struct GraphSpec {
    pub agent: AgentKind,
    pub entry: Node,
    edges: HashMap<Node, Edge>,
    interrupt_after: HashSet<Node>,
    routes: RouteTable,
}

impl GraphSpec {
    pub fn for_agent(agent: AgentKind) -> Self {
        let mut edges = HashMap::from([
            (Node::Chat, Edge::Route),
            (Node::Search, Edge::To(Node::Chat)),
            (Node::Propose, Edge::To(Node::Perform)),
            (Node::Perform, Edge::To(Node::Chat)),
        ]);
        if agent == AgentKind::Food {
            edges.insert(Node::Summary, Edge::To(Node::Chat));
        }

        Self {
            agent,
            entry: Node::Chat,
            edges,
            interrupt_after: HashSet::from([Node::Propose]),
            routes: RouteTable::for_agent(agent),
        }
    }

    /// Outgoing edge; `None` for nodes the graph does not contain
    pub fn edge(&self, node: Node) -> Option<Edge> {
        self.edges.get(&node).copied()
    }

    pub fn contains(&self, node: Node) -> bool {
        self.edges.contains_key(&node)
    }

    pub fn interrupts_after(&self, node: Node) -> bool {
        self.interrupt_after.contains(&node)
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Every edge and route must land on a node of this graph
    pub fn validate(&self) -> Result<()> {
        let targets = self
            .edges
            .values()
            .filter_map(|edge| match edge {
                Edge::To(node) => Some(Step::Node(*node)),
                Edge::Route => None,
            })
            .chain(self.routes.targets());

        for target in targets.chain(std::iter::once(Step::Node(self.entry))) {
            if let Step::Node(node) = target {
                if !self.contains(node) {
                    return Err(EventflowError::config(format!(
                        "{} graph has no node {}",
                        self.agent,
                        node.name(self.agent)
                    )));
                }
            }
        }
        Ok(())
    }
}

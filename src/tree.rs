//! the canonical policy tree
//!
//! Nodes live in an arena in pre-order, the root is always the first node. Children are addressed by
//! [NodeId] and every node knows its parent, there is no shared ownership between nodes.
use crate::{
	matcher::Matcher,
	route::{ObjectMatcher, Route, RouteConfig},
};

/// index of a node inside its [PolicyTree]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

/// a policy with its matchers in canonical form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyNode {
	pub id: String,
	/// the node's own matchers, never inherited
	pub matchers: Vec<Matcher>,
	pub config: RouteConfig,
	pub continue_matching: bool,
	pub children: Vec<NodeId>,
	pub parent: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyTree {
	/// never empty, stored in pre-order
	nodes: Vec<PolicyNode>,
}

impl PolicyTree {
	/// `nodes` has to be non-empty and in pre-order with the root first
	pub(crate) fn from_nodes(nodes: Vec<PolicyNode>) -> Self {
		debug_assert!(!nodes.is_empty());
		Self { nodes }
	}

	pub fn root(&self) -> NodeId {
		NodeId(0)
	}

	pub fn node(&self, id: NodeId) -> &PolicyNode {
		&self.nodes[id.0]
	}

	pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut PolicyNode {
		&mut self.nodes[id.0]
	}

	/// all nodes, parents before their children and siblings left to right
	pub fn pre_order(&self) -> impl Iterator<Item = NodeId> {
		(0..self.nodes.len()).map(NodeId)
	}

	/// look up a node by its route id
	pub fn find(&self, route_id: &str) -> Option<NodeId> {
		self.nodes.iter().position(|node| node.id == route_id).map(NodeId)
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	/// Renders the tree back into the server shape. Matchers end up in `object_matchers` only.
	pub fn to_route(&self) -> Route {
		self.render(self.root())
	}

	fn render(&self, id: NodeId) -> Route {
		let node = self.node(id);
		let RouteConfig {
			receiver,
			group_by,
			group_wait,
			group_interval,
			repeat_interval,
			mute_time_intervals,
			active_time_intervals,
		} = node.config.clone();

		let object_matchers: Vec<ObjectMatcher> = node
			.matchers
			.iter()
			.map(|m| (m.name().to_string(), m.operator().to_string(), m.value().to_string()))
			.collect();
		let routes: Vec<Route> = node.children.iter().map(|child| self.render(*child)).collect();

		Route {
			id: Some(node.id.clone()),
			receiver,
			group_by,
			group_wait,
			group_interval,
			repeat_interval,
			mute_time_intervals,
			active_time_intervals,
			continue_matching: node.continue_matching.then_some(true),
			object_matchers: (!object_matchers.is_empty()).then_some(object_matchers),
			routes: (!routes.is_empty()).then_some(routes),
			..Default::default()
		}
	}
}

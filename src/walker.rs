//! Finds the policies responsible for a label set.
//!
//! The walk is depth first and left to right. A node whose matchers fail prunes its whole subtree. Among
//! the children of a matching node the first one that produces a match stops the search unless it has
//! `continue` set. A matching node without matching descendants is itself the match.
use crate::{
	labels::LabelSet,
	matcher::matches_all,
	tree::{NodeId, PolicyTree},
};

/// All nodes responsible for `labels`, in discovery order. Empty if the root itself doesn't match.
pub fn find_matching_nodes(tree: &PolicyTree, labels: &LabelSet) -> Vec<NodeId> {
	find_from(tree, tree.root(), labels)
}

/// [find_matching_nodes] starting at an arbitrary node
pub fn find_from(tree: &PolicyTree, id: NodeId, labels: &LabelSet) -> Vec<NodeId> {
	let node = tree.node(id);
	if !matches_all(&node.matchers, labels) {
		return Vec::new();
	}

	let mut matches = Vec::new();
	for child in &node.children {
		let child_matches = find_from(tree, *child, labels);
		if child_matches.is_empty() {
			continue;
		}

		matches.extend(child_matches);

		if !tree.node(*child).continue_matching {
			tracing::trace!(route = %tree.node(*child).id, "matched without continue, skipping remaining siblings");
			break;
		}
	}

	if matches.is_empty() {
		matches.push(id);
	}

	matches
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;
	use crate::normalize::normalize;

	fn tree(value: serde_json::Value) -> PolicyTree {
		normalize(&serde_json::from_value(value).unwrap()).unwrap()
	}

	fn labels(pairs: &[(&str, &str)]) -> LabelSet {
		pairs.iter().copied().collect()
	}

	fn ids(tree: &PolicyTree, nodes: Vec<NodeId>) -> Vec<String> {
		nodes.into_iter().map(|id| tree.node(id).id.clone()).collect()
	}

	#[test]
	fn first_match_wins() {
		let tree = tree(json!({
			"continue": true,
			"routes": [
				{"id": "A", "matchers": ["team=sre"]},
				{"id": "B", "matchers": ["team=sre", "severity=critical"]}
			]
		}));

		let matches = find_matching_nodes(&tree, &labels(&[("team", "sre"), ("severity", "critical")]));
		assert_eq!(ids(&tree, matches), ["A"]);
	}

	#[test]
	fn continue_visits_later_siblings() {
		let tree = tree(json!({
			"routes": [
				{"id": "A", "matchers": ["team=sre"], "continue": true},
				{"id": "B", "matchers": ["team=sre", "severity=critical"]},
				{"id": "C", "matchers": ["team=sre"]}
			]
		}));

		let matches = find_matching_nodes(&tree, &labels(&[("team", "sre"), ("severity", "critical")]));
		assert_eq!(ids(&tree, matches), ["A", "B"]);
	}

	#[test]
	fn non_matching_siblings_are_skipped() {
		let tree = tree(json!({
			"routes": [
				{"id": "ops", "matchers": ["team=ops"]},
				{"id": "sre", "matchers": ["team=sre"]}
			]
		}));

		assert_eq!(ids(&tree, find_matching_nodes(&tree, &labels(&[("team", "sre")]))), ["sre"]);
	}

	#[test]
	fn falls_back_to_the_matching_node() {
		let tree = tree(json!({
			"routes": [{"id": "leaf", "matchers": ["team=sre"]}]
		}));

		assert_eq!(ids(&tree, find_matching_nodes(&tree, &labels(&[("team", "sre")]))), ["leaf"]);
		assert_eq!(ids(&tree, find_matching_nodes(&tree, &labels(&[("team", "ops")]))), ["root"]);
	}

	#[test]
	fn parent_matches_if_no_descendant_does() {
		let tree = tree(json!({
			"routes": [{
				"id": "sre",
				"matchers": ["team=sre"],
				"routes": [{"id": "sre-critical", "matchers": ["severity=critical"]}]
			}]
		}));

		assert_eq!(
			ids(&tree, find_matching_nodes(&tree, &labels(&[("team", "sre"), ("severity", "critical")]))),
			["sre-critical"]
		);
		assert_eq!(
			ids(&tree, find_matching_nodes(&tree, &labels(&[("team", "sre"), ("severity", "info")]))),
			["sre"]
		);
	}

	#[test]
	fn continue_collects_nested_matches_in_order() {
		let tree = tree(json!({
			"routes": [
				{
					"id": "a",
					"continue": true,
					"routes": [
						{"id": "a1", "continue": true},
						{"id": "a2"}
					]
				},
				{"id": "b"}
			]
		}));

		assert_eq!(ids(&tree, find_matching_nodes(&tree, &LabelSet::new())), ["a1", "a2", "b"]);
	}

	#[test]
	fn root_mismatch_matches_nothing() {
		let tree = tree(json!({
			"matchers": ["env=prod"],
			"routes": [{"id": "any"}]
		}));

		assert!(find_matching_nodes(&tree, &labels(&[("env", "dev")])).is_empty());
		assert_eq!(ids(&tree, find_matching_nodes(&tree, &labels(&[("env", "prod")]))), ["any"]);
	}
}

//! The two public matching operations.
//!
//! Both take the whole policy tree and their alerts by value-like references and build a fresh result,
//! nothing is cached between calls. They are what [MatcherWorker][crate::worker::MatcherWorker] serves.
use hashbrown::HashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
	error::RoutingError,
	inherit::inherited_tree,
	labels::LabelSet,
	matcher::{match_details, LabelMatch},
	normalize::{normalize, unquote_tree},
	partition::AlertGroup,
	route::{Route, RouteConfig},
	tree::{NodeId, PolicyTree},
	walker::find_matching_nodes,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatchOptions {
	/// remove server side quoting from matchers before matching
	pub unquote_matchers: bool,
}

/// filtered alert groups per route id, in pre-order of the tree
pub type RouteGroupsMap = IndexMap<String, Vec<AlertGroup>>;

/// which policies a batch of label sets resolved to
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMatchReport {
	pub root_id: String,
	/// the normalized tree with inherited settings filled in
	pub expanded_tree: Route,
	/// one entry per input label set, in input order
	pub instances: Vec<InstanceMatch>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceMatch {
	pub labels: LabelSet,
	/// empty if the root itself didn't match
	pub routes: Vec<MatchedRoute>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedRoute {
	pub id: String,
	/// effective settings after inheritance
	pub config: RouteConfig,
	/// which label satisfied each of the route's own matchers
	pub matched_labels: Vec<LabelMatch>,
}

fn prepare(root: &Route, options: MatchOptions) -> Result<PolicyTree, RoutingError> {
	let tree = normalize(root)?;

	if options.unquote_matchers {
		unquote_tree(&tree)
	} else {
		Ok(tree)
	}
}

/// For every node of the tree the alert groups filtered down to the alerts routed to it. Every node gets
/// an entry, nodes without alerts map to an empty list.
pub fn get_route_groups_map(
	root: &Route,
	groups: &[AlertGroup],
	options: MatchOptions,
) -> Result<RouteGroupsMap, RoutingError> {
	let tree = prepare(root, options)?;

	// alerts with identical labels always take the same path
	let mut routed: HashMap<&LabelSet, Vec<NodeId>> = HashMap::new();
	for alert in groups.iter().flat_map(|group| &group.alerts) {
		routed
			.entry(&alert.labels)
			.or_insert_with(|| find_matching_nodes(&tree, &alert.labels));
	}

	let map: RouteGroupsMap = tree
		.pre_order()
		.map(|id| {
			let filtered = groups
				.iter()
				.filter_map(|group| {
					group.retain_alerts(|alert| {
						routed.get(&alert.labels).map_or(false, |nodes| nodes.contains(&id))
					})
				})
				.collect();

			(tree.node(id).id.clone(), filtered)
		})
		.collect();

	tracing::debug!(
		routes = tree.len(),
		groups = groups.len(),
		label_sets = routed.len(),
		"computed route groups map"
	);

	Ok(map)
}

/// Resolves each label set to the policies it would be routed to.
pub fn match_instances_to_routes(
	root: &Route,
	label_sets: &[LabelSet],
	options: MatchOptions,
) -> Result<RouteMatchReport, RoutingError> {
	let tree = prepare(root, options)?;
	let expanded = inherited_tree(&tree);

	let instances = label_sets
		.iter()
		.map(|labels| {
			let routes = find_matching_nodes(&tree, labels)
				.into_iter()
				.map(|id| {
					let node = tree.node(id);
					MatchedRoute {
						id: node.id.clone(),
						config: expanded.node(id).config.clone(),
						matched_labels: match_details(&node.matchers, labels).unwrap_or_default(),
					}
				})
				.collect();

			InstanceMatch { labels: labels.clone(), routes }
		})
		.collect();

	tracing::debug!(routes = tree.len(), label_sets = label_sets.len(), "matched instances to routes");

	Ok(RouteMatchReport {
		root_id: tree.node(tree.root()).id.clone(),
		expanded_tree: expanded.to_route(),
		instances,
	})
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;

	fn route() -> Route {
		serde_json::from_value(json!({
			"id": "root",
			"receiver": "default",
			"group_by": ["alertname"],
			"continue": true,
			"routes": [
				{"id": "A", "receiver": "sre-pager", "matchers": ["team=sre"]},
				{"id": "B", "object_matchers": [["team", "=", "sre"], ["severity", "=", "critical"]]},
				{"id": "quoted", "object_matchers": [["\"team\"", "=", "\"db ops\""]]}
			]
		}))
		.unwrap()
	}

	fn groups() -> Vec<AlertGroup> {
		serde_json::from_value(json!([
			{
				"labels": {"alertname": "HighLatency"},
				"receiver": {"name": "default"},
				"alerts": [
					{"labels": {"team": "sre", "severity": "critical"}, "fingerprint": "1"},
					{"labels": {"team": "db ops"}, "fingerprint": "2"}
				]
			},
			{
				"labels": {"alertname": "Watchdog"},
				"receiver": {"name": "default"},
				"alerts": [{"labels": {"team": "sre", "severity": "critical"}, "fingerprint": "3"}]
			}
		]))
		.unwrap()
	}

	fn fingerprints(groups: &[AlertGroup]) -> Vec<String> {
		groups
			.iter()
			.flat_map(|group| &group.alerts)
			.filter_map(|alert| alert.fingerprint().map(str::to_string))
			.collect()
	}

	#[test]
	fn every_route_gets_an_entry() {
		let map = get_route_groups_map(&route(), &groups(), MatchOptions::default()).unwrap();

		assert_eq!(map.keys().collect::<Vec<_>>(), ["root", "A", "B", "quoted"]);
		assert_eq!(fingerprints(&map["A"]), ["1", "3"]);
		assert!(map["B"].is_empty());
		// without unquoting the quoted matcher never matches, the alert falls back to the root
		assert!(map["quoted"].is_empty());
		assert_eq!(fingerprints(&map["root"]), ["2"]);
		assert_eq!(map["root"].len(), 1);
	}

	#[test]
	fn unquotes_on_request() {
		let options = MatchOptions { unquote_matchers: true };
		let map = get_route_groups_map(&route(), &groups(), options).unwrap();

		assert_eq!(fingerprints(&map["quoted"]), ["2"]);
		assert!(map["root"].is_empty());
	}

	#[test]
	fn rejects_invalid_trees() {
		let mut route = route();
		route.matchers = Some(vec!["{broken}".to_string()]);

		assert!(get_route_groups_map(&route, &groups(), MatchOptions::default()).is_err());
		assert!(match_instances_to_routes(&route, &[], MatchOptions::default()).is_err());
	}

	#[test]
	fn reports_matches_per_label_set() {
		let label_sets: Vec<LabelSet> = vec![
			[("team", "sre"), ("severity", "critical")].into_iter().collect(),
			[("team", "ops")].into_iter().collect(),
		];

		let report = match_instances_to_routes(&route(), &label_sets, MatchOptions::default()).unwrap();

		assert_eq!(report.root_id, "root");
		assert_eq!(report.instances.len(), 2);

		let first = &report.instances[0];
		assert_eq!(first.labels, label_sets[0]);
		assert_eq!(first.routes.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), ["A"]);
		assert_eq!(first.routes[0].config.receiver.as_deref(), Some("sre-pager"));
		assert_eq!(first.routes[0].config.group_by, Some(vec!["alertname".to_string()]));
		assert_eq!(first.routes[0].matched_labels.len(), 1);
		assert_eq!(first.routes[0].matched_labels[0].label, ("team".to_string(), "sre".to_string()));

		let second = &report.instances[1];
		assert_eq!(second.routes.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), ["root"]);
		assert!(second.routes[0].matched_labels.is_empty());

		// the expanded tree carries inherited settings
		assert_eq!(report.expanded_tree.children()[1].receiver.as_deref(), Some("default"));
	}

	#[test]
	fn report_serializes_to_plain_json() {
		let label_sets: Vec<LabelSet> = vec![[("team", "sre")].into_iter().collect()];
		let report = match_instances_to_routes(&route(), &label_sets, MatchOptions::default()).unwrap();

		let value = serde_json::to_value(&report).unwrap();
		assert_eq!(value["rootId"], "root");
		assert_eq!(value["instances"][0]["labels"], json!({"team": "sre"}));
		assert_eq!(value["instances"][0]["routes"][0]["id"], "A");
		assert_eq!(
			value["instances"][0]["routes"][0]["matchedLabels"][0]["matcher"],
			json!(["team", "=", "sre"])
		);
	}

	#[test]
	fn options_default_to_exact_matching() {
		let options: MatchOptions = serde_json::from_value(json!({})).unwrap();
		assert!(!options.unquote_matchers);

		let options: MatchOptions = serde_json::from_value(json!({"unquoteMatchers": true})).unwrap();
		assert!(options.unquote_matchers);
	}
}

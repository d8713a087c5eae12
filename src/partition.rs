//! Alert groups as returned by alertmanager and their partitioning by policy.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
	labels::LabelSet,
	tree::{NodeId, PolicyTree},
	walker::find_matching_nodes,
};

/// A single alert. Only the labels matter for routing, every other field is kept exactly as the server
/// sent it (timestamps, annotations, status, ...) and re-emitted unchanged.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct AlertInstance {
	#[serde(default)]
	pub labels: LabelSet,
	#[serde(flatten)]
	pub fields: Map<String, Value>,
}

impl AlertInstance {
	/// a string field like `fingerprint` or `startsAt`, as sent by the server
	pub fn field(&self, name: &str) -> Option<&str> {
		self.fields.get(name).and_then(Value::as_str)
	}

	pub fn fingerprint(&self) -> Option<&str> {
		self.field("fingerprint")
	}
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Receiver {
	pub name: String,
}

/// alerts the upstream alertmanager grouped together
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct AlertGroup {
	#[serde(default)]
	pub labels: LabelSet,
	#[serde(default)]
	pub receiver: Receiver,
	#[serde(default)]
	pub alerts: Vec<AlertInstance>,
}

impl AlertGroup {
	/// this group with only the alerts `keep` returns true for, `None` if no alert is left
	pub fn retain_alerts(&self, mut keep: impl FnMut(&AlertInstance) -> bool) -> Option<Self> {
		let alerts: Vec<AlertInstance> = self.alerts.iter().filter(|alert| keep(alert)).cloned().collect();
		if alerts.is_empty() {
			return None;
		}

		Some(Self { labels: self.labels.clone(), receiver: self.receiver.clone(), alerts })
	}
}

/// Filters every group down to the alerts routed to `target`.
///
/// An alert can be routed to several policies at once through `continue`. Groups without any remaining
/// alert are dropped.
pub fn matching_alert_groups(tree: &PolicyTree, target: NodeId, groups: &[AlertGroup]) -> Vec<AlertGroup> {
	groups
		.iter()
		.filter_map(|group| {
			group.retain_alerts(|alert| find_matching_nodes(tree, &alert.labels).contains(&target))
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;
	use crate::normalize::normalize;

	fn tree() -> PolicyTree {
		normalize(
			&serde_json::from_value(json!({
				"routes": [
					{"id": "sre", "matchers": ["team=sre"], "continue": true},
					{"id": "critical", "matchers": ["severity=critical"]}
				]
			}))
			.unwrap(),
		)
		.unwrap()
	}

	fn groups() -> Vec<AlertGroup> {
		serde_json::from_value(json!([
			{
				"labels": {"alertname": "HighLatency"},
				"receiver": {"name": "default"},
				"alerts": [
					{"labels": {"team": "sre", "severity": "critical"}, "fingerprint": "a1"},
					{"labels": {"team": "ops", "severity": "warning"}, "fingerprint": "a2"}
				]
			},
			{
				"labels": {"alertname": "DiskFull"},
				"receiver": {"name": "default"},
				"alerts": [
					{"labels": {"team": "ops", "severity": "critical"}, "fingerprint": "b1"}
				]
			}
		]))
		.unwrap()
	}

	fn fingerprints(groups: &[AlertGroup]) -> Vec<Vec<&str>> {
		groups
			.iter()
			.map(|group| group.alerts.iter().filter_map(AlertInstance::fingerprint).collect())
			.collect()
	}

	#[test]
	fn keeps_only_routed_alerts() {
		let tree = tree();
		let groups = groups();

		let sre = matching_alert_groups(&tree, tree.find("sre").unwrap(), &groups);
		assert_eq!(fingerprints(&sre), vec![vec!["a1"]]);
		assert_eq!(sre[0].labels, groups[0].labels);
		assert_eq!(sre[0].receiver.name, "default");

		// a1 continues past `sre` and is routed to `critical` as well
		let critical = matching_alert_groups(&tree, tree.find("critical").unwrap(), &groups);
		assert_eq!(fingerprints(&critical), vec![vec!["a1"], vec!["b1"]]);

		let root = matching_alert_groups(&tree, tree.root(), &groups);
		assert_eq!(fingerprints(&root), vec![vec!["a2"]]);
	}

	#[test]
	fn drops_groups_without_alerts() {
		let tree = tree();
		let groups = groups();

		let sre = matching_alert_groups(&tree, tree.find("sre").unwrap(), &groups);
		assert!(sre.iter().all(|group| group.labels.get("alertname") != Some("DiskFull")));
	}

	#[test]
	fn alerts_are_re_emitted_unchanged() {
		let raw = json!({
			"labels": {"team": "sre"},
			"startsAt": "2024-05-01T12:00:00+02:00",
			"endsAt": "0001-01-01T00:00:00.000Z",
			"updatedAt": "",
			"fingerprint": "abc"
		});

		let alert: AlertInstance = serde_json::from_value(raw.clone()).unwrap();
		assert_eq!(alert.fingerprint(), Some("abc"));
		assert_eq!(alert.field("startsAt"), Some("2024-05-01T12:00:00+02:00"));
		assert_eq!(serde_json::to_value(&alert).unwrap(), raw);
	}

	#[test]
	fn passes_unknown_alert_fields_through() {
		let groups: Vec<AlertGroup> = serde_json::from_value(json!([{
			"labels": {},
			"receiver": {"name": "default"},
			"alerts": [{
				"labels": {"team": "sre"},
				"startsAt": "2024-05-01T10:00:00Z",
				"status": {"state": "active", "silencedBy": [], "inhibitedBy": []},
				"receivers": [{"name": "default"}]
			}]
		}]))
		.unwrap();

		let tree = tree();
		let sre = matching_alert_groups(&tree, tree.find("sre").unwrap(), &groups);
		let alert = serde_json::to_value(&sre[0].alerts[0]).unwrap();

		assert_eq!(alert["status"]["state"], "active");
		assert_eq!(alert["receivers"][0]["name"], "default");
		assert_eq!(alert["startsAt"], "2024-05-01T10:00:00Z");
	}
}

//! data structures for deserializing notification policy trees
//!
//! The shape follows the alertmanager/grafana routing configuration, every field is optional.
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// `[name, op, value]` as found in `object_matchers`
pub type ObjectMatcher = (String, String, String);

/// one node of a policy tree as received from the server
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Route {
	/// stable identifier, unique within one snapshot
	pub id: Option<String>,

	pub receiver: Option<String>,
	pub group_by: Option<Vec<String>>,
	pub group_wait: Option<String>,
	pub group_interval: Option<String>,
	pub repeat_interval: Option<String>,
	pub mute_time_intervals: Option<Vec<String>>,
	pub active_time_intervals: Option<Vec<String>>,

	/// keep evaluating siblings after this route matched
	#[serde(rename = "continue")]
	pub continue_matching: Option<bool>,

	/// raw `name=value` strings
	pub matchers: Option<Vec<String>>,
	/// deprecated equality matchers
	#[serde(rename = "match")]
	pub match_equal: Option<IndexMap<String, String>>,
	/// deprecated regex matchers
	pub match_re: Option<IndexMap<String, String>>,
	pub object_matchers: Option<Vec<ObjectMatcher>>,

	pub routes: Option<Vec<Route>>,
}

impl Route {
	pub fn children(&self) -> &[Route] {
		self.routes.as_deref().unwrap_or_default()
	}

	pub fn config(&self) -> RouteConfig {
		RouteConfig {
			receiver: self.receiver.clone(),
			group_by: self.group_by.clone(),
			group_wait: self.group_wait.clone(),
			group_interval: self.group_interval.clone(),
			repeat_interval: self.repeat_interval.clone(),
			mute_time_intervals: self.mute_time_intervals.clone(),
			active_time_intervals: self.active_time_intervals.clone(),
		}
	}
}

/// The notification settings of a route, everything except matchers, `continue` and children.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouteConfig {
	pub receiver: Option<String>,
	pub group_by: Option<Vec<String>>,
	pub group_wait: Option<String>,
	pub group_interval: Option<String>,
	pub repeat_interval: Option<String>,
	pub mute_time_intervals: Option<Vec<String>>,
	pub active_time_intervals: Option<Vec<String>>,
}

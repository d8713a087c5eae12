//! inheritance of notification settings from parent to child policies
//!
//! Only receiver, grouping and the three timing settings are inherited. Matchers, `continue` and the
//! mute/active time intervals always belong to the policy that defines them.
use crate::{route::RouteConfig, tree::PolicyTree};

/// Settings a child adopts from its already resolved parent. Fields the child keeps are `None`.
pub fn compute_inherited(parent: &RouteConfig, child: &RouteConfig) -> RouteConfig {
	RouteConfig {
		receiver: inherit_string(&parent.receiver, &child.receiver),
		group_by: inherit_group_by(&parent.group_by, &child.group_by),
		group_wait: inherit_string(&parent.group_wait, &child.group_wait),
		group_interval: inherit_string(&parent.group_interval, &child.group_interval),
		repeat_interval: inherit_string(&parent.repeat_interval, &child.repeat_interval),
		mute_time_intervals: None,
		active_time_intervals: None,
	}
}

/// `child` with the settings it inherits from `parent` filled in
pub fn resolve(parent: &RouteConfig, child: &RouteConfig) -> RouteConfig {
	let inherited = compute_inherited(parent, child);

	RouteConfig {
		receiver: inherited.receiver.or_else(|| child.receiver.clone()),
		group_by: inherited.group_by.or_else(|| child.group_by.clone()),
		group_wait: inherited.group_wait.or_else(|| child.group_wait.clone()),
		group_interval: inherited.group_interval.or_else(|| child.group_interval.clone()),
		repeat_interval: inherited.repeat_interval.or_else(|| child.repeat_interval.clone()),
		mute_time_intervals: child.mute_time_intervals.clone(),
		active_time_intervals: child.active_time_intervals.clone(),
	}
}

/// Materializes the effective settings of every node, top down. A grandchild inherits from its parent's
/// resolved settings, so values propagate through any number of levels.
///
/// Matchers are left as they are, this tree is for inspection and never used for matching.
pub fn inherited_tree(tree: &PolicyTree) -> PolicyTree {
	let mut resolved = tree.clone();

	// pre-order visits every parent before its children
	for id in tree.pre_order() {
		if let Some(parent) = tree.node(id).parent {
			let config = resolve(&resolved.node(parent).config, &tree.node(id).config);
			resolved.node_mut(id).config = config;
		}
	}

	resolved
}

fn is_absent(value: &Option<String>) -> bool {
	value.as_deref().map_or(true, str::is_empty)
}

fn inherit_string(parent: &Option<String>, child: &Option<String>) -> Option<String> {
	if is_absent(child) && !is_absent(parent) {
		parent.clone()
	} else {
		None
	}
}

/// an empty list means "nothing configured" rather than "group by nothing"
fn inherit_group_by(parent: &Option<Vec<String>>, child: &Option<Vec<String>>) -> Option<Vec<String>> {
	let child_absent = child.as_ref().map_or(true, Vec::is_empty);
	let parent_present = parent.as_ref().map_or(false, |group_by| !group_by.is_empty());

	if child_absent && parent_present {
		parent.clone()
	} else {
		None
	}
}

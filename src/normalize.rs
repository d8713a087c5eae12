//! Turns a server provided [Route] into a canonical [PolicyTree].
//!
//! A route can carry its matchers in four encodings at the same time. They are converted in a fixed order
//! (raw strings, `match`, `match_re`, `object_matchers`) and concatenated without deduplication. Only the
//! canonical list survives, so nothing downstream ever looks at the legacy fields again.
use hashbrown::HashSet;
use indexmap::IndexMap;

use crate::{
	error::RoutingError,
	matcher::{parse_matcher, MatchOperator, Matcher},
	route::{ObjectMatcher, Route},
	tree::{NodeId, PolicyNode, PolicyTree},
};

/// id of a root route that didn't come with one
const ROOT_ID: &str = "root";

/// the matcher encodings of a single route
#[derive(Debug, Clone, Copy)]
enum MatcherEncoding<'a> {
	Raw(&'a [String]),
	Equal(&'a IndexMap<String, String>),
	Regex(&'a IndexMap<String, String>),
	Object(&'a [ObjectMatcher]),
}

impl<'a> MatcherEncoding<'a> {
	/// the encodings present on `route`, in conversion order
	fn of(route: &'a Route) -> impl Iterator<Item = MatcherEncoding<'a>> {
		[
			route.matchers.as_deref().map(MatcherEncoding::Raw),
			route.match_equal.as_ref().map(MatcherEncoding::Equal),
			route.match_re.as_ref().map(MatcherEncoding::Regex),
			route.object_matchers.as_deref().map(MatcherEncoding::Object),
		]
		.into_iter()
		.flatten()
	}

	fn convert(self, matchers: &mut Vec<Matcher>) -> Result<(), RoutingError> {
		match self {
			MatcherEncoding::Raw(raw) => {
				for raw in raw {
					matchers.push(parse_matcher(raw)?);
				}
			}
			MatcherEncoding::Equal(map) => {
				for (name, value) in map {
					matchers.push(Matcher::new(name.as_str(), MatchOperator::Equal, value.as_str())?);
				}
			}
			MatcherEncoding::Regex(map) => {
				for (name, value) in map {
					matchers.push(Matcher::new(name.as_str(), MatchOperator::RegexMatch, value.as_str())?);
				}
			}
			MatcherEncoding::Object(objects) => {
				for (name, operator, value) in objects {
					let operator = operator.parse::<MatchOperator>()?;
					matchers.push(Matcher::new(name.as_str(), operator, value.as_str())?);
				}
			}
		}

		Ok(())
	}
}

/// the canonical matcher list of a single route
pub fn canonical_matchers(route: &Route) -> Result<Vec<Matcher>, RoutingError> {
	let mut matchers = Vec::new();
	for encoding in MatcherEncoding::of(route) {
		encoding.convert(&mut matchers)?;
	}

	Ok(matchers)
}

/// Normalizes a whole tree. One invalid matcher anywhere fails the entire tree.
///
/// Routes without an id get a positional one (`root`, `root.0`, `root.0.1`, ...). A positional id that is
/// already used explicitly elsewhere in the tree gets a `~N` suffix instead.
pub fn normalize(root: &Route) -> Result<PolicyTree, RoutingError> {
	let mut nodes = Vec::new();
	let mut taken = HashSet::new();

	collect_explicit_ids(root, &mut taken)?;
	push_node(root, None, ROOT_ID.to_string(), &mut nodes, &mut taken)?;

	tracing::trace!(nodes = nodes.len(), "normalized policy tree");

	Ok(PolicyTree::from_nodes(nodes))
}

fn collect_explicit_ids(route: &Route, ids: &mut HashSet<String>) -> Result<(), RoutingError> {
	if let Some(id) = &route.id {
		if !ids.insert(id.clone()) {
			return Err(RoutingError::DuplicateRouteId(id.clone()));
		}
	}

	for child in route.children() {
		collect_explicit_ids(child, ids)?;
	}

	Ok(())
}

/// `path` or, if that's taken, the first free `path~N`
fn positional_id(path: &str, taken: &HashSet<String>) -> String {
	let mut id = path.to_string();
	let mut suffix = 1;
	while taken.contains(&id) {
		id = format!("{path}~{suffix}");
		suffix += 1;
	}

	id
}

fn push_node(
	route: &Route,
	parent: Option<NodeId>,
	path: String,
	nodes: &mut Vec<PolicyNode>,
	taken: &mut HashSet<String>,
) -> Result<NodeId, RoutingError> {
	let id = match &route.id {
		Some(id) => id.clone(),
		None => {
			let id = positional_id(&path, taken);
			taken.insert(id.clone());
			id
		}
	};

	let index = NodeId(nodes.len());
	nodes.push(PolicyNode {
		id,
		matchers: canonical_matchers(route)?,
		config: route.config(),
		continue_matching: route.continue_matching.unwrap_or(false),
		children: Vec::with_capacity(route.children().len()),
		parent,
	});

	for (position, child) in route.children().iter().enumerate() {
		let child = push_node(child, Some(index), format!("{path}.{position}"), nodes, taken)?;
		nodes[index.0].children.push(child);
	}

	Ok(index)
}

/// Removes server side quoting from every matcher name and value, see [crate::matcher::unquote].
pub fn unquote_tree(tree: &PolicyTree) -> Result<PolicyTree, RoutingError> {
	let mut unquoted = tree.clone();

	for id in tree.pre_order() {
		let matchers = tree
			.node(id)
			.matchers
			.iter()
			.map(Matcher::unquoted)
			.collect::<Result<Vec<_>, _>>()?;
		unquoted.node_mut(id).matchers = matchers;
	}

	Ok(unquoted)
}

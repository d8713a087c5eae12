//! notification policy routing tree matcher
//!
//! Given an alertmanager style policy tree this crate finds the policies responsible for alerts:
//! - normalizes the different matcher encodings into canonical `(name, operator, value)` matchers
//! - walks the tree depth first honoring `continue` to find the matching policies of a label set
//! - partitions alert groups by the policies their alerts are routed to
//! - materializes inherited notification settings for inspection
//!
//! [facade] holds the two entry points, [worker] runs them on a background thread.

pub mod error;
pub mod facade;
pub mod inherit;
pub mod labels;
pub mod matcher;
pub mod normalize;
pub mod partition;
pub mod route;
pub mod tree;
pub mod walker;
pub mod worker;

pub use error::RoutingError;
pub use facade::{
	get_route_groups_map, match_instances_to_routes, MatchOptions, RouteGroupsMap, RouteMatchReport,
};
pub use labels::LabelSet;
pub use partition::{AlertGroup, AlertInstance};
pub use route::Route;
pub use worker::{MatcherHandle, MatcherWorker, WorkerError};

//! Runs the matcher on a dedicated thread so large trees and alert volumes don't block the caller.
//!
//! Requests are queued into a bounded channel and served one at a time in arrival order. Every request
//! owns its inputs and gets its answer through a oneshot channel, nothing is shared between caller and
//! worker. Dropping the last [MatcherHandle] shuts the worker down.
use std::{thread, time::Duration};

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::{
	error::RoutingError,
	facade::{get_route_groups_map, match_instances_to_routes, MatchOptions, RouteGroupsMap, RouteMatchReport},
	labels::LabelSet,
	partition::AlertGroup,
	route::Route,
};

type Reply<T> = oneshot::Sender<Result<T, RoutingError>>;

/// the requests the worker understands
#[derive(Debug)]
pub enum WorkerRequest {
	RouteGroupsMap {
		root: Route,
		groups: Vec<AlertGroup>,
		options: MatchOptions,
		reply: Reply<RouteGroupsMap>,
	},
	MatchInstances {
		root: Route,
		label_sets: Vec<LabelSet>,
		options: MatchOptions,
		reply: Reply<RouteMatchReport>,
	},
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
	/// the worker thread is gone, either it was shut down or it panicked
	#[error("matcher worker closed")]
	Closed,
	#[error("matcher worker didn't answer within {0:?}")]
	Timeout(Duration),
	#[error(transparent)]
	Routing(#[from] RoutingError),
}

/// the worker side of the channel
pub struct MatcherWorker {
	rx: mpsc::Receiver<WorkerRequest>,
}

impl MatcherWorker {
	/// Spawns the worker thread and returns the handle to talk to it.
	///
	/// # Arguments
	///
	/// * `queue_capacity` - number of requests that can wait before callers have to wait for a free slot
	pub fn spawn(queue_capacity: usize) -> std::io::Result<MatcherHandle> {
		let (tx, rx) = mpsc::channel(queue_capacity.max(1));
		let worker = MatcherWorker { rx };

		thread::Builder::new()
			.name(String::from("route-matcher"))
			.spawn(move || worker.run())?;

		Ok(MatcherHandle { tx, timeout: None })
	}

	/// main loop of [MatcherWorker], returns once every handle is dropped
	fn run(mut self) {
		while let Some(request) = self.rx.blocking_recv() {
			match request {
				WorkerRequest::RouteGroupsMap { root, groups, options, reply } => {
					let result = get_route_groups_map(&root, &groups, options);
					Self::respond(reply, result);
				}
				WorkerRequest::MatchInstances { root, label_sets, options, reply } => {
					let result = match_instances_to_routes(&root, &label_sets, options);
					Self::respond(reply, result);
				}
			}
		}

		tracing::debug!("all matcher handles dropped, stopping worker");
	}

	fn respond<T>(reply: Reply<T>, result: Result<T, RoutingError>) {
		if let Err(err) = &result {
			tracing::warn!("rejected policy tree: {}", err);
		}

		if reply.send(result).is_err() {
			// the caller timed out or went away
			tracing::debug!("dropping matcher response, nobody is waiting for it");
		}
	}
}

/// caller side of a [MatcherWorker]
#[derive(Debug, Clone)]
pub struct MatcherHandle {
	tx: mpsc::Sender<WorkerRequest>,
	timeout: Option<Duration>,
}

impl MatcherHandle {
	/// Gives up waiting for an answer after `timeout`. The worker still finishes the request, there is no
	/// way to interrupt a running match.
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);
		self
	}

	/// [get_route_groups_map] on the worker thread
	pub async fn route_groups_map(
		&self,
		root: Route,
		groups: Vec<AlertGroup>,
		options: MatchOptions,
	) -> Result<RouteGroupsMap, WorkerError> {
		self.call(|reply| WorkerRequest::RouteGroupsMap { root, groups, options, reply })
			.await
	}

	/// [match_instances_to_routes] on the worker thread
	pub async fn match_instances(
		&self,
		root: Route,
		label_sets: Vec<LabelSet>,
		options: MatchOptions,
	) -> Result<RouteMatchReport, WorkerError> {
		self.call(|reply| WorkerRequest::MatchInstances { root, label_sets, options, reply })
			.await
	}

	async fn call<T>(&self, request: impl FnOnce(Reply<T>) -> WorkerRequest) -> Result<T, WorkerError> {
		let (reply, response) = oneshot::channel();

		self.tx
			.send(request(reply))
			.await
			.map_err(|_| WorkerError::Closed)?;

		let response = match self.timeout {
			Some(timeout) => tokio::time::timeout(timeout, response)
				.await
				.map_err(|_| WorkerError::Timeout(timeout))?,
			None => response.await,
		};

		response
			.map_err(|_| WorkerError::Closed)?
			.map_err(WorkerError::from)
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn route() -> Route {
		serde_json::from_value(json!({
			"id": "root",
			"routes": [{"id": "sre", "matchers": ["team=sre"]}]
		}))
		.unwrap()
	}

	#[tokio::test]
	async fn serves_both_operations() {
		let handle = MatcherWorker::spawn(4).unwrap();

		let groups: Vec<AlertGroup> = serde_json::from_value(json!([{
			"labels": {"alertname": "HighLatency"},
			"receiver": {"name": "default"},
			"alerts": [{"labels": {"team": "sre"}}]
		}]))
		.unwrap();

		let map = handle
			.route_groups_map(route(), groups, MatchOptions::default())
			.await
			.unwrap();
		assert_eq!(map["sre"].len(), 1);
		assert!(map["root"].is_empty());

		let report = handle
			.match_instances(route(), vec![[("team", "ops")].into_iter().collect()], MatchOptions::default())
			.await
			.unwrap();
		assert_eq!(report.instances[0].routes[0].id, "root");
	}

	#[tokio::test]
	async fn forwards_routing_errors() {
		let handle = MatcherWorker::spawn(1).unwrap();
		let mut root = route();
		root.object_matchers = Some(vec![("team".to_string(), "<>".to_string(), "sre".to_string())]);

		let result = handle.match_instances(root, Vec::new(), MatchOptions::default()).await;

		assert_eq!(result, Err(WorkerError::Routing(RoutingError::UnknownOperator("<>".to_string()))));
	}

	#[tokio::test]
	async fn answers_concurrent_callers_independently() {
		let handle = MatcherWorker::spawn(2).unwrap();

		let requests = ["sre", "ops", "sre", "db"].map(|team| {
			let handle = handle.clone();
			tokio::spawn(async move {
				let labels: LabelSet = [("team", team)].into_iter().collect();
				let report = handle
					.match_instances(route(), vec![labels], MatchOptions::default())
					.await
					.unwrap();
				report.instances[0].routes[0].id.clone()
			})
		});

		let mut ids = Vec::new();
		for request in requests {
			ids.push(request.await.unwrap());
		}

		assert_eq!(ids, ["sre", "root", "sre", "root"]);
	}
}

//! errors raised while turning a policy tree snapshot into something we can match against
use thiserror::Error;

/// A snapshot that can't be normalized. Any of these fails the whole request,
/// a partially normalized tree would route alerts to the wrong policies.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
	/// a raw matcher string without any of the four operators
	#[error("invalid matcher `{0}`: no operator found")]
	InvalidMatcher(String),

	/// PromQL style `{foo="bar"}` block matchers
	#[error("unsupported matcher syntax `{0}`: brace wrapped matchers are not supported")]
	UnsupportedMatcherSyntax(String),

	#[error("invalid matcher `{0}`: empty label name")]
	EmptyLabelName(String),

	/// an operator spelling outside of `=`, `!=`, `=~` and `!~`
	#[error("unknown matcher operator `{0}`")]
	UnknownOperator(String),

	#[error("invalid regular expression `{pattern}` for label `{label}`: {reason}")]
	InvalidRegex { label: String, pattern: String, reason: String },

	/// match results are keyed by route id so ids have to be unique within one snapshot
	#[error("route id `{0}` is used by more than one policy")]
	DuplicateRouteId(String),
}

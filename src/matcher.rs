//! label matchers and their evaluation against label sets
//!
//! Every matcher encoding a policy can carry (`matchers`, `match`, `match_re`, `object_matchers`)
//! ends up as a [Matcher]: a label name, one of four [MatchOperator]s and a value.
use std::{borrow::Cow, fmt, str::FromStr};

use regex::Regex;
use serde::{ser::SerializeTuple, Serialize, Serializer};

use crate::{
	error::RoutingError,
	labels::{Label, LabelSet},
};

/// how a matcher compares its value with a label value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchOperator {
	Equal,
	NotEqual,
	/// unanchored regular expression, partial matches count
	RegexMatch,
	RegexNotMatch,
}

impl MatchOperator {
	/// order in which spellings win if several of them start at the same offset, `=~` has to beat `=`
	const PRIORITY: [MatchOperator; 4] = [
		MatchOperator::RegexMatch,
		MatchOperator::RegexNotMatch,
		MatchOperator::NotEqual,
		MatchOperator::Equal,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			MatchOperator::Equal => "=",
			MatchOperator::NotEqual => "!=",
			MatchOperator::RegexMatch => "=~",
			MatchOperator::RegexNotMatch => "!~",
		}
	}
}

impl FromStr for MatchOperator {
	type Err = RoutingError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::PRIORITY
			.into_iter()
			.find(|operator| operator.as_str() == s)
			.ok_or_else(|| RoutingError::UnknownOperator(s.to_string()))
	}
}

impl fmt::Display for MatchOperator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl Serialize for MatchOperator {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(self.as_str())
	}
}

/// how [Matcher::is_match] compares, regex operators carry their compiled pattern
#[derive(Debug, Clone)]
enum Comparison {
	Equal,
	NotEqual,
	Regex(Regex),
	NotRegex(Regex),
}

/// A canonical `(name, operator, value)` matcher.
///
/// Regex operators compile their pattern on construction, so a matcher that exists can always be evaluated.
#[derive(Debug, Clone)]
pub struct Matcher {
	name: String,
	value: String,
	comparison: Comparison,
}

impl Matcher {
	pub fn new(
		name: impl Into<String>,
		operator: MatchOperator,
		value: impl Into<String>,
	) -> Result<Self, RoutingError> {
		let name = name.into();
		let value = value.into();

		let compile = || {
			Regex::new(&value).map_err(|err| RoutingError::InvalidRegex {
				label: name.clone(),
				pattern: value.clone(),
				reason: err.to_string(),
			})
		};

		let comparison = match operator {
			MatchOperator::Equal => Comparison::Equal,
			MatchOperator::NotEqual => Comparison::NotEqual,
			MatchOperator::RegexMatch => Comparison::Regex(compile()?),
			MatchOperator::RegexNotMatch => Comparison::NotRegex(compile()?),
		};

		Ok(Self { name, value, comparison })
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn operator(&self) -> MatchOperator {
		match self.comparison {
			Comparison::Equal => MatchOperator::Equal,
			Comparison::NotEqual => MatchOperator::NotEqual,
			Comparison::Regex(_) => MatchOperator::RegexMatch,
			Comparison::NotRegex(_) => MatchOperator::RegexNotMatch,
		}
	}

	pub fn value(&self) -> &str {
		&self.value
	}

	/// Evaluates the matcher against a single label. Labels with another name never match.
	pub fn is_match(&self, label: &Label) -> bool {
		let (name, value) = label;
		if *name != self.name {
			return false;
		}

		match &self.comparison {
			Comparison::Equal => *value == self.value,
			Comparison::NotEqual => *value != self.value,
			Comparison::Regex(regex) => regex.is_match(value),
			Comparison::NotRegex(regex) => !regex.is_match(value),
		}
	}

	/// the same matcher with one layer of server side quoting removed from name and value
	pub fn unquoted(&self) -> Result<Self, RoutingError> {
		match (unquote(&self.name), unquote(&self.value)) {
			(Cow::Borrowed(_), Cow::Borrowed(_)) => Ok(self.clone()),
			(name, value) => Self::new(name, self.operator(), value),
		}
	}
}

impl PartialEq for Matcher {
	fn eq(&self, other: &Self) -> bool {
		self.name == other.name && self.operator() == other.operator() && self.value == other.value
	}
}

impl Eq for Matcher {}

impl fmt::Display for Matcher {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}{}{}", self.name, self.operator(), self.value)
	}
}

/// serialized as the `[name, op, value]` triple alertmanager uses for `object_matchers`
impl Serialize for Matcher {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		let mut tuple = serializer.serialize_tuple(3)?;
		tuple.serialize_element(&self.name)?;
		tuple.serialize_element(&self.operator())?;
		tuple.serialize_element(&self.value)?;
		tuple.end()
	}
}

impl FromStr for Matcher {
	type Err = RoutingError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		parse_matcher(s)
	}
}

/// Parses a raw `name<op>value` matcher string.
///
/// The first operator spelling found scanning left to right wins, ties at the same offset are broken by
/// [MatchOperator::PRIORITY]. Name and value are trimmed.
pub fn parse_matcher(raw: &str) -> Result<Matcher, RoutingError> {
	let trimmed = raw.trim();
	if trimmed.starts_with('{') && trimmed.ends_with('}') {
		return Err(RoutingError::UnsupportedMatcherSyntax(raw.to_string()));
	}

	let (offset, operator) = MatchOperator::PRIORITY
		.into_iter()
		.filter_map(|operator| raw.find(operator.as_str()).map(|offset| (offset, operator)))
		.min_by_key(|(offset, _)| *offset)
		.ok_or_else(|| RoutingError::InvalidMatcher(raw.to_string()))?;

	let name = raw[..offset].trim();
	let value = raw[offset + operator.as_str().len()..].trim();

	if name.is_empty() {
		return Err(RoutingError::EmptyLabelName(raw.to_string()));
	}

	Matcher::new(name, operator, value)
}

/// Strips one layer of double quotes and reverses `\\` and `\"` escapes.
///
/// Values that aren't wrapped in quotes are returned untouched.
pub fn unquote(input: &str) -> Cow<'_, str> {
	let inner = match input.strip_prefix('"').and_then(|rest| rest.strip_suffix('"')) {
		Some(inner) => inner,
		None => return Cow::Borrowed(input),
	};

	let mut unescaped = String::with_capacity(inner.len());
	let mut chars = inner.chars();
	while let Some(c) = chars.next() {
		if c == '\\' {
			match chars.next() {
				Some(escaped @ ('\\' | '"')) => unescaped.push(escaped),
				Some(other) => {
					unescaped.push('\\');
					unescaped.push(other);
				}
				None => unescaped.push('\\'),
			}
		} else {
			unescaped.push(c);
		}
	}

	Cow::Owned(unescaped)
}

/// A node matches a label set if every one of its matchers is satisfied by some label. No matchers match everything.
pub fn matches_all(matchers: &[Matcher], labels: &LabelSet) -> bool {
	matchers
		.iter()
		.all(|matcher| labels.iter().any(|label| matcher.is_match(label)))
}

/// a label together with the matcher it satisfied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelMatch {
	pub label: Label,
	pub matcher: Matcher,
}

/// Like [matches_all] but reports which label satisfied each matcher. Returns `None` if any matcher is unsatisfied.
pub fn match_details(matchers: &[Matcher], labels: &LabelSet) -> Option<Vec<LabelMatch>> {
	matchers
		.iter()
		.map(|matcher| {
			labels
				.iter()
				.find(|label| matcher.is_match(label))
				.map(|label| LabelMatch { label: label.clone(), matcher: matcher.clone() })
		})
		.collect()
}

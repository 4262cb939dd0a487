//! Page-script invocation.
//!
//! Every in-page helper is a named function expression applied to a single
//! JSON argument: `(function pwName(args) { ... })({...})`. Arguments are
//! always passed as serialized JSON, never spliced into the function body.

use serde_json::Value;

/// Builds the expression that applies `function` to `args`.
pub(crate) fn invoke(function: &str, args: &Value) -> String {
	format!("({})({})", function.trim(), args)
}

/// Splits an expression built by [`invoke`] back into its function name and
/// arguments.
#[cfg(test)]
pub(crate) fn parse_invocation(expression: &str) -> Option<(String, Value)> {
	let rest = expression.strip_prefix("(function ")?;
	let name: String = rest.chars().take_while(|c| c.is_ascii_alphanumeric() || *c == '_').collect();
	let args = expression
		.match_indices("})(")
		.filter_map(|(at, _)| expression[at + 3..].strip_suffix(')'))
		.find_map(|args| serde_json::from_str(args).ok())?;
	Some((name, args))
}

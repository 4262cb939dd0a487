//! JavaScript evaluation for [`Page`].

use serde_json::{Value, json};

use super::Page;
use crate::error::{Error, Result};

impl Page {
	/// Evaluates `expression` by value, awaiting a returned promise.
	///
	/// # Errors
	///
	/// Returns [`Error::Script`] if the expression throws.
	pub async fn evaluate_json(&self, expression: &str) -> Result<Value> {
		let response = self
			.send(
				"Runtime.evaluate",
				json!({
					"expression": expression,
					"returnByValue": true,
					"awaitPromise": true,
					"userGesture": true,
				}),
			)
			.await?;

		if let Some(details) = response.get("exceptionDetails") {
			return Err(Error::Script(exception_message(details)));
		}
		Ok(response["result"].get("value").cloned().unwrap_or(Value::Null))
	}
}

fn exception_message(details: &Value) -> String {
	details["exception"]["description"]
		.as_str()
		.or_else(|| details["text"].as_str())
		.map(|s| s.lines().next().unwrap_or(s).to_string())
		.unwrap_or_else(|| "script threw".to_string())
}

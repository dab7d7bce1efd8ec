//! Shared utilities for talking to Ethereum JSON-RPC endpoints.

use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use serde_json::Value;

/// Default timeout for a single RPC request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client(timeout: Duration) -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to create HTTP client")
}

/// Make a JSON-RPC call and deserialize the result.
///
/// # Arguments
/// * `client` - The HTTP client to use
/// * `url` - The RPC endpoint URL
/// * `method` - The RPC method name
/// * `params` - The method parameters
///
/// # Returns
/// The deserialized result, or an error if the request failed or the node answered with
/// an error object. The node's error message (and revert data, if any) is kept in the error.
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<T, anyhow::Error> {
    let response = client
        .post(url)
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .with_context(|| format!("Failed to send {} request", method))?;

    let status = response.status();
    let result: Value = response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response (HTTP {})", method, status))?;

    if let Some(error) = result.get("error") {
        anyhow::bail!("{} failed: {}", method, describe_error(error));
    }

    let result_value = result
        .get("result")
        .with_context(|| format!("No result in {} response", method))?
        .clone();

    serde_json::from_value(result_value)
        .with_context(|| format!("Failed to deserialize {} result", method))
}

/// Render a JSON-RPC error object as `message (data)`.
fn describe_error(error: &Value) -> String {
    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("unknown error");

    match error.get("data") {
        Some(Value::String(data)) => format!("{} ({})", message, data),
        Some(Value::Null) | None => message.to_string(),
        Some(data) => format!("{} ({})", message, data),
    }
}

/// Parse a hex quantity (`0x`-prefixed, no leading zeros required).
pub fn parse_quantity(s: &str) -> Result<u128, anyhow::Error> {
    let digits = s
        .strip_prefix("0x")
        .with_context(|| format!("Quantity `{}` is missing the 0x prefix", s))?;
    if digits.is_empty() {
        anyhow::bail!("Quantity `{}` has no digits", s);
    }
    u128::from_str_radix(digits, 16).with_context(|| format!("Invalid hex quantity `{}`", s))
}

/// Format a value as a hex quantity.
pub fn to_quantity(value: u128) -> String {
    format!("0x{:x}", value)
}

/// Deserialize a u64 from a hex quantity string.
pub fn deserialize_u64_quantity<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    let value = parse_quantity(&s).map_err(serde::de::Error::custom)?;
    u64::try_from(value).map_err(serde::de::Error::custom)
}

/// Deserialize an optional u128 from a hex quantity string.
pub fn deserialize_opt_u128_quantity<'de, D>(deserializer: D) -> Result<Option<u128>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Deserialize::deserialize(deserializer)?;
    s.map(|s| parse_quantity(&s).map_err(serde::de::Error::custom))
        .transpose()
}

//! Sequential tool dispatch.

use super::{ToolDescriptor, ToolError, ToolHost};
use crate::model::{ToolCall, ToolResult};

/// Execute `calls` against `host`, one at a time, in order.
///
/// Returns exactly one result per call, in call order. Calls naming a tool
/// outside `known` are not sent to the host. A failed call becomes an error
/// result and the remaining calls still run, so the model can react to the
/// failure on its next step.
pub async fn dispatch<H: ToolHost>(
    calls: &[&ToolCall],
    known: &[ToolDescriptor],
    host: &H,
) -> Vec<ToolResult> {
    let mut results = Vec::with_capacity(calls.len());

    for call in calls {
        if !known.iter().any(|d| d.name == call.name) {
            tracing::warn!(tool = %call.name, "model requested unknown tool");
            results.push(ToolResult::error(
                call,
                ToolError::NotFound(call.name.clone()).to_string(),
            ));
            continue;
        }

        tracing::info!(tool = %call.name, input = %call.input, "calling tool");
        let result = match host.call_tool(&call.name, call.input.clone()).await {
            Ok(output) => ToolResult::success(call, output),
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "tool call failed");
                ToolResult::error(call, e.to_string())
            }
        };
        results.push(result);
    }

    results
}

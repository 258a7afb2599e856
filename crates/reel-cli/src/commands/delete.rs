use color_eyre::Result;
use serde_json::json;

use crate::commands::load_service;
use crate::output::Output;

/// Removes the library grouping. A missing grouping is not an error.
///
/// Collection state lives in the process that registered it, so a running
/// daemon keeps its jobs until the entry leaves its seed file.
pub async fn run_delete(name: &str, output: &Output) -> Result<()> {
    let service = load_service(output).await?;
    let existed = service.delete_collection(name).await?;

    output.success(format!("Library collection '{}' deleted", name.trim()));
    output.warn(daemon_notice(name.trim()));
    output.data(&json!({ "name": name.trim(), "registered": existed }));
    Ok(())
}

fn daemon_notice(name: &str) -> String {
    format!(
        "A running daemon still tracks '{}' and may recreate it; remove it from the daemon's seed file to stop that",
        name
    )
}

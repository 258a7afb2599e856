use color_eyre::Result;
use owo_colors::OwoColorize;

use crate::commands::{load_service, spinner, watch_collection};
use crate::output::Output;

pub async fn run_build(name: &str, titles: &[String], watch: bool, output: &Output) -> Result<()> {
    let service = load_service(output).await?;

    let progress = spinner(format!("Building '{}' from {} titles...", name, titles.len()), output);
    let result = service.build_collection(name, titles).await;
    progress.finish_and_clear();
    let outcome = result?;

    output.success(format!("Collection '{}' registered", outcome.collection_name));
    if !outcome.movies_already_present.is_empty() {
        output.println(format!("  {}", "Already in the library:".bold()));
        for title in &outcome.movies_already_present {
            output.println(format!("    {} {}", "•".green(), title));
        }
    }
    if !outcome.movies_dispatched.is_empty() {
        output.println(format!("  {}", "Sent to Radarr:".bold()));
        for title in &outcome.movies_dispatched {
            output.println(format!("    {} {}", "↓".blue(), title));
        }
    }
    let unresolved = titles
        .len()
        .saturating_sub(outcome.movies_already_present.len() + outcome.movies_dispatched.len());
    if unresolved > 0 {
        output.warn(format!("{} titles could not be resolved or dispatched", unresolved));
    }
    output.data(&outcome);

    let pending = !outcome.movies_dispatched.is_empty() || unresolved > 0;
    if watch && pending {
        watch_collection(&service, &outcome.collection_name, output).await?;
    } else if pending {
        output.info("Run with --watch, or list the collection in the daemon's seed file, to attach movies as they arrive");
    }
    Ok(())
}

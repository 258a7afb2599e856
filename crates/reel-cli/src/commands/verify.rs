use color_eyre::Result;
use comfy_table::{Cell, Color};
use reel_core::CandidateMode;

use crate::commands::{load_service, spinner, styled_table};
use crate::output::Output;

pub async fn run_verify(titles: &[String], mode: CandidateMode, limit: Option<usize>, output: &Output) -> Result<()> {
    let service = load_service(output).await?;

    let progress = spinner(format!("Verifying {} titles ({} mode)...", titles.len(), mode), output);
    let result = service.verify_candidates(titles, mode, limit).await;
    progress.finish_and_clear();
    let candidates = result?;

    if candidates.is_empty() {
        output.info("No candidates matched");
        output.data(&candidates);
        return Ok(());
    }

    let mut table = styled_table(&["Title", "Year", "IMDb", "In library"]);
    for candidate in &candidates {
        let presence = match mode {
            CandidateMode::Discovery => Cell::new("-"),
            _ if candidate.in_library => Cell::new("yes").fg(Color::Green),
            _ => Cell::new("no").fg(Color::DarkGrey),
        };
        table.add_row(vec![
            Cell::new(&candidate.reference.title),
            Cell::new(candidate.reference.year.map(|y| y.to_string()).unwrap_or_default()),
            Cell::new(candidate.external_id.as_deref().unwrap_or("unresolved")),
            presence,
        ]);
    }
    output.println(table.to_string());
    output.success(format!("{} of {} candidates kept", candidates.len(), titles.len()));
    output.data(&candidates);
    Ok(())
}

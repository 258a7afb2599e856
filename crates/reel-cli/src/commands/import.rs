use color_eyre::Result;
use comfy_table::{Cell, Color};
use reel_models::ListedMovie;

use crate::commands::{load_service, spinner, styled_table, watch_collection};
use crate::output::Output;

pub struct ImportOptions {
    pub create: bool,
    pub name: Option<String>,
    pub library_only: bool,
    pub watch: bool,
}

pub async fn run_import(url: &str, options: ImportOptions, output: &Output) -> Result<()> {
    let service = load_service(output).await?;

    let progress = spinner("Fetching list...", output);
    let result = service.import_list(url).await;
    progress.finish_and_clear();
    let preview = result?;

    let present = preview.movies.iter().filter(|m| m.in_library).count();
    output.success(format!(
        "'{}': {} movies, {} already in the library",
        preview.collection_name,
        preview.movies.len(),
        present
    ));
    let mut table = styled_table(&["#", "Title", "In library"]);
    for (idx, movie) in preview.movies.iter().enumerate() {
        let presence = if movie.in_library {
            Cell::new("yes").fg(Color::Green)
        } else {
            Cell::new("no").fg(Color::DarkGrey)
        };
        table.add_row(vec![Cell::new(idx + 1), Cell::new(&movie.title), presence]);
    }
    output.println(table.to_string());

    if !options.create {
        output.data(&preview);
        return Ok(());
    }

    let selected = select_movies(&preview.movies, options.library_only);
    if selected.is_empty() {
        output.warn("No movies selected; nothing to create");
        output.data(&preview);
        return Ok(());
    }
    let name = options
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| preview.collection_name.clone());

    let progress = spinner(format!("Creating '{}'...", name), output);
    let result = service.materialize_list(&name, &selected, &preview.source_url).await;
    progress.finish_and_clear();
    let outcome = result?;

    output.success(format!(
        "Collection '{}' created: {} attached, {} to add ({} sent to Radarr)",
        outcome.name,
        outcome.in_library.len(),
        outcome.to_add.len(),
        outcome.dispatched.len()
    ));
    output.data(&outcome);

    if options.watch {
        watch_collection(&service, &outcome.name, output).await?;
    }
    Ok(())
}

fn select_movies(movies: &[ListedMovie], library_only: bool) -> Vec<ListedMovie> {
    movies
        .iter()
        .filter(|m| !library_only || m.in_library)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listed(title: &str, in_library: bool) -> ListedMovie {
        ListedMovie {
            title: title.to_string(),
            in_library,
        }
    }

    #[test]
    fn test_select_movies() {
        let movies = vec![listed("Parasite (2019)", true), listed("Burning (2018)", false)];

        assert_eq!(select_movies(&movies, false).len(), 2);
        assert_eq!(select_movies(&movies, true), vec![listed("Parasite (2019)", true)]);
    }
}

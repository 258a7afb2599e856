use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::error::{Result, SourceError};

pub(crate) const LETTERBOXD_BASE_URL: &str = "https://letterboxd.com";
pub(crate) const UNTITLED_LIST: &str = "Untitled List";

const SERVICE: &str = "letterboxd";

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| SourceError::parse(SERVICE, format!("selector '{}': {}", css, e)))
}

/// One list page: its titles plus the link to the following page, if any
#[derive(Debug, Default, PartialEq)]
pub(crate) struct ListPage {
    pub titles: Vec<String>,
    pub next_page: Option<String>,
}

pub(crate) fn parse_list_page(html: &str) -> Result<ListPage> {
    let document = Html::parse_document(html);
    let poster = selector("li.poster-container div.film-poster")?;
    let image = selector("img.image")?;
    let item = selector("div[data-item-name]")?;
    let next = selector("a.next")?;

    let mut titles: Vec<String> = document
        .select(&poster)
        .filter_map(|film| poster_title(film, &image))
        .collect();

    // Newer list markup carries the display name on a lazy-loaded component
    if titles.is_empty() {
        titles = document
            .select(&item)
            .filter_map(|film| film.value().attr("data-item-name"))
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
    }

    let next_page = document
        .select(&next)
        .next()
        .and_then(|link| link.value().attr("href"))
        .map(absolute_url);

    debug!("Letterboxd: parsed {} titles (next page: {:?})", titles.len(), next_page);
    Ok(ListPage { titles, next_page })
}

fn poster_title(film: ElementRef<'_>, image: &Selector) -> Option<String> {
    let name = film.value().attr("data-film-name").map(str::trim);
    let year = film.value().attr("data-film-release-year").map(str::trim);

    match (name, year) {
        (Some(name), Some(year)) if !name.is_empty() && !year.is_empty() => {
            Some(format!("{} ({})", name, year))
        }
        _ => {
            let alt = film
                .select(image)
                .next()
                .and_then(|img| img.value().attr("alt"))
                .map(str::trim)
                .filter(|alt| !alt.is_empty())?;
            debug!("Letterboxd: using poster alt text '{}'", alt);
            Some(alt.to_string())
        }
    }
}

pub(crate) fn parse_list_name(html: &str) -> Result<String> {
    let document = Html::parse_document(html);
    let heading = selector("h1.title-1")?;

    Ok(document
        .select(&heading)
        .next()
        .map(|h1| h1.text().collect::<String>().trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNTITLED_LIST.to_string()))
}

fn absolute_url(href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!("{}/{}", LETTERBOXD_BASE_URL, href.trim_start_matches('/'))
    }
}

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::error::{ensure_success, Result};
use crate::letterboxd::parser::{parse_list_name, parse_list_page, LETTERBOXD_BASE_URL};
use crate::traits::ListProvider;

const SERVICE: &str = "letterboxd";
const MAX_PAGES: usize = 50;

/// Public Letterboxd lists, read from their HTML pages
pub struct LetterboxdLists {
    client: Client,
}

impl LetterboxdLists {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client })
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        debug!("Letterboxd: GET {}", url);
        let response = self.client.get(url).send().await?;
        let body = ensure_success(SERVICE, response).await?.text().await?;
        Ok(body)
    }
}

#[async_trait]
impl ListProvider for LetterboxdLists {
    fn provider_name(&self) -> &str {
        SERVICE
    }

    fn accepts(&self, url: &str) -> bool {
        url.starts_with(&format!("{}/", LETTERBOXD_BASE_URL))
    }

    async fn fetch_titles(&self, url: &str) -> Result<Vec<String>> {
        let mut titles: Vec<String> = Vec::new();
        let mut next = Some(url.to_string());
        let mut pages = 0;

        while let Some(page_url) = next.take() {
            if pages == MAX_PAGES {
                warn!("Letterboxd: stopped after {} pages of {}", MAX_PAGES, url);
                break;
            }
            let body = self.fetch_page(&page_url).await?;
            let page = parse_list_page(&body)?;
            pages += 1;

            for title in page.titles {
                if !titles.contains(&title) {
                    titles.push(title);
                }
            }
            next = page.next_page.filter(|next_url| *next_url != page_url);
        }

        info!("Letterboxd: {} titles across {} page(s) from {}", titles.len(), pages, url);
        Ok(titles)
    }

    async fn fetch_list_name(&self, url: &str) -> Result<String> {
        let body = self.fetch_page(url).await?;
        parse_list_name(&body)
    }
}

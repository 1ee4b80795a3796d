use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::movies::{CatalogError, DownloadLink, LinkShortener, MovieDetails, MovieHit};

/// Scrapes search results and download links from the movie listing site.
pub struct MovieCatalog {
    client: reqwest::Client,
    site_url: Url,
    shortener: Option<LinkShortener>,
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {}: {:?}", css, e))
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

pub fn parse_search_results(html: &str) -> Vec<MovieHit> {
    let document = Html::parse_document(html);
    let anchors = selector("a.ml-mask.jt");
    let info = selector("span.mli-info");

    document
        .select(&anchors)
        .enumerate()
        .filter_map(|(index, anchor)| {
            let url = anchor.value().attr("href")?;
            let title = anchor.select(&info).next().map(text_of)?;
            Some(MovieHit {
                id: format!("link{}", index),
                title,
                url: url.to_string(),
            })
        })
        .collect()
}

pub fn parse_movie_page(html: &str) -> Result<MovieDetails, CatalogError> {
    let document = Html::parse_document(html);

    let title = document
        .select(&selector("div.mvic-desc h3"))
        .next()
        .map(text_of)
        .filter(|title| !title.is_empty())
        .ok_or_else(|| CatalogError::Parse("movie title not found".to_string()))?;
    let poster = document
        .select(&selector("div.mvic-thumb"))
        .next()
        .and_then(|thumb| thumb.value().attr("data-bg"))
        .map(str::to_string);
    let links = document
        .select(&selector(r#"a[rel="noopener"][data-wpel-link="internal"]"#))
        .filter_map(|anchor| {
            let url = anchor.value().attr("href")?;
            Some(DownloadLink {
                label: text_of(anchor),
                url: url.to_string(),
            })
        })
        .collect();

    Ok(MovieDetails { title, poster, links })
}

impl MovieCatalog {
    pub fn new(client: reqwest::Client, site_url: Url, shortener: Option<LinkShortener>) -> Self {
        Self {
            client,
            site_url,
            shortener,
        }
    }

    pub fn search_url(&self, query: &str) -> Url {
        let mut url = self.site_url.clone();
        url.set_path("/");
        url.query_pairs_mut().clear().append_pair("s", query.trim());
        url
    }

    async fn fetch_page(&self, url: &str) -> Result<String, CatalogError> {
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }

    pub async fn search(&self, query: &str) -> Result<Vec<MovieHit>, CatalogError> {
        let url = self.search_url(query);
        log::info!("Searching movies: {}", url);
        let html = self.fetch_page(url.as_str()).await?;
        let hits = parse_search_results(&html);
        log::info!("Movie search '{}' returned {} results", query, hits.len());
        Ok(hits)
    }

    pub async fn details(&self, page_url: &str) -> Result<MovieDetails, CatalogError> {
        let html = self.fetch_page(page_url).await?;
        let mut details = parse_movie_page(&html)?;
        if let Some(shortener) = &self.shortener {
            for link in &mut details.links {
                link.url = shortener.shorten(&link.url).await;
            }
        }
        Ok(details)
    }
}

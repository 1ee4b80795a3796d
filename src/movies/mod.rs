pub mod catalog;
pub mod shortener;

use thiserror::Error;

pub use catalog::MovieCatalog;
pub use shortener::LinkShortener;

/// One search result. `id` is only meaningful inside the chat that searched.
#[derive(Debug, Clone, PartialEq)]
pub struct MovieHit {
    pub id: String,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadLink {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MovieDetails {
    pub title: String,
    pub poster: Option<String>,
    pub links: Vec<DownloadLink>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("listing site unreachable: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected page layout: {0}")]
    Parse(String),
}

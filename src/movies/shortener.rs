use serde::Deserialize;
use url::Url;

const URLSHORTX_API: &str = "https://urlshortx.com/api";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShortenResponse {
    shortened_url: Option<String>,
}

/// Client for the urlshortx link shortener. A failed call keeps the original link.
pub struct LinkShortener {
    client: reqwest::Client,
    api_key: String,
}

impl LinkShortener {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self { client, api_key }
    }

    pub fn request_url(&self, link: &str) -> Option<Url> {
        Url::parse_with_params(URLSHORTX_API, &[("api", self.api_key.as_str()), ("url", link)]).ok()
    }

    pub async fn shorten(&self, link: &str) -> String {
        let Some(request) = self.request_url(link) else {
            return link.to_string();
        };
        let response = match self.client.get(request).send().await {
            Ok(resp) => resp.json::<ShortenResponse>().await,
            Err(e) => Err(e),
        };
        match response {
            Ok(ShortenResponse {
                shortened_url: Some(short),
            }) => short,
            Ok(_) => {
                log::warn!("Shortener returned no link for {}", link);
                link.to_string()
            }
            Err(e) => {
                log::warn!("Failed to shorten {}: {}", link, e.without_url());
                link.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_url_escapes_target_link() {
        let shortener = LinkShortener::new(reqwest::Client::new(), "k3y".to_string());
        let url = shortener.request_url("https://dl.example/file?id=1&q=a b").unwrap();

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("api".to_string(), "k3y".to_string()),
                ("url".to_string(), "https://dl.example/file?id=1&q=a b".to_string()),
            ]
        );
    }

    #[test]
    fn response_field_is_camel_case() {
        let parsed: ShortenResponse =
            serde_json::from_str(r#"{"status":"success","shortenedUrl":"https://urlshortx.com/xyz"}"#).unwrap();
        assert_eq!(parsed.shortened_url.as_deref(), Some("https://urlshortx.com/xyz"));
    }
}

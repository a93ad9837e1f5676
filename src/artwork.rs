// src/artwork.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::progress::Progress;
use crate::settings::Patterns;
use crate::tagger;

const API_BASE: &str = "https://api.discogs.com";
const WEB_BASE: &str = "https://www.discogs.com";
const MAX_ATTEMPTS: u32 = 3;
const DEFAULT_PACING: Duration = Duration::from_millis(1100);

#[derive(Debug, Clone)]
pub struct ConsumerCredentials {
    pub key: String,
    pub secret: String,
}

/// Temporary token handed out before the user authorizes the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestToken {
    pub token: String,
    pub secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub secret: String,
}

/// Where a client talks to and how long it waits between requests.
#[derive(Debug, Clone)]
pub struct DiscogsEndpoints {
    pub api_base: String,
    pub web_base: String,
    pub pacing: Duration,
}

impl Default for DiscogsEndpoints {
    fn default() -> Self {
        Self {
            api_base: API_BASE.to_string(),
            web_base: WEB_BASE.to_string(),
            pacing: DEFAULT_PACING,
        }
    }
}

#[derive(Debug)]
pub struct DiscogsClient {
    client: reqwest::Client,
    api_base: String,
    web_base: String,
    consumer: ConsumerCredentials,
    access: Option<AccessToken>,
    pacing: Duration,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SearchResult {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub resource_url: Option<String>,
}

#[derive(Deserialize, Debug)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize, Debug)]
struct ArtistResource {
    #[serde(default)]
    images: Vec<ArtistImage>,
}

#[derive(Deserialize, Debug)]
struct ArtistImage {
    #[serde(default)]
    uri: String,
}

#[derive(Deserialize, Debug)]
struct Identity {
    username: String,
}

#[derive(Debug, Default)]
pub struct ArtworkReport {
    pub embedded: Vec<PathBuf>,
    pub missing: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

impl DiscogsClient {
    pub fn new(user_agent: &str, consumer: ConsumerCredentials) -> Result<Self> {
        if consumer.key.is_empty() || consumer.secret.is_empty() {
            anyhow::bail!("Discogs consumer key and secret must be set in the settings file");
        }

        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(1)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_base: API_BASE.to_string(),
            web_base: WEB_BASE.to_string(),
            consumer,
            access: None,
            pacing: DEFAULT_PACING,
        })
    }

    /// Point the client at another host, e.g. a mock server.
    pub fn with_base_urls(mut self, api_base: &str, web_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self.web_base = web_base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_endpoints(self, endpoints: &DiscogsEndpoints) -> Self {
        self.with_base_urls(&endpoints.api_base, &endpoints.web_base)
            .with_pacing(endpoints.pacing)
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_access_token(mut self, access: AccessToken) -> Self {
        self.access = Some(access);
        self
    }

    /// First leg of the OAuth dance. Returns the token and the URL the user
    /// has to visit to obtain a verification code.
    pub async fn request_token(&self) -> Result<(RequestToken, String)> {
        let url = format!("{}/oauth/request_token", self.api_base);
        let body = self
            .send_with_retry(|| {
                self.client
                    .post(&url)
                    .header(
                        reqwest::header::AUTHORIZATION,
                        self.oauth_header(None, &[("oauth_callback", "oob")]),
                    )
                    .header(
                        reqwest::header::CONTENT_TYPE,
                        "application/x-www-form-urlencoded",
                    )
            })
            .await?
            .text()
            .await
            .context("Failed to read request token response")?;

        let fields = parse_form(&body);
        let token = RequestToken {
            token: form_field(&fields, "oauth_token")?,
            secret: form_field(&fields, "oauth_token_secret")?,
        };
        let authorize_url = format!(
            "{}/oauth/authorize?oauth_token={}",
            self.web_base,
            urlencoding::encode(&token.token)
        );

        Ok((token, authorize_url))
    }

    /// Exchange an authorized request token and its verifier for an access token.
    pub async fn access_token(&self, request: &RequestToken, verifier: &str) -> Result<AccessToken> {
        let url = format!("{}/oauth/access_token", self.api_base);
        let verifier = verifier.trim();

        let body = self
            .send_with_retry(|| {
                self.client
                    .post(&url)
                    .header(
                        reqwest::header::AUTHORIZATION,
                        self.oauth_header(
                            Some((request.token.as_str(), request.secret.as_str())),
                            &[("oauth_verifier", verifier)],
                        ),
                    )
                    .header(
                        reqwest::header::CONTENT_TYPE,
                        "application/x-www-form-urlencoded",
                    )
            })
            .await
            .context("Discogs rejected the verification code")?
            .text()
            .await
            .context("Failed to read access token response")?;

        let fields = parse_form(&body);
        Ok(AccessToken {
            token: form_field(&fields, "oauth_token")?,
            secret: form_field(&fields, "oauth_token_secret")?,
        })
    }

    /// Name of the user the access token belongs to.
    pub async fn identity(&self) -> Result<String> {
        let url = format!("{}/oauth/identity", self.api_base);
        let identity: Identity = self.get_json(&url).await?;
        Ok(identity.username)
    }

    pub async fn search_artists(&self, name: &str) -> Result<Vec<SearchResult>> {
        let url = format!(
            "{}/database/search?q={}&type=artist",
            self.api_base,
            urlencoding::encode(name)
        );
        let response: SearchResponse = self.get_json(&url).await?;
        Ok(response.results)
    }

    /// Primary image of a search hit: the artist's first image, or the
    /// result's cover image when the artist has none.
    pub async fn artist_image_url(&self, result: &SearchResult) -> Result<Option<String>> {
        if let Some(resource_url) = &result.resource_url {
            let artist: ArtistResource = self.get_json(resource_url).await?;
            if let Some(image) = artist.images.iter().find(|img| !img.uri.is_empty()) {
                return Ok(Some(image.uri.clone()));
            }
        }

        Ok(result
            .cover_image
            .clone()
            .filter(|uri| !uri.is_empty() && !uri.ends_with("spacer.gif")))
    }

    /// Search `artist` and download the first usable image among the top two hits.
    pub async fn find_artist_image(&self, artist: &str) -> Result<Option<Vec<u8>>> {
        let results = self.search_artists(artist).await?;
        debug!("{} search results for {}", results.len(), artist);

        for result in results.iter().take(2) {
            let url = match self.artist_image_url(result).await {
                Ok(Some(url)) => url,
                Ok(None) => continue,
                Err(e) => {
                    debug!("No image for {}: {:#}", result.title, e);
                    continue;
                }
            };

            match self.download(&url).await {
                Ok(bytes) => return resize_if_needed(bytes).map(Some),
                Err(e) => debug!("Download of {} failed: {:#}", url, e),
            }
        }

        Ok(None)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        tokio::time::sleep(self.pacing / 2).await;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to download image")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to download image: {}", response.status());
        }

        let bytes = response
            .bytes()
            .await
            .context("Failed to read image bytes")?;

        Ok(bytes.to_vec())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let token = self
            .access
            .as_ref()
            .map(|a| (a.token.as_str(), a.secret.as_str()));

        let response = self
            .send_with_retry(|| {
                self.client
                    .get(url)
                    .header(reqwest::header::AUTHORIZATION, self.oauth_header(token, &[]))
                    .header(reqwest::header::ACCEPT, "application/json")
            })
            .await?;

        let text = response
            .text()
            .await
            .context("Failed to read response body")?;

        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse Discogs response. Body: {}", text))
    }

    async fn send_with_retry<F>(&self, build: F) -> Result<reqwest::Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempts = 0;

        loop {
            attempts += 1;

            if attempts > 1 {
                tokio::time::sleep(self.pacing * 2_u32.pow(attempts - 1)).await;
            } else {
                tokio::time::sleep(self.pacing).await;
            }

            let response = match build().send().await {
                Ok(resp) => resp,
                Err(e) if attempts < MAX_ATTEMPTS => {
                    warn!(
                        "Request failed (attempt {}/{}): {}",
                        attempts, MAX_ATTEMPTS, e
                    );
                    continue;
                }
                Err(e) => {
                    return Err(e).context("Failed to send request to Discogs");
                }
            };

            let status = response.status();

            if (status == reqwest::StatusCode::SERVICE_UNAVAILABLE
                || status == reqwest::StatusCode::TOO_MANY_REQUESTS)
                && attempts < MAX_ATTEMPTS
            {
                warn!(
                    "Rate limited, retrying... (attempt {}/{})",
                    attempts, MAX_ATTEMPTS
                );
                continue;
            }

            if !status.is_success() {
                let error_body = response.text().await.unwrap_or_default();
                anyhow::bail!("Discogs API error {}: {}", status, error_body);
            }

            return Ok(response);
        }
    }

    /// OAuth 1.0a `Authorization` header using the PLAINTEXT signature.
    /// Every call gets a fresh nonce and timestamp, so build one per attempt.
    fn oauth_header(&self, token: Option<(&str, &str)>, extra: &[(&str, &str)]) -> String {
        let token_secret = token.map(|(_, secret)| secret).unwrap_or("");
        let signature = format!(
            "{}&{}",
            urlencoding::encode(&self.consumer.secret),
            urlencoding::encode(token_secret)
        );
        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let timestamp = chrono::Utc::now().timestamp().to_string();

        let mut params: Vec<(&str, &str)> = vec![
            ("oauth_consumer_key", self.consumer.key.as_str()),
            ("oauth_nonce", nonce.as_str()),
            ("oauth_signature", signature.as_str()),
            ("oauth_signature_method", "PLAINTEXT"),
            ("oauth_timestamp", timestamp.as_str()),
        ];
        if let Some((token, _)) = token {
            params.push(("oauth_token", token));
        }
        params.push(("oauth_version", "1.0"));
        params.extend_from_slice(extra);

        let joined = params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join(", ");

        format!("OAuth {}", joined)
    }
}

fn parse_form(body: &str) -> HashMap<String, String> {
    body.trim()
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| {
            let value = urlencoding::decode(v)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| v.to_string());
            (k.to_string(), value)
        })
        .collect()
}

fn form_field(fields: &HashMap<String, String>, key: &str) -> Result<String> {
    fields
        .get(key)
        .filter(|v| !v.is_empty())
        .cloned()
        .with_context(|| format!("Discogs response is missing `{}`", key))
}

/// Keep embedded artwork at most 1200px on a side and about 1 MiB.
pub fn resize_if_needed(image_data: Vec<u8>) -> Result<Vec<u8>> {
    const MAX_SIZE: u32 = 1200;
    const MAX_BYTES: usize = 1024 * 1024;

    if image_data.len() <= MAX_BYTES {
        if let Ok(img) = image::load_from_memory(&image_data) {
            if img.width() <= MAX_SIZE && img.height() <= MAX_SIZE {
                return Ok(image_data);
            }
        } else {
            return Ok(image_data);
        }
    }

    let img =
        image::load_from_memory(&image_data).context("Failed to decode image for resizing")?;

    let resized = img.resize(MAX_SIZE, MAX_SIZE, image::imageops::FilterType::Lanczos3);

    let mut output = std::io::Cursor::new(Vec::new());
    resized
        .write_to(&mut output, image::ImageOutputFormat::Jpeg(90))
        .context("Failed to encode resized image")?;

    Ok(output.into_inner())
}

/// Look up and embed a cover for every file. Artists are searched once per run.
pub async fn fetch_artwork(
    client: &DiscogsClient,
    files: &[PathBuf],
    patterns: &Patterns,
    progress: &mut Progress,
) -> ArtworkReport {
    let mut report = ArtworkReport::default();
    let mut cache: HashMap<String, Option<Vec<u8>>> = HashMap::new();
    progress.print();

    for file in files {
        match artwork_for_file(client, file, patterns, &mut cache).await {
            Ok(true) => report.embedded.push(file.clone()),
            Ok(false) => {
                debug!("No artwork found for {}", file.display());
                report.missing.push(file.clone());
            }
            Err(e) => {
                warn!("Artwork failed for {}: {:#}", file.display(), e);
                report.failed.push(file.clone());
            }
        }
        progress.inc_and_print();
    }

    progress.finish();
    info!(
        "Artwork completed: {} embedded, {} without image, {} failed.",
        report.embedded.len(),
        report.missing.len(),
        report.failed.len()
    );

    report
}

async fn artwork_for_file(
    client: &DiscogsClient,
    file: &Path,
    patterns: &Patterns,
    cache: &mut HashMap<String, Option<Vec<u8>>>,
) -> Result<bool> {
    let artist = tagger::primary_artist(&tagger::read_artist(file)?, patterns);
    let key = artist.to_lowercase();

    if !cache.contains_key(&key) {
        let image = client.find_artist_image(&artist).await?;
        cache.insert(key.clone(), image);
    }

    match cache.get(&key).and_then(|img| img.as_deref()) {
        Some(image) => {
            tagger::embed_cover(file, image)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> DiscogsClient {
        DiscogsClient::new(
            "test-agent",
            ConsumerCredentials {
                key: "ckey".to_string(),
                secret: "c&secret".to_string(),
            },
        )
        .unwrap()
    }

    #[test]
    fn missing_consumer_credentials_are_rejected() {
        let result = DiscogsClient::new(
            "test-agent",
            ConsumerCredentials {
                key: String::new(),
                secret: String::new(),
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn plaintext_signature_joins_secrets() {
        let header = client().oauth_header(Some(("tok", "tsecret")), &[("oauth_verifier", "123")]);

        assert!(header.starts_with("OAuth "));
        assert!(header.contains("oauth_signature_method=\"PLAINTEXT\""));
        assert!(header.contains("oauth_token=\"tok\""));
        assert!(header.contains("oauth_verifier=\"123\""));
        // "c%26secret&tsecret", encoded once more inside the header
        assert!(header.contains("oauth_signature=\"c%2526secret%26tsecret\""));
    }

    #[test]
    fn form_bodies_are_decoded() {
        let fields = parse_form("oauth_token=a%20b&oauth_token_secret=s&oauth_callback_confirmed=true\n");
        assert_eq!(fields["oauth_token"], "a b");
        assert_eq!(form_field(&fields, "oauth_token_secret").unwrap(), "s");
        assert!(form_field(&fields, "missing").is_err());
    }

    #[test]
    fn undecodable_images_pass_through() {
        let data = vec![1, 2, 3, 4];
        assert_eq!(resize_if_needed(data.clone()).unwrap(), data);
    }
}

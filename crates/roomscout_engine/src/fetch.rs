use std::time::Duration;

use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use engine_logging::engine_debug;
use futures_util::StreamExt;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{Client, Response, Url};

use crate::{FailureKind, FetchError, FetchMetadata, FetchOutput, FetchedPage};

pub(crate) const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub allowed_content_types: Vec<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
            allowed_content_types: vec![
                "text/html".to_string(),
                "application/xhtml+xml".to_string(),
            ],
        }
    }
}

/// Plain HTTP page download used for listing tables and detail pages.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchOutput, FetchError>;

    /// Fetches and decodes the body to UTF-8, keeping the post-redirect URL.
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let output = self.fetch(url).await?;
        let FetchMetadata {
            final_url,
            redirect_count,
            content_type,
        } = output.metadata;
        if redirect_count > 0 {
            engine_debug!("{url} redirected {redirect_count} time(s) to {final_url}");
        }
        let final_url = Url::parse(&final_url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        Ok(FetchedPage {
            html: decode_body(&output.bytes, content_type.as_deref()),
            url: final_url,
        })
    }
}

/// One pooled client shared by every request. Redirects are followed hop by hop
/// in [`ReqwestFetcher::follow`].
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: Client,
    settings: FetchSettings,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { client, settings })
    }

    /// GET with manual redirect handling; returns the final response and hop count.
    async fn follow(&self, start: Url) -> Result<(Response, usize), FetchError> {
        let mut url = start;
        let mut hops = 0;
        loop {
            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(map_reqwest_error)?;
            if !response.status().is_redirection() {
                return Ok((response, hops));
            }
            let Some(target) = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|location| url.join(location).ok())
            else {
                // A redirect without a usable target is handed back as-is.
                return Ok((response, hops));
            };
            hops += 1;
            if hops > self.settings.redirect_limit {
                return Err(FetchError::new(
                    FailureKind::RedirectLimitExceeded,
                    format!("more than {} redirects from {url}", self.settings.redirect_limit),
                ));
            }
            url = target;
        }
    }

    fn too_large(&self, actual: u64) -> FetchError {
        FetchError::new(
            FailureKind::TooLarge {
                max_bytes: self.settings.max_bytes,
                actual: Some(actual),
            },
            "response too large",
        )
    }

    /// Streams the body, giving up as soon as it passes `max_bytes`.
    async fn read_capped(&self, response: Response) -> Result<Vec<u8>, FetchError> {
        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = (bytes.len() + chunk.len()) as u64;
            if next_len > self.settings.max_bytes {
                return Err(self.too_large(next_len));
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }
}

#[async_trait::async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchOutput, FetchError> {
        let parsed =
            Url::parse(url).map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let (response, redirect_count) = self.follow(parsed).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        if let Some(declared) = response.content_length().filter(|len| *len > self.settings.max_bytes) {
            return Err(self.too_large(declared));
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        if let Some(ct) = content_type.as_deref() {
            if !is_allowed(&self.settings.allowed_content_types, ct) {
                return Err(FetchError::new(
                    FailureKind::UnsupportedContentType {
                        content_type: ct.to_string(),
                    },
                    "not an html page",
                ));
            }
        }

        let bytes = self.read_capped(response).await?;
        Ok(FetchOutput {
            metadata: FetchMetadata {
                final_url,
                redirect_count,
                content_type,
            },
            bytes,
        })
    }
}

fn is_allowed(allowed: &[String], content_type: &str) -> bool {
    let mime = content_type.split(';').next().unwrap_or(content_type).trim();
    allowed.iter().any(|candidate| candidate.eq_ignore_ascii_case(mime))
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    let kind = if err.is_timeout() {
        FailureKind::Timeout
    } else {
        FailureKind::Network
    };
    FetchError::new(kind, err.to_string())
}

/// Decode raw bytes into UTF-8 using: BOM -> Content-Type charset -> chardetng guess.
///
/// Malformed sequences are replaced rather than rejected; a listing page with a
/// stray byte is still worth parsing.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = Encoding::for_bom(bytes)
        .map(|(enc, _)| enc)
        .or_else(|| {
            content_type
                .and_then(charset_label)
                .and_then(|label| Encoding::for_label(label.as_bytes()))
        })
        .unwrap_or_else(|| {
            let mut detector = EncodingDetector::new();
            detector.feed(bytes, true);
            detector.guess(None, true)
        });
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

fn charset_label(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|part| {
        let (key, value) = part.trim().split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"').to_string())
    })
}

//! HTTP transcript fetcher.
//!
//! Talks to a transcript service exposing `GET {endpoint}/{platform}/{id}`.
//! Each call is a single attempt; retries belong to
//! [`flowlens_core::transcript::acquire`].

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use flowlens_core::{FetchOutcome, TranscriptFetcher};
use flowlens_shared::{FlowLensError, Result, TranscriptConfig, VideoRef};

/// User-Agent string for transcript requests.
const USER_AGENT: &str = concat!("FlowLens/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct TranscriptBody {
    success: Option<bool>,
    #[serde(alias = "transcript")]
    text: Option<String>,
    error: Option<String>,
}

/// [`TranscriptFetcher`] backed by an HTTP transcript service.
#[derive(Clone)]
pub struct HttpTranscriptFetcher {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpTranscriptFetcher {
    /// Build a fetcher from `[transcripts]`. Fails if no endpoint is set.
    pub fn new(config: &TranscriptConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| FlowLensError::config("transcripts.endpoint is not set"))?;
        let parsed = Url::parse(endpoint)
            .map_err(|e| FlowLensError::config(format!("transcripts.endpoint: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FlowLensError::config(
                "transcripts.endpoint must be an http(s) URL",
            ));
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FlowLensError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key(),
        })
    }

    fn url_for(&self, video: &VideoRef) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint,
            video.platform().as_str(),
            urlencoding::encode(video.id())
        )
    }
}

impl TranscriptFetcher for HttpTranscriptFetcher {
    fn fetch(&self, video: &VideoRef) -> impl Future<Output = FetchOutcome> + Send {
        let url = self.url_for(video);
        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        async move {
            debug!(%url, "requesting transcript");
            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => return FetchOutcome::Transient(format!("{url}: {e}")),
            };

            let status = response.status();
            if !status.is_success() {
                return outcome_for_status(status);
            }

            let is_json = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.contains("json"));
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => return FetchOutcome::Transient(format!("{url}: body read failed: {e}")),
            };

            if is_json {
                match serde_json::from_str::<TranscriptBody>(&body) {
                    Ok(parsed) => FetchOutcome::from_parts(
                        parsed.success.unwrap_or(true),
                        parsed.text,
                        parsed.error,
                    ),
                    Err(e) => FetchOutcome::Transient(format!("{url}: malformed JSON: {e}")),
                }
            } else {
                FetchOutcome::from_parts(true, Some(body), None)
            }
        }
    }
}

fn outcome_for_status(status: StatusCode) -> FetchOutcome {
    let message = format!("HTTP {status}");
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        FetchOutcome::Transient(message)
    } else {
        FetchOutcome::Unavailable(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowlens_shared::Platform;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher_for(server: &MockServer) -> HttpTranscriptFetcher {
        HttpTranscriptFetcher::new(&TranscriptConfig {
            endpoint: Some(format!("{}/v1/", server.uri())),
            api_key_env: "FLOWLENS_TEST_KEY_UNSET".into(),
            ..TranscriptConfig::default()
        })
        .unwrap()
    }

    fn video() -> VideoRef {
        VideoRef::new(Platform::Youtube, "dQw4w9WgXcQ").unwrap()
    }

    #[test]
    fn requires_endpoint() {
        let err = HttpTranscriptFetcher::new(&TranscriptConfig::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("endpoint"));

        let err = HttpTranscriptFetcher::new(&TranscriptConfig {
            endpoint: Some("ftp://example.com".into()),
            ..TranscriptConfig::default()
        })
        .err()
        .unwrap();
        assert!(err.to_string().contains("http"));
    }

    #[tokio::test]
    async fn plain_text_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/youtube/dQw4w9WgXcQ"))
            .respond_with(ResponseTemplate::new(200).set_body_string("never gonna give you up"))
            .mount(&server)
            .await;

        let outcome = fetcher_for(&server).fetch(&video()).await;
        assert_eq!(
            outcome,
            FetchOutcome::Transcript("never gonna give you up".into())
        );
    }

    #[tokio::test]
    async fn json_body_with_triple() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/youtube/dQw4w9WgXcQ"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "text": null,
                "error": "Subtitles are disabled for this video"
            })))
            .mount(&server)
            .await;

        let outcome = fetcher_for(&server).fetch(&video()).await;
        assert!(matches!(outcome, FetchOutcome::Unavailable(_)));
    }

    #[tokio::test]
    async fn json_transcript_alias() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "transcript": "hello" })),
            )
            .mount(&server)
            .await;

        let outcome = fetcher_for(&server).fetch(&video()).await;
        assert_eq!(outcome, FetchOutcome::Transcript("hello".into()));
    }

    #[tokio::test]
    async fn status_codes_map_to_outcomes() {
        for (code, transient) in [(404, false), (410, false), (403, false), (429, true), (503, true)] {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(code))
                .mount(&server)
                .await;

            let outcome = fetcher_for(&server).fetch(&video()).await;
            match outcome {
                FetchOutcome::Transient(_) => assert!(transient, "{code} should be terminal"),
                FetchOutcome::Unavailable(_) => assert!(!transient, "{code} should retry"),
                FetchOutcome::Transcript(_) => panic!("{code} produced a transcript"),
            }
        }
    }

    #[tokio::test]
    async fn sends_bearer_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let mut fetcher = fetcher_for(&server);
        fetcher.api_key = Some("secret".into());
        assert_eq!(fetcher.fetch(&video()).await, FetchOutcome::Transcript("ok".into()));
    }

    #[tokio::test]
    async fn retries_through_acquire() {
        use flowlens_core::{RetryPolicy, acquire};
        use flowlens_shared::{
            CandidateContext, Classification, ClassifiedVideo, ContextTier, DiscoveryType,
            PagePosition, VideoCandidate,
        };
        use std::sync::Arc;

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("second time lucky"))
            .mount(&server)
            .await;

        let v = video();
        let mut videos = vec![ClassifiedVideo {
            candidate: VideoCandidate {
                url: v.canonical_url(),
                video: v,
                discovery_type: DiscoveryType::HtmlEmbed,
                context: CandidateContext {
                    tier: ContextTier::HostDocument,
                    location: "host_document".into(),
                    surrounding_text: String::new(),
                    position: PagePosition::MainContent,
                    container_src: None,
                    container_title: None,
                    in_workflow_preview: false,
                },
            },
            classification: Classification::PrimaryExplainer,
            confidence: 0.95,
            has_transcript: None,
            transcript_attempts: 0,
        }];

        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
        };
        let report = acquire(&mut videos, Arc::new(fetcher_for(&server)), policy, 1).await;

        assert_eq!(videos[0].transcript_attempts, 2);
        assert_eq!(videos[0].has_transcript, Some(true));
        assert_eq!(report.transcripts.len(), 1);
    }
}

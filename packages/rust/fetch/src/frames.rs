//! Hosting document and embedded frame retrieval.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use url::Url;

use flowlens_discovery::list_frames;
use flowlens_shared::{FetchConfig, FlowLensError, PageInput, Result};

use crate::guard::is_ssrf_target;

/// User-Agent string for page and frame requests.
const USER_AGENT: &str = concat!("FlowLens/", env!("CARGO_PKG_VERSION"));

/// Frames fetched in parallel for one page.
const FRAME_CONCURRENCY: usize = 4;

/// Fetches a hosting document and the markup of its embedded frames.
#[derive(Clone)]
pub struct FrameFetcher {
    client: Client,
    /// Allow localhost/private IPs (for integration tests with mock servers).
    allow_localhost: bool,
}

impl FrameFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FlowLensError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            allow_localhost: false,
        })
    }

    /// Allow fetching localhost/private IPs (for integration tests).
    #[cfg(test)]
    pub fn allow_localhost(mut self) -> Self {
        self.allow_localhost = true;
        self
    }

    /// Fetch a page, list its frames, and fill in their markup.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn load_page(&self, url: &Url) -> Result<PageInput> {
        let host_markup = self.fetch_text(url).await?;
        let frames = list_frames(&host_markup, Some(url.as_str()))
            .into_iter()
            .map(|f| f.into_input())
            .collect();

        let mut input = PageInput {
            page_url: Some(url.to_string()),
            host_markup,
            frames,
            ..PageInput::default()
        };
        self.fill_frames(&mut input).await;
        Ok(input)
    }

    /// Fetch markup for every frame that has a `src` but no markup yet.
    ///
    /// Failures are recorded on the frame's `fetch_error`; discovery later
    /// reports them as partial failures.
    #[instrument(skip_all, fields(frames = input.frames.len()))]
    pub async fn fill_frames(&self, input: &mut PageInput) {
        let semaphore = Arc::new(Semaphore::new(FRAME_CONCURRENCY));
        let mut handles = Vec::new();

        for (index, frame) in input.frames.iter_mut().enumerate() {
            if frame.markup.is_some() {
                continue;
            }
            let Some(src) = frame.src.clone() else {
                continue;
            };
            let url = match Url::parse(&src) {
                Ok(url) => url,
                Err(e) => {
                    frame.fetch_error = Some(format!("invalid frame URL: {e}"));
                    continue;
                }
            };
            if !self.allow_localhost && is_ssrf_target(&url) {
                warn!(%url, "SSRF protection: blocked");
                frame.fetch_error = Some("blocked: local or private address".into());
                continue;
            }

            let this = self.clone();
            let sem = Arc::clone(&semaphore);
            handles.push((
                index,
                tokio::spawn(async move {
                    let Ok(_permit) = sem.acquire_owned().await else {
                        return Err(FlowLensError::Network("semaphore closed".into()));
                    };
                    this.fetch_text(&url).await
                }),
            ));
        }

        let mut filled = 0usize;
        for (index, handle) in handles {
            let frame = &mut input.frames[index];
            match handle.await {
                Ok(Ok(markup)) => {
                    frame.markup = Some(markup);
                    filled += 1;
                }
                Ok(Err(e)) => {
                    warn!(frame = %frame.label(), error = %e, "frame fetch failed");
                    frame.fetch_error = Some(e.to_string());
                }
                Err(e) => {
                    frame.fetch_error = Some(format!("task failed: {e}"));
                }
            }
        }

        info!(filled, total = input.frames.len(), "frame markup fetched");
    }

    async fn fetch_text(&self, url: &Url) -> Result<String> {
        if !self.allow_localhost && is_ssrf_target(url) {
            return Err(FlowLensError::Network(format!(
                "{url}: blocked local or private address"
            )));
        }
        debug!(%url, "fetching markup");

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| FlowLensError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FlowLensError::Network(format!("{url}: HTTP {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| FlowLensError::Network(format!("{url}: body read failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowlens_shared::{FrameInput, FrameOrigin};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> FrameFetcher {
        FrameFetcher::new(&FetchConfig::default()).unwrap().allow_localhost()
    }

    #[tokio::test]
    async fn loads_page_and_frames() {
        let host = MockServer::start().await;
        let preview = MockServer::start().await;

        let page = format!(
            r#"<html><body>
                <iframe src="/same/frame" title="Details"></iframe>
                <iframe src="{}/workflow-preview/42"></iframe>
                <iframe src="https://www.youtube.com/embed/dQw4w9WgXcQ"></iframe>
            </body></html>"#,
            preview.uri()
        );

        Mock::given(method("GET"))
            .and(path("/workflows/42"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page))
            .mount(&host)
            .await;
        Mock::given(method("GET"))
            .and(path("/same/frame"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>same</p>"))
            .mount(&host)
            .await;
        Mock::given(method("GET"))
            .and(path("/workflow-preview/42"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>preview</p>"))
            .mount(&preview)
            .await;

        let url = Url::parse(&format!("{}/workflows/42", host.uri())).unwrap();
        let input = fetcher().load_page(&url).await.unwrap();

        assert_eq!(input.page_url.as_deref(), Some(url.as_str()));
        assert_eq!(input.frames.len(), 2);
        assert_eq!(input.frames[0].origin, FrameOrigin::SameContext);
        assert_eq!(input.frames[0].markup.as_deref(), Some("<p>same</p>"));
        assert_eq!(input.frames[1].origin, FrameOrigin::CrossOrigin);
        assert_eq!(input.frames[1].markup.as_deref(), Some("<p>preview</p>"));
    }

    #[tokio::test]
    async fn failed_frame_records_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mut input = PageInput {
            frames: vec![FrameInput {
                src: Some(format!("{}/broken", server.uri())),
                title: None,
                origin: FrameOrigin::CrossOrigin,
                markup: None,
                fetch_error: None,
            }],
            ..PageInput::default()
        };
        fetcher().fill_frames(&mut input).await;

        assert!(input.frames[0].markup.is_none());
        let err = input.frames[0].fetch_error.as_deref().unwrap();
        assert!(err.contains("500"), "{err}");
    }

    #[tokio::test]
    async fn guard_blocks_private_frames() {
        let strict = FrameFetcher::new(&FetchConfig::default()).unwrap();
        let mut input = PageInput {
            frames: vec![FrameInput {
                src: Some("http://169.254.169.254/latest/meta-data".into()),
                title: None,
                origin: FrameOrigin::CrossOrigin,
                markup: None,
                fetch_error: None,
            }],
            ..PageInput::default()
        };
        strict.fill_frames(&mut input).await;

        assert!(input.frames[0].markup.is_none());
        assert!(input.frames[0].fetch_error.as_deref().unwrap().contains("blocked"));
    }

    #[tokio::test]
    async fn supplied_markup_is_kept() {
        let mut input = PageInput {
            frames: vec![FrameInput {
                src: Some("https://preview.example.com/x".into()),
                title: None,
                origin: FrameOrigin::CrossOrigin,
                markup: Some("<p>already here</p>".into()),
                fetch_error: None,
            }],
            ..PageInput::default()
        };
        fetcher().fill_frames(&mut input).await;
        assert_eq!(input.frames[0].markup.as_deref(), Some("<p>already here</p>"));
    }
}

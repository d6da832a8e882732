use crate::app::ports::{HttpClientPort, HttpRequest, HttpResponse};
use crate::constants::{BROWSER_USER_AGENT, IMAGE_RESIZE_WIDTH, MAX_IMAGE_SIZE, TEMP_IMAGE_PREFIX};
use crate::error::{BotError, Result};
use crate::infra::thumbnail::thumbnail;
use crate::types::SourceEvent;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

static OG_IMAGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:image"]"#).expect("valid selector"));
static IMG_SRC: Lazy<Selector> = Lazy::new(|| Selector::parse("img[src]").expect("valid selector"));

/// Image ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    /// Downloaded (and possibly thumbnailed) copy in the temp dir. Not removed
    /// after upload.
    File(PathBuf),
    /// Inline `data:` URI, decoded by the uploader.
    DataUri(String),
}

/// Image candidates found on an event page.
#[derive(Debug, Default)]
struct PageImages {
    og_image: Option<String>,
    img_srcs: Vec<String>,
}

fn parse_page(html: &str) -> PageImages {
    let doc = Html::parse_document(html);
    PageImages {
        og_image: doc
            .select(&OG_IMAGE)
            .filter_map(|m| m.value().attr("content"))
            .map(str::trim)
            .find(|c| !c.is_empty())
            .map(str::to_string),
        img_srcs: doc
            .select(&IMG_SRC)
            .filter_map(|img| img.value().attr("src"))
            .map(|src| src.trim().to_string())
            .collect(),
    }
}

fn absolute(base: &str, candidate: &str) -> String {
    Url::parse(base)
        .and_then(|base| base.join(candidate))
        .map(String::from)
        .unwrap_or_else(|_| candidate.to_string())
}

/// Picks, downloads and if needed shrinks the picture of an event.
pub struct ImageAcquirer {
    http: Arc<dyn HttpClientPort>,
    default_image_url: String,
}

impl ImageAcquirer {
    pub fn new(http: Arc<dyn HttpClientPort>, default_image_url: &str) -> Self {
        Self {
            http,
            default_image_url: default_image_url.to_string(),
        }
    }

    pub fn default_image_url(&self) -> &str {
        &self.default_image_url
    }

    /// Download the best image for the event, falling back to the default
    /// image once. A second failure is returned so the caller can skip the event.
    #[instrument(skip(self, event), fields(url = %event.url))]
    pub async fn acquire(&self, event: &SourceEvent) -> Result<ImageSource> {
        let url = self.choose_url(event).await;
        match self.download(&url).await {
            Ok(image) => Ok(image),
            Err(e) if url != self.default_image_url => {
                warn!(image = %url, error = %e, "Media download error, using default image");
                self.download(&self.default_image_url).await
            }
            Err(e) => Err(e),
        }
    }

    /// First usable candidate of: the source's own image, the page's
    /// `og:image`, the largest `<img>` on the page, the default image.
    pub async fn choose_url(&self, event: &SourceEvent) -> String {
        let own = event.image_url.trim();
        if !own.is_empty() && own != event.source_url && !own.ends_with('/') {
            return absolute(&event.url, own);
        }

        let page = self.fetch_page(&event.url).await;
        if let Some(og) = self.check_og_image(&event.url, page.og_image.as_deref()).await {
            return og;
        }
        if let Some(best) = self.largest_img(&event.url, &page.img_srcs).await {
            return best;
        }
        info!(url = %event.url, "No image found");
        self.default_image_url.clone()
    }

    async fn fetch_page(&self, url: &str) -> PageImages {
        let request = HttpRequest::get(url).with_header("User-Agent", BROWSER_USER_AGENT);
        match self.http.execute(request).await {
            Ok(resp) if resp.is_success() => parse_page(&resp.text()),
            Ok(resp) => {
                debug!(status = resp.status, "event page not available");
                PageImages::default()
            }
            Err(e) => {
                warn!(error = %e, "could not fetch event page");
                PageImages::default()
            }
        }
    }

    async fn head(&self, url: &str) -> Option<HttpResponse> {
        let request = HttpRequest::head(url).with_header("User-Agent", BROWSER_USER_AGENT);
        match self.http.execute(request).await {
            Ok(resp) => Some(resp),
            Err(e) => {
                debug!(src = url, error = %e, "HEAD failed for image");
                None
            }
        }
    }

    async fn check_og_image(&self, page_url: &str, og_image: Option<&str>) -> Option<String> {
        let Some(og) = og_image else {
            debug!("No opengraph image found");
            return None;
        };
        let og = absolute(page_url, og);
        if page_url.contains(&og) {
            debug!(%og, "Opengraph image URL is a substring of the event URL");
            return None;
        }
        if !og.starts_with("http") {
            return None;
        }
        match self.head(&og).await {
            Some(resp) if resp.status == 200 => Some(og),
            Some(resp) => {
                debug!(%og, status = resp.status, "opengraph image not reachable");
                None
            }
            None => None,
        }
    }

    /// Largest image under the size ceiling, judged by `Content-Length`.
    async fn largest_img(&self, page_url: &str, srcs: &[String]) -> Option<String> {
        let mut best: Option<(u64, String)> = None;
        for src in srcs {
            if src.starts_with("data:") || src.starts_with('/') || src.ends_with(".svg") {
                continue;
            }
            let src = absolute(page_url, src);
            if !src.starts_with("http") {
                continue;
            }
            let Some(resp) = self.head(&src).await else {
                continue;
            };
            if !resp.is_success() {
                continue;
            }
            let size = resp.content_length.unwrap_or(0);
            debug!(%src, size, "Choosing image by size");
            if size < MAX_IMAGE_SIZE && best.as_ref().map_or(size > 0, |(b, _)| size > *b) {
                best = Some((size, src));
            }
        }
        best.map(|(_, src)| src)
    }

    /// Fetch an image into a kept temp file, thumbnailing large or AVIF images.
    pub async fn download(&self, url: &str) -> Result<ImageSource> {
        if url.starts_with("data:") {
            return Ok(ImageSource::DataUri(url.to_string()));
        }
        let request = HttpRequest::get(url).with_header("User-Agent", BROWSER_USER_AGENT);
        let resp = self.http.execute(request).await?;
        if resp.status != 200 {
            return Err(BotError::Status {
                status: resp.status,
                url: url.to_string(),
            });
        }

        let mime = resp.mime();
        let oversized = resp.content_length.unwrap_or(resp.bytes.len() as u64) > MAX_IMAGE_SIZE;
        let avif = mime == "image/avif" || url.ends_with(".avif");
        let bytes = if oversized || avif {
            debug!(%url, %mime, oversized, "thumbnailing image");
            let mime = if mime.is_empty() && avif { "image/avif".to_string() } else { mime };
            thumbnail(&resp.bytes, &mime, IMAGE_RESIZE_WIDTH)?
        } else {
            resp.bytes
        };

        let mut file = tempfile::Builder::new()
            .prefix(TEMP_IMAGE_PREFIX)
            .tempfile()?;
        file.write_all(&bytes)?;
        let (_, path) = file.keep().map_err(|e| BotError::Io(e.error))?;
        debug!(%url, path = %path.display(), bytes = bytes.len(), "image downloaded");
        Ok(ImageSource::File(path))
    }
}

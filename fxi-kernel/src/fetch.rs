//! Blocking fetch boundary for images and documents.
//!
//! Every fetch blocks the calling thread until it resolves. There is no
//! timeout; a hung request ties up its thread until the transport gives up.

use fxi_api::ImageData;

use crate::FetchError;

/// Something that can turn a URL into bytes.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// HTTP(S) fetcher backed by `reqwest`'s blocking client.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("fxi/", env!("CARGO_PKG_VERSION")))
            .timeout(None::<std::time::Duration>)
            .build()?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        tracing::debug!(url, "fetching");
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response.bytes()?.to_vec())
    }
}

/// Decode any format the `image` crate understands into RGBA8.
pub fn decode_image(bytes: &[u8]) -> Result<ImageData, FetchError> {
    let rgba = image::load_from_memory(bytes)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(ImageData::new(width, height, rgba.into_raw()))
}

/// Fetch and decode an image.
pub fn fetch_image(fetcher: &dyn Fetcher, url: &str) -> Result<ImageData, FetchError> {
    let bytes = fetcher.fetch(url)?;
    decode_image(&bytes)
}

/// Fetch a document and decode it as (lossy) UTF-8 text.
pub fn fetch_text(fetcher: &dyn Fetcher, url: &str) -> Result<String, FetchError> {
    let bytes = fetcher.fetch(url)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

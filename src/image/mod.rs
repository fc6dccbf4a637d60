//! Remote frame image retrieval.

use crate::{config::Config, error::AppError, http};

use alloc::vec::Vec;

pub mod bmp;

/// Cap the download well under the heap; a converted panel-sized bitmap is
/// a fraction of this.
const MAX_IMAGE_BYTES: usize = 48 * 1024;

/// Download the configured image endpoint and return the BMP bytes.
///
/// The caller parses them with [`bmp::Bmp::parse`]; a body that is not a
/// usable bitmap counts as a failed fetch and is retried on a later wake.
pub async fn fetch_image(
    stack: embassy_net::Stack<'static>,
    config: &Config,
) -> Result<Vec<u8>, AppError> {
    let (host, port, path) = http::split_url(config.img_url)?;
    let response = http::http_get(stack, host, port, path, None, MAX_IMAGE_BYTES).await?;
    let body = http::checked_body(&response)?;

    // shed the header bytes in place so only the image stays on the heap
    let offset = response.len() - body.len();
    let mut data = response;
    data.drain(..offset);
    Ok(data)
}

//! Inline face thumbnails.
//!
//! Face entries point at full-size images. The preview UI only shows a
//! small square, so each image is fetched, downscaled and embedded as a
//! `data:image/png;base64,…` URI. Failures are per entry: an image that
//! cannot be fetched or decoded keeps its original URL.

use std::io::Cursor;

use anyhow::{anyhow, Result};
use base64::Engine;
use futures::future::join_all;
use image::imageops::FilterType;
use image::ImageFormat;
use reqwest::Client;
use tracing::{debug, warn};

use crate::cards::CardEntry;

/// Refuse to decode anything bigger than this (10 MB).
const MAX_IMAGE_SIZE: u64 = 10 * 1024 * 1024;

/// Replaces every entry's `image_url` with an inline thumbnail.
///
/// All fetches run concurrently and the call returns once every one has
/// finished, whatever their individual outcome.
pub async fn inline_thumbnails(http: &Client, entries: Vec<CardEntry>, size: u32) -> Vec<CardEntry> {
    let tasks = entries.into_iter().map(|mut entry| async move {
        if let Some(url) = entry.image_url.clone() {
            match thumbnail_data_uri(http, &url, size).await {
                Ok(data_uri) => entry.image_url = Some(data_uri),
                Err(e) => warn!("Keeping original image URL {url}: {e}"),
            }
        }
        entry
    });
    join_all(tasks).await
}

/// Fetches an image and returns it as a `size`×`size` PNG data URI.
pub async fn thumbnail_data_uri(http: &Client, url: &str, size: u32) -> Result<String> {
    if url.starts_with("data:") {
        return Err(anyhow!("already an inline image"));
    }

    let response = http.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("image fetch returned HTTP {status}"));
    }
    if let Some(len) = response.content_length() {
        check_size(len)?;
    }
    let bytes = response.bytes().await?;
    check_size(bytes.len() as u64)?;

    // Decoding and resampling are CPU-bound
    let png = tokio::task::spawn_blocking(move || resize_to_png(&bytes, size)).await??;
    debug!("Thumbnail for {url}: {} bytes", png.len());

    Ok(format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(&png)
    ))
}

fn check_size(len: u64) -> Result<()> {
    if len > MAX_IMAGE_SIZE {
        return Err(anyhow!("image too large ({len} bytes)"));
    }
    Ok(())
}

fn resize_to_png(data: &[u8], size: u32) -> Result<Vec<u8>> {
    let img = image::load_from_memory(data)?;
    let thumb = img.resize_exact(size, size, FilterType::Triangle);
    let mut out = Vec::new();
    thumb.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)?;
    Ok(out)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cards::{process_data_list, DataEntry};
    use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};

    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([200, 120, 40, 255]),
        ));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    fn decode_data_uri(uri: &str) -> DynamicImage {
        let b64 = uri.strip_prefix("data:image/png;base64,").unwrap();
        let data = base64::engine::general_purpose::STANDARD.decode(b64).unwrap();
        image::load_from_memory(&data).unwrap()
    }

    #[test]
    fn test_resize_to_png_dimensions() {
        let png = resize_to_png(&png_bytes(300, 200), 45).unwrap();
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!(img.dimensions(), (45, 45));
    }

    #[test]
    fn test_check_size() {
        assert!(check_size(MAX_IMAGE_SIZE).is_ok());
        assert!(check_size(MAX_IMAGE_SIZE + 1).is_err());
        // Would wrap to a small value if narrowed to 32 bits
        assert!(check_size(u64::from(u32::MAX) + 1 + 1024).is_err());
    }

    #[test]
    fn test_resize_rejects_garbage() {
        assert!(resize_to_png(b"definitely not an image", 45).is_err());
    }

    #[tokio::test]
    async fn test_thumbnail_data_uri() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/face.png")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body(png_bytes(120, 120))
            .create_async()
            .await;

        let uri = thumbnail_data_uri(&Client::new(), &format!("{}/face.png", server.url()), 45)
            .await
            .unwrap();
        assert_eq!(decode_data_uri(&uri).dimensions(), (45, 45));
    }

    #[tokio::test]
    async fn test_inline_thumbnails_partial_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/ok.png")
            .with_status(200)
            .with_body(png_bytes(64, 64))
            .create_async()
            .await;
        server
            .mock("GET", "/missing.png")
            .with_status(404)
            .create_async()
            .await;
        server
            .mock("GET", "/broken.png")
            .with_status(200)
            .with_body("not a png")
            .create_async()
            .await;

        let ok = format!("{}/ok.png", server.url());
        let missing = format!("{}/missing.png", server.url());
        let broken = format!("{}/broken.png", server.url());
        let entries = process_data_list(vec![
            DataEntry::image(&ok, "Alice"),
            DataEntry::image(&missing, "Bob"),
            DataEntry::text("No face"),
            DataEntry::image(&broken, "Carol"),
        ]);

        let out = inline_thumbnails(&Client::new(), entries, 45).await;

        assert_eq!(out.len(), 4);
        assert!(out[0]
            .image_url
            .as_deref()
            .unwrap()
            .starts_with("data:image/png;base64,"));
        assert_eq!(out[1].image_url.as_deref(), Some(missing.as_str()));
        assert!(out[2].image_url.is_none());
        assert_eq!(out[3].image_url.as_deref(), Some(broken.as_str()));
        assert_eq!(out[1].text, "Bob");
    }

    #[tokio::test]
    async fn test_existing_data_uri_left_alone() {
        let entries = process_data_list(vec![DataEntry::image("data:image/png;base64,AAAA", "x")]);
        let out = inline_thumbnails(&Client::new(), entries, 45).await;
        assert_eq!(out[0].image_url.as_deref(), Some("data:image/png;base64,AAAA"));
    }
}

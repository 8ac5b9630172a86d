use anyhow::Context;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::download::fetch::{extract_drive_id, is_drive_file_id};

use super::rules::IconSize;

/// Where a marker image ends up pointing in the rendered document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconSource {
    /// Image bytes inlined as a data URI; the artifact is self-contained.
    Embedded { data_uri: String },
    /// Plain address, resolved by the browser at view time.
    Direct { url: String },
}

impl IconSource {
    pub fn address(&self) -> &str {
        match self {
            IconSource::Embedded { data_uri } => data_uri,
            IconSource::Direct { url } => url,
        }
    }
}

/// Outcome of resolving one image reference. `fallback_reason` is set
/// when embedding was requested but failed and the direct address is
/// used instead; the caller decides how loudly to report it.
#[derive(Debug)]
pub struct IconResolution {
    pub source: IconSource,
    pub fallback_reason: Option<anyhow::Error>,
}

/// Rewrite a Google Drive share link or bare file id into the direct
/// thumbnail address at the requested pixel size. Anything else is
/// returned unchanged.
pub fn to_direct_url(url_or_id: &str, size: &IconSize) -> String {
    if !url_or_id.contains("drive.google.com") && !is_drive_file_id(url_or_id) {
        return url_or_id.to_string();
    }
    let file_id = if is_drive_file_id(url_or_id) {
        url_or_id.to_string()
    } else {
        extract_drive_id(url_or_id).unwrap_or_else(|| url_or_id.to_string())
    };
    format!(
        "https://drive.google.com/thumbnail?id={}&sz=w{}",
        file_id,
        size.max_dimension()
    )
}

/// Sniff the image MIME type from the payload's magic bytes. Unrecognized
/// payloads are reported as PNG.
pub fn sniff_image_mime(content: &[u8]) -> &'static str {
    if content.starts_with(&[0xff, 0xd8, 0xff]) {
        "image/jpeg"
    } else if content.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if content.starts_with(b"GIF") {
        "image/gif"
    } else {
        "image/png"
    }
}

pub fn bytes_to_data_uri(content: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        sniff_image_mime(content),
        BASE64.encode(content)
    )
}

pub fn url_to_data_uri(client: &reqwest::blocking::Client, url: &str) -> anyhow::Result<String> {
    let response = client
        .get(url)
        .send()
        .and_then(|response| response.error_for_status())
        .with_context(|| format!("Fetching icon from {}", url))?;
    let content = response.bytes().context("Reading icon bytes")?;
    Ok(bytes_to_data_uri(&content))
}

/// Resolve an image reference for one marker. With `embed` set the bytes
/// are fetched and inlined; a fetch failure degrades to the direct
/// address and carries the error out for the caller to log.
pub fn resolve_icon_source(
    client: &reqwest::blocking::Client,
    url_or_id: &str,
    size: &IconSize,
    embed: bool,
) -> IconResolution {
    let direct = to_direct_url(url_or_id, size);
    if !embed {
        return IconResolution {
            source: IconSource::Direct { url: direct },
            fallback_reason: None,
        };
    }
    match url_to_data_uri(client, &direct) {
        Ok(data_uri) => IconResolution {
            source: IconSource::Embedded { data_uri },
            fallback_reason: None,
        },
        Err(err) => IconResolution {
            source: IconSource::Direct { url: direct },
            fallback_reason: Some(err),
        },
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::icons::rules::IconSize;

    use super::{bytes_to_data_uri, sniff_image_mime, to_direct_url};

    #[rstest]
    #[case(&[0xff, 0xd8, 0xff, 0xe0], "image/jpeg")]
    #[case(&[0x89, b'P', b'N', b'G', 0x0d, 0x0a], "image/png")]
    #[case(b"GIF89a", "image/gif")]
    #[case(b"<svg xmlns=", "image/png")]
    #[case(&[], "image/png")]
    fn test_sniff_image_mime(#[case] content: &[u8], #[case] expected: &'static str) {
        assert_eq!(sniff_image_mime(content), expected);
    }

    #[rstest]
    fn test_bytes_to_data_uri() {
        let uri = bytes_to_data_uri(&[0xff, 0xd8, 0xff, 0x00]);
        assert_eq!(uri, "data:image/jpeg;base64,/9j/AA==");
    }

    #[rstest]
    #[case(
        "1kaeronC0Q-h6uHbdKNzm8381m1SIFFZX",
        IconSize { width: 28, height: 28 },
        "https://drive.google.com/thumbnail?id=1kaeronC0Q-h6uHbdKNzm8381m1SIFFZX&sz=w28"
    )]
    #[case(
        "https://drive.google.com/file/d/1kaeronC0Q/view?usp=sharing",
        IconSize { width: 28, height: 48 },
        "https://drive.google.com/thumbnail?id=1kaeronC0Q&sz=w48"
    )]
    #[case(
        "https://example.com/icons/shop.png",
        IconSize { width: 28, height: 28 },
        "https://example.com/icons/shop.png"
    )]
    fn test_to_direct_url(#[case] input: &str, #[case] size: IconSize, #[case] expected: &str) {
        assert_eq!(to_direct_url(input, &size), expected);
    }
}

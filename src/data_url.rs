use crate::error::AnalysisError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Image decoded out of a `data:<mime>;base64,<payload>` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Splits off the header of a data URL and base64-decodes the payload.
///
/// Whatever precedes the first `,` is the header, and its mime type is only
/// trusted when it names an image. Otherwise the type is sniffed from the
/// decoded bytes. The payload is the segment between the first and second
/// `,`; anything after a stray second comma is ignored.
pub fn decode_data_url(url: &str) -> Result<DecodedImage, AnalysisError> {
    let mut segments = url.split(',');
    let header = segments.next().unwrap_or_default();
    let payload = segments.next().ok_or_else(|| {
        AnalysisError::InvalidInput(
            "la imagen no es una data URL (falta la separación ',')".to_string(),
        )
    })?;

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| AnalysisError::InvalidInput(format!("base64 inválido: {}", e)))?;

    let declared = header
        .strip_prefix("data:")
        .and_then(|rest| rest.split(';').next())
        .map(str::trim)
        .filter(|mime| mime.starts_with("image/"));

    let mime_type = match declared {
        Some(mime) => mime.to_string(),
        None => detect_image_mime(&bytes).to_string(),
    };

    Ok(DecodedImage { mime_type, bytes })
}

pub fn detect_image_mime(bytes: &[u8]) -> &'static str {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [0x89, 0x50, 0x4E, 0x47, ..] => "image/png",
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => "image/webp",
        _ => {
            tracing::debug!(
                "Unrecognized image signature {:02X?}, assuming image/png",
                &bytes[..bytes.len().min(4)]
            );
            "image/png"
        }
    }
}

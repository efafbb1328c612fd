use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use super::error::ServerError;

pub(crate) fn decode_image_base64(raw: &str) -> Result<(Vec<u8>, Option<String>), ServerError> {
    let raw = raw.trim();
    let (mime, payload) = match raw.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest
                .split_once(',')
                .ok_or_else(|| ServerError::bad_request("invalid data URL"))?;
            let Some(mime) = header.strip_suffix(";base64") else {
                return Err(ServerError::bad_request("data URL must be base64 encoded"));
            };
            let mime = Some(mime.to_string()).filter(|mime| !mime.is_empty());
            (mime, payload)
        }
        None => (None, raw),
    };
    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64
        .decode(cleaned.as_bytes())
        .map_err(|err| ServerError::bad_request(format!("invalid base64 image: {}", err)))?;
    Ok((bytes, mime))
}

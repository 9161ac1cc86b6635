//! Translation between HTTP header conventions and gRPC metadata
//! conventions, without depending on tonic/prost. Useful for services that
//! terminate gRPC-Web or grpc-gateway style traffic in front of HTTP-only
//! handlers.
//!
//! gRPC metadata keys ending in `-bin` carry base64-encoded binary values;
//! everything else is ASCII text. `grpc-status`/`grpc-message` are the
//! trailer pair gRPC uses to report the outcome of a call.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::HashMap;

pub const GRPC_STATUS_HEADER: &str = "grpc-status";
pub const GRPC_MESSAGE_HEADER: &str = "grpc-message";
const BIN_SUFFIX: &str = "-bin";

/// Convert HTTP request headers into gRPC metadata. Keys are lowercased, as
/// gRPC metadata keys are case-insensitive and conventionally lowercase.
/// Values for `-bin` keys are left base64-encoded, matching wire format.
#[must_use]
pub fn http_headers_to_grpc_metadata(headers: &HashMap<String, String>) -> HashMap<String, String> {
    headers
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v.clone()))
        .collect()
}

/// Convert gRPC metadata back into HTTP response headers.
#[must_use]
pub fn grpc_metadata_to_http_headers(metadata: &HashMap<String, String>) -> Vec<(String, String)> {
    metadata.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

/// Encode a binary metadata value for a `-bin` suffixed key.
#[must_use]
pub fn encode_binary_metadata(key: &str, value: &[u8]) -> (String, String) {
    let key = if key.ends_with(BIN_SUFFIX) {
        key.to_string()
    } else {
        format!("{key}{BIN_SUFFIX}")
    };
    (key, STANDARD.encode(value))
}

/// Decode a `-bin` suffixed metadata value. Returns `None` if `key` does not
/// carry the suffix or the value is not valid base64.
#[must_use]
pub fn decode_binary_metadata(key: &str, value: &str) -> Option<Vec<u8>> {
    if !key.ends_with(BIN_SUFFIX) {
        return None;
    }
    STANDARD.decode(value).ok()
}

/// Map an HTTP status code to the nearest gRPC status code, per the
/// conventional grpc-gateway correspondence.
#[must_use]
pub fn http_status_to_grpc_code(status: u16) -> u32 {
    match status {
        200 => 0,        // OK
        400 => 3,        // INVALID_ARGUMENT
        401 => 16,       // UNAUTHENTICATED
        403 => 7,        // PERMISSION_DENIED
        404 => 5,        // NOT_FOUND
        409 => 6,        // ALREADY_EXISTS
        429 => 8,        // RESOURCE_EXHAUSTED
        499 => 1,        // CANCELLED
        500 => 13,       // INTERNAL
        501 => 12,       // UNIMPLEMENTED
        503 => 14,       // UNAVAILABLE
        504 => 4,        // DEADLINE_EXCEEDED
        _ => 2,          // UNKNOWN
    }
}

/// Build the `grpc-status`/`grpc-message` trailer pair for an HTTP status
/// and message.
#[must_use]
pub fn grpc_trailers(status: u16, message: &str) -> Vec<(String, String)> {
    vec![
        (GRPC_STATUS_HEADER.to_string(), http_status_to_grpc_code(status).to_string()),
        (GRPC_MESSAGE_HEADER.to_string(), message.to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_header_keys() {
        let mut headers = HashMap::new();
        headers.insert("X-Request-Id".to_string(), "abc".to_string());
        let meta = http_headers_to_grpc_metadata(&headers);
        assert_eq!(meta.get("x-request-id"), Some(&"abc".to_string()));
    }

    #[test]
    fn binary_metadata_roundtrips() {
        let (key, encoded) = encode_binary_metadata("trace-context", b"\x01\x02\x03");
        assert_eq!(key, "trace-context-bin");
        let decoded = decode_binary_metadata(&key, &encoded).unwrap();
        assert_eq!(decoded, vec![1, 2, 3]);
    }

    #[test]
    fn non_bin_key_fails_to_decode() {
        assert!(decode_binary_metadata("trace-context", "AQID").is_none());
    }

    #[test]
    fn status_mapping_covers_common_cases() {
        assert_eq!(http_status_to_grpc_code(200), 0);
        assert_eq!(http_status_to_grpc_code(404), 5);
        assert_eq!(http_status_to_grpc_code(500), 13);
        assert_eq!(http_status_to_grpc_code(418), 2);
    }

    #[test]
    fn grpc_trailers_pairs_status_and_message() {
        let trailers = grpc_trailers(404, "not found");
        assert!(trailers.contains(&(GRPC_STATUS_HEADER.to_string(), "5".to_string())));
        assert!(trailers.contains(&(GRPC_MESSAGE_HEADER.to_string(), "not found".to_string())));
    }
}

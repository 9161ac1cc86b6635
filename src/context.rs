//! Per-request [`Context`] and the process-wide free-list that recycles
//! them across requests.

use crate::chain::Chain;
use crate::error::{Error, Result};
use crate::route::ParamVec;
use prost::Message as ProstMessage;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

const PROTOBUF_CONTENT_TYPE: &str = "application/protobuf";

/// One field of a parsed `multipart/form-data` body.
#[derive(Debug, Clone)]
pub struct MultipartField {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl MultipartField {
    /// Write this field's bytes to `path`, creating or truncating it.
    pub fn save_to(&self, path: &std::path::Path) -> std::io::Result<()> {
        std::fs::write(path, &self.data)
    }
}

/// All state associated with one in-flight request.
///
/// Created by [`ContextPool`], reset and returned to the pool when the
/// request completes. Handlers interact with it exclusively through the
/// accessor methods below; there is no direct field access outside the
/// crate.
#[derive(Default)]
pub struct Context {
    method: String,
    path: String,
    request_headers: HashMap<String, String>,
    response_headers: Vec<(String, String)>,
    query: HashMap<String, String>,
    cookies: HashMap<String, String>,
    params: ParamVec,
    body: Vec<u8>,
    status: u16,
    response_body: Vec<u8>,
    locals: HashMap<String, serde_json::Value>,
    trace_id: String,
    chain: Chain,
    index: isize,
}

impl Context {
    #[must_use]
    pub fn new() -> Self {
        Context {
            status: 200,
            chain: Chain::from(Vec::new().into_boxed_slice()),
            index: -1,
            ..Default::default()
        }
    }

    // -- request-side population, used by the Application on Acquire --

    pub(crate) fn set_request(
        &mut self,
        method: String,
        path: String,
        headers: HashMap<String, String>,
        query: HashMap<String, String>,
        cookies: HashMap<String, String>,
        body: Vec<u8>,
    ) {
        self.method = method;
        self.path = path;
        self.request_headers = headers;
        self.query = query;
        self.cookies = cookies;
        self.body = body;
    }

    pub(crate) fn set_params(&mut self, params: ParamVec) {
        self.params = params;
    }

    pub(crate) fn begin_chain(&mut self, chain: Chain) {
        self.chain = chain;
        self.index = -1;
    }

    /// Reset all per-request state, retaining allocated capacity. Called by
    /// [`ContextPool::release`] before a Context rejoins the free-list.
    pub(crate) fn reset(&mut self) {
        self.method.clear();
        self.path.clear();
        self.request_headers.clear();
        self.response_headers.clear();
        self.query.clear();
        self.cookies.clear();
        self.params.clear();
        self.body.clear();
        self.status = 200;
        self.response_body.clear();
        self.locals.clear();
        self.trace_id.clear();
        self.chain = Chain::from(Vec::new().into_boxed_slice());
        self.index = -1;
    }

    // -- getters --

    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.request_headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    #[must_use]
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rev()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn raw_body(&self) -> &[u8] {
        &self.body
    }

    /// Deserialize the request body as JSON.
    pub fn bind_json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| Error::BadInput(format!("invalid JSON body: {e}")))
    }

    /// Decode the request body as a protobuf-wire message.
    pub fn bind_protobuf<T: ProstMessage + Default>(&self) -> Result<T> {
        T::decode(self.body.as_slice())
            .map_err(|e| Error::BadInput(format!("invalid protobuf body: {e}")))
    }

    /// Deserialize the request body as protobuf-wire or JSON, selected by
    /// the `Content-Type` header (`application/protobuf` vs anything else).
    pub fn bind_body<T: DeserializeOwned + ProstMessage + Default>(&self) -> Result<T> {
        match self.header("content-type") {
            Some(ct) if ct.trim_start().to_ascii_lowercase().starts_with(PROTOBUF_CONTENT_TYPE) => {
                self.bind_protobuf()
            }
            _ => self.bind_json(),
        }
    }

    /// Parse the body as `multipart/form-data`, using the boundary declared
    /// in the `Content-Type` header.
    pub fn multipart(&self) -> Result<Vec<MultipartField>> {
        let content_type = self
            .header("content-type")
            .ok_or_else(|| Error::BadInput("missing Content-Type".into()))?;
        let boundary = content_type
            .split(';')
            .find_map(|part| part.trim().strip_prefix("boundary="))
            .ok_or_else(|| Error::BadInput("missing multipart boundary".into()))?;
        parse_multipart(&self.body, boundary)
    }

    #[must_use]
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn set_trace_id(&mut self, id: String) {
        self.trace_id = id;
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub fn response_body(&self) -> &[u8] {
        &self.response_body
    }

    #[must_use]
    pub fn response_headers(&self) -> &[(String, String)] {
        &self.response_headers
    }

    // -- setters --

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.response_headers.push((name.into(), value.into()));
    }

    pub fn set_cookie(&mut self, name: &str, value: &str) {
        self.set_header("Set-Cookie", format!("{name}={value}"));
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    pub fn set_body_bytes(&mut self, bytes: Vec<u8>) {
        self.response_body = bytes;
    }

    pub fn set_body_string(&mut self, body: impl Into<String>) {
        self.response_body = body.into().into_bytes();
    }

    pub fn set_body_json<T: Serialize>(&mut self, value: &T) -> Result<()> {
        self.response_body =
            serde_json::to_vec(value).map_err(|e| Error::Internal(format!("serialize body: {e}")))?;
        self.set_header("Content-Type", "application/json");
        Ok(())
    }

    /// Encode `value` as a protobuf-wire message and set the matching
    /// `Content-Type`.
    pub fn set_body_protobuf<T: ProstMessage>(&mut self, value: &T) -> Result<()> {
        self.response_body = value.encode_to_vec();
        self.set_header("Content-Type", PROTOBUF_CONTENT_TYPE);
        Ok(())
    }

    // -- local store --

    pub fn set_local(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.locals.insert(key.into(), value);
    }

    #[must_use]
    pub fn local(&self, key: &str) -> Option<&serde_json::Value> {
        self.locals.get(key)
    }

    // -- chain execution --

    /// Invoke the next handler in the chain. The chain's entry point calls
    /// this once from an index of `-1`; each handler calls it again to
    /// invoke whatever follows it.
    pub fn advance(&mut self) -> Result<()> {
        self.index += 1;
        let idx = self.index;
        if idx < 0 {
            return Ok(());
        }
        let idx = idx as usize;
        if idx >= self.chain.len() {
            return Ok(());
        }
        let chain = self.chain.clone();
        chain[idx].call(self)
    }
}

fn parse_multipart(body: &[u8], boundary: &str) -> Result<Vec<MultipartField>> {
    let delimiter = format!("--{boundary}").into_bytes();
    let mut fields = Vec::new();
    let mut rest = body;
    loop {
        let Some(pos) = find_subslice(rest, &delimiter) else {
            break;
        };
        rest = &rest[pos + delimiter.len()..];
        if rest.starts_with(b"--") {
            break;
        }
        let Some(next) = find_subslice(rest, &delimiter) else {
            break;
        };
        let part = &rest[..next];
        if let Some(field) = parse_part(part) {
            fields.push(field);
        }
    }
    Ok(fields)
}

fn parse_part(part: &[u8]) -> Option<MultipartField> {
    let part = trim_crlf(part);
    let header_end = find_subslice(part, b"\r\n\r\n")?;
    let header_block = std::str::from_utf8(&part[..header_end]).ok()?;
    let data = &part[header_end + 4..];
    let data = trim_crlf(data);

    let mut name = None;
    let mut filename = None;
    let mut content_type = None;
    for line in header_block.split("\r\n") {
        let (key, value) = line.split_once(':')?;
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();
        if key == "content-disposition" {
            for piece in value.split(';') {
                let piece = piece.trim();
                if let Some(v) = piece.strip_prefix("name=") {
                    name = Some(v.trim_matches('"').to_string());
                } else if let Some(v) = piece.strip_prefix("filename=") {
                    filename = Some(v.trim_matches('"').to_string());
                }
            }
        } else if key == "content-type" {
            content_type = Some(value.to_string());
        }
    }

    Some(MultipartField {
        name: name.unwrap_or_default(),
        filename,
        content_type,
        data: data.to_vec(),
    })
}

fn trim_crlf(mut data: &[u8]) -> &[u8] {
    if data.starts_with(b"\r\n") {
        data = &data[2..];
    }
    if data.ends_with(b"\r\n") {
        data = &data[..data.len() - 2];
    }
    if data.ends_with(b"--") {
        data = &data[..data.len() - 2];
    }
    if data.ends_with(b"\r\n") {
        data = &data[..data.len() - 2];
    }
    data
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Process-wide free-list of Contexts, avoiding a fresh allocation per
/// request under steady load.
pub struct ContextPool {
    free: Mutex<Vec<Box<Context>>>,
}

impl Default for ContextPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextPool {
    #[must_use]
    pub fn new() -> Self {
        ContextPool {
            free: Mutex::new(Vec::new()),
        }
    }

    /// Pop a recycled Context or mint a new one.
    #[must_use]
    pub fn acquire(&self) -> Box<Context> {
        #[allow(clippy::unwrap_used)]
        let mut free = self.free.lock().unwrap();
        free.pop().unwrap_or_else(|| Box::new(Context::new()))
    }

    /// Reset and return a Context to the free-list.
    pub fn release(&self, mut ctx: Box<Context>) {
        ctx.reset();
        #[allow(clippy::unwrap_used)]
        self.free.lock().unwrap().push(ctx);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        #[allow(clippy::unwrap_used)]
        self.free.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq, serde::Deserialize, ::prost::Message)]
    struct PingMessage {
        #[prost(string, tag = "1")]
        id: String,
        #[prost(uint32, tag = "2")]
        count: u32,
    }

    #[test]
    fn bind_protobuf_decodes_encoded_message() {
        let msg = PingMessage {
            id: "abc".to_string(),
            count: 3,
        };
        let mut ctx = Context::new();
        ctx.set_request(
            "POST".into(),
            "/ping".into(),
            HashMap::new(),
            HashMap::new(),
            HashMap::new(),
            msg.encode_to_vec(),
        );
        let decoded: PingMessage = ctx.bind_protobuf().unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn bind_body_selects_protobuf_by_content_type() {
        let msg = PingMessage {
            id: "xyz".to_string(),
            count: 7,
        };
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/protobuf".to_string());
        let mut ctx = Context::new();
        ctx.set_request(
            "POST".into(),
            "/ping".into(),
            headers,
            HashMap::new(),
            HashMap::new(),
            msg.encode_to_vec(),
        );
        let decoded: PingMessage = ctx.bind_body().unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn bind_body_defaults_to_json_without_protobuf_content_type() {
        let mut ctx = Context::new();
        ctx.set_request(
            "POST".into(),
            "/ping".into(),
            HashMap::new(),
            HashMap::new(),
            HashMap::new(),
            serde_json::json!({"id": "j1", "count": 2}).to_string().into_bytes(),
        );
        let decoded: PingMessage = ctx.bind_body().unwrap();
        assert_eq!(decoded.id, "j1");
        assert_eq!(decoded.count, 2);
    }

    #[test]
    fn set_body_protobuf_round_trips_through_bind_protobuf() {
        let msg = PingMessage {
            id: "rt".to_string(),
            count: 9,
        };
        let mut ctx = Context::new();
        ctx.set_body_protobuf(&msg).unwrap();
        assert_eq!(ctx.response_body(), msg.encode_to_vec().as_slice());
    }

    #[test]
    fn acquire_then_release_recycles_instance() {
        let pool = ContextPool::new();
        assert_eq!(pool.len(), 0);
        let mut ctx = pool.acquire();
        ctx.set_status(404);
        ctx.set_local("k", serde_json::json!(1));
        pool.release(ctx);
        assert_eq!(pool.len(), 1);
        let recycled = pool.acquire();
        assert_eq!(recycled.status(), 200);
        assert!(recycled.local("k").is_none());
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn param_lookup_is_last_write_wins() {
        let mut ctx = Context::new();
        let mut params = ParamVec::new();
        params.push((std::sync::Arc::from("id"), "1".to_string()));
        params.push((std::sync::Arc::from("id"), "2".to_string()));
        ctx.set_params(params);
        assert_eq!(ctx.param("id"), Some("2"));
    }

    #[test]
    fn bind_json_rejects_malformed_body() {
        let mut ctx = Context::new();
        ctx.set_request(
            "POST".into(),
            "/x".into(),
            HashMap::new(),
            HashMap::new(),
            HashMap::new(),
            b"not json".to_vec(),
        );
        let result: Result<serde_json::Value> = ctx.bind_json();
        assert!(result.is_err());
    }

    #[test]
    fn multipart_parses_fields() {
        let body = b"--B\r\nContent-Disposition: form-data; name=\"field\"\r\n\r\nvalue\r\n--B\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\nContent-Type: text/plain\r\n\r\nhello\r\n--B--\r\n";
        let mut ctx = Context::new();
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "multipart/form-data; boundary=B".to_string());
        ctx.set_request(
            "POST".into(),
            "/upload".into(),
            headers,
            HashMap::new(),
            HashMap::new(),
            body.to_vec(),
        );
        let fields = ctx.multipart().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name, "field");
        assert_eq!(fields[0].data, b"value");
        assert_eq!(fields[1].filename.as_deref(), Some("a.txt"));
        assert_eq!(fields[1].data, b"hello");
    }
}

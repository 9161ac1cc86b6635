//! `may_minihttp` transport: wires an [`Application`] up as an
//! [`HttpService`], parses the raw request into the core's dispatch
//! arguments, and writes the [`DispatchResult`] back out.

use crate::app::Application;
use crate::ids;
use http::Method;
use may::coroutine::JoinHandle;
use may_minihttp::{HttpServer as MiniHttpServer, HttpService, Request, Response};
use std::collections::HashMap;
use std::io::{self, Read};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;
use tracing::{debug, error};

/// [`HttpService`] implementation dispatching every request through an
/// [`Application`]'s pipeline.
#[derive(Clone)]
pub struct AppService {
    app: Application,
}

impl AppService {
    #[must_use]
    pub fn new(app: Application) -> Self {
        AppService { app }
    }
}

fn split_path_and_query(raw_path: &str) -> (String, HashMap<String, String>) {
    match raw_path.split_once('?') {
        Some((path, query)) => {
            let params = url::form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            (path.to_string(), params)
        }
        None => (raw_path.to_string(), HashMap::new()),
    }
}

fn parse_cookies(header_value: Option<&str>) -> HashMap<String, String> {
    header_value
        .map(|value| {
            value
                .split(';')
                .filter_map(|pair| {
                    let (name, val) = pair.trim().split_once('=')?;
                    Some((name.trim().to_string(), val.trim().to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

impl HttpService for AppService {
    fn call(&mut self, mut req: Request, res: &mut Response) -> io::Result<()> {
        let method_str = req.method().to_string();
        let (path, query) = split_path_and_query(req.path());

        let headers: HashMap<String, String> = req
            .headers()
            .iter()
            .map(|h| (h.name.to_ascii_lowercase(), String::from_utf8_lossy(h.value).to_string()))
            .collect();
        let cookies = parse_cookies(headers.get("cookie").map(String::as_str));
        let trace_id = headers.get(ids::TRACE_HEADER).cloned();

        let mut body = Vec::new();
        req.body().read_to_end(&mut body)?;

        let Ok(method) = method_str.parse::<Method>() else {
            res.status_code(400, "Bad Request");
            res.header("Content-Type: application/json");
            res.body_vec(
                serde_json::json!({"code": "bad_input", "message": "unrecognized HTTP method"})
                    .to_string()
                    .into_bytes(),
            );
            return Ok(());
        };

        debug!(method = %method, path = %path, "dispatching request");
        let result = self.app.dispatch(method, &path, headers, query, cookies, body, trace_id);

        res.status_code(result.status as usize, status_reason(result.status));
        for (name, value) in &result.headers {
            // may_minihttp's header API takes `&'static str`; each response
            // has a small, bounded header count, so leaking is cheap and
            // matches the pattern used for other dynamic headers.
            let header = format!("{name}: {value}").into_boxed_str();
            res.header(Box::leak(header));
        }
        res.body_vec(result.body);
        Ok(())
    }
}

fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown",
    }
}

/// Handle to a running HTTP server, mirroring `may_minihttp`'s join-handle
/// wrapper but adding graceful shutdown that drains in-flight requests
/// through the owning [`Application`] before cancelling the listener
/// coroutine.
pub struct ServerHandle {
    addr: SocketAddr,
    app: Application,
    handle: JoinHandle<()>,
}

impl ServerHandle {
    pub fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..50 {
            if TcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Wait up to `timeout` for in-flight requests to drain, run shutdown
    /// hooks, then cancel the listener coroutine.
    pub fn shutdown(self, timeout: Duration) {
        if !self.app.wait_idle(timeout) {
            error!("shutdown timed out with requests still in flight");
        }
        self.app.fire_on_shutdown();
        unsafe {
            self.handle.coroutine().cancel();
        }
        let _ = self.handle.join();
    }

    pub fn join(self) -> std::thread::Result<()> {
        self.handle.join()
    }
}

/// Start `app` on `addr`, running `on_listen` hooks and marking the
/// application ready before accepting connections.
pub fn serve<A: ToSocketAddrs>(app: Application, addr: A) -> io::Result<ServerHandle> {
    app.fire_on_listen()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
    let addr = addr
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid address"))?;
    let service = AppService::new(app.clone());
    let handle = MiniHttpServer(service).start(addr)?;
    Ok(ServerHandle { addr, app, handle })
}

/// Like [`serve`], but also spawns a background thread that watches for
/// SIGTERM/SIGINT (the signals Kubernetes sends on scale-down and rollout)
/// and, on receipt, runs graceful shutdown with `drain_timeout` before the
/// process exits. Blocks the calling thread until shutdown completes.
#[cfg(unix)]
pub fn serve_with_graceful_shutdown<A: ToSocketAddrs>(
    app: Application,
    addr: A,
    drain_timeout: Duration,
) -> io::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let handle = serve(app, addr)?;
    let mut signals = Signals::new([SIGTERM, SIGINT])?;
    // Blocks this thread; the listener coroutine keeps serving on its own.
    signals.forever().next();
    handle.shutdown(drain_timeout);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_path_and_query_string() {
        let (path, query) = split_path_and_query("/users?active=true&page=2");
        assert_eq!(path, "/users");
        assert_eq!(query.get("active"), Some(&"true".to_string()));
        assert_eq!(query.get("page"), Some(&"2".to_string()));
    }

    #[test]
    fn path_without_query_has_empty_map() {
        let (path, query) = split_path_and_query("/users");
        assert_eq!(path, "/users");
        assert!(query.is_empty());
    }

    #[test]
    fn parses_cookie_header_into_pairs() {
        let cookies = parse_cookies(Some("a=1; b=2"));
        assert_eq!(cookies.get("a"), Some(&"1".to_string()));
        assert_eq!(cookies.get("b"), Some(&"2".to_string()));
    }

    #[test]
    fn missing_cookie_header_yields_empty_map() {
        assert!(parse_cookies(None).is_empty());
    }

    #[test]
    fn status_reason_covers_known_codes() {
        assert_eq!(status_reason(404), "Not Found");
        assert_eq!(status_reason(999), "Unknown");
    }
}

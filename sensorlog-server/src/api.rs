//! HTTP/JSON API over a shared [`SensorStore`].
//!
//! Uses `std::net::TcpListener` with one thread per connection, capped at
//! [`MAX_CONNECTIONS`]. Connections past the cap get a 503 and are closed.
//! No external HTTP framework needed. Endpoints:
//!
//! - `POST /data` — ingest `{"sensor_name": ..., "sensor_value": ...}`
//! - `GET /` — recent series of every buffered sensor
//! - `GET /health` — liveness check
//! - `GET /sensors` — every known sensor
//! - `GET /sensors/<name>/recent` — buffered recent series
//! - `GET /sensors/<name>/dates` — partition dates, newest first
//! - `GET /sensors/<name>/query?start=<YYYY-MM-DD>&end=<YYYY-MM-DD>` — merged series

use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

use sensorlog::naming;
use sensorlog::{SensorStore, SensorlogError};

/// Largest request body accepted.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// How long a connection may sit idle mid-request.
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Most connections served concurrently.
const MAX_CONNECTIONS: usize = 256;

/// Errors that turn into non-200 responses.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request line, headers, or parameters are malformed.
    #[error("{0}")]
    BadRequest(String),

    /// `sensor_name` or `sensor_value` is absent from the ingest body.
    #[error("Missing fields")]
    MissingFields,

    /// The ingest body is not the expected JSON object.
    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The declared body length exceeds [`MAX_BODY_BYTES`].
    #[error("request body too large")]
    BodyTooLarge,

    /// No route matches the path.
    #[error("not found")]
    NotFound,

    /// The route exists but not for this method.
    #[error("method not allowed")]
    MethodNotAllowed,

    /// Every connection slot is in use.
    #[error("server busy")]
    Overloaded,

    /// The store rejected the operation.
    #[error(transparent)]
    Store(#[from] SensorlogError),

    /// The connection failed while reading the request.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    fn status(&self) -> u16 {
        match self {
            Self::BadRequest(_) | Self::MissingFields | Self::InvalidJson(_) => 400,
            Self::BodyTooLarge => 413,
            Self::NotFound => 404,
            Self::MethodNotAllowed => 405,
            Self::Overloaded => 503,
            Self::Store(e) if e.is_client_error() => 400,
            Self::Store(_) | Self::Io(_) => 500,
        }
    }
}

impl From<sensorlog::error::InputError> for ApiError {
    fn from(e: sensorlog::error::InputError) -> Self {
        Self::Store(e.into())
    }
}

/// A parsed HTTP request.
#[derive(Debug)]
struct Request {
    method: String,
    path: String,
    query: String,
    body: Vec<u8>,
}

/// A JSON response ready to be written.
#[derive(Debug)]
struct Response {
    status: u16,
    body: Value,
}

impl Response {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn from_error(e: &ApiError) -> Self {
        Self {
            status: e.status(),
            body: json!({ "error": e.to_string() }),
        }
    }
}

/// Counts in-flight connections against a fixed limit.
#[derive(Debug, Clone)]
struct ConnectionSlots {
    active: Arc<AtomicUsize>,
    limit: usize,
}

impl ConnectionSlots {
    fn new(limit: usize) -> Self {
        Self {
            active: Arc::new(AtomicUsize::new(0)),
            limit: limit.max(1),
        }
    }

    /// Claims a slot, or returns `None` when all are taken.
    fn try_acquire(&self) -> Option<SlotGuard> {
        self.active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.limit).then_some(n + 1)
            })
            .ok()?;
        Some(SlotGuard {
            active: Arc::clone(&self.active),
        })
    }

    fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }
}

/// Releases its slot on drop.
#[derive(Debug)]
struct SlotGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Body of `POST /data`.
#[derive(Debug, Deserialize)]
struct DataPayload {
    sensor_name: Option<String>,
    sensor_value: Option<Value>,
}

/// Runs the HTTP API server (blocking, one thread per connection).
pub fn run_api_server(listener: TcpListener, store: Arc<SensorStore>) {
    serve(listener, store, &ConnectionSlots::new(MAX_CONNECTIONS));
}

fn serve(listener: TcpListener, store: Arc<SensorStore>, slots: &ConnectionSlots) {
    for stream in listener.incoming() {
        let mut stream = match stream {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("accept error: {e}");
                continue;
            }
        };

        let Some(slot) = slots.try_acquire() else {
            tracing::warn!(active = slots.active(), "connection limit reached");
            let _ = write_response(&mut stream, &Response::from_error(&ApiError::Overloaded));
            continue;
        };

        let store = Arc::clone(&store);
        let spawned = thread::Builder::new()
            .name("sensorlog-conn".to_string())
            .spawn(move || {
                let _slot = slot;
                handle_connection(&stream, &store);
            });
        if let Err(e) = spawned {
            tracing::error!("failed to spawn connection thread: {e}");
        }
    }
}

/// Serves a single request on `stream`.
fn handle_connection(stream: &TcpStream, store: &SensorStore) {
    // Set a short read timeout so we don't block forever on slow clients
    let _ = stream.set_read_timeout(Some(READ_TIMEOUT));

    let mut reader = BufReader::new(stream);
    let mut writer = stream;
    if let Err(e) = handle_request(&mut reader, &mut writer, store) {
        tracing::debug!("request error: {e}");
    }
}

/// Reads one request from `reader`, dispatches it, and writes the response.
fn handle_request<R: BufRead, W: Write>(
    reader: &mut R,
    writer: &mut W,
    store: &SensorStore,
) -> io::Result<()> {
    let response = match read_request(reader) {
        Ok(Some(request)) => {
            let response = dispatch(&request, store);
            tracing::debug!(
                method = %request.method,
                path = %request.path,
                status = response.status,
                "request"
            );
            response
        }
        // Client closed the connection without sending anything.
        Ok(None) => return Ok(()),
        Err(ApiError::Io(e)) => return Err(e),
        Err(e) => Response::from_error(&e),
    };

    write_response(writer, &response)
}

/// Parses the request line, headers, and body.
///
/// Returns `None` if the stream ends before a request line arrives.
fn read_request<R: BufRead>(reader: &mut R) -> Result<Option<Request>, ApiError> {
    let mut request_line = String::new();
    if reader.read_line(&mut request_line)? == 0 {
        return Ok(None);
    }

    // Parse: "METHOD /path?query HTTP/1.x"
    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target)) = (parts.next(), parts.next()) else {
        return Err(ApiError::BadRequest("malformed request line".to_string()));
    };
    let (path, query) = target.split_once('?').unwrap_or((target, ""));

    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let header = line.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':')
            && name.trim().eq_ignore_ascii_case("content-length")
        {
            content_length = value
                .trim()
                .parse()
                .map_err(|_| ApiError::BadRequest("invalid Content-Length".to_string()))?;
        }
    }

    if content_length > MAX_BODY_BYTES {
        return Err(ApiError::BodyTooLarge);
    }
    let mut body = vec![0; content_length];
    reader.read_exact(&mut body)?;

    Ok(Some(Request {
        method: method.to_string(),
        path: path.to_string(),
        query: query.to_string(),
        body,
    }))
}

/// Routes a request and converts the outcome into a response.
fn dispatch(request: &Request, store: &SensorStore) -> Response {
    match route(request, store) {
        Ok(body) => Response::ok(body),
        Err(e) => {
            if e.status() >= 500 {
                tracing::warn!(path = %request.path, "request failed: {e}");
            }
            Response::from_error(&e)
        }
    }
}

fn route(request: &Request, store: &SensorStore) -> Result<Value, ApiError> {
    let segments = request
        .path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| percent_decode(s, false))
        .collect::<Result<Vec<_>, _>>()?;
    let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
    let method = request.method.as_str();

    match segments.as_slice() {
        [] => {
            require_get(method)?;
            Ok(handle_index(store))
        }
        ["health"] => {
            require_get(method)?;
            Ok(json!({ "status": "ok" }))
        }
        ["data"] => {
            if method != "POST" {
                return Err(ApiError::MethodNotAllowed);
            }
            handle_ingest(store, &request.body)
        }
        ["sensors"] => {
            require_get(method)?;
            handle_sensors(store)
        }
        ["sensors", name, "recent"] => {
            require_get(method)?;
            handle_recent(store, name)
        }
        ["sensors", name, "dates"] => {
            require_get(method)?;
            handle_dates(store, name)
        }
        ["sensors", name, "query"] => {
            require_get(method)?;
            handle_query(store, name, &request.query)
        }
        _ => Err(ApiError::NotFound),
    }
}

fn require_get(method: &str) -> Result<(), ApiError> {
    if method == "GET" {
        Ok(())
    } else {
        Err(ApiError::MethodNotAllowed)
    }
}

/// `GET /` — recent series of every buffered sensor.
fn handle_index(store: &SensorStore) -> Value {
    let sensors: Vec<Value> = store
        .buffered_sensors()
        .into_iter()
        .map(|name| {
            let points = store.recent_series(&name);
            json!({ "name": name, "points": points })
        })
        .collect();

    json!({ "sensors": sensors })
}

/// `POST /data` — ingests one reading.
fn handle_ingest(store: &SensorStore, body: &[u8]) -> Result<Value, ApiError> {
    let payload: DataPayload = serde_json::from_slice(body)?;
    let (Some(sensor_name), Some(sensor_value)) = (payload.sensor_name, payload.sensor_value)
    else {
        return Err(ApiError::MissingFields);
    };

    let raw_value = match sensor_value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s,
        other => {
            return Err(ApiError::BadRequest(format!(
                "sensor_value must be a number or string, got {other}"
            )));
        }
    };

    store.ingest(&sensor_name, &raw_value)?;
    Ok(json!({ "status": "success" }))
}

/// `GET /sensors` — sensors on storage plus sensors buffered in this process.
fn handle_sensors(store: &SensorStore) -> Result<Value, ApiError> {
    let mut sensors = store.list_sensors()?;
    sensors.extend(store.buffered_sensors());
    Ok(json!({ "sensors": sensors }))
}

/// `GET /sensors/<name>/recent`
fn handle_recent(store: &SensorStore, name: &str) -> Result<Value, ApiError> {
    naming::validate_sensor_name(name)?;
    let points = store.recent_series(name);
    Ok(json!({ "sensor": name, "count": points.len(), "points": points }))
}

/// `GET /sensors/<name>/dates`
fn handle_dates(store: &SensorStore, name: &str) -> Result<Value, ApiError> {
    let dates = store.list_dates(name)?;
    Ok(json!({ "sensor": name, "dates": dates }))
}

/// `GET /sensors/<name>/query?start=<date>&end=<date>`
fn handle_query(store: &SensorStore, name: &str, query: &str) -> Result<Value, ApiError> {
    let params = parse_query(query)?;

    let start: NaiveDate = match params.get("start") {
        Some(raw) => naming::parse_date(raw)?,
        None => return Err(ApiError::BadRequest("missing 'start' parameter".to_string())),
    };
    let end: NaiveDate = match params.get("end") {
        Some(raw) => naming::parse_date(raw)?,
        None => start,
    };

    let result = store.query_series(name, start, end)?;
    let (start, end) = result.range();

    Ok(json!({
        "sensor": name,
        "start": start,
        "end": end,
        "partitions": result.partitions(),
        "count": result.len(),
        "points": result.readings(),
    }))
}

/// Writes a JSON HTTP response and flushes it.
fn write_response<W: Write>(writer: &mut W, response: &Response) -> io::Result<()> {
    let status_text = match response.status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    };
    let body = response.body.to_string();

    write!(
        writer,
        "HTTP/1.1 {} {status_text}\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {body}",
        response.status,
        body.len(),
    )?;
    writer.flush()
}

/// Parses a query string into percent-decoded key-value pairs.
fn parse_query(query: &str) -> Result<HashMap<String, String>, ApiError> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| Ok((percent_decode(k, true)?, percent_decode(v, true)?)))
        .collect()
}

/// Decodes `%XX` escapes, and `+` as a space when `plus_as_space` is set.
fn percent_decode(s: &str, plus_as_space: bool) -> Result<String, ApiError> {
    let invalid = || ApiError::BadRequest(format!("invalid percent-encoding in '{s}'"));

    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = bytes
                    .get(i + 1..i + 3)
                    .filter(|hex| hex.iter().all(u8::is_ascii_hexdigit))
                    .ok_or_else(invalid)?;
                let hex = std::str::from_utf8(hex).map_err(|_| invalid())?;
                out.push(u8::from_str_radix(hex, 16).map_err(|_| invalid())?);
                i += 3;
            }
            b'+' if plus_as_space => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8(out).map_err(|_| invalid())
}

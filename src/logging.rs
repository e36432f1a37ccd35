//! Structured logging for the case dashboard.
//!
//! Every record is a single JSON line on stdout carrying a run id, a sequence
//! number, a level and a domain. When `LOG_DIR` is set (or [`init_file_sink`]
//! is called before the first record), records are also appended under
//! `<LOG_DIR>/<run_id>/`: trace/debug records to `trace.jsonl`, everything
//! else to `events.jsonl`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            Ok("fatal") => Level::Fatal,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

// =============================================================================
// Log Domains
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Fetch,   // Resource retrieval and date fallback
    Reshape, // Wide to long conversion
    Series,  // Aggregation and delta derivation
    View,    // Entity selection and figure building
    Http,    // Dashboard server
    System,  // Startup, shutdown
    Profile, // Timing scopes
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Fetch => "fetch",
            Domain::Reshape => "reshape",
            Domain::Series => "series",
            Domain::View => "view",
            Domain::Http => "http",
            Domain::System => "system",
            Domain::Profile => "profile",
        }
    }

    pub fn is_enabled(&self) -> bool {
        // LOG_DOMAINS is a comma-separated list or "all"
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Run context
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static PROFILE_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug)]
struct RunContext {
    run_id: String,
    sink: Option<FileSink>,
}

#[derive(Debug)]
struct FileSink {
    events: Mutex<BufWriter<File>>,
    trace: Mutex<BufWriter<File>>,
}

fn new_run_id() -> String {
    std::env::var("RUN_ID").unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()))
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = new_run_id();
        let sink = std::env::var("LOG_DIR")
            .ok()
            .and_then(|base| open_sink(&Path::new(&base).join(&run_id), &run_id));
        RunContext { run_id, sink }
    })
}

/// Route records into `base/<run_id>/` for the rest of the process.
///
/// Returns the run directory, or `None` when the run context was already
/// initialized by an earlier record or the directory could not be created.
pub fn init_file_sink(base: &Path) -> Option<PathBuf> {
    if RUN_CONTEXT.get().is_some() {
        return None;
    }
    let run_id = new_run_id();
    let run_dir = base.join(&run_id);
    let sink = open_sink(&run_dir, &run_id)?;
    RUN_CONTEXT
        .set(RunContext {
            run_id,
            sink: Some(sink),
        })
        .ok()?;
    Some(run_dir)
}

fn open_sink(run_dir: &Path, run_id: &str) -> Option<FileSink> {
    if let Err(err) = create_dir_all(run_dir) {
        eprintln!("[log] failed to create run dir {}: {}", run_dir.display(), err);
        return None;
    }
    let _ = std::fs::write(
        run_dir.join("manifest.json"),
        json!({
            "run_id": run_id,
            "ts": ts_now(),
            "pid": process::id(),
            "log_dir": run_dir.to_string_lossy(),
        })
        .to_string(),
    );
    let open = |name: &str| match File::create(run_dir.join(name)) {
        Ok(f) => Some(Mutex::new(BufWriter::new(f))),
        Err(err) => {
            eprintln!("[log] failed to create {}: {}", name, err);
            None
        }
    };
    Some(FileSink {
        events: open("events.jsonl")?,
        trace: open("trace.jsonl")?,
    })
}

fn split_fields(mut fields: Map<String, Value>) -> (Map<String, Value>, Map<String, Value>) {
    let mut top = Map::new();
    for key in ["entity", "url", "msg"] {
        if let Some(value) = fields.remove(key) {
            top.insert(key.to_string(), value);
        }
    }
    (top, fields)
}

fn write_line(writer: &Mutex<BufWriter<File>>, line: &str) {
    if let Ok(mut w) = writer.lock() {
        let _ = writeln!(w, "{}", line);
        let _ = w.flush();
    }
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    let min_level = Level::from_env();
    if level < min_level || !domain.is_enabled() {
        return;
    }

    emit_record(level, domain.as_str(), event, fields);
}

fn emit_record(level: Level, component: &str, event: &str, fields: Map<String, Value>) {
    let ctx = ensure_run_context();
    let (mut top, data) = split_fields(fields);

    let msg = top.remove("msg").unwrap_or(Value::String(String::new()));
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(ctx.run_id.clone()));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(component));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    for (k, v) in top {
        entry.insert(k, v);
    }
    entry.insert("data".to_string(), Value::Object(data));

    let line = Value::Object(entry).to_string();
    if let Some(sink) = &ctx.sink {
        match level {
            Level::Trace | Level::Debug => write_line(&sink.trace, &line),
            _ => write_line(&sink.events, &line),
        }
    }
    println!("{}", line);
}

// =============================================================================
// Domain-Specific Logging Helpers
// =============================================================================

pub fn log_fetch_attempt(kind: &str, url: &str) {
    log(
        Level::Debug,
        Domain::Fetch,
        "fetch_attempt",
        obj(&[("kind", v_str(kind)), ("url", v_str(url))]),
    );
}

pub fn log_fetch_failed(kind: &str, url: &str, error_kind: &str, reason: &str) {
    log(
        Level::Warn,
        Domain::Fetch,
        "fetch_failed",
        obj(&[
            ("kind", v_str(kind)),
            ("url", v_str(url)),
            ("error_kind", v_str(error_kind)),
            ("msg", v_str(reason)),
        ]),
    );
}

pub fn log_fetch_fallback(primary_url: &str, fallback_url: &str) {
    log(
        Level::Info,
        Domain::Fetch,
        "fetch_fallback",
        obj(&[
            ("url", v_str(fallback_url)),
            ("primary_url", v_str(primary_url)),
        ]),
    );
}

pub fn log_fetch_ok(kind: &str, url: &str, rows: usize, fingerprint: &str) {
    log(
        Level::Info,
        Domain::Fetch,
        "fetch_ok",
        obj(&[
            ("kind", v_str(kind)),
            ("url", v_str(url)),
            ("rows", json!(rows)),
            ("fingerprint", v_str(fingerprint)),
        ]),
    );
}

pub fn log_reshape(rows_in: usize, date_columns: usize, rows_out: usize) {
    log(
        Level::Debug,
        Domain::Reshape,
        "unpivot",
        obj(&[
            ("rows_in", json!(rows_in)),
            ("date_columns", json!(date_columns)),
            ("rows_out", json!(rows_out)),
        ]),
    );
}

pub fn log_series(entities: usize, rows: usize) {
    log(
        Level::Debug,
        Domain::Series,
        "delta_series",
        obj(&[("entities", json!(entities)), ("rows", json!(rows))]),
    );
}

pub fn log_snapshot_ready(entities: usize, rows: usize, fingerprint: &str) {
    log(
        Level::Info,
        Domain::System,
        "snapshot_ready",
        obj(&[
            ("entities", json!(entities)),
            ("rows", json!(rows)),
            ("fingerprint", v_str(fingerprint)),
        ]),
    );
}

pub fn log_view_request(entity: &str, scale: &str, points: usize) {
    log(
        Level::Debug,
        Domain::View,
        "render",
        obj(&[
            ("entity", v_str(entity)),
            ("scale", v_str(scale)),
            ("points", json!(points)),
        ]),
    );
}

pub fn log_unknown_entity(entity: &str) {
    log(
        Level::Warn,
        Domain::View,
        "unknown_entity",
        obj(&[("entity", v_str(entity))]),
    );
}

// =============================================================================
// Field helpers
// =============================================================================

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

// =============================================================================
// Profiling Scope
// =============================================================================

/// Profiling scope that emits structured timing on drop.
pub struct ProfileScope {
    label: &'static str,
    context: Option<Map<String, Value>>,
    started: Instant,
    enabled: bool,
}

impl ProfileScope {
    pub fn with_context(label: &'static str, fields: &[(&str, Value)]) -> Self {
        let enabled = Self::should_sample();
        Self {
            label,
            context: if enabled { Some(obj(fields)) } else { None },
            started: Instant::now(),
            enabled,
        }
    }

    fn should_sample() -> bool {
        std::env::var("PROFILE_SAMPLE")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .map(|p| {
                if p >= 1.0 {
                    true
                } else if p <= 0.0 {
                    false
                } else {
                    let seq = PROFILE_SEQ.fetch_add(1, Ordering::SeqCst);
                    let bucket = (seq % 10_000) as f64 / 10_000.0;
                    bucket < p
                }
            })
            .unwrap_or(true)
    }
}

impl Drop for ProfileScope {
    fn drop(&mut self) {
        if !self.enabled {
            return;
        }
        let elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let mut fields = self.context.take().unwrap_or_default();
        fields.insert("label".to_string(), v_str(self.label));
        fields.insert("elapsed_ms".to_string(), v_num(elapsed_ms));
        log(Level::Trace, Domain::Profile, "profile", fields);
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Shared test utilities for adapter and integration tests.
//!
//! `RecordingEngine` stands in for a live DuckDB connection: it records every
//! statement, answers with canned results and simulates the configuration lock
//! per physical connection. Opening it through `Connector` yields a new
//! "connection" that shares the log and canned responses but starts unlocked.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::db::{ConnectionConfig, Connector, DbError, Engine, RawColumn, RawResult, Result, Value};

#[derive(Debug, Clone)]
enum Reply {
    Rows(RawResult),
    Count(u64),
    Fail(String),
}

#[derive(Debug, Default)]
struct Shared {
    log: Mutex<Vec<String>>,
    replies: Mutex<Vec<(String, Reply)>>,
    opened: AtomicUsize,
}

/// Engine double that records SQL and replays canned responses.
#[derive(Debug, Clone, Default)]
pub struct RecordingEngine {
    shared: Arc<Shared>,
    locked: Arc<AtomicBool>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer statements containing `pattern` with `result`.
    pub fn respond(&self, pattern: &str, result: RawResult) {
        self.push(pattern, Reply::Rows(result));
    }

    /// Answer statements containing `pattern` with rows under named columns.
    pub fn respond_rows(&self, pattern: &str, columns: &[&str], rows: Vec<Vec<Value>>) {
        self.respond(
            pattern,
            RawResult {
                columns: columns.iter().map(|c| RawColumn::Name(c.to_string())).collect(),
                rows,
            },
        );
    }

    /// Changed-row count reported by `execute` for statements containing `pattern`.
    pub fn respond_count(&self, pattern: &str, count: u64) {
        self.push(pattern, Reply::Count(count));
    }

    /// Fail statements containing `pattern` with a `StatementInvalid` error.
    pub fn fail_on(&self, pattern: &str, message: &str) {
        self.push(pattern, Reply::Fail(message.to_string()));
    }

    pub fn clear_responses(&self) {
        self.lock_replies().clear();
    }

    pub fn clear_failures(&self) {
        self.lock_replies().retain(|(_, reply)| !matches!(reply, Reply::Fail(_)));
    }

    /// Every statement seen so far, across all connections.
    pub fn statements(&self) -> Vec<String> {
        self.shared.log.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.shared.log.lock().unwrap().clear();
    }

    /// Number of physical connections opened through `Connector`.
    pub fn opened(&self) -> usize {
        self.shared.opened.load(Ordering::SeqCst)
    }

    fn push(&self, pattern: &str, reply: Reply) {
        self.lock_replies().push((pattern.to_string(), reply));
    }

    fn lock_replies(&self) -> std::sync::MutexGuard<'_, Vec<(String, Reply)>> {
        self.shared.replies.lock().unwrap()
    }

    fn record(&self, sql: &str) -> Option<Reply> {
        self.shared.log.lock().unwrap().push(sql.to_string());
        if sql.contains("lock_configuration = true") {
            self.locked.store(true, Ordering::SeqCst);
        }
        self.lock_replies()
            .iter()
            .find(|(pattern, _)| sql.contains(pattern.as_str()))
            .map(|(_, reply)| reply.clone())
    }
}

impl Engine for RecordingEngine {
    fn query(&self, sql: &str, _binds: &[Value]) -> Result<RawResult> {
        if sql.contains("current_setting('lock_configuration')") {
            self.shared.log.lock().unwrap().push(sql.to_string());
            return Ok(RawResult {
                columns: vec![RawColumn::Name("current_setting('lock_configuration')".into())],
                rows: vec![vec![Value::Bool(self.locked.load(Ordering::SeqCst))]],
            });
        }
        match self.record(sql) {
            Some(Reply::Rows(result)) => Ok(result),
            Some(Reply::Count(count)) => Ok(RawResult {
                columns: vec![RawColumn::Name("Count".into())],
                rows: vec![vec![Value::Int(count as i64)]],
            }),
            Some(Reply::Fail(message)) => Err(DbError::statement_invalid(sql, message)),
            None => Ok(RawResult::default()),
        }
    }

    fn execute(&self, sql: &str, _binds: &[Value]) -> Result<u64> {
        match self.record(sql) {
            Some(Reply::Count(count)) => Ok(count),
            Some(Reply::Fail(message)) => Err(DbError::statement_invalid(sql, message)),
            _ => Ok(0),
        }
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}

impl Connector for RecordingEngine {
    fn open(&self, _config: &ConnectionConfig) -> Result<Box<dyn Engine>> {
        self.shared.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingEngine {
            shared: Arc::clone(&self.shared),
            locked: Arc::new(AtomicBool::new(false)),
        }))
    }
}

//! Timed spans around units of pipeline work.
//!
//! [`TimedSpan`] logs `span_start` when created and `span_end` (with the
//! elapsed milliseconds) when dropped, so the end event is emitted on every
//! exit path, including `?` returns and panics.

use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::info;
use uuid::Uuid;

/// Guard that brackets a block of work with start/end events
#[derive(Debug)]
pub struct TimedSpan {
    name: String,
    session_id: String,
    trace_id: String,
    fields: Value,
    started: Instant,
}

impl TimedSpan {
    /// Emit `span_start` and return the guard
    pub fn enter(name: impl Into<String>, session_id: impl Into<String>, fields: Value) -> Self {
        let mut trace_id = Uuid::new_v4().simple().to_string();
        trace_id.truncate(8);

        let span = Self {
            name: name.into(),
            session_id: session_id.into(),
            trace_id,
            fields,
            started: Instant::now(),
        };

        info!(
            event = "span_start",
            span = %span.name,
            trace_id = %span.trace_id,
            session_id = %span.session_id,
            fields = %span.fields
        );

        span
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Drop for TimedSpan {
    fn drop(&mut self) {
        let duration_ms = (self.started.elapsed().as_secs_f64() * 100_000.0).round() / 100.0;
        info!(
            event = "span_end",
            span = %self.name,
            trace_id = %self.trace_id,
            session_id = %self.session_id,
            duration_ms,
            fields = %self.fields
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn failing_work() -> anyhow::Result<()> {
        let _span = TimedSpan::enter("evaluation", "s1", json!({"detections": 3}));
        anyhow::bail!("stage exploded")
    }

    #[test]
    fn test_end_event_emitted_on_error_exit() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        let result = tracing::subscriber::with_default(subscriber, failing_work);
        assert!(result.is_err());

        let output = captured.text();
        let start = output.find("span_start").expect("start event");
        let end = output.find("span_end").expect("end event");
        assert!(start < end);
        assert!(output.contains("duration_ms"));
    }

    #[test]
    fn test_trace_id_length() {
        let span = TimedSpan::enter("detection", "s1", Value::Null);
        assert_eq!(span.trace_id().len(), 8);
    }
}

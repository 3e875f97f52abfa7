//! Flat NDJSON record layer
//!
//! Every event becomes one JSON object per line:
//!
//! ```text
//! {"level":"info","time":1718000000000,"msg":"connected","client":{"id":"sensor-1"}}
//! ```
//!
//! Fields of the enclosing spans are merged in from the root span down, then
//! the event's own fields. Dotted field names nest (`client.id` becomes
//! `{"client":{"id":..}}`). The formatted message is written as `msg`; an
//! event that sets `msg` explicitly keeps its `message` field as data.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

use crate::sink::LogSink;

/// Debug adapter that renders a value as compact JSON.
///
/// Record structured values with `field = ?Json(&value)`; the record layer
/// turns them back into JSON arrays and objects.
pub struct Json<'a, T: ?Sized>(pub &'a T);

impl<T: Serialize + ?Sized> fmt::Debug for Json<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(self.0).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

/// `tracing_subscriber` layer writing flat JSON records to a [`LogSink`]
pub struct RecordLayer {
    sink: LogSink,
}

impl RecordLayer {
    pub fn new(sink: LogSink) -> Self {
        Self { sink }
    }
}

/// Span fields captured at creation, stored in the span's extensions
struct SpanFields(Vec<(&'static str, Value)>);

impl<S> Layer<S> for RecordLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut visitor = FieldVisitor::default();
        attrs.record(&mut visitor);
        span.extensions_mut().insert(SpanFields(visitor.fields));
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut visitor = FieldVisitor::default();
        values.record(&mut visitor);
        let mut extensions = span.extensions_mut();
        match extensions.get_mut::<SpanFields>() {
            Some(fields) => fields.0.extend(visitor.fields),
            None => extensions.insert(SpanFields(visitor.fields)),
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut record = Map::new();
        record.insert(
            "level".to_string(),
            Value::from(level_label(event.metadata().level())),
        );
        record.insert("time".to_string(), Value::from(now_millis()));

        if let Some(scope) = ctx.event_scope(event) {
            for span in scope.from_root() {
                if let Some(fields) = span.extensions().get::<SpanFields>() {
                    for (name, value) in &fields.0 {
                        insert_path(&mut record, name, value.clone());
                    }
                }
            }
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        visitor.apply(&mut record);

        if let Ok(line) = serde_json::to_vec(&record) {
            // Write errors are dropped
            let _ = self.sink.write_line(&line);
        }
    }
}

#[derive(Default)]
struct FieldVisitor {
    fields: Vec<(&'static str, Value)>,
    message: Option<String>,
}

impl FieldVisitor {
    fn push(&mut self, field: &Field, value: Value) {
        self.fields.push((field.name(), value));
    }

    fn apply(self, record: &mut Map<String, Value>) {
        let explicit_msg = self.fields.iter().any(|(name, _)| *name == "msg");
        for (name, value) in self.fields {
            insert_path(record, name, value);
        }
        if let Some(text) = self.message {
            if explicit_msg {
                insert_path(record, "message", structured(text));
            } else {
                record.insert("msg".to_string(), Value::String(text));
            }
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.push(field, Value::from(value));
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push(field, Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.push(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.push(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.push(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.push(field, Value::from(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let text = format!("{:?}", value);
        if field.name() == "message" {
            self.message = Some(text);
        } else {
            self.push(field, structured(text));
        }
    }
}

/// JSON arrays and objects (as rendered by [`Json`]) stay structured,
/// anything else is kept as text.
fn structured(text: String) -> Value {
    if text.starts_with('{') || text.starts_with('[') {
        if let Ok(value) = serde_json::from_str::<Value>(&text) {
            return value;
        }
    }
    Value::String(text)
}

fn insert_path(map: &mut Map<String, Value>, key: &str, value: Value) {
    match key.split_once('.') {
        Some((head, rest)) => {
            let entry = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(inner) = entry {
                insert_path(inner, rest, value);
            }
        }
        None => {
            map.insert(key.to_string(), value);
        }
    }
}

fn level_label(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::SharedBuf;
    use tracing_subscriber::prelude::*;

    fn capture(f: impl FnOnce()) -> Vec<Value> {
        let buf = SharedBuf::default();
        let subscriber = tracing_subscriber::registry()
            .with(RecordLayer::new(LogSink::from_writer(buf.clone())));
        tracing::subscriber::with_default(subscriber, f);
        buf.lines()
    }

    #[test]
    fn test_flat_record_shape() {
        let records = capture(|| tracing::info!(port = 1883u16, "listening"));

        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["msg"], "listening");
        assert_eq!(records[0]["level"], "info");
        assert_eq!(records[0]["port"], 1883);
        assert!(records[0]["time"].as_u64().unwrap() > 0);
    }

    #[test]
    fn test_span_fields_nest_and_merge() {
        let records = capture(|| {
            let span = tracing::error_span!("client", client.id = "abc");
            span.in_scope(|| tracing::warn!("connected"));
        });

        assert_eq!(records[0]["client"]["id"], "abc");
        assert_eq!(records[0]["level"], "warn");
    }

    #[test]
    fn test_structured_fields_survive() {
        let topics = vec!["a/b".to_string()];
        let records = capture(|| {
            tracing::info!(topics = ?Json(&topics), "unsubscribed");
        });

        assert_eq!(records[0]["topics"], serde_json::json!(["a/b"]));
    }

    #[test]
    fn test_explicit_msg_keeps_message_field() {
        let packet = serde_json::json!({ "topic": "t", "qos": 1, "retain": true });
        let records = capture(|| {
            tracing::info!(msg = "published", message = ?Json(&packet));
        });

        assert_eq!(records[0]["msg"], "published");
        assert_eq!(records[0]["message"], packet);
    }

    #[test]
    fn test_bracketed_text_stays_text() {
        let records = capture(|| tracing::info!(reason = ?"[not json", "x"));
        assert_eq!(records[0]["reason"], "\"[not json\"");

        let records = capture(|| tracing::info!("[1,2]"));
        assert_eq!(records[0]["msg"], "[1,2]");
    }
}

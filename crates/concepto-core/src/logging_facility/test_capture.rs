//! In-memory capture of tracing events for assertions in tests
//!
//! Events are recorded with their fields flattened to strings. Events
//! emitted inside a `compile` span also carry that span's `run_id`, so a
//! test can pick out the events of the run it started even when other
//! tests log concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use concepto_core_types::schema::{
    FIELD_COMMAND_ID, FIELD_EVENT, FIELD_NODE_ID, FIELD_OP, FIELD_RUN_ID,
};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// One recorded event
#[derive(Clone, Debug)]
pub struct CapturedEvent {
    pub level: Level,
    pub op: Option<String>,
    pub event: Option<String>,
    pub node_id: Option<String>,
    pub command_id: Option<String>,
    /// Run id of the innermost enclosing span that has one
    pub run_id: Option<String>,
    pub fields: HashMap<String, String>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

#[derive(Default)]
struct Fields(HashMap<String, String>);

impl Visit for Fields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    // Numbers and bools land here too; their Debug form is their plain form
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.0
            .insert(field.name().to_string(), format!("{:?}", value));
    }
}

/// Span extension holding a span's `run_id`
struct SpanRunId(String);

/// Layer recording every event into a shared buffer
pub struct TestCaptureLayer {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl TestCaptureLayer {
    pub fn new() -> (Self, TestCapture) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let capture = TestCapture {
            events: Arc::clone(&events),
        };
        (Self { events }, capture)
    }
}

impl<S> Layer<S> for TestCaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut fields = Fields::default();
        attrs.record(&mut fields);
        if let (Some(run_id), Some(span)) = (fields.0.remove(FIELD_RUN_ID), ctx.span(id)) {
            span.extensions_mut().insert(SpanRunId(run_id));
        }
    }

    fn on_event(&self, event: &tracing::Event<'_>, ctx: Context<'_, S>) {
        let mut fields = Fields::default();
        event.record(&mut fields);

        let run_id = ctx.event_scope(event).and_then(|scope| {
            scope
                .into_iter()
                .find_map(|span| span.extensions().get::<SpanRunId>().map(|r| r.0.clone()))
        });

        let captured = CapturedEvent {
            level: *event.metadata().level(),
            op: fields.0.get(FIELD_OP).cloned(),
            event: fields.0.get(FIELD_EVENT).cloned(),
            node_id: fields.0.get(FIELD_NODE_ID).cloned(),
            command_id: fields.0.get(FIELD_COMMAND_ID).cloned(),
            run_id,
            fields: fields.0,
        };

        if let Ok(mut events) = self.events.lock() {
            events.push(captured);
        }
    }
}

/// Handle on the captured events
#[derive(Clone)]
pub struct TestCapture {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl TestCapture {
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Events emitted inside the run with the given id
    pub fn run_events(&self, run_id: &str) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.run_id.as_deref() == Some(run_id))
            .collect()
    }

    /// # Panics
    ///
    /// Panics if no event has both the given `op` and `event` values.
    pub fn assert_event_exists(&self, op: &str, event: &str) {
        let events = self.events();
        assert!(
            events
                .iter()
                .any(|e| e.op.as_deref() == Some(op) && e.event.as_deref() == Some(event)),
            "no {} event for op {} among {} captured events",
            event,
            op,
            events.len()
        );
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }

    pub fn count_events<F>(&self, predicate: F) -> usize
    where
        F: Fn(&CapturedEvent) -> bool,
    {
        self.events().iter().filter(|e| predicate(e)).count()
    }
}

static GLOBAL_CAPTURE: OnceLock<TestCapture> = OnceLock::new();

/// Install the capture layer as the global subscriber (once) and return a
/// handle on the shared buffer
///
/// Tests in one binary share the buffer; filter by a unique `op`, node id
/// or run id.
///
/// # Example
///
/// ```
/// use concepto_core::logging_facility::test_capture::init_test_capture;
/// use concepto_core::log_op_start;
///
/// let capture = init_test_capture();
/// log_op_start!("doc_capture_op");
/// capture.assert_event_exists("doc_capture_op", "start");
/// ```
pub fn init_test_capture() -> TestCapture {
    GLOBAL_CAPTURE
        .get_or_init(|| {
            let (layer, capture) = TestCaptureLayer::new();
            tracing_subscriber::registry().with(layer).init();
            capture
        })
        .clone()
}

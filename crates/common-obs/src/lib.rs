use std::{
    fmt, io,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use axum::{routing::get, Json, Router};
use serde_json::{json, Map, Value};
use tracing::{field::Visit, span};
use tracing_subscriber::{
    fmt::{self as tsfmt, format::Writer, FmtContext, FormatEvent, FormatFields, MakeWriter},
    layer::{Context, Layer, SubscriberExt},
    registry::{LookupSpan, SpanRef},
    EnvFilter, Registry,
};

mod metrics;

pub use metrics::{
    encode_prometheus as encode_prometheus_metrics, http_requests_total, register_counter,
    Counter, CounterVec, PROMETHEUS_CONTENT_TYPE,
};

/// Span field that carries the request identifier onto every nested log line.
pub const REQUEST_ID_FIELD: &str = "request_id";

#[derive(Debug, thiserror::Error)]
pub enum ObsInitError {
    #[error("tracing subscriber already initialized")]
    AlreadyInitialized,
    #[error("failed to install tracing subscriber: {0}")]
    Install(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Initialize observability for a service.
pub struct ObsInit;

impl ObsInit {
    /// Install a global tracing subscriber with JSON output on stderr and
    /// register the service with the metrics registry.
    pub fn init(service: &str) -> Result<(), ObsInitError> {
        let subscriber = Self::subscriber_with_writer(service, io::stderr);
        tracing::subscriber::set_global_default(subscriber).map_err(|err| {
            if tracing::dispatcher::has_been_set() {
                ObsInitError::AlreadyInitialized
            } else {
                ObsInitError::Install(err)
            }
        })
    }

    /// Build a tracing subscriber using the provided writer.
    pub fn subscriber_with_writer<W>(service: &str, writer: W) -> impl tracing::Subscriber
    where
        W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
    {
        metrics::init(service);
        let env_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| {
            if cfg!(debug_assertions) {
                "debug".to_string()
            } else {
                "info".to_string()
            }
        });
        let env_filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(env_level))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let fmt_layer = tsfmt::layer()
            .with_ansi(false)
            .event_format(JsonLineFormat {
                service: Arc::from(service),
            })
            .with_writer(writer);

        Registry::default()
            .with(env_filter)
            .with(RequestContextLayer::default())
            .with(fmt_layer)
    }
}

/// Build a simple health and info router for services.
pub fn health_router(service: &'static str) -> Router {
    let health_handler =
        get(move || async move { Json(json!({ "status": "ok", "service": service })) });

    let version = env!("CARGO_PKG_VERSION");
    let info_handler =
        get(move || async move { Json(json!({ "service": service, "version": version })) });

    Router::new()
        .route("/health", health_handler.clone())
        .route("/v1/health", health_handler)
        .route("/info", info_handler.clone())
        .route("/v1/info", info_handler)
}

/// Correlation data shared by a root span and all of its children.
#[derive(Clone, Debug)]
struct SpanContext {
    trace_id: String,
    request_id: Option<String>,
}

#[derive(Default)]
struct RequestContextLayer {
    traces: AtomicU64,
}

impl RequestContextLayer {
    fn next_trace_id(&self) -> String {
        let id = self.traces.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{:016x}", id)
    }
}

impl<S> Layer<S> for RequestContextLayer
where
    S: tracing::Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let inherited = span.parent().as_ref().and_then(span_context);

        let mut visitor = RequestIdVisitor::default();
        attrs.record(&mut visitor);

        let context = match inherited {
            Some(parent) => SpanContext {
                trace_id: parent.trace_id,
                request_id: visitor.request_id.or(parent.request_id),
            },
            None => SpanContext {
                trace_id: self.next_trace_id(),
                request_id: visitor.request_id,
            },
        };
        span.extensions_mut().insert(context);
    }

    fn on_record(&self, id: &span::Id, values: &span::Record<'_>, ctx: Context<'_, S>) {
        let mut visitor = RequestIdVisitor::default();
        values.record(&mut visitor);
        let (Some(request_id), Some(span)) = (visitor.request_id, ctx.span(id)) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        if let Some(context) = extensions.get_mut::<SpanContext>() {
            context.request_id = Some(request_id);
        }
    }
}

fn span_context<S>(span: &SpanRef<'_, S>) -> Option<SpanContext>
where
    S: tracing::Subscriber + for<'span> LookupSpan<'span>,
{
    let extensions = span.extensions();
    extensions.get::<SpanContext>().cloned()
}

#[derive(Default)]
struct RequestIdVisitor {
    request_id: Option<String>,
}

impl Visit for RequestIdVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == REQUEST_ID_FIELD {
            self.request_id = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == REQUEST_ID_FIELD {
            self.request_id = Some(format!("{:?}", value).trim_matches('"').to_string());
        }
    }
}

struct JsonLineFormat {
    service: Arc<str>,
}

impl<S, N> FormatEvent<S, N> for JsonLineFormat
where
    S: tracing::Subscriber + for<'span> LookupSpan<'span>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let context = ctx.lookup_current().as_ref().and_then(span_context);
        let (trace_id, request_id) = match context {
            Some(context) => (Some(context.trace_id), context.request_id),
            None => (None, None),
        };

        let line = json!({
            "level": metadata.level().as_str().to_ascii_lowercase(),
            "target": metadata.target(),
            "service": &*self.service,
            "trace_id": trace_id,
            "request_id": request_id,
            "fields": Value::Object(fields.0),
        });
        writeln!(writer, "{}", line)
    }
}

#[derive(Default)]
struct FieldCollector(Map<String, Value>);

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        self.0
            .insert(field.name().to_string(), Value::from(format!("{:?}", value)));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_f64(&mut self, field: &tracing::field::Field, value: f64) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }
}

pub fn service_name() -> Option<&'static str> {
    metrics::service_name()
}

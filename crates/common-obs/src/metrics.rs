use once_cell::sync::OnceCell;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

static REGISTRY: OnceCell<Registry> = OnceCell::new();
static SERVICE_NAME: OnceCell<&'static str> = OnceCell::new();
static PROCESS_START: OnceCell<Instant> = OnceCell::new();

pub fn init(service: &str) {
    if SERVICE_NAME.get().is_some() {
        return;
    }

    let leaked: &'static str = Box::leak(service.to_string().into_boxed_str());
    SERVICE_NAME.set(leaked).ok();
    PROCESS_START.get_or_init(Instant::now);
    http_requests_total().ensure(&[leaked, "/metrics", "200"]);
}

pub fn service_name() -> Option<&'static str> {
    SERVICE_NAME.get().copied()
}

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::default)
}

#[derive(Default)]
struct Registry {
    counters: RwLock<Vec<Arc<CounterFamily>>>,
}

impl Registry {
    fn counter(
        &self,
        name: &'static str,
        help: &'static str,
        label_names: &'static [&'static str],
    ) -> Arc<CounterFamily> {
        if let Some(existing) = self
            .counters
            .read()
            .expect("lock poisoned")
            .iter()
            .find(|family| family.name == name)
        {
            return existing.clone();
        }

        let mut guard = self.counters.write().expect("lock poisoned");
        if let Some(existing) = guard.iter().find(|family| family.name == name) {
            return existing.clone();
        }
        let family = Arc::new(CounterFamily {
            name,
            help,
            label_names,
            values: Mutex::new(BTreeMap::new()),
        });
        guard.push(family.clone());
        family
    }

    fn encode(&self) -> String {
        let mut output = String::new();

        if let (Some(service), Some(start)) = (service_name(), PROCESS_START.get()) {
            let _ = writeln!(
                output,
                "# HELP process_uptime_seconds Service uptime in seconds"
            );
            let _ = writeln!(output, "# TYPE process_uptime_seconds gauge");
            let _ = writeln!(
                output,
                "process_uptime_seconds{{service=\"{}\"}} {:.3}",
                escape_label(service),
                start.elapsed().as_secs_f64()
            );
        }

        for family in self.counters.read().expect("lock poisoned").iter() {
            let _ = writeln!(output, "# HELP {} {}", family.name, family.help);
            let _ = writeln!(output, "# TYPE {} counter", family.name);
            for (labels, value) in family.collect() {
                output.push_str(family.name);
                write_labels(&mut output, family.label_names, &labels);
                let _ = writeln!(output, " {}", value);
            }
        }

        output
    }
}

struct CounterFamily {
    name: &'static str,
    help: &'static str,
    label_names: &'static [&'static str],
    values: Mutex<BTreeMap<Vec<String>, Arc<AtomicU64>>>,
}

impl CounterFamily {
    fn get_or_create(&self, label_values: &[&str]) -> Arc<AtomicU64> {
        assert_eq!(
            self.label_names.len(),
            label_values.len(),
            "label value count mismatch",
        );
        let key: Vec<String> = label_values.iter().map(|value| value.to_string()).collect();
        let mut guard = self.values.lock().expect("lock poisoned");
        guard.entry(key).or_default().clone()
    }

    fn collect(&self) -> Vec<(Vec<String>, u64)> {
        let guard = self.values.lock().expect("lock poisoned");
        guard
            .iter()
            .map(|(labels, value)| (labels.clone(), value.load(Ordering::Relaxed)))
            .collect()
    }
}

/// A family of monotonically increasing counters keyed by label values.
#[derive(Clone)]
pub struct CounterVec {
    inner: Arc<CounterFamily>,
}

impl CounterVec {
    pub fn with_label_values(&self, labels: &[&str]) -> Counter {
        Counter {
            inner: self.inner.get_or_create(labels),
        }
    }

    pub fn inc(&self, labels: &[&str], amount: u64) {
        self.with_label_values(labels).inc(amount);
    }

    /// Make a series visible with a zero value before it is first incremented.
    pub fn ensure(&self, labels: &[&str]) {
        let _ = self.inner.get_or_create(labels);
    }
}

#[derive(Clone)]
pub struct Counter {
    inner: Arc<AtomicU64>,
}

impl Counter {
    pub fn inc(&self, amount: u64) {
        self.inner.fetch_add(amount, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.inner.load(Ordering::Relaxed)
    }
}

/// Register a counter family, or return the existing one with the same name.
pub fn register_counter(
    name: &'static str,
    help: &'static str,
    label_names: &'static [&'static str],
) -> CounterVec {
    CounterVec {
        inner: registry().counter(name, help, label_names),
    }
}

pub fn http_requests_total() -> CounterVec {
    register_counter(
        "http_requests_total",
        "Total HTTP requests handled",
        &["service", "route", "code"],
    )
}

pub fn encode_prometheus() -> String {
    registry().encode()
}

fn write_labels(output: &mut String, names: &[&str], values: &[String]) {
    if names.is_empty() {
        return;
    }
    output.push('{');
    for (idx, (name, value)) in names.iter().zip(values).enumerate() {
        if idx > 0 {
            output.push(',');
        }
        let _ = write!(output, "{}=\"{}\"", name, escape_label(value));
    }
    output.push('}');
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_shared_by_name_and_encoded() {
        let first = register_counter("test_widgets_total", "Widgets", &["kind"]);
        let second = register_counter("test_widgets_total", "Widgets", &["kind"]);
        first.inc(&["round"], 2);
        second.inc(&["round"], 1);
        second.ensure(&["square"]);

        assert_eq!(first.with_label_values(&["round"]).value(), 3);

        let encoded = encode_prometheus();
        assert!(encoded.contains("# TYPE test_widgets_total counter"));
        assert!(encoded.contains("test_widgets_total{kind=\"round\"} 3"));
        assert!(encoded.contains("test_widgets_total{kind=\"square\"} 0"));
    }

    #[test]
    fn label_values_are_escaped() {
        let mut out = String::new();
        write_labels(&mut out, &["path"], &["a\"b".to_string()]);
        assert_eq!(out, "{path=\"a\\\"b\"}");
    }
}

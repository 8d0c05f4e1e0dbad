//! Prometheus counters for write operations.

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

use domains::AppError;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct WriteLabels {
    pub operation: String,
    /// `ok` or the error code.
    pub outcome: String,
}

pub struct Metrics {
    registry: Registry,
    writes: Family<WriteLabels, Counter>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let writes = Family::<WriteLabels, Counter>::default();
        registry.register("cookbook_writes", "Write operations by outcome", writes.clone());
        Self { registry, writes }
    }

    pub fn record(&self, operation: &str, error: Option<&AppError>) {
        let labels = WriteLabels {
            operation: operation.to_string(),
            outcome: error.map_or("ok", AppError::code).to_string(),
        };
        self.writes.get_or_create(&labels).inc();
    }

    /// OpenMetrics text exposition.
    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut out = String::new();
        encode(&mut out, &self.registry)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::ValidationReason;

    #[test]
    fn counts_by_operation_and_outcome() {
        let metrics = Metrics::new();
        metrics.record("post_create", None);
        metrics.record("post_create", None);
        metrics.record("post_create", Some(&ValidationReason::MissingTitle.into()));

        let text = metrics.render().unwrap();
        assert!(text.contains(r#"cookbook_writes_total{operation="post_create",outcome="ok"} 2"#));
        assert!(text.contains(
            r#"cookbook_writes_total{operation="post_create",outcome="missing_title"} 1"#
        ));
    }
}

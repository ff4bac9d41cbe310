use anyhow::Context;
use opentelemetry::metrics::{Meter, MeterProvider};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::Resource;

/// An opentelemetry meter provider whose metrics are scraped from a
/// prometheus registry.
#[derive(Debug, Clone)]
pub struct Telemetry {
	provider: SdkMeterProvider,
	registry: prometheus::Registry,
}

impl Telemetry {
	pub fn new() -> anyhow::Result<Self> {
		let registry = prometheus::Registry::new();
		let exporter = opentelemetry_prometheus::exporter()
			.with_registry(registry.clone())
			.build()
			.context("prometheus exporter")?;

		let provider = SdkMeterProvider::builder()
			.with_resource(Resource::new([KeyValue::new("service.name", env!("CARGO_PKG_NAME"))]))
			.with_reader(exporter)
			.build();

		Ok(Self { provider, registry })
	}

	/// Make this provider back [`opentelemetry::global::meter`].
	pub fn install_global(&self) {
		opentelemetry::global::set_meter_provider(self.provider.clone());
	}

	pub fn meter(&self, name: &'static str) -> Meter {
		self.provider.meter(name)
	}

	/// Everything recorded so far in the prometheus text format.
	pub fn encode(&self) -> Result<String, prometheus::Error> {
		prometheus::TextEncoder::new().encode_to_string(&self.registry.gather())
	}

	pub fn shutdown(&self) -> anyhow::Result<()> {
		self.provider.shutdown().context("meter provider shutdown")
	}
}

#[cfg_attr(all(coverage_nightly, test), coverage(off))]
#[cfg(test)]
mod tests {
	use super::Telemetry;

	#[test]
	fn encodes_counters() {
		let telemetry = Telemetry::new().unwrap();
		let counter = telemetry.meter("profsnap-hello-test").u64_counter("test.requests").build();
		counter.add(3, &[]);

		let text = telemetry.encode().unwrap();
		assert!(text.contains("# TYPE test_requests_total counter"), "{text}");
		assert!(text.contains("test_requests_total{"), "{text}");

		telemetry.shutdown().unwrap();
	}
}

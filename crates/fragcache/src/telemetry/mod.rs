// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structured logs and optional OpenTelemetry metrics for fragment cache operations.
//!
//! Every notable step of a lookup is recorded once as a `fragment.event` through `tracing`,
//! at a level that follows the activity. With the `metrics` feature and a configured meter
//! provider, the same events also feed a counter and a duration histogram.

use std::{error::Error as StdError, time::Duration};

#[cfg(any(feature = "metrics", test))]
use opentelemetry::{
    InstrumentationScope, KeyValue,
    metrics::{Counter, Gauge, Histogram, Meter, MeterProvider},
};

pub(crate) mod attributes;
#[cfg(test)]
pub(crate) mod testing;

/// Name identifying a fragment cache in logs and metrics.
pub type CacheName = &'static str;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FragmentOperation {
    GetOrRender,
    Render,
    StoreGet,
    StoreSet,
    StoreRemove,
    LocalSet,
    Invalidate,
}

impl FragmentOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GetOrRender => "fragment.get_or_render",
            Self::Render => "fragment.render",
            Self::StoreGet => "fragment.store_get",
            Self::StoreSet => "fragment.store_set",
            Self::StoreRemove => "fragment.store_remove",
            Self::LocalSet => "fragment.local_set",
            Self::Invalidate => "fragment.invalidate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FragmentActivity {
    LocalHit,
    Joined,
    StoreHit,
    StoreMiss,
    Expired,
    Rendered,
    Stored,
    Uncacheable,
    Rejected,
    Invalidated,
    StoreError,
    FormatError,
    RenderFailed,
}

impl FragmentActivity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LocalHit => "fragment.local_hit",
            Self::Joined => "fragment.joined",
            Self::StoreHit => "fragment.store_hit",
            Self::StoreMiss => "fragment.store_miss",
            Self::Expired => "fragment.expired",
            Self::Rendered => "fragment.rendered",
            Self::Stored => "fragment.stored",
            Self::Uncacheable => "fragment.uncacheable",
            Self::Rejected => "fragment.rejected",
            Self::Invalidated => "fragment.invalidated",
            Self::StoreError => "fragment.store_error",
            Self::FormatError => "fragment.format_error",
            Self::RenderFailed => "fragment.render_failed",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            Self::LocalHit | Self::Joined | Self::StoreHit | Self::StoreMiss | Self::Stored | Self::Uncacheable => Severity::Debug,
            Self::Expired | Self::Rendered | Self::Rejected | Self::Invalidated => Severity::Info,
            Self::StoreError | Self::FormatError => Severity::Warn,
            Self::RenderFailed => Severity::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

/// Creates the meter all fragment cache instruments are registered on.
#[cfg(any(feature = "metrics", test))]
pub(crate) fn create_meter(meter_provider: &dyn MeterProvider) -> Meter {
    meter_provider.meter_with_scope(
        InstrumentationScope::builder("fragcache")
            .with_version(env!("CARGO_PKG_VERSION"))
            .with_schema_url("https://opentelemetry.io/schemas/1.47.0")
            .build(),
    )
}

/// Instruments fed by every recorded event.
#[cfg(any(feature = "metrics", test))]
#[derive(Clone, Debug)]
struct Instruments {
    events: Counter<u64>,
    durations: Histogram<f64>,
    // Last observed byte total of the local cache, not a running sum.
    local_size: Gauge<u64>,
}

#[cfg(any(feature = "metrics", test))]
impl Instruments {
    fn new(meter: &Meter) -> Self {
        Self {
            events: meter
                .u64_counter("fragment.event.count")
                .with_description("Fragment cache events")
                .with_unit("{event}")
                .build(),
            durations: meter
                .f64_histogram("fragment.operation.duration")
                .with_description("Duration of fragment lookups, renders and store calls")
                .with_unit("s")
                .build(),
            local_size: meter
                .u64_gauge("fragment.local.size")
                .with_description("Bytes held by the local fragment cache after the last insertion")
                .with_unit("By")
                .build(),
        }
    }
}

/// Records fragment cache events.
#[derive(Clone, Debug)]
pub(crate) struct FragmentTelemetry {
    name: CacheName,
    #[cfg(any(feature = "metrics", test))]
    instruments: Option<Instruments>,
}

impl FragmentTelemetry {
    /// Creates a recorder that only logs.
    pub fn new(name: CacheName) -> Self {
        Self {
            name,
            #[cfg(any(feature = "metrics", test))]
            instruments: None,
        }
    }

    /// Creates a recorder that logs and reports metrics through `meter`.
    #[cfg(any(feature = "metrics", test))]
    pub fn with_meter(name: CacheName, meter: &Meter) -> Self {
        Self {
            name,
            instruments: Some(Instruments::new(meter)),
        }
    }

    pub fn name(&self) -> CacheName {
        self.name
    }

    pub fn record(&self, operation: FragmentOperation, activity: FragmentActivity, duration: Option<Duration>) {
        self.record_metrics(operation, activity, duration);
        Self::emit(self.name, operation, activity, duration, None);
    }

    pub fn record_failure(
        &self,
        operation: FragmentOperation,
        activity: FragmentActivity,
        duration: Option<Duration>,
        cause: &(dyn StdError + 'static),
    ) {
        self.record_metrics(operation, activity, duration);
        Self::emit(self.name, operation, activity, duration, Some(cause));
    }

    #[cfg_attr(
        not(any(feature = "metrics", test)),
        expect(unused_variables, clippy::unused_self, reason = "only metrics use the size")
    )]
    pub fn record_local_size(&self, bytes: u64) {
        #[cfg(any(feature = "metrics", test))]
        if let Some(instruments) = &self.instruments {
            instruments
                .local_size
                .record(bytes, &[KeyValue::new(attributes::FRAGMENT_CACHE_NAME, self.name)]);
        }
    }

    #[cfg_attr(
        not(any(feature = "metrics", test)),
        expect(unused_variables, clippy::unused_self, reason = "only metrics use the event details")
    )]
    fn record_metrics(&self, operation: FragmentOperation, activity: FragmentActivity, duration: Option<Duration>) {
        #[cfg(any(feature = "metrics", test))]
        if let Some(instruments) = &self.instruments {
            let attrs = [
                KeyValue::new(attributes::FRAGMENT_CACHE_NAME, self.name),
                KeyValue::new(attributes::FRAGMENT_OPERATION_NAME, operation.as_str()),
                KeyValue::new(attributes::FRAGMENT_ACTIVITY_NAME, activity.as_str()),
            ];

            instruments.events.add(1, &attrs);
            if let Some(duration) = duration {
                instruments.durations.record(duration.as_secs_f64(), &attrs);
            }
        }
    }

    fn emit(
        name: CacheName,
        operation: FragmentOperation,
        activity: FragmentActivity,
        duration: Option<Duration>,
        cause: Option<&(dyn StdError + 'static)>,
    ) {
        let op = operation.as_str();
        let act = activity.as_str();
        let duration_ns = duration.map(|d| d.as_nanos());
        let cause = cause.map(tracing::field::display);

        // Tracing levels must be constant, so each severity expands its own event.
        // Field names must match the constants in attributes.rs.
        macro_rules! emit_event {
            ($level:ident) => {
                tracing::$level!(
                    fragment.cache = name,
                    fragment.operation = op,
                    fragment.activity = act,
                    fragment.duration_ns = ?duration_ns,
                    fragment.cause = cause,
                    "fragment.event"
                )
            };
        }

        match activity.severity() {
            Severity::Debug => emit_event!(debug),
            Severity::Info => emit_event!(info),
            Severity::Warn => emit_event!(warn),
            Severity::Error => emit_event!(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use opentelemetry::metrics::MeterProvider;

    use super::*;
    use crate::telemetry::testing::{LogCapture, MetricTester};

    #[test]
    fn operation_names() {
        assert_eq!(FragmentOperation::GetOrRender.as_str(), "fragment.get_or_render");
        assert_eq!(FragmentOperation::Render.as_str(), "fragment.render");
        assert_eq!(FragmentOperation::StoreGet.as_str(), "fragment.store_get");
        assert_eq!(FragmentOperation::StoreSet.as_str(), "fragment.store_set");
        assert_eq!(FragmentOperation::StoreRemove.as_str(), "fragment.store_remove");
        assert_eq!(FragmentOperation::LocalSet.as_str(), "fragment.local_set");
        assert_eq!(FragmentOperation::Invalidate.as_str(), "fragment.invalidate");
    }

    #[test]
    fn degradations_warn_and_render_failures_error() {
        assert_eq!(FragmentActivity::StoreError.severity(), Severity::Warn);
        assert_eq!(FragmentActivity::FormatError.severity(), Severity::Warn);
        assert_eq!(FragmentActivity::RenderFailed.severity(), Severity::Error);
        assert_eq!(FragmentActivity::Rendered.severity(), Severity::Info);
        assert_eq!(FragmentActivity::LocalHit.severity(), Severity::Debug);
    }

    #[test]
    fn event_contains_all_fields() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        let cause = std::io::Error::other("connection reset");

        FragmentTelemetry::new("pages").record_failure(
            FragmentOperation::StoreGet,
            FragmentActivity::StoreError,
            Some(Duration::from_nanos(4321)),
            &cause,
        );

        capture.assert_contains(attributes::FRAGMENT_CACHE_NAME);
        capture.assert_contains(attributes::FRAGMENT_OPERATION_NAME);
        capture.assert_contains(attributes::FRAGMENT_ACTIVITY_NAME);
        capture.assert_contains(attributes::FRAGMENT_DURATION_NAME);
        capture.assert_contains(attributes::FRAGMENT_CAUSE_NAME);
        capture.assert_contains(attributes::FRAGMENT_EVENT_NAME);

        capture.assert_contains("pages");
        capture.assert_contains(FragmentOperation::StoreGet.as_str());
        capture.assert_contains(FragmentActivity::StoreError.as_str());
        capture.assert_contains("connection reset");
        capture.assert_contains("WARN");
    }

    #[test]
    fn levels_follow_severity() {
        let cases = [
            (FragmentActivity::RenderFailed, "ERROR"),
            (FragmentActivity::StoreError, "WARN"),
            (FragmentActivity::Rendered, "INFO"),
            (FragmentActivity::LocalHit, "DEBUG"),
        ];
        for (activity, level) in cases {
            let capture = LogCapture::new();
            let _guard = tracing::subscriber::set_default(capture.subscriber());
            FragmentTelemetry::new("pages").record(FragmentOperation::GetOrRender, activity, None);
            capture.assert_contains(level);
        }
    }

    #[test]
    fn successful_events_carry_no_cause() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        FragmentTelemetry::new("pages").record(FragmentOperation::GetOrRender, FragmentActivity::LocalHit, None);

        let output = capture.output();
        assert!(!output.contains(attributes::FRAGMENT_CAUSE_NAME), "{output}");
    }

    #[test]
    fn metrics_carry_name_operation_and_activity() {
        let tester = MetricTester::new();
        let meter = tester.meter_provider().meter("test");
        let telemetry = FragmentTelemetry::with_meter("pages", &meter);

        telemetry.record(FragmentOperation::Render, FragmentActivity::Rendered, Some(Duration::from_millis(3)));

        tester.assert_attributes_contain(&[
            KeyValue::new(attributes::FRAGMENT_CACHE_NAME, "pages"),
            KeyValue::new(attributes::FRAGMENT_OPERATION_NAME, FragmentOperation::Render.as_str()),
            KeyValue::new(attributes::FRAGMENT_ACTIVITY_NAME, FragmentActivity::Rendered.as_str()),
        ]);
    }

    #[test]
    fn metrics_record_local_size() {
        let tester = MetricTester::new();
        let meter = create_meter(tester.meter_provider());
        let telemetry = FragmentTelemetry::with_meter("pages", &meter);

        telemetry.record_local_size(2048);

        let names = tester.metric_names();
        assert!(names.iter().any(|name| name == "fragment.local.size"), "{names:?}");
    }

    #[test]
    fn logging_only_recorder_emits_no_metrics() {
        let tester = MetricTester::new();
        let telemetry = FragmentTelemetry::new("pages");

        telemetry.record(FragmentOperation::Render, FragmentActivity::Rendered, Some(Duration::from_millis(3)));
        telemetry.record_local_size(10);

        assert!(tester.collect_attributes().is_empty());
    }
}

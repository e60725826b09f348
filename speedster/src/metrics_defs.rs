pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
}

pub struct MetricDef {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub description: &'static str,
}

pub const SCANS_CREATED: MetricDef = MetricDef {
    name: "scans.created",
    metric_type: MetricType::Counter,
    description: "Number of scan records created",
};

pub const AUDITOR_FAILURES: MetricDef = MetricDef {
    name: "auditor.failures",
    metric_type: MetricType::Counter,
    description: "Auditor invocations that did not produce both reports",
};

pub const AUDIT_DURATION: MetricDef = MetricDef {
    name: "auditor.duration",
    metric_type: MetricType::Histogram,
    description: "Wall-clock auditor runtime in seconds",
};

pub const ALL_METRICS: &[MetricDef] = &[SCANS_CREATED, AUDITOR_FAILURES, AUDIT_DURATION];

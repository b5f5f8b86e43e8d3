/// Wall clock in milliseconds since the Unix epoch.
///
/// Only used for retention bookkeeping. Ordering of clipboard values never
/// looks at wall time.
pub trait ClockPort: Send + Sync {
    fn now_ms(&self) -> i64;
}

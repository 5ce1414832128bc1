use criterion::Criterion;

mod add_orders;
mod cancel_orders;
mod depth;

/// Register all order book benchmarks.
pub fn register_benchmarks(c: &mut Criterion) {
    add_orders::register_benchmarks(c);
    cancel_orders::register_benchmarks(c);
    depth::register_benchmarks(c);
}

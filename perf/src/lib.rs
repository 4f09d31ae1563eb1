//! Criterion benchmarks for the hot-path primitives: cached clock reads,
//! ring writes/reads, and quote JSON framing. See `benches/`.

/// Data layer: core types, conditioning, matching and estimation.
///
/// Architecture:
/// ```text
///    RawSample (6 × u16)
///        │
///        ▼
///   ┌──────────────┐
///   │ conditioning │  Savitzky–Golay → min-max → ConditionedVector
///   └──────────────┘
///        │
///        ├──────────────────┐
///        ▼                  ▼
///   ┌──────────┐      ┌───────────┐
///   │ matcher  │      │ estimator │
///   └──────────┘      └───────────┘
///        ▲
///        │ ReferenceTable (builtin or loader: .json / .csv)
/// ```

pub mod conditioning;
pub mod estimator;
pub mod loader;
pub mod matcher;
pub mod model;

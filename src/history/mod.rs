pub mod model;
pub mod repository;
pub mod repository_sqlx;

pub use model::{HeatmapCell, HistoryRow, SpreadStats};
pub use repository::SampleRepository;
pub use repository_sqlx::SqlxSampleRepository;

pub mod settings;

pub use settings::{BenchmarkSettings, Settings, load_settings};

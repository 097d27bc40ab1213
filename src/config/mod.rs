mod sample_config;

pub use sample_config::SampleConfig;

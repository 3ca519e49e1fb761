pub mod acquisition_source;
pub mod capture_delegate;
pub mod output_sink;

mod tracing_factory;

pub use tracing_factory::{OutputType, TracingFactory, TracingFactoryOptions};

mod server_config;

pub use server_config::{DataSourceSettings, ServerConfig};

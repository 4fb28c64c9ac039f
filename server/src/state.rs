use std::sync::Arc;

use common::config::ServerConfig;
use common::err::CResult;
use common::row::Value;
use datasource::{DataSourceConfig, DataSourceManager, FactoryRegistry};
use fileadapters::{CsvFactory, JsonFactory, JsonlFactory, ParquetFactory};
use functions::FunctionRegistry;
use infoschema::InformationSchemaProvider;
use infra::IndexManager;
use kvstore::KvFactory;
use mvcc::MvccFactory;
use planner::QueryCache;
use session::{QueryRegistry, SessionRegistry};

/// Everything a connection handler needs, built once at startup and shared
/// behind `Arc`s. Mirrors the shape of the teacher's per-connection context
/// objects, but collected into one struct since this server has a single
/// shared backend topology rather than one relay target per connection.
pub struct AppState {
    pub config: ServerConfig,
    pub data_sources: Arc<DataSourceManager>,
    pub factories: Arc<FactoryRegistry>,
    pub sessions: Arc<SessionRegistry>,
    pub queries: Arc<QueryRegistry>,
    pub functions: Arc<FunctionRegistry>,
    pub info_schema: Arc<InformationSchemaProvider>,
    pub query_cache: Arc<QueryCache>,
    pub index_manager: Arc<IndexManager>,
}

impl AppState {
    pub async fn bootstrap(config: ServerConfig) -> CResult<Arc<Self>> {
        let factories = Arc::new(FactoryRegistry::new());
        factories.register(Box::new(MvccFactory))?;
        factories.register(Box::new(KvFactory))?;
        factories.register(Box::new(CsvFactory))?;
        factories.register(Box::new(JsonFactory))?;
        factories.register(Box::new(JsonlFactory))?;
        factories.register(Box::new(ParquetFactory))?;

        let data_sources = Arc::new(DataSourceManager::new());
        for (name, settings) in &config.data_sources {
            let mut ds_config = DataSourceConfig::new(settings.backend_type.clone(), name.clone());
            ds_config.writable = settings.writable;
            if let Some(path) = &settings.path {
                ds_config.options.insert("path".to_string(), Value::String(path.clone()));
            }
            for (key, value) in &settings.options {
                ds_config.options.insert(key.clone(), Value::String(value.clone()));
            }
            let source = factories.create(ds_config)?;
            data_sources.register(name.as_str(), source)?;
        }
        if let Some(first) = config.data_sources.keys().next() {
            data_sources.set_default(first.as_str())?;
        }
        data_sources.connect_all().await?;

        let sessions = Arc::new(SessionRegistry::new());
        let queries = Arc::new(QueryRegistry::new());
        let functions = Arc::new(FunctionRegistry::with_builtins());
        let info_schema = Arc::new(InformationSchemaProvider::new(
            data_sources.clone(),
            factories.clone(),
            queries.clone(),
        ));
        let query_cache = Arc::new(QueryCache::new(
            config.query_cache_max_size,
            std::time::Duration::from_secs(config.query_cache_ttl_secs),
        ));
        let index_manager = Arc::new(IndexManager::new());

        Ok(Arc::new(Self {
            config,
            data_sources,
            factories,
            sessions,
            queries,
            functions,
            info_schema,
            query_cache,
            index_manager,
        }))
    }
}

mod schema;

pub use schema::{
    Config, ContextConfig, GatewayConfig, GenerationConfig, MemoryConfig, ProviderConfig,
    ReasoningSettings, SearchConfig,
};

pub mod groq;
pub mod traits;

pub use groq::GroqProvider;
pub use traits::{
    AssistantToolCall, ChatMessage, ChatResponse, GenerationParams, NativeToolCall, Provider,
    ProviderError, ToolChoice,
};

/// Factory: create the right provider from config
pub fn create_provider(name: &str, api_key: Option<&str>) -> anyhow::Result<Box<dyn Provider>> {
    match name {
        "groq" => Ok(Box::new(GroqProvider::new(api_key))),

        // Bring Your Own Provider (any OpenAI-compatible endpoint)
        // Format: "custom:https://your-api.com"
        name if name.starts_with("custom:") => {
            let base_url = name.strip_prefix("custom:").unwrap_or("");
            if base_url.is_empty() {
                anyhow::bail!("Custom provider requires a URL. Format: custom:https://your-api.com");
            }
            Ok(Box::new(GroqProvider::with_base_url(
                "Custom", base_url, api_key,
            )))
        }

        _ => anyhow::bail!(
            "Unknown provider: {name}. Supported: groq, custom:<base-url> (any OpenAI-compatible endpoint)."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_groq() {
        assert!(create_provider("groq", Some("gsk-test")).is_ok());
        assert!(create_provider("groq", None).is_ok());
    }

    #[test]
    fn factory_custom_url() {
        assert!(create_provider("custom:http://localhost:1234", Some("key")).is_ok());
    }

    #[test]
    fn factory_custom_empty_url_errors() {
        let err = create_provider("custom:", None).unwrap_err();
        assert!(err.to_string().contains("requires a URL"));
    }

    #[test]
    fn factory_unknown_provider_errors() {
        let err = create_provider("nonexistent", None).unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));
    }
}

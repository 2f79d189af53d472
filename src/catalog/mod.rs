use std::sync::LazyLock;

use crate::core::types::{ModelCatalog, ModelDescriptor, ProviderCard, ProviderId};

pub const AZURE_PROVIDER_URL: &str = "https://azure.microsoft.com";
pub const AZURE_MODELS_URL: &str =
    "https://learn.microsoft.com/azure/ai-services/openai/concepts/models";

static AZURE_CATALOG: LazyLock<ModelCatalog> =
    LazyLock::new(|| ModelCatalog::from(builtin_azure_models()));

/// Built-in Azure OpenAI model table, in presentation order.
pub fn azure_catalog() -> &'static ModelCatalog {
    &AZURE_CATALOG
}

pub fn azure_provider_card() -> ProviderCard {
    ProviderCard {
        id: ProviderId::Azure,
        name: "Azure".to_string(),
        description: "Azure offers a range of advanced AI models, including GPT-3.5 and the \
                      latest GPT-4 family, supporting many data types and complex tasks with a \
                      focus on secure, reliable and sustainable AI."
            .to_string(),
        url: AZURE_PROVIDER_URL.to_string(),
        models_url: AZURE_MODELS_URL.to_string(),
        sdk_type: "azure".to_string(),
        default_show_browser_request: true,
        models: azure_catalog().clone(),
    }
}

pub fn export_catalog_json(catalog: &ModelCatalog) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(catalog)
}

struct ModelRow {
    id: &'static str,
    deployment_name: &'static str,
    display_name: &'static str,
    description: &'static str,
    context_window_tokens: Option<u32>,
    max_output_tokens: Option<u32>,
    function_call: bool,
    vision: bool,
    enabled: bool,
}

const AZURE_MODELS: &[ModelRow] = &[
    ModelRow {
        id: "gpt-35-turbo",
        deployment_name: "gpt-35-turbo",
        display_name: "GPT 3.5 Turbo",
        description: "GPT 3.5 Turbo, an efficient OpenAI model for chat and text generation \
                      with parallel function calling.",
        context_window_tokens: Some(16_385),
        max_output_tokens: Some(4_096),
        function_call: true,
        vision: false,
        enabled: true,
    },
    ModelRow {
        id: "gpt-35-turbo-16k",
        deployment_name: "gpt-35-turbo-16k",
        display_name: "GPT 3.5 Turbo",
        description: "GPT 3.5 Turbo 16k, a high-capacity text generation model for complex tasks.",
        context_window_tokens: Some(16_384),
        max_output_tokens: None,
        function_call: true,
        vision: false,
        enabled: false,
    },
    ModelRow {
        id: "gpt-4",
        deployment_name: "gpt-4-turbo",
        display_name: "GPT 4 Turbo",
        description: "GPT 4 Turbo, a multimodal model with strong language understanding and \
                      generation that also accepts image input.",
        context_window_tokens: Some(128_000),
        max_output_tokens: None,
        function_call: true,
        vision: true,
        enabled: true,
    },
    ModelRow {
        id: "gpt-4o-mini",
        deployment_name: "gpt-4o-mini",
        display_name: "GPT 4o Mini",
        description: "GPT-4o Mini, a small and efficient model with performance close to GPT-4o.",
        context_window_tokens: Some(128_000),
        max_output_tokens: None,
        function_call: true,
        vision: true,
        enabled: true,
    },
    ModelRow {
        id: "gpt-4o",
        deployment_name: "gpt-4o",
        display_name: "GPT 4o",
        description: "GPT-4o, the latest multimodal model combining advanced text and image \
                      processing.",
        context_window_tokens: Some(128_000),
        max_output_tokens: None,
        function_call: true,
        vision: true,
        enabled: true,
    },
    ModelRow {
        id: "o1-mini",
        deployment_name: "o1-mini",
        display_name: "o1-mini",
        description: "o1-mini",
        context_window_tokens: None,
        max_output_tokens: None,
        function_call: false,
        vision: false,
        enabled: true,
    },
    ModelRow {
        id: "o1-preview",
        deployment_name: "o1-preview",
        display_name: "o1-preview",
        description: "o1-preview",
        context_window_tokens: None,
        max_output_tokens: None,
        function_call: false,
        vision: false,
        enabled: true,
    },
    ModelRow {
        id: "o3-mini",
        deployment_name: "o3-mini",
        display_name: "o3-mini",
        description: "o3-mini",
        context_window_tokens: None,
        max_output_tokens: None,
        function_call: false,
        vision: false,
        enabled: true,
    },
];

fn builtin_azure_models() -> Vec<ModelDescriptor> {
    AZURE_MODELS
        .iter()
        .map(|row| ModelDescriptor {
            id: row.id.to_string(),
            deployment_name: Some(row.deployment_name.to_string()),
            display_name: row.display_name.to_string(),
            description: row.description.to_string(),
            context_window_tokens: row.context_window_tokens,
            max_output_tokens: row.max_output_tokens,
            supports_function_calling: row.function_call,
            supports_vision: row.vision,
            enabled_by_default: row.enabled,
        })
        .collect()
}

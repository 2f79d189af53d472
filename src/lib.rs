pub mod catalog;
pub mod config;
pub mod core;
pub mod diagnostics;
pub mod providers;
pub mod stream;
pub mod transform;
pub mod transport;

pub use catalog::{azure_catalog, azure_provider_card, export_catalog_json};
pub use config::ProviderConfig;
pub use core::error::{ChatError, ChatErrorType};
pub use core::traits::{ChatAdapter, StreamCallbacks};
pub use core::types::*;
pub use providers::azure::AzureOpenAiAdapter;
pub use stream::StreamingResponse;

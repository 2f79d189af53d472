pub mod azure;
pub(crate) mod azure_translate;

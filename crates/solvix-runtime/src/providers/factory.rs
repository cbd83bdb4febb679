//! Construct providers from the closed [`ProviderKind`] set.

use std::sync::Arc;

use super::{
    AnthropicProvider, ApiCredential, GeminiProvider, LlmProvider, OpenAiProvider, ProviderKind,
};

/// Build the transport for `kind`, optionally pointed at a custom endpoint.
pub fn build_provider(
    kind: ProviderKind,
    credential: ApiCredential,
    base_url: Option<&str>,
) -> Arc<dyn LlmProvider> {
    match kind {
        ProviderKind::Gemini => {
            let provider = GeminiProvider::with_credential(credential);
            Arc::new(match base_url {
                Some(url) => provider.with_base_url(url),
                None => provider,
            })
        }
        ProviderKind::OpenAi => {
            let provider = OpenAiProvider::with_credential(credential);
            Arc::new(match base_url {
                Some(url) => provider.with_base_url(url),
                None => provider,
            })
        }
        ProviderKind::Anthropic => {
            let provider = AnthropicProvider::with_credential(credential);
            Arc::new(match base_url {
                Some(url) => provider.with_base_url(url),
                None => provider,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::CredentialSource;

    #[tokio::test]
    async fn test_each_kind_builds_named_provider() {
        for kind in ProviderKind::ALL {
            let credential = ApiCredential::new("k", CredentialSource::Programmatic, "test");
            let provider = build_provider(kind, credential, Some("http://localhost:9/"));
            assert_eq!(provider.name(), kind.as_str());
            assert!(provider.health_check().await);
        }
    }

    #[tokio::test]
    async fn test_blank_key_is_not_healthy() {
        let credential = ApiCredential::new("  ", CredentialSource::Programmatic, "test");
        let provider = build_provider(ProviderKind::Gemini, credential, None);
        assert!(!provider.health_check().await);
    }
}

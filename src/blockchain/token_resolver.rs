use once_cell::sync::Lazy;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::blockchain::abi::{decode_symbol, encode_symbol_call};
use crate::blockchain::BlockSource;
use crate::logging::LogContext;
use crate::models::WalletAddress;

/// Tokens whose symbol is known without asking the chain
static KNOWN_TOKENS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([("0xa0b86a33e6ba0c74d75c9abfd35e5e0b1bcceb83", "WXPL")])
});

/// Length of the degraded symbol: `0x` plus six hex digits
const FALLBACK_SYMBOL_LEN: usize = 8;

/// Maps token contracts to display symbols.
///
/// Successful `symbol()` lookups are cached for the lifetime of the process.
/// Failed lookups fall back to an address prefix and are retried next time.
/// Concurrent first lookups of the same token may each hit the node.
pub struct TokenResolver {
    source: Arc<dyn BlockSource>,
    cache: RwLock<HashMap<WalletAddress, String>>,
    native_symbol: String,
}

impl TokenResolver {
    pub fn new(source: Arc<dyn BlockSource>, native_symbol: String) -> Self {
        Self {
            source,
            cache: RwLock::new(HashMap::new()),
            native_symbol,
        }
    }

    pub fn native_symbol(&self) -> &str {
        &self.native_symbol
    }

    pub async fn resolve(&self, token: &WalletAddress) -> String {
        if token.is_zero() {
            return self.native_symbol.clone();
        }
        if let Some(symbol) = KNOWN_TOKENS.get(token.as_str()) {
            return symbol.to_string();
        }
        if let Some(symbol) = self.cache.read().await.get(token) {
            return symbol.clone();
        }

        match self.fetch_symbol(token).await {
            Ok(symbol) => {
                self.cache.write().await.insert(token.clone(), symbol.clone());
                symbol
            }
            Err(reason) => {
                LogContext::new("token_resolver", "resolve")
                    .with_metadata("token_address", json!(token.as_str()))
                    .debug(&format!("symbol() lookup failed, using address prefix: {}", reason));
                fallback_symbol(token)
            }
        }
    }

    async fn fetch_symbol(&self, token: &WalletAddress) -> Result<String, String> {
        let return_data = self
            .source
            .call(token, &encode_symbol_call())
            .await
            .map_err(|e| e.to_string())?;
        decode_symbol(&return_data).map_err(|e| e.to_string())
    }

    pub async fn cached_count(&self) -> usize {
        self.cache.read().await.len()
    }
}

fn fallback_symbol(token: &WalletAddress) -> String {
    token.as_str()[..FALLBACK_SYMBOL_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::abi::encode_string_return;
    use crate::blockchain::mock::MockBlockSource;

    const TOKEN: &str = "0x3333333333333333333333333333333333333333";

    fn addr(s: &str) -> WalletAddress {
        WalletAddress::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_native_sentinel_never_calls_node() {
        let source = Arc::new(MockBlockSource::new());
        let resolver = TokenResolver::new(source.clone(), "XPL".to_string());

        assert_eq!(resolver.resolve(&WalletAddress::zero()).await, "XPL");
        assert_eq!(source.call_count(), 0);
    }

    #[tokio::test]
    async fn test_known_token_table() {
        let source = Arc::new(MockBlockSource::new());
        let resolver = TokenResolver::new(source.clone(), "XPL".to_string());

        let wxpl = addr("0xA0b86a33E6ba0c74D75c9AbFd35e5E0B1bccEB83");
        assert_eq!(resolver.resolve(&wxpl).await, "WXPL");
        assert_eq!(source.call_count(), 0);
    }

    #[tokio::test]
    async fn test_second_resolution_is_served_from_cache() {
        let source = Arc::new(MockBlockSource::new().with_call_result(TOKEN, encode_string_return("USDT")));
        let resolver = TokenResolver::new(source.clone(), "XPL".to_string());

        assert_eq!(resolver.resolve(&addr(TOKEN)).await, "USDT");
        assert_eq!(resolver.resolve(&addr(TOKEN)).await, "USDT");
        assert_eq!(source.call_count(), 1);
        assert_eq!(resolver.cached_count().await, 1);
    }

    #[tokio::test]
    async fn test_failed_lookup_falls_back_without_caching() {
        let source = Arc::new(MockBlockSource::new());
        let resolver = TokenResolver::new(source.clone(), "XPL".to_string());

        assert_eq!(resolver.resolve(&addr(TOKEN)).await, "0x333333");
        assert_eq!(resolver.resolve(&addr(TOKEN)).await, "0x333333");
        assert_eq!(source.call_count(), 2);
        assert_eq!(resolver.cached_count().await, 0);
    }

    #[tokio::test]
    async fn test_undecodable_return_falls_back() {
        let source = Arc::new(MockBlockSource::new().with_call_result(TOKEN, "0x1234".to_string()));
        let resolver = TokenResolver::new(source, "XPL".to_string());

        assert_eq!(resolver.resolve(&addr(TOKEN)).await, "0x333333");
    }
}

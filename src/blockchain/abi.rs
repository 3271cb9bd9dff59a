//! ABI bindings for the ERC-20 pieces the tracker reads: the `symbol()`
//! accessor and the `Transfer` event.

use alloy::primitives::B256;
use alloy::sol;
use alloy::sol_types::SolCall;

use crate::error::ProcessingError;
use crate::models::strip_hex_prefix;

sol! {
    function symbol() external view returns (string);

    event Transfer(address indexed from, address indexed to, uint256 value);
}

/// Calldata for `symbol()`
pub fn encode_symbol_call() -> String {
    format!("0x{}", hex::encode(symbolCall {}.abi_encode()))
}

/// Decode the return data of `symbol()`.
///
/// Standard tokens return an ABI `string`; a few older ones return
/// `bytes32`, which is accepted too.
pub fn decode_symbol(return_data: &str) -> Result<String, ProcessingError> {
    let bytes = hex::decode(strip_hex_prefix(return_data))
        .map_err(|e| ProcessingError::AbiDecoding(format!("invalid hex: {}", e)))?;

    let symbol = match bytes.len() {
        0 => return Err(ProcessingError::AbiDecoding("empty return data".to_string())),
        32 => decode_bytes32(B256::from_slice(&bytes))?,
        _ => symbolCall::abi_decode_returns(&bytes).map_err(|e| ProcessingError::AbiDecoding(e.to_string()))?,
    };

    if symbol.trim().is_empty() {
        return Err(ProcessingError::AbiDecoding("empty symbol".to_string()));
    }
    Ok(symbol)
}

fn decode_bytes32(word: B256) -> Result<String, ProcessingError> {
    let trimmed: Vec<u8> = word.iter().copied().take_while(|b| *b != 0).collect();
    String::from_utf8(trimmed).map_err(|e| ProcessingError::AbiDecoding(format!("symbol is not UTF-8: {}", e)))
}

#[cfg(test)]
pub(crate) fn encode_string_return(symbol: &str) -> String {
    use alloy::sol_types::SolValue;

    format!("0x{}", hex::encode(symbol.to_string().abi_encode()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::sol_types::SolEvent;

    #[test]
    fn test_encode_symbol_call() {
        assert_eq!(encode_symbol_call(), "0x95d89b41");
    }

    #[test]
    fn test_transfer_signature_hash() {
        assert_eq!(
            hex::encode(Transfer::SIGNATURE_HASH),
            "ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn test_decode_string_return() {
        let encoded = encode_string_return("USDT");
        assert_eq!(encoded.len(), 2 + 3 * 64);
        assert_eq!(decode_symbol(&encoded).unwrap(), "USDT");
    }

    #[test]
    fn test_decode_bytes32_return() {
        // "MKR" left-aligned in a 32-byte word
        let encoded = format!("0x{}{}", hex::encode("MKR"), "0".repeat(58));
        assert_eq!(decode_symbol(&encoded).unwrap(), "MKR");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_symbol("0x").is_err());
        assert!(decode_symbol("0xzz").is_err());
        assert!(decode_symbol("0x1234").is_err());
        assert!(decode_symbol(&format!("0x{}", "00".repeat(32))).is_err());

        // Length claims more bytes than present
        let truncated = format!("0x{:064x}{:064x}", 32, 100);
        assert!(decode_symbol(&truncated).is_err());
    }
}

// 🔑 Wallet Address Decoding
//
// Mobile wallets hand back the authorized account as base64 bytes, while
// everything downstream (RPC, explorers, the program) speaks base58.
//
// - "base64 in" → bytes → big-integer base conversion → "base58 out"
// - Leading zero bytes survive as leading '1' characters
// - A valid Solana address decodes to exactly 32 bytes

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bitcoin/Solana base58 alphabet (no 0, O, I, l)
pub const BASE58_ALPHABET: &[u8; 58] =
    b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Length of a decoded public key
pub const PUBKEY_BYTES: usize = 32;

/// Accepted length range of the base58 text form
pub const MIN_ADDRESS_LEN: usize = 32;
pub const MAX_ADDRESS_LEN: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("invalid base64 address: {0}")]
    InvalidBase64(String),
    #[error("Non-base58 character '{character}' in address {address}")]
    InvalidBase58Character { character: char, address: String },
    #[error("account address has invalid length: {0}")]
    InvalidLength(usize),
    #[error("decoded address is {0} bytes, expected 32")]
    InvalidKeyLength(usize),
}

// ============================================================================
// BASE CONVERSION
// ============================================================================

/// Convert a base64 string (padded or not) into base58.
///
/// `=` padding is stripped before decoding. Empty input gives an empty
/// string.
pub fn base64_to_base58(base64_string: &str) -> Result<String, AddressError> {
    let clean: String = base64_string.chars().filter(|c| *c != '=').collect();
    let bytes = STANDARD_NO_PAD
        .decode(clean.as_bytes())
        .map_err(|e| AddressError::InvalidBase64(e.to_string()))?;

    let encoded = base58_encode(&bytes);
    log::debug!(
        "base64 {} -> {} bytes -> base58 {}",
        base64_string,
        bytes.len(),
        encoded
    );
    Ok(encoded)
}

/// Encode bytes as base58.
///
/// Treats `bytes` as a big-endian integer and repeatedly divides it by 58.
/// Digits are kept little-endian in a scratch buffer and reversed at the end.
pub fn base58_encode(bytes: &[u8]) -> String {
    let leading_zeros = bytes.iter().take_while(|b| **b == 0).count();

    // log(256) / log(58) ≈ 1.366
    let mut digits: Vec<u8> = Vec::with_capacity(bytes.len() * 138 / 100 + 1);

    for &byte in &bytes[leading_zeros..] {
        let mut carry = byte as u32;
        for digit in digits.iter_mut() {
            carry += (*digit as u32) << 8;
            *digit = (carry % 58) as u8;
            carry /= 58;
        }
        while carry > 0 {
            digits.push((carry % 58) as u8);
            carry /= 58;
        }
    }

    let mut result = String::with_capacity(leading_zeros + digits.len());
    for _ in 0..leading_zeros {
        result.push('1');
    }
    for digit in digits.iter().rev() {
        result.push(BASE58_ALPHABET[*digit as usize] as char);
    }
    result
}

/// Decode a base58 string back into bytes.
pub fn base58_decode(encoded: &str) -> Result<Vec<u8>, AddressError> {
    let leading_ones = encoded.chars().take_while(|c| *c == '1').count();

    // Little-endian base-256 accumulator
    let mut bytes: Vec<u8> = Vec::with_capacity(encoded.len());

    for character in encoded.chars().skip(leading_ones) {
        let value = base58_index(character).ok_or_else(|| AddressError::InvalidBase58Character {
            character,
            address: encoded.to_string(),
        })?;

        let mut carry = value as u32;
        for byte in bytes.iter_mut() {
            carry += (*byte as u32) * 58;
            *byte = (carry & 0xFF) as u8;
            carry >>= 8;
        }
        while carry > 0 {
            bytes.push((carry & 0xFF) as u8);
            carry >>= 8;
        }
    }

    let mut result = vec![0u8; leading_ones];
    result.extend(bytes.iter().rev());
    Ok(result)
}

fn base58_index(character: char) -> Option<usize> {
    if !character.is_ascii() {
        return None;
    }
    BASE58_ALPHABET
        .iter()
        .position(|&c| c == character as u8)
}

/// Heuristic used on raw wallet output: base64 text contains `=`, `+` or `/`,
/// none of which exist in base58.
pub fn looks_like_base64(address: &str) -> bool {
    address.contains(['=', '+', '/'])
}

// ============================================================================
// WALLET ADDRESS
// ============================================================================

/// A validated base58 wallet address (32-byte public key)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletAddress {
    text: String,
    bytes: [u8; PUBKEY_BYTES],
}

impl WalletAddress {
    /// Parse an address as returned by a wallet (base58, or base64 bytes)
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        let clean = raw.trim();

        let text = if looks_like_base64(clean) {
            log::debug!("Detected base64 address, converting to base58");
            base64_to_base58(clean)?
        } else {
            clean.to_string()
        };

        if let Some(character) = text.chars().find(|c| base58_index(*c).is_none()) {
            return Err(AddressError::InvalidBase58Character {
                character,
                address: text,
            });
        }

        if text.len() < MIN_ADDRESS_LEN || text.len() > MAX_ADDRESS_LEN {
            return Err(AddressError::InvalidLength(text.len()));
        }

        let decoded = base58_decode(&text)?;
        let bytes: [u8; PUBKEY_BYTES] = decoded
            .as_slice()
            .try_into()
            .map_err(|_| AddressError::InvalidKeyLength(decoded.len()))?;

        Ok(WalletAddress { text, bytes })
    }

    /// Build an address from raw key bytes
    pub fn from_bytes(bytes: [u8; PUBKEY_BYTES]) -> Self {
        WalletAddress {
            text: base58_encode(&bytes),
            bytes,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn as_bytes(&self) -> &[u8; PUBKEY_BYTES] {
        &self.bytes
    }

    /// Shortened form for display: "AbCd...WxYz"
    pub fn short(&self) -> String {
        if self.text.len() <= 8 {
            return self.text.clone();
        }
        format!("{}...{}", &self.text[..4], &self.text[self.text.len() - 4..])
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl TryFrom<String> for WalletAddress {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        WalletAddress::parse(&value)
    }
}

impl From<WalletAddress> for String {
    fn from(address: WalletAddress) -> Self {
        address.text
    }
}

impl std::str::FromStr for WalletAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WalletAddress::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // System program id: 32 zero bytes
    const SYSTEM_PROGRAM: &str = "11111111111111111111111111111111";
    // BONK mint
    const BONK_MINT: &str = "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263";

    #[test]
    fn test_base58_known_vectors() {
        assert_eq!(base58_encode(b""), "");
        assert_eq!(base58_encode(&[0]), "1");
        assert_eq!(base58_encode(&[0, 0, 1]), "112");
        assert_eq!(base58_encode(b"hello world"), "StV1DL6CwTryKyV");
        assert_eq!(base58_encode(&[0u8; 32]), SYSTEM_PROGRAM);
    }

    #[test]
    fn test_base58_decode_known_vectors() {
        assert_eq!(base58_decode("StV1DL6CwTryKyV").unwrap(), b"hello world");
        assert_eq!(base58_decode("112").unwrap(), vec![0, 0, 1]);
        assert_eq!(base58_decode(SYSTEM_PROGRAM).unwrap(), vec![0u8; 32]);
    }

    #[test]
    fn test_base58_decode_rejects_ambiguous_characters() {
        for bad in ["0abc", "Oabc", "Iabc", "labc"] {
            assert!(matches!(
                base58_decode(bad),
                Err(AddressError::InvalidBase58Character { .. })
            ));
        }
    }

    #[test]
    fn test_base64_to_base58() {
        // "hello world" in base64, with and without padding
        assert_eq!(base64_to_base58("aGVsbG8gd29ybGQ=").unwrap(), "StV1DL6CwTryKyV");
        assert_eq!(base64_to_base58("aGVsbG8gd29ybGQ").unwrap(), "StV1DL6CwTryKyV");
        assert_eq!(base64_to_base58("").unwrap(), "");
    }

    #[test]
    fn test_base64_to_base58_rejects_garbage() {
        assert!(matches!(
            base64_to_base58("not*base64"),
            Err(AddressError::InvalidBase64(_))
        ));
    }

    #[test]
    fn test_wallet_address_from_base58() {
        let address = WalletAddress::parse(BONK_MINT).unwrap();
        assert_eq!(address.as_str(), BONK_MINT);
        assert_eq!(address.as_bytes().len(), 32);
    }

    #[test]
    fn test_wallet_address_from_base64() {
        let bonk = WalletAddress::parse(BONK_MINT).unwrap();
        let as_base64 = base64::engine::general_purpose::STANDARD.encode(bonk.as_bytes());
        assert!(looks_like_base64(&as_base64));

        let parsed = WalletAddress::parse(&as_base64).unwrap();
        assert_eq!(parsed, bonk);
    }

    #[test]
    fn test_wallet_address_trims_whitespace() {
        let parsed = WalletAddress::parse(&format!("  {}\n", BONK_MINT)).unwrap();
        assert_eq!(parsed.as_str(), BONK_MINT);
    }

    #[test]
    fn test_wallet_address_rejects_short() {
        assert_eq!(
            WalletAddress::parse("abc"),
            Err(AddressError::InvalidLength(3))
        );
    }

    #[test]
    fn test_wallet_address_rejects_wrong_key_length() {
        // 33 bytes of 0xFF encodes to a valid-length base58 string
        let encoded = base58_encode(&[0xFF; 33]);
        assert!(encoded.len() <= MAX_ADDRESS_LEN);
        assert_eq!(
            WalletAddress::parse(&encoded),
            Err(AddressError::InvalidKeyLength(33))
        );
    }

    #[test]
    fn test_wallet_address_rejects_placeholder_ids() {
        // Placeholder program ids contain 'l' and '0', which base58 excludes
        let result = WalletAddress::parse("sleek123456789012345678901234567890123456789");
        assert!(matches!(
            result,
            Err(AddressError::InvalidBase58Character { character: 'l', .. })
        ));
    }

    #[test]
    fn test_short_display() {
        let address = WalletAddress::parse(BONK_MINT).unwrap();
        assert_eq!(address.short(), "DezX...B263");
    }

    #[test]
    fn test_serde_roundtrip_through_string() {
        let address = WalletAddress::from_bytes([7u8; 32]);
        let json = serde_json::to_string(&address).unwrap();
        let back: WalletAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address);
    }
}

//! Wallet address validation and normalization.
//!
//! A deployment talks to exactly one chain family, so the rule is picked
//! once at startup and every route goes through the same strategy:
//!
//! - Stacks: `ST`/`SP` prefix, stored upper-cased.
//! - EVM: `0x` + 40 hex digits, stored in EIP-55 checksum form.

use regex::Regex;
use sha3::{Digest, Keccak256};

use crate::config::ChainKind;
use crate::error::{ServiceError, ServiceResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressFormat {
    Stacks,
    Evm,
}

const STACKS_TOKEN: &str = r"(?i)\b(?:ST|SP)[0-9A-Z]{20,}\b";
const EVM_TOKEN: &str = r"\b0x[0-9a-fA-F]{40}\b";

impl AddressFormat {
    pub fn for_chain(kind: ChainKind) -> Self {
        match kind {
            ChainKind::Stacks => AddressFormat::Stacks,
            ChainKind::Evm => AddressFormat::Evm,
        }
    }

    /// Human-readable rule, used in validation messages.
    pub fn requirement(&self) -> &'static str {
        match self {
            AddressFormat::Stacks => "Debe comenzar con ST o SP",
            AddressFormat::Evm => "Debe ser 0x seguido de 40 caracteres hexadecimales",
        }
    }

    /// Native token symbol of the family.
    pub fn native_symbol(&self) -> &'static str {
        match self {
            AddressFormat::Stacks => "STX",
            AddressFormat::Evm => "ETH",
        }
    }

    /// Validate `raw` and return its canonical stored form.
    pub fn normalize(&self, raw: &str) -> ServiceResult<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ServiceError::validation("Se requiere una dirección"));
        }

        match self {
            AddressFormat::Stacks => {
                let upper = trimmed.to_ascii_uppercase();
                let well_formed = (upper.starts_with("ST") || upper.starts_with("SP"))
                    && upper.len() > 2
                    && upper.chars().all(|c| c.is_ascii_alphanumeric());
                if !well_formed {
                    return Err(self.invalid());
                }
                Ok(upper)
            }
            AddressFormat::Evm => {
                let hex_part = trimmed
                    .strip_prefix("0x")
                    .or_else(|| trimmed.strip_prefix("0X"))
                    .ok_or_else(|| self.invalid())?;
                if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(self.invalid());
                }
                Ok(to_checksum_address(hex_part))
            }
        }
    }

    pub fn is_valid(&self, raw: &str) -> bool {
        self.normalize(raw).is_ok()
    }

    /// First address-shaped token in free text, if any.
    pub fn find_in(&self, text: &str) -> Option<String> {
        let pattern = match self {
            AddressFormat::Stacks => STACKS_TOKEN,
            AddressFormat::Evm => EVM_TOKEN,
        };
        let re = Regex::new(pattern).ok()?;
        re.find(text).map(|m| m.as_str().to_string())
    }

    fn invalid(&self) -> ServiceError {
        ServiceError::validation(format!("Dirección inválida. {}", self.requirement()))
    }
}

/// EIP-55 mixed-case checksum of a 40-digit hex address (no `0x`).
fn to_checksum_address(hex_part: &str) -> String {
    let lower = hex_part.to_ascii_lowercase();
    let hash = Keccak256::digest(lower.as_bytes());

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let byte = hash[i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stacks_prefix_rule() {
        let f = AddressFormat::Stacks;
        assert_eq!(
            f.normalize(" st2pqhq0eyr93ksp0b6an9ahej1k3ebrjp02hpgk6 ").unwrap(),
            "ST2PQHQ0EYR93KSP0B6AN9AHEJ1K3EBRJP02HPGK6"
        );
        assert!(f.is_valid("SP3AQ7KXWA7KGQ67EX2MFYR1E3231B9S4KY6EFB1R"));
        assert!(f.is_valid("ST999WALLET999NO999REGISTRADA"));
        assert!(!f.is_valid("0x8ba1f109551bD432803012645Ac136ddd64DBA72"));
        assert!(!f.is_valid("ST"));
        assert!(!f.is_valid("ST12-34"));
        assert!(matches!(f.normalize(""), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn test_evm_checksum_normalization() {
        let f = AddressFormat::Evm;
        // EIP-55 reference vectors.
        assert_eq!(
            f.normalize("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap(),
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
        );
        assert_eq!(
            f.normalize("0XFB6916095CA1DF60BB79CE92CE3EA74C37C5D359").unwrap(),
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359"
        );
        assert!(!f.is_valid("0x123"));
        assert!(!f.is_valid("ST2PQHQ0EYR93KSP0B6AN9AHEJ1K3EBRJP02HPGK6"));
        assert!(!f.is_valid("0xZZaeb6053f3e94c9b9a09f33669435e7ef1beaed"));
    }

    #[test]
    fn test_find_in_text() {
        assert_eq!(
            AddressFormat::Stacks
                .find_in("Transfiere 50 STX a ST2PQHQ0EYR93KSP0B6AN9AHEJ1K3EBRJP02HPGK6 ya")
                .as_deref(),
            Some("ST2PQHQ0EYR93KSP0B6AN9AHEJ1K3EBRJP02HPGK6")
        );
        assert!(AddressFormat::Stacks.find_in("Envía 10 STX a Andrés").is_none());
        assert!(AddressFormat::Evm
            .find_in("send 1 eth to 0x8ba1f109551bD432803012645Ac136ddd64DBA72")
            .is_some());
        assert!(AddressFormat::Evm.find_in("send 1 eth to maria").is_none());
    }
}

//! Decoding of integer results returned by Stacks read-only calls.
//!
//! `call-read` answers with a hex-serialized Clarity value:
//!
//! | prefix | type                 | payload                        |
//! |--------|----------------------|--------------------------------|
//! | `0x00` | int                  | 16 bytes, two's complement, BE |
//! | `0x01` | uint                 | 16 bytes, BE                   |
//! | `0x07` | response ok          | nested value                   |
//! | `0x08` | response err         | nested value                   |
//!
//! So `(ok u7)` arrives as `0x070100000000000000000000000000000007`.
//! Read as one big integer that is 610126283889242664989830671125160403140615,
//! which is why treating the hex as a number never worked.

use regex::Regex;
use serde_json::Value;

use crate::error::{ServiceError, ServiceResult};

const TYPE_INT: u8 = 0x00;
const TYPE_UINT: u8 = 0x01;
const TYPE_RESPONSE_OK: u8 = 0x07;
const TYPE_RESPONSE_ERR: u8 = 0x08;

const REPR_UINT: &str = r"^\s*(?:\(ok\s+)?u(\d+)\)?\s*$";

/// Decode the `result` field of a call-read response into an integer.
pub fn decode_integer(raw: &Value) -> ServiceResult<i128> {
    match raw {
        Value::String(s) => decode_str(s),
        Value::Number(n) => n
            .as_i64()
            .map(i128::from)
            .ok_or_else(|| ServiceError::Upstream(format!("unsupported numeric result {}", n))),
        other => Err(ServiceError::Upstream(format!(
            "unsupported call-read result {}",
            other
        ))),
    }
}

fn decode_str(s: &str) -> ServiceResult<i128> {
    if let Some(hex_part) = s.trim().strip_prefix("0x") {
        let bytes = hex::decode(hex_part)
            .map_err(|e| ServiceError::Upstream(format!("invalid hex result '{}': {}", s, e)))?;
        let (value, rest) = decode_value(&bytes)?;
        if !rest.is_empty() {
            return Err(ServiceError::Upstream(format!(
                "trailing bytes after clarity value in '{}'",
                s
            )));
        }
        return Ok(value);
    }

    let re = Regex::new(REPR_UINT)
        .map_err(|e| ServiceError::Upstream(format!("clarity pattern: {}", e)))?;
    let caps = re
        .captures(s)
        .ok_or_else(|| ServiceError::Upstream(format!("unrecognized clarity result '{}'", s)))?;
    caps[1]
        .parse::<i128>()
        .map_err(|e| ServiceError::Upstream(format!("integer out of range in '{}': {}", s, e)))
}

fn decode_value(bytes: &[u8]) -> ServiceResult<(i128, &[u8])> {
    let (&tag, rest) = bytes
        .split_first()
        .ok_or_else(|| ServiceError::Upstream("empty clarity value".to_string()))?;

    match tag {
        TYPE_RESPONSE_OK => decode_value(rest),
        TYPE_RESPONSE_ERR => {
            let (code, _) = decode_value(rest)?;
            Err(ServiceError::Upstream(format!("contract returned (err {})", code)))
        }
        TYPE_UINT => {
            let (word, rest) = take_word(rest)?;
            let value = i128::try_from(u128::from_be_bytes(word)).map_err(|_| {
                ServiceError::Upstream("uint result does not fit in i128".to_string())
            })?;
            Ok((value, rest))
        }
        TYPE_INT => {
            let (word, rest) = take_word(rest)?;
            Ok((i128::from_be_bytes(word), rest))
        }
        other => Err(ServiceError::Upstream(format!(
            "unsupported clarity type 0x{:02x}",
            other
        ))),
    }
}

fn take_word(bytes: &[u8]) -> ServiceResult<([u8; 16], &[u8])> {
    if bytes.len() < 16 {
        return Err(ServiceError::Upstream(format!(
            "truncated clarity integer: {} bytes",
            bytes.len()
        )));
    }
    let (head, rest) = bytes.split_at(16);
    let mut word = [0u8; 16];
    word.copy_from_slice(head);
    Ok((word, rest))
}

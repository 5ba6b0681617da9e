//! Canonical byte form of assets.
//!
//! An asset encodes to a compact JSON object whose keys appear in the fixed
//! order `id, proposalTimeStamp, deliveryTimeStamp, amount, buyer, merchant,
//! buyerSig, merchantSig, platformSig, partySig, paymentSuccess,
//! deliverSuccess, buyerConfirmDeliverSig, tradeSuccess`. Zero values are always
//! written. Strings use HTML-safe escaping: besides the usual JSON escapes,
//! `<`, `>`, `&`, U+2028 and U+2029 are written as `\uXXXX`, which keeps the
//! bytes identical to records already on the ledger.

use crate::asset::Asset;
use crate::error::CodecError;
use serde::Serialize;
use serde_json::ser::Formatter;
use std::io;

/// Compact JSON formatter with HTML-safe string escaping
#[derive(Debug, Default, Clone, Copy)]
pub struct CanonicalFormatter;

impl Formatter for CanonicalFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (i, ch) in fragment.char_indices() {
            let escaped = match ch {
                '<' => "\\u003c",
                '>' => "\\u003e",
                '&' => "\\u0026",
                '\u{2028}' => "\\u2028",
                '\u{2029}' => "\\u2029",
                _ => continue,
            };
            writer.write_all(fragment[start..i].as_bytes())?;
            writer.write_all(escaped.as_bytes())?;
            start = i + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

fn to_canonical_vec<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::with_capacity(256);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, CanonicalFormatter);
    value.serialize(&mut ser).map_err(CodecError::Encode)?;
    Ok(buf)
}

/// Encode an asset to its canonical persisted form
pub fn encode(asset: &Asset) -> Result<Vec<u8>, CodecError> {
    to_canonical_vec(asset)
}

/// Decode a persisted asset.
///
/// Every field must be present with the right type. Unknown keys are ignored,
/// which lets records carrying the legacy `appraisedValue` key load.
pub fn decode(bytes: &[u8]) -> Result<Asset, CodecError> {
    serde_json::from_slice(bytes).map_err(CodecError::Decode)
}

/// Encode a list of assets as a canonical JSON array (`[]` when empty)
pub fn encode_list(assets: &[Asset]) -> Result<Vec<u8>, CodecError> {
    to_canonical_vec(assets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Asset {
        Asset::new("asset1", 1622548800, 1000, "BuyerA", "BuyerASignature", "MerchantA")
    }

    #[test]
    fn test_canonical_field_order() {
        let bytes = encode(&sample()).unwrap();
        let expected = concat!(
            r#"{"id":"asset1","proposalTimeStamp":1622548800,"deliveryTimeStamp":0,"#,
            r#""amount":1000,"buyer":"BuyerA","merchant":"MerchantA","#,
            r#""buyerSig":"BuyerASignature","merchantSig":"","platformSig":"","#,
            r#""partySig":"","paymentSuccess":false,"deliverSuccess":false,"#,
            r#""buyerConfirmDeliverSig":"","tradeSuccess":false}"#,
        );
        assert_eq!(String::from_utf8(bytes).unwrap(), expected);
    }

    #[test]
    fn test_round_trip() {
        let mut asset = sample();
        asset.delivery_time_stamp = -5;
        asset.merchant_sig = "sig with \"quotes\" and \\ and \n".to_string();
        asset.platform_sig = "ünïcödé ✓".to_string();
        asset.trade_success = true;

        let decoded = decode(&encode(&asset).unwrap()).unwrap();
        assert_eq!(decoded, asset);
    }

    #[test]
    fn test_html_characters_escaped() {
        let mut asset = sample();
        asset.buyer = "<A&B>\u{2028}\u{2029}".to_string();

        let text = String::from_utf8(encode(&asset).unwrap()).unwrap();
        assert!(text.contains(r#""buyer":"\u003cA\u0026B\u003e\u2028\u2029""#));
        assert_eq!(decode(text.as_bytes()).unwrap(), asset);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let a = encode(&sample()).unwrap();
        let b = encode(&sample().clone()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_decode_rejects_missing_field() {
        let truncated = br#"{"id":"asset1","proposalTimeStamp":1622548800}"#;
        assert!(matches!(decode(truncated), Err(CodecError::Decode(_))));
    }

    #[test]
    fn test_decode_rejects_malformed_input() {
        assert!(decode(b"not json").is_err());
        assert!(decode(b"").is_err());

        let wrong_type = String::from_utf8(encode(&sample()).unwrap())
            .unwrap()
            .replace("\"amount\":1000", "\"amount\":\"1000\"");
        assert!(decode(wrong_type.as_bytes()).is_err());
    }

    #[test]
    fn test_decode_ignores_legacy_appraised_value() {
        let legacy = String::from_utf8(encode(&sample()).unwrap())
            .unwrap()
            .replacen('{', r#"{"appraisedValue":0,"#, 1);
        let decoded = decode(legacy.as_bytes()).unwrap();
        assert_eq!(decoded, sample());
        assert_eq!(encode(&decoded).unwrap(), encode(&sample()).unwrap());
    }

    #[test]
    fn test_encode_list() {
        assert_eq!(encode_list(&[]).unwrap(), b"[]");

        let list = encode_list(&[sample()]).unwrap();
        let single = encode(&sample()).unwrap();
        let mut expected = b"[".to_vec();
        expected.extend_from_slice(&single);
        expected.push(b']');
        assert_eq!(list, expected);
    }
}

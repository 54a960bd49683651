//! Payment gateway notifications
//!
//! The payment provider calls back with its parameters in the query string,
//! signed with a shared key. The signature is a hex HMAC-SHA256 over the
//! non-empty parameters (except `sign` and `sign_type`), sorted by key and
//! joined as `k=v&k=v`.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{BillingError, BillingResult};

/// Trade status that settles an order
pub const TRADE_SUCCESS: &str = "TRADE_SUCCESS";

const SIGNATURE_FIELDS: [&str; 2] = ["sign", "sign_type"];

/// Parameters of one payment callback
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentNotification {
    params: BTreeMap<String, String>,
}

impl PaymentNotification {
    pub fn new(params: BTreeMap<String, String>) -> Self {
        Self { params }
    }

    /// Raw parameter value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Our order number
    pub fn out_trade_no(&self) -> Option<&str> {
        self.get("out_trade_no").filter(|v| !v.is_empty())
    }

    /// The provider's trade reference
    pub fn trade_no(&self) -> Option<&str> {
        self.get("trade_no").filter(|v| !v.is_empty())
    }

    pub fn trade_status(&self) -> Option<&str> {
        self.get("trade_status")
    }

    pub fn is_trade_success(&self) -> bool {
        self.trade_status() == Some(TRADE_SUCCESS)
    }

    /// Check the `sign` parameter against `key`
    pub fn verify(&self, key: &str) -> BillingResult<()> {
        let provided = self
            .get("sign")
            .and_then(|sign| hex::decode(sign.trim().to_ascii_lowercase()).ok())
            .ok_or(BillingError::InvalidSignature)?;

        let expected = self.mac(key)?;
        if bool::from(expected.as_slice().ct_eq(provided.as_slice())) {
            Ok(())
        } else {
            Err(BillingError::InvalidSignature)
        }
    }

    /// Hex signature of the current parameters
    pub fn sign(&self, key: &str) -> BillingResult<String> {
        self.mac(key).map(hex::encode)
    }

    fn canonical(&self) -> String {
        self.params
            .iter()
            .filter(|(k, v)| !v.is_empty() && !SIGNATURE_FIELDS.contains(&k.as_str()))
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }

    fn mac(&self, key: &str) -> BillingResult<Vec<u8>> {
        let mut mac = Hmac::<Sha256>::new_from_slice(key.as_bytes())
            .map_err(|_| BillingError::InvalidSignature)?;
        mac.update(self.canonical().as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

impl FromIterator<(String, String)> for PaymentNotification {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "notify-key";

    fn notification(pairs: &[(&str, &str)]) -> PaymentNotification {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn signed(pairs: &[(&str, &str)]) -> PaymentNotification {
        let mut n = notification(pairs);
        let sign = n.sign(KEY).unwrap();
        n.params.insert("sign".to_string(), sign);
        n.params.insert("sign_type".to_string(), "HMAC-SHA256".to_string());
        n
    }

    #[test]
    fn test_canonical_form() {
        let n = notification(&[
            ("trade_status", "TRADE_SUCCESS"),
            ("out_trade_no", "SUB1"),
            ("money", ""),
            ("sign", "abc"),
        ]);
        assert_eq!(n.canonical(), "out_trade_no=SUB1&trade_status=TRADE_SUCCESS");
    }

    #[test]
    fn test_verify_accepts_valid_signature() {
        let n = signed(&[
            ("out_trade_no", "SUB1"),
            ("trade_no", "T1"),
            ("trade_status", "TRADE_SUCCESS"),
        ]);
        assert!(n.verify(KEY).is_ok());
        assert!(n.is_trade_success());
        assert_eq!(n.out_trade_no(), Some("SUB1"));
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let mut n = signed(&[("out_trade_no", "SUB1"), ("trade_status", "TRADE_SUCCESS")]);
        n.params.insert("out_trade_no".to_string(), "SUB2".to_string());
        assert!(matches!(n.verify(KEY), Err(BillingError::InvalidSignature)));
    }

    #[test]
    fn test_verify_rejects_wrong_key_and_missing_sign() {
        let n = signed(&[("out_trade_no", "SUB1")]);
        assert!(n.verify("other-key").is_err());

        let unsigned = notification(&[("out_trade_no", "SUB1")]);
        assert!(matches!(unsigned.verify(KEY), Err(BillingError::InvalidSignature)));
    }

    #[test]
    fn test_non_success_status() {
        let n = notification(&[("trade_status", "WAIT_BUYER_PAY")]);
        assert!(!n.is_trade_success());
        assert_eq!(n.trade_no(), None);
    }
}

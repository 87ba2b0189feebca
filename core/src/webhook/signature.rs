// core/src/webhook/signature.rs

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Hex HMAC-SHA256 of `body` under `secret`, as the provider computes it.
pub fn sign_payload(secret: &[u8], body: &[u8]) -> String {
  match HmacSha256::new_from_slice(secret) {
    Ok(mut mac) => {
      mac.update(body);
      hex::encode(mac.finalize().into_bytes())
    }
    Err(_) => String::new(),
  }
}

/// Constant-time check of a hex signature over the exact raw body.
///
/// A signature that is not valid hex is compared as zeros so the rejection
/// path takes the same time.
pub fn verify_signature(secret: &[u8], body: &[u8], signature: &str) -> bool {
  let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
    return false;
  };
  mac.update(body);
  let presented = hex::decode(signature.trim()).unwrap_or_else(|_| vec![0u8; 32]);
  mac.verify_slice(&presented).is_ok()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accepts_own_signature() {
    let sig = sign_payload(b"whsec", b"{\"event\":\"x\"}");
    assert_eq!(sig.len(), 64);
    assert!(verify_signature(b"whsec", b"{\"event\":\"x\"}", &sig));
    assert!(verify_signature(b"whsec", b"{\"event\":\"x\"}", &sig.to_uppercase()));
  }

  #[test]
  fn rejects_tampering() {
    let sig = sign_payload(b"whsec", b"original");
    assert!(!verify_signature(b"whsec", b"original ", &sig));
    assert!(!verify_signature(b"other", b"original", &sig));
    assert!(!verify_signature(b"whsec", b"original", "zz-not-hex"));
    assert!(!verify_signature(b"whsec", b"original", ""));
  }
}

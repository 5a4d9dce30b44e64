use aes_gcm::{
   aead::{Aead, KeyInit},
   Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;

use crate::backend::TextCipher;
use crate::error::{ChatError, ChatResult};

const NONCE_LEN: usize = 12;
const KEY_INFO: &[u8] = b"messenger-text-body";
const KEY_SALT: &[u8] = b"messenger-conversation-core";

/// AES-256-GCM text cipher keyed by a shared secret string.
///
/// Output is `base64(nonce || ciphertext)`, so it can be stored wherever
/// a text body is stored.
#[derive(Debug, Default, Clone, Copy)]
pub struct AesGcmCipher;

impl AesGcmCipher {
   pub fn new() -> Self {
      Self
   }

   /// Derive a 256-bit key from the secret using HKDF
   fn derive_key(&self, key: &str) -> ChatResult<[u8; 32]> {
      if key.is_empty() {
         return Err(ChatError::crypto("Encryption key is empty"));
      }

      let hk = Hkdf::<Sha256>::new(Some(KEY_SALT), key.as_bytes());
      let mut derived = [0u8; 32];
      hk.expand(KEY_INFO, &mut derived)
         .map_err(|_| ChatError::crypto("HKDF expansion failed"))?;

      Ok(derived)
   }
}

impl TextCipher for AesGcmCipher {
   fn encrypt_text(&self, plain_text: &str, key: &str) -> ChatResult<String> {
      let derived = self.derive_key(key)?;

      // Generate random nonce
      let mut nonce_bytes = [0u8; NONCE_LEN];
      rand::thread_rng().fill_bytes(&mut nonce_bytes);
      let nonce = Nonce::from_slice(&nonce_bytes);

      let cipher = Aes256Gcm::new_from_slice(&derived)
         .map_err(|_| ChatError::crypto("Failed to create cipher"))?;

      let ciphertext = cipher
         .encrypt(nonce, plain_text.as_bytes())
         .map_err(|_| ChatError::crypto("Encryption failed"))?;

      let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
      sealed.extend_from_slice(&nonce_bytes);
      sealed.extend_from_slice(&ciphertext);

      Ok(STANDARD.encode(sealed))
   }

   fn decrypt_text(&self, cipher_text: &str, key: &str) -> ChatResult<String> {
      let derived = self.derive_key(key)?;

      let sealed = STANDARD
         .decode(cipher_text)
         .map_err(|e| ChatError::crypto(format!("Invalid ciphertext encoding: {}", e)))?;
      if sealed.len() <= NONCE_LEN {
         return Err(ChatError::crypto("Ciphertext too short"));
      }

      let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
      let nonce = Nonce::from_slice(nonce_bytes);

      let cipher = Aes256Gcm::new_from_slice(&derived)
         .map_err(|_| ChatError::crypto("Failed to create cipher"))?;

      let plaintext = cipher
         .decrypt(nonce, ciphertext)
         .map_err(|_| ChatError::crypto("Decryption failed - message may be tampered"))?;

      String::from_utf8(plaintext)
         .map_err(|_| ChatError::crypto("Invalid UTF-8 in decrypted message"))
   }
}

use md5::{Digest, Md5};

use crate::protocol::AuthResponse;

/// Calculate the hex-encoded MD5 of data
pub fn md5_hex(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Inputs that tie an authentication proof to one upload
#[derive(Debug, Clone, Copy)]
pub struct AuthContext<'a> {
    pub image_path: &'a str,
    pub size: u64,
    pub digest: &'a str,
    pub target_host: &'a str,
}

impl AuthContext<'_> {
    /// Client nonce derived from the request.
    ///
    /// Same request, same nonce. Devices in the field expect exactly this value.
    pub fn client_nonce(&self) -> String {
        let text = format!(
            "{}{}{}{}",
            self.image_path, self.size, self.digest, self.target_host
        );
        md5_hex(text.as_bytes())
    }

    /// Answer a device challenge with `md5(md5(password):nonce:cnonce)`
    pub fn respond(&self, password: &str, server_nonce: &str) -> AuthResponse {
        let client_nonce = self.client_nonce();
        let password_hash = md5_hex(password.as_bytes());
        let proof = format!("{}:{}:{}", password_hash, server_nonce, client_nonce);

        AuthResponse {
            digest: md5_hex(proof.as_bytes()),
            client_nonce,
        }
    }
}

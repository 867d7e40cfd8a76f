//! Builder patterns for test token construction
//!
//! Provides a fluent API for minting signed (and deliberately mis-signed)
//! authentication tokens.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};

/// Builder for creating test authentication tokens
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_subject("t2_alice")
///     .with_role("admin")
///     .with_kid(KEY_2.fingerprint)
///     .sign_rs256(KEY_2.private_pem);
/// ```
#[derive(Debug, Clone)]
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
    kid: Option<String>,
}

impl TestTokenBuilder {
    /// Create a new token builder for `t2_test_user`, valid for one hour
    pub fn new() -> Self {
        let now = Utc::now();
        let mut claims = Map::new();
        claims.insert("sub".to_string(), json!("t2_test_user"));
        claims.insert(
            "exp".to_string(),
            json!((now + Duration::seconds(3600)).timestamp()),
        );
        claims.insert("iat".to_string(), json!(now.timestamp()));
        Self { claims, kid: None }
    }

    /// Set the subject (`t2_...` user or `service/...`)
    pub fn for_subject(mut self, subject: &str) -> Self {
        self.claims.insert("sub".to_string(), json!(subject));
        self
    }

    /// Anonymous token: `sub` is null and the only role is `anonymous`
    pub fn anonymous(mut self) -> Self {
        self.claims.insert("sub".to_string(), Value::Null);
        self.claims.insert("roles".to_string(), json!(["anonymous"]));
        self
    }

    /// Append a role
    pub fn with_role(mut self, role: &str) -> Self {
        self.push("roles", role);
        self
    }

    /// Append a scope
    pub fn with_scope(mut self, scope: &str) -> Self {
        self.push("scopes", scope);
        self
    }

    /// Set the OAuth client id and type
    pub fn with_oauth_client(mut self, client_id: &str, client_type: &str) -> Self {
        self.claims.insert("client_id".to_string(), json!(client_id));
        self.claims.insert("client_type".to_string(), json!(client_type));
        self
    }

    /// Embed a LoID
    pub fn with_loid(mut self, id: &str, created_ms: i64) -> Self {
        self.claims.insert(
            "loid".to_string(),
            json!({"id": id, "created_ms": created_ms}),
        );
        self
    }

    /// Set expiration in seconds from now (negative for an expired token)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.claims.insert(
            "exp".to_string(),
            json!((Utc::now() + Duration::seconds(seconds)).timestamp()),
        );
        self
    }

    /// Drop the `exp` claim
    pub fn without_expiry(mut self) -> Self {
        self.claims.remove("exp");
        self
    }

    /// Set not-before in seconds from now
    pub fn not_before_in(mut self, seconds: i64) -> Self {
        self.claims.insert(
            "nbf".to_string(),
            json!((Utc::now() + Duration::seconds(seconds)).timestamp()),
        );
        self
    }

    /// Set an arbitrary claim
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Set the `kid` header
    pub fn with_kid(mut self, kid: &str) -> Self {
        self.kid = Some(kid.to_string());
        self
    }

    /// The claims as a JSON value
    pub fn claims(&self) -> Value {
        Value::Object(self.claims.clone())
    }

    /// Sign with RS256 using a PEM private key
    pub fn sign_rs256(self, private_pem: &str) -> String {
        self.sign_rsa(Algorithm::RS256, private_pem)
    }

    /// Sign with any RSA algorithm (RS256/384/512, PS256/384/512)
    pub fn sign_rsa(self, algorithm: Algorithm, private_pem: &str) -> String {
        let key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .expect("test private key should parse");
        self.sign(algorithm, &key)
    }

    /// Sign with HS256 using a shared secret
    pub fn sign_hs256(self, secret: &[u8]) -> String {
        self.sign(Algorithm::HS256, &EncodingKey::from_secret(secret))
    }

    /// Build an unsecured token (`alg: none`, empty signature segment)
    pub fn unsigned(self) -> String {
        let mut header = json!({"alg": "none", "typ": "JWT"});
        if let Some(kid) = &self.kid {
            header["kid"] = json!(kid);
        }
        format!(
            "{}.{}.",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(self.claims().to_string()),
        )
    }

    fn sign(self, algorithm: Algorithm, key: &EncodingKey) -> String {
        let mut header = Header::new(algorithm);
        header.kid = self.kid.clone();
        encode(&header, &self.claims(), key).expect("test token should encode")
    }

    fn push(&mut self, list: &str, value: &str) {
        let entry = self
            .claims
            .entry(list.to_string())
            .or_insert_with(|| json!([]));
        if let Value::Array(values) = entry {
            values.push(json!(value));
        }
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace the signature segment of `token` with a well-formed but wrong one
pub fn tamper_signature(token: &str) -> String {
    let (signed_part, _) = token
        .rsplit_once('.')
        .expect("token should have a signature segment");
    format!("{signed_part}.{}", URL_SAFE_NO_PAD.encode([0u8; 256]))
}

/// Replace the header segment of `token` with `header`, keeping the rest
pub fn with_header(token: &str, header: &Value) -> String {
    let (_, rest) = token
        .split_once('.')
        .expect("token should have a header segment");
    format!("{}.{rest}", URL_SAFE_NO_PAD.encode(header.to_string()))
}

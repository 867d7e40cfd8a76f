//! Per-request edge context.
//!
//! An [`EdgeRequestContext`] carries the client identity facts an edge
//! service collected (LoID, session, device, origin, geolocation, request
//! id, locale) plus the raw authentication token. The token is validated
//! lazily on first use and the outcome is cached for the life of the
//! context.
//!
//! Identity accessors ([`User`], [`OAuthClient`], [`Service`]) return
//! [`NoAuthentication`] when the token is missing, invalid, or does not
//! describe the requested kind of principal.

use crate::claims::{AuthenticationTokenClaims, SERVICE_PREFIX, USER_PREFIX};
use crate::error::{ContextError, NoAuthentication, ValidationError};
use crate::secret::{ExposeSecret, SecretString};
use crate::validator::TokenValidator;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::sync::OnceLock;
use tracing::debug;

/// Inputs for [`EdgeRequestContext::new`]. Every field is optional; an
/// empty string is treated the same as `None`.
#[derive(Debug, Clone, Default)]
pub struct NewArgs {
    /// LoID in fullname format (`t2_...`).
    pub loid: Option<String>,
    /// When the LoID cookie was created (Unix epoch milliseconds).
    pub loid_created_ms: Option<i64>,
    pub session_id: Option<String>,
    pub device_id: Option<String>,
    /// Raw token as issued by the authentication service.
    pub auth_token: Option<SecretString>,
    /// Name of the edge service that built the context.
    pub origin_service_name: Option<String>,
    /// ISO 3166-1 alpha-2 country code, e.g. `US`.
    pub country_code: Option<String>,
    /// Human-readable id of the underlying request.
    pub request_id: Option<String>,
    /// Locale such as `en` or `en_US`.
    pub locale_code: Option<String>,
}

/// Identity and client facts for one inbound request.
#[derive(Debug)]
pub struct EdgeRequestContext {
    validator: TokenValidator,
    args: NewArgs,
    authentication: OnceLock<Result<AuthenticationTokenClaims, ValidationError>>,
}

impl EdgeRequestContext {
    /// Build a context from facts collected at the edge.
    ///
    /// The token is not validated here; see
    /// [`authentication_token`](Self::authentication_token).
    ///
    /// # Errors
    ///
    /// - [`ContextError::LoIdWrongPrefix`] if the LoID lacks the `t2_` prefix
    /// - [`ContextError::InvalidCountryCode`] if the country code is not two
    ///   uppercase letters
    /// - [`ContextError::InvalidLocaleCode`] if the locale is not like `en`
    ///   or `en_US`
    pub fn new(validator: TokenValidator, args: NewArgs) -> Result<Self, ContextError> {
        let args = NewArgs {
            loid: non_empty(args.loid),
            session_id: non_empty(args.session_id),
            device_id: non_empty(args.device_id),
            origin_service_name: non_empty(args.origin_service_name),
            country_code: non_empty(args.country_code),
            request_id: non_empty(args.request_id),
            locale_code: non_empty(args.locale_code),
            auth_token: args
                .auth_token
                .filter(|token| !token.expose_secret().is_empty()),
            ..args
        };

        if let Err(e) = check_args(&args) {
            debug!(target: "edgecontext.context", error = %e, "Rejected edge context arguments");
            return Err(e);
        }

        Ok(Self {
            validator,
            args,
            authentication: OnceLock::new(),
        })
    }

    /// Validated claims of the request's token.
    ///
    /// Validation runs at most once per context. A context without a token
    /// reports [`ValidationError::EmptyToken`].
    ///
    /// # Errors
    ///
    /// Returns the cached [`ValidationError`] if the token did not validate.
    pub fn authentication_token(&self) -> Result<&AuthenticationTokenClaims, &ValidationError> {
        self.authentication
            .get_or_init(|| match &self.args.auth_token {
                Some(token) => self.validator.validate(token.expose_secret()),
                None => Err(ValidationError::EmptyToken),
            })
            .as_ref()
    }

    /// The end user behind the request.
    #[must_use]
    pub fn user(&self) -> User<'_> {
        User {
            claims: self.authentication_token().ok(),
            loid: self.args.loid.as_deref(),
            cookie_created_ms: self.args.loid_created_ms,
        }
    }

    /// The OAuth client that obtained the token.
    #[must_use]
    pub fn oauth_client(&self) -> OAuthClient<'_> {
        OAuthClient {
            claims: self.authentication_token().ok(),
        }
    }

    /// The service principal, for service-to-service tokens.
    #[must_use]
    pub fn service(&self) -> Service<'_> {
        Service {
            claims: self.authentication_token().ok(),
        }
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.args.session_id.as_deref()
    }

    #[must_use]
    pub fn device_id(&self) -> Option<&str> {
        self.args.device_id.as_deref()
    }

    #[must_use]
    pub fn origin_service_name(&self) -> Option<&str> {
        self.args.origin_service_name.as_deref()
    }

    #[must_use]
    pub fn country_code(&self) -> Option<&str> {
        self.args.country_code.as_deref()
    }

    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.args.request_id.as_deref()
    }

    #[must_use]
    pub fn locale_code(&self) -> Option<&str> {
        self.args.locale_code.as_deref()
    }

    /// Fields to attach to analytics events.
    ///
    /// Always has `session_id`, `user_id`, `logged_in`,
    /// `cookie_created_timestamp` and `oauth_client_id` (JSON `null` when
    /// unknown). `device_id` and `edge_request_id` appear only when set.
    #[must_use]
    pub fn event_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("session_id".to_string(), json!(self.session_id()));
        if let Some(device_id) = self.device_id() {
            fields.insert("device_id".to_string(), json!(device_id));
        }
        if let Some(request_id) = self.request_id() {
            fields.insert("edge_request_id".to_string(), json!(request_id));
        }
        fields.extend(self.user().event_fields());
        fields.extend(self.oauth_client().event_fields());
        fields
    }
}

/// End-user view of a request's identity.
#[derive(Debug, Clone, Copy)]
pub struct User<'a> {
    claims: Option<&'a AuthenticationTokenClaims>,
    loid: Option<&'a str>,
    cookie_created_ms: Option<i64>,
}

impl<'a> User<'a> {
    /// Account id of the logged-in user.
    ///
    /// # Errors
    ///
    /// [`NoAuthentication`] if there is no valid token or its subject is
    /// not a user account.
    pub fn id(&self) -> Result<&'a str, NoAuthentication> {
        self.claims
            .and_then(AuthenticationTokenClaims::subject)
            .filter(|sub| sub.starts_with(USER_PREFIX))
            .ok_or(NoAuthentication)
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.id().is_ok()
    }

    /// Roles granted by the token.
    ///
    /// # Errors
    ///
    /// [`NoAuthentication`] if there is no valid token.
    pub fn roles(&self) -> Result<&'a [String], NoAuthentication> {
        self.claims
            .map(|claims| claims.roles.as_slice())
            .ok_or(NoAuthentication)
    }

    /// Whether the token grants `role` (case-insensitive query).
    ///
    /// # Errors
    ///
    /// [`NoAuthentication`] if there is no valid token.
    pub fn has_role(&self, role: &str) -> Result<bool, NoAuthentication> {
        self.claims
            .map(|claims| claims.has_role(role))
            .ok_or(NoAuthentication)
    }

    /// Best-known LoID: the logged-in account id, else the LoID the edge
    /// supplied, else the LoID embedded in the token, else `""`.
    #[must_use]
    pub fn loid(&self) -> &'a str {
        if let Ok(id) = self.id() {
            return id;
        }
        if let Some(loid) = self.loid {
            return loid;
        }
        self.claims
            .and_then(AuthenticationTokenClaims::loid_id)
            .filter(|loid| !loid.is_empty())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn cookie_created_ms(&self) -> Option<i64> {
        self.cookie_created_ms
    }

    fn event_fields(&self) -> Map<String, Value> {
        let loid = Some(self.loid()).filter(|loid| !loid.is_empty());
        let mut fields = Map::new();
        fields.insert("user_id".to_string(), json!(loid));
        fields.insert("logged_in".to_string(), json!(self.is_logged_in()));
        fields.insert(
            "cookie_created_timestamp".to_string(),
            json!(self.cookie_created_ms),
        );
        fields
    }
}

/// OAuth client view of a request's identity.
#[derive(Debug, Clone, Copy)]
pub struct OAuthClient<'a> {
    claims: Option<&'a AuthenticationTokenClaims>,
}

impl<'a> OAuthClient<'a> {
    /// Client id carried by the token, if any.
    ///
    /// # Errors
    ///
    /// [`NoAuthentication`] if there is no valid token.
    pub fn id(&self) -> Result<Option<&'a str>, NoAuthentication> {
        self.claims
            .map(|claims| claims.client_id.as_deref())
            .ok_or(NoAuthentication)
    }

    /// Whether the client type is one of `client_types`.
    ///
    /// The candidates are lowercased before comparison. Check that a client
    /// "is" an allowed type rather than that it "is not" a disallowed one.
    ///
    /// # Errors
    ///
    /// [`NoAuthentication`] if there is no valid token.
    pub fn is_type(&self, client_types: &[&str]) -> Result<bool, NoAuthentication> {
        let claims = self.claims.ok_or(NoAuthentication)?;
        let Some(client_type) = claims.client_type.as_deref().filter(|t| !t.is_empty()) else {
            return Ok(false);
        };
        Ok(client_types
            .iter()
            .any(|candidate| candidate.to_lowercase() == client_type))
    }

    fn event_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(
            "oauth_client_id".to_string(),
            json!(self.id().ok().flatten()),
        );
        fields
    }
}

/// Service principal view of a request's identity.
#[derive(Debug, Clone, Copy)]
pub struct Service<'a> {
    claims: Option<&'a AuthenticationTokenClaims>,
}

impl<'a> Service<'a> {
    /// Service name, taken from a `service/<name>` subject.
    ///
    /// # Errors
    ///
    /// [`NoAuthentication`] if there is no valid token or its subject is
    /// not a service.
    pub fn name(&self) -> Result<&'a str, NoAuthentication> {
        self.claims
            .and_then(AuthenticationTokenClaims::subject)
            .and_then(|sub| sub.strip_prefix(SERVICE_PREFIX))
            .ok_or(NoAuthentication)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn check_args(args: &NewArgs) -> Result<(), ContextError> {
    if let Some(loid) = &args.loid {
        if !loid.starts_with(USER_PREFIX) {
            return Err(ContextError::LoIdWrongPrefix);
        }
    }
    if let Some(country_code) = &args.country_code {
        if !country_code_regex().is_match(country_code) {
            return Err(ContextError::InvalidCountryCode);
        }
    }
    if let Some(locale_code) = &args.locale_code {
        if !locale_code_regex().is_match(locale_code) {
            return Err(ContextError::InvalidLocaleCode);
        }
    }
    Ok(())
}

fn country_code_regex() -> &'static Regex {
    static COUNTRY_CODE_RE: OnceLock<Regex> = OnceLock::new();
    // Constant pattern; compiling it cannot fail.
    #[allow(clippy::expect_used)]
    COUNTRY_CODE_RE.get_or_init(|| Regex::new(r"^[A-Z]{2}$").expect("valid country code regex"))
}

fn locale_code_regex() -> &'static Regex {
    static LOCALE_CODE_RE: OnceLock<Regex> = OnceLock::new();
    // Constant pattern; compiling it cannot fail.
    #[allow(clippy::expect_used)]
    LOCALE_CODE_RE.get_or_init(|| {
        Regex::new(r"^[a-z]{2,}([_|\-][\da-zA-Z]{2,})*$").expect("valid locale code regex")
    })
}

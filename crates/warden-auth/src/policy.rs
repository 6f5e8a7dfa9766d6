//! Declarative protection policies
//!
//! A policy is built once per protected route while the application is set up
//! and is immutable afterwards. Invalid policies are rejected by
//! [`ProtectionPolicyBuilder::build`] so misconfiguration stops startup instead
//! of surfacing on a request.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::is_valid_sign_in_url;
use crate::context::RequestContext;
use crate::{AuthError, AuthResult};

/// When a protected route demands a CSRF token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CsrfMode {
    /// Required for state-changing methods only
    #[default]
    Auto,
    /// Required for every method
    Force,
    /// Never required
    Disabled,
}

impl CsrfMode {
    /// Whether a request with this method must carry a valid token
    pub fn requires_token(&self, method: &http::Method) -> bool {
        match self {
            CsrfMode::Force => true,
            CsrfMode::Disabled => false,
            CsrfMode::Auto => crate::context::is_state_changing(method),
        }
    }
}

/// Computes a sign-in URL from the request
pub type SignInResolver = Arc<dyn Fn(&RequestContext) -> String + Send + Sync>;

/// Where unauthenticated or unauthorized requests are sent
#[derive(Clone)]
pub enum SignInUrl {
    /// Fixed URL
    Static(String),
    /// URL computed per request
    Dynamic(SignInResolver),
}

impl SignInUrl {
    /// Build a dynamic sign-in URL from a closure
    pub fn dynamic<F>(resolver: F) -> Self
    where
        F: Fn(&RequestContext) -> String + Send + Sync + 'static,
    {
        SignInUrl::Dynamic(Arc::new(resolver))
    }

    /// Reject static URLs that cannot be sent as a `Location` header.
    /// Dynamic URLs are checked by the adapter when they are produced.
    pub fn validate(&self) -> AuthResult<()> {
        match self {
            SignInUrl::Static(url) if url.trim().is_empty() => {
                Err(AuthError::config_error("sign_in_url cannot be empty"))
            }
            SignInUrl::Static(url) if !is_valid_sign_in_url(url) => Err(AuthError::config_error(
                format!("sign_in_url is not a valid Location value: {:?}", url),
            )),
            _ => Ok(()),
        }
    }

    /// Resolve the URL for a request
    pub fn resolve(&self, ctx: &RequestContext) -> String {
        match self {
            SignInUrl::Static(url) => url.clone(),
            SignInUrl::Dynamic(resolver) => resolver(ctx),
        }
    }
}

impl fmt::Debug for SignInUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignInUrl::Static(url) => f.debug_tuple("Static").field(url).finish(),
            SignInUrl::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl From<&str> for SignInUrl {
    fn from(url: &str) -> Self {
        SignInUrl::Static(url.to_string())
    }
}

impl From<String> for SignInUrl {
    fn from(url: String) -> Self {
        SignInUrl::Static(url)
    }
}

/// Custom authorization check run after the role check
pub struct Predicate<U> {
    name: String,
    check: Arc<dyn Fn(&U, &RequestContext) -> bool + Send + Sync>,
}

impl<U> Predicate<U> {
    /// Create a named predicate
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&U, &RequestContext) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    /// Name used in logs and denial messages
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the check
    pub fn check(&self, user: &U, ctx: &RequestContext) -> bool {
        (self.check)(user, ctx)
    }
}

impl<U> Clone for Predicate<U> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            check: Arc::clone(&self.check),
        }
    }
}

impl<U> fmt::Debug for Predicate<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate").field("name", &self.name).finish()
    }
}

/// Protection rules attached to one route
pub struct ProtectionPolicy<U> {
    required_role: Option<String>,
    required_roles: Option<BTreeSet<String>>,
    predicates: Vec<Predicate<U>>,
    csrf_mode: CsrfMode,
    sign_in_url: Option<SignInUrl>,
}

impl<U> ProtectionPolicy<U> {
    /// Start building a policy
    pub fn builder() -> ProtectionPolicyBuilder<U> {
        ProtectionPolicyBuilder::new()
    }

    /// Policy that only requires an authenticated user
    pub fn authenticated() -> Self {
        Self {
            required_role: None,
            required_roles: None,
            predicates: Vec::new(),
            csrf_mode: CsrfMode::Auto,
            sign_in_url: None,
        }
    }

    /// Exact role the user must hold
    pub fn required_role(&self) -> Option<&str> {
        self.required_role.as_deref()
    }

    /// Roles of which the user must hold at least one
    pub fn required_roles(&self) -> Option<&BTreeSet<String>> {
        self.required_roles.as_ref()
    }

    /// Custom checks in declared order
    pub fn predicates(&self) -> &[Predicate<U>] {
        &self.predicates
    }

    /// CSRF requirement
    pub fn csrf_mode(&self) -> CsrfMode {
        self.csrf_mode
    }

    /// Route-specific sign-in URL
    pub fn sign_in_url(&self) -> Option<&SignInUrl> {
        self.sign_in_url.as_ref()
    }
}

impl<U> Clone for ProtectionPolicy<U> {
    fn clone(&self) -> Self {
        Self {
            required_role: self.required_role.clone(),
            required_roles: self.required_roles.clone(),
            predicates: self.predicates.clone(),
            csrf_mode: self.csrf_mode,
            sign_in_url: self.sign_in_url.clone(),
        }
    }
}

impl<U> fmt::Debug for ProtectionPolicy<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtectionPolicy")
            .field("required_role", &self.required_role)
            .field("required_roles", &self.required_roles)
            .field("predicates", &self.predicates)
            .field("csrf_mode", &self.csrf_mode)
            .field("sign_in_url", &self.sign_in_url)
            .finish()
    }
}

impl<U> Default for ProtectionPolicy<U> {
    fn default() -> Self {
        Self::authenticated()
    }
}

/// Builder for [`ProtectionPolicy`]
pub struct ProtectionPolicyBuilder<U> {
    required_role: Option<String>,
    required_roles: Option<Vec<String>>,
    predicates: Vec<Predicate<U>>,
    csrf_mode: CsrfMode,
    sign_in_url: Option<SignInUrl>,
}

impl<U> ProtectionPolicyBuilder<U> {
    /// Create a builder for an authentication-only policy
    pub fn new() -> Self {
        Self {
            required_role: None,
            required_roles: None,
            predicates: Vec::new(),
            csrf_mode: CsrfMode::Auto,
            sign_in_url: None,
        }
    }

    /// Require an exact role
    pub fn role<S: Into<String>>(mut self, role: S) -> Self {
        self.required_role = Some(role.into());
        self
    }

    /// Require any one of these roles
    pub fn roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_roles = Some(roles.into_iter().map(Into::into).collect());
        self
    }

    /// Append a custom check
    pub fn predicate<F>(mut self, name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&U, &RequestContext) -> bool + Send + Sync + 'static,
    {
        self.predicates.push(Predicate::new(name, check));
        self
    }

    /// Set the CSRF requirement
    pub fn csrf(mut self, mode: CsrfMode) -> Self {
        self.csrf_mode = mode;
        self
    }

    /// Require a CSRF token for every method
    pub fn force_csrf(self) -> Self {
        self.csrf(CsrfMode::Force)
    }

    /// Never require a CSRF token
    pub fn without_csrf(self) -> Self {
        self.csrf(CsrfMode::Disabled)
    }

    /// Redirect failures to this route-specific URL
    pub fn sign_in_url(mut self, url: impl Into<SignInUrl>) -> Self {
        self.sign_in_url = Some(url.into());
        self
    }

    /// Compute the sign-in URL per request
    pub fn sign_in_with<F>(self, resolver: F) -> Self
    where
        F: Fn(&RequestContext) -> String + Send + Sync + 'static,
    {
        self.sign_in_url(SignInUrl::dynamic(resolver))
    }

    /// Validate and freeze the policy
    pub fn build(self) -> AuthResult<ProtectionPolicy<U>> {
        if let Some(role) = &self.required_role {
            if role.trim().is_empty() {
                return Err(AuthError::config_error("required_role cannot be empty"));
            }
        }

        let required_roles = match self.required_roles {
            Some(roles) => {
                if roles.is_empty() {
                    return Err(AuthError::config_error(
                        "required_roles must name at least one role",
                    ));
                }
                if roles.iter().any(|role| role.trim().is_empty()) {
                    return Err(AuthError::config_error(
                        "required_roles cannot contain an empty role",
                    ));
                }
                Some(roles.into_iter().collect::<BTreeSet<_>>())
            }
            None => None,
        };

        if let Some(url) = &self.sign_in_url {
            url.validate()?;
        }

        if let Some(index) = self.predicates.iter().position(|p| p.name().is_empty()) {
            return Err(AuthError::config_error(format!(
                "predicate #{} has no name",
                index
            )));
        }

        Ok(ProtectionPolicy {
            required_role: self.required_role,
            required_roles,
            predicates: self.predicates,
            csrf_mode: self.csrf_mode,
            sign_in_url: self.sign_in_url,
        })
    }
}

impl<U> Default for ProtectionPolicyBuilder<U> {
    fn default() -> Self {
        Self::new()
    }
}

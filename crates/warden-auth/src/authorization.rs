//! Role and predicate evaluation
//!
//! Checks run left to right and stop at the first failure: the role check
//! first, then each custom predicate in declared order. Predicates never run
//! for a user who already failed the role check.

use tracing::{debug, trace};

use crate::context::RequestContext;
use crate::policy::ProtectionPolicy;
use crate::traits::Authenticatable;
use crate::{AuthError, AuthResult};

/// Evaluates a policy's role requirement and predicates for a user
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationEngine;

impl AuthorizationEngine {
    /// Create an engine
    pub fn new() -> Self {
        Self
    }

    /// Evaluate the policy, naming the failed check on denial
    pub fn evaluate<U: Authenticatable>(
        &self,
        user: &U,
        policy: &ProtectionPolicy<U>,
        ctx: &RequestContext,
    ) -> AuthResult<()> {
        self.check_roles(user, policy)?;

        for predicate in policy.predicates() {
            trace!(predicate = predicate.name(), "running predicate");
            if !predicate.check(user, ctx) {
                debug!(user_id = %user.id(), predicate = predicate.name(), "predicate denied access");
                return Err(AuthError::access_denied(format!(
                    "predicate {} failed",
                    predicate.name()
                )));
            }
        }

        Ok(())
    }

    /// Evaluate the policy as a plain yes/no
    pub fn is_authorized<U: Authenticatable>(
        &self,
        user: &U,
        policy: &ProtectionPolicy<U>,
        ctx: &RequestContext,
    ) -> bool {
        self.evaluate(user, policy, ctx).is_ok()
    }

    fn check_roles<U: Authenticatable>(&self, user: &U, policy: &ProtectionPolicy<U>) -> AuthResult<()> {
        if let Some(role) = policy.required_role() {
            if !user.has_role(role) {
                debug!(user_id = %user.id(), role, "user lacks required role");
                return Err(AuthError::access_denied(format!("missing role {}", role)));
            }
            return Ok(());
        }

        if let Some(roles) = policy.required_roles() {
            let held = user.roles();
            if !roles.iter().any(|role| held.contains(role)) {
                debug!(user_id = %user.id(), ?roles, "user holds none of the required roles");
                return Err(AuthError::access_denied(format!(
                    "requires one of {:?}",
                    roles
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone)]
    struct Member {
        id: u32,
        roles: Vec<String>,
    }

    impl Authenticatable for Member {
        type Id = u32;

        fn id(&self) -> &u32 {
            &self.id
        }

        fn roles(&self) -> Vec<String> {
            self.roles.clone()
        }
    }

    fn member(roles: &[&str]) -> Member {
        Member {
            id: 1,
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    fn ctx() -> RequestContext {
        RequestContext::get("/admin")
    }

    #[test]
    fn test_no_constraints_pass() {
        let policy = ProtectionPolicy::<Member>::authenticated();
        assert!(AuthorizationEngine::new().is_authorized(&member(&[]), &policy, &ctx()));
    }

    #[test]
    fn test_required_role_is_exact() {
        let engine = AuthorizationEngine::new();
        let policy = ProtectionPolicy::builder().role("admin").build().unwrap();

        assert!(engine.is_authorized(&member(&["admin"]), &policy, &ctx()));
        assert!(engine.is_authorized(&member(&["viewer", "admin"]), &policy, &ctx()));
        assert!(!engine.is_authorized(&member(&["administrator"]), &policy, &ctx()));
        assert!(!engine.is_authorized(&member(&[]), &policy, &ctx()));
    }

    #[test]
    fn test_required_roles_any_of() {
        let engine = AuthorizationEngine::new();
        let policy = ProtectionPolicy::builder().roles(["editor", "admin"]).build().unwrap();

        assert!(engine.is_authorized(&member(&["admin"]), &policy, &ctx()));
        assert!(engine.is_authorized(&member(&["editor"]), &policy, &ctx()));
        assert!(!engine.is_authorized(&member(&["viewer"]), &policy, &ctx()));
    }

    #[test]
    fn test_required_role_takes_precedence() {
        let engine = AuthorizationEngine::new();
        let policy = ProtectionPolicy::builder()
            .role("admin")
            .roles(["editor"])
            .build()
            .unwrap();

        assert!(!engine.is_authorized(&member(&["editor"]), &policy, &ctx()));
        assert!(engine.is_authorized(&member(&["admin"]), &policy, &ctx()));
    }

    #[test]
    fn test_predicates_short_circuit_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (l1, l2, l3) = (log.clone(), log.clone(), log.clone());

        let policy = ProtectionPolicy::<Member>::builder()
            .predicate("test1", move |_, _| {
                l1.lock().unwrap().push("test1");
                true
            })
            .predicate("fail", move |_, _| {
                l2.lock().unwrap().push("fail");
                false
            })
            .predicate("test2", move |_, _| {
                l3.lock().unwrap().push("test2");
                true
            })
            .build()
            .unwrap();

        let err = AuthorizationEngine::new()
            .evaluate(&member(&[]), &policy, &ctx())
            .unwrap_err();

        assert_eq!(*log.lock().unwrap(), vec!["test1", "fail"]);
        assert_eq!(err, AuthError::access_denied("predicate fail failed"));
    }

    #[test]
    fn test_predicates_skipped_when_role_fails() {
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();

        let policy = ProtectionPolicy::<Member>::builder()
            .role("admin")
            .predicate("audit", move |_, _| {
                *counter.lock().unwrap() += 1;
                true
            })
            .build()
            .unwrap();

        assert!(!AuthorizationEngine::new().is_authorized(&member(&["viewer"]), &policy, &ctx()));
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_predicates_see_request_context() {
        let policy = ProtectionPolicy::<Member>::builder()
            .predicate("owner", |user, ctx| {
                ctx.query.get("owner") == Some(&user.id.to_string())
            })
            .build()
            .unwrap();

        let engine = AuthorizationEngine::new();
        let mine = RequestContext::get("/doc").with_query("owner", "1");
        let theirs = RequestContext::get("/doc").with_query("owner", "2");

        assert!(engine.is_authorized(&member(&[]), &policy, &mine));
        assert!(!engine.is_authorized(&member(&[]), &policy, &theirs));
    }
}

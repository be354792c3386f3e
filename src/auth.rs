//! Bearer-credential resolution.
//!
//! Token issuance lives outside this crate; the core only asks "who holds this
//! token". [`StaticTokenGate`] answers from configuration.

use std::collections::HashMap;

use crate::{
   config::TokenGrant,
   types::{Identity, Role},
};

pub trait AuthGate: Send + Sync {
   /// Resolves a bearer token to an identity, or `None` if it is unknown.
   fn resolve(&self, token: &str) -> Option<Identity>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticTokenGate {
   tokens: HashMap<String, Identity>,
}

impl StaticTokenGate {
   pub fn new(grants: &[TokenGrant]) -> Self {
      let tokens = grants
         .iter()
         .filter(|g| !g.token.is_empty() && !g.id.is_empty())
         .map(|g| (g.token.clone(), Identity::new(g.id.clone(), g.role)))
         .collect();
      Self { tokens }
   }

   pub fn with_token(mut self, token: impl Into<String>, id: impl Into<String>, role: Role) -> Self {
      self.tokens.insert(token.into(), Identity::new(id, role));
      self
   }

   pub fn len(&self) -> usize {
      self.tokens.len()
   }

   pub fn is_empty(&self) -> bool {
      self.tokens.is_empty()
   }
}

impl AuthGate for StaticTokenGate {
   fn resolve(&self, token: &str) -> Option<Identity> {
      self.tokens.get(token).cloned()
   }
}

/// Extracts the credential from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
   let (scheme, token) = header.trim().split_once(' ')?;
   if !scheme.eq_ignore_ascii_case("bearer") {
      return None;
   }
   let token = token.trim();
   (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn resolves_configured_tokens_only() {
      let gate = StaticTokenGate::new(&[
         TokenGrant { token: "t-admin".into(), id: "admin".into(), role: Role::Admin },
         TokenGrant { token: String::new(), id: "ghost".into(), role: Role::User },
      ]);
      assert_eq!(gate.len(), 1);
      assert_eq!(gate.resolve("t-admin"), Some(Identity::new("admin", Role::Admin)));
      assert_eq!(gate.resolve("nope"), None);
      assert_eq!(gate.resolve(""), None);
   }

   #[test]
   fn parses_bearer_header() {
      assert_eq!(bearer_token("Bearer abc"), Some("abc"));
      assert_eq!(bearer_token("bearer   abc "), Some("abc"));
      assert_eq!(bearer_token("Basic abc"), None);
      assert_eq!(bearer_token("Bearer "), None);
      assert_eq!(bearer_token("abc"), None);
   }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.

use serde::{Deserialize, Serialize};

/// Platform role. A user may hold several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Teacher,
    Student,
    Guest,
    Editor,
}

/// User profile stored in the `users` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Random hex id (also used as document ID)
    pub id: String,
    /// Login email, unique across users
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub roles: Vec<Role>,
    /// When the user was provisioned (RFC3339)
    pub created_at: String,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// True if the user holds any of `roles`.
    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.iter().any(|r| self.has_role(*r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_serialize_uppercase() {
        let json = serde_json::to_string(&vec![Role::Admin, Role::Teacher]).unwrap();
        assert_eq!(json, r#"["ADMIN","TEACHER"]"#);

        let parsed: Vec<Role> = serde_json::from_str(r#"["EDITOR","GUEST"]"#).unwrap();
        assert_eq!(parsed, vec![Role::Editor, Role::Guest]);
    }

    #[test]
    fn test_has_any_role() {
        let user = User {
            id: "u1".to_string(),
            email: "e@example.com".to_string(),
            display_name: "E".to_string(),
            roles: vec![Role::Editor],
            created_at: "2025-01-01T00:00:00.000Z".to_string(),
        };
        assert!(user.has_any_role(&[Role::Admin, Role::Editor]));
        assert!(!user.has_role(Role::Admin));
    }
}

use serde::{Deserialize, Serialize};

/// Role attached to the caller of a quotation operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Admin,
    Sales,
    Production,
    Accounts,
    System,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Sales => "sales",
            Self::Production => "production",
            Self::Accounts => "accounts",
            Self::System => "system",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "sales" => Some(Self::Sales),
            "production" => Some(Self::Production),
            "accounts" => Some(Self::Accounts),
            "system" => Some(Self::System),
            _ => None,
        }
    }

    /// Roles allowed through the HTTP gate. `System` acts only from operator tooling.
    pub fn can_manage_quotations(&self) -> bool {
        matches!(self, Self::Admin | Self::Sales)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: ActorRole) -> Self {
        Self { id: id.into(), role }
    }

    pub fn system() -> Self {
        Self::new("system", ActorRole::System)
    }
}

#[cfg(test)]
mod tests {
    use super::ActorRole;

    #[test]
    fn only_admin_and_sales_manage_quotations() {
        assert!(ActorRole::Admin.can_manage_quotations());
        assert!(ActorRole::Sales.can_manage_quotations());
        assert!(!ActorRole::System.can_manage_quotations());
        assert!(!ActorRole::Production.can_manage_quotations());
        assert!(!ActorRole::Accounts.can_manage_quotations());
    }

    #[test]
    fn role_parsing_is_case_insensitive() {
        assert_eq!(ActorRole::parse(" Sales "), Some(ActorRole::Sales));
        assert_eq!(ActorRole::parse("ADMIN"), Some(ActorRole::Admin));
        assert_eq!(ActorRole::parse("intern"), None);
    }
}

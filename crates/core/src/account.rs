use serde::{Deserialize, Serialize};
use std::fmt;

/// An `{id, name}` pair naming a category or a cost center. The result model
/// only ever carries both halves or neither.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: String,
    pub name: String,
}

impl CategoryRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        CategoryRef {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for CategoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// One of an organization's own bank accounts. Money moving into or out of
/// these is a transfer, not income or expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalAccount {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    /// Free-text names the bank prints for this account ("ITAU CC", "RESERVA").
    #[serde(default)]
    pub aliases: Vec<String>,
    pub account_number: Option<String>,
}

impl InternalAccount {
    pub fn new(id: &str, organization_id: &str, name: &str) -> Self {
        InternalAccount {
            id: id.to_string(),
            organization_id: organization_id.to_string(),
            name: name.to_string(),
            aliases: Vec::new(),
            account_number: None,
        }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    pub fn with_account_number(mut self, number: &str) -> Self {
        self.account_number = Some(number.to_string());
        self
    }
}

/// Categories and cost centers known for an organization, offered to the AI
/// backend as the closed set it may choose from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub categories: Vec<CategoryRef>,
    pub cost_centers: Vec<CategoryRef>,
}

impl Catalog {
    pub fn category(&self, id: &str) -> Option<&CategoryRef> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn cost_center(&self, id: &str) -> Option<&CategoryRef> {
        self.cost_centers.iter().find(|c| c.id == id)
    }
}

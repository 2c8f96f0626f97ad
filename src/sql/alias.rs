//! Table aliases for the models bound in one SELECT.

use modelset_core::ModelId;

use crate::schema::Schema;

/// Assigns each bound model a short alias: the lowercase first letter of
/// its name, suffixed with a counter when taken (`c`, `c2`, ...).
#[derive(Debug, Clone, Default)]
pub struct ModelAliasManager {
    aliases: Vec<(ModelId, String)>,
}

impl ModelAliasManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aliases for `models`, assigned in order.
    pub fn for_models(schema: &Schema, models: &[ModelId]) -> Self {
        let mut manager = Self::new();
        for model in models {
            manager.assign(schema, *model);
        }
        manager
    }

    /// Alias of `model`, assigning one on first use.
    pub fn assign(&mut self, schema: &Schema, model: ModelId) -> &str {
        let index = match self.aliases.iter().position(|(m, _)| *m == model) {
            Some(index) => index,
            None => {
                let base = schema
                    .model(model)
                    .name
                    .chars()
                    .find(|c| c.is_ascii_alphabetic())
                    .map(|c| c.to_ascii_lowercase())
                    .unwrap_or('t')
                    .to_string();
                let mut alias = base.clone();
                let mut counter = 1;
                while self.aliases.iter().any(|(_, a)| *a == alias) {
                    counter += 1;
                    alias = format!("{}{}", base, counter);
                }
                self.aliases.push((model, alias));
                self.aliases.len() - 1
            }
        };
        &self.aliases[index].1
    }

    pub fn alias(&self, model: ModelId) -> Option<&str> {
        self.aliases
            .iter()
            .find(|(m, _)| *m == model)
            .map(|(_, a)| a.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaBuilder;

    #[test]
    fn test_aliases_are_deduplicated() {
        let mut b = SchemaBuilder::new();
        let customer = b.add_model("Customer", "customers").unwrap();
        let contact = b.add_model("Contact", "contacts").unwrap();
        let order = b.add_model("Order", "orders").unwrap();
        let schema = b.build().unwrap();

        let mut aliases = ModelAliasManager::for_models(&schema, &[customer, contact]);
        assert_eq!(aliases.alias(customer), Some("c"));
        assert_eq!(aliases.alias(contact), Some("c2"));
        assert_eq!(aliases.assign(&schema, order), "o");
        assert_eq!(aliases.assign(&schema, customer), "c");
        assert_eq!(aliases.alias(ModelId(99)), None);
    }
}

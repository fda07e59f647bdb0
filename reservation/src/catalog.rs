//! The fixed beverage catalog guests choose from.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Beverage category, used for grouping on the page
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    /// Wine, champagne, beer
    Alcoholic,
    /// Soft drinks, juice, water
    NonAlcoholic,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alcoholic => write!(f, "alcoholic"),
            Self::NonAlcoholic => write!(f, "soft"),
        }
    }
}

/// One selectable beverage
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Unique display name, also the counter key
    pub name: String,
    /// Category
    pub category: Category,
}

impl CatalogItem {
    /// Creates a catalog item
    #[must_use]
    pub fn new(name: impl Into<String>, category: Category) -> Self {
        Self {
            name: name.into(),
            category,
        }
    }
}

/// Static list of beverages, built once at startup
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    items: Vec<CatalogItem>,
}

impl Catalog {
    /// Builds a catalog, dropping later duplicates of a name.
    #[must_use]
    pub fn new(items: Vec<CatalogItem>) -> Self {
        let mut unique: Vec<CatalogItem> = Vec::with_capacity(items.len());
        for item in items {
            if unique.iter().any(|existing| existing.name == item.name) {
                tracing::warn!(item = %item.name, "duplicate catalog entry ignored");
                continue;
            }
            unique.push(item);
        }
        Self { items: unique }
    }

    /// The beverages served at the reception
    #[must_use]
    pub fn default_beverages() -> Self {
        use Category::{Alcoholic, NonAlcoholic};
        Self::new(vec![
            CatalogItem::new("Champagne", Alcoholic),
            CatalogItem::new("Vin rouge", Alcoholic),
            CatalogItem::new("Vin blanc", Alcoholic),
            CatalogItem::new("Bière", Alcoholic),
            CatalogItem::new("Coca", NonAlcoholic),
            CatalogItem::new("Fanta", NonAlcoholic),
            CatalogItem::new("Jus d'orange", NonAlcoholic),
            CatalogItem::new("Eau", NonAlcoholic),
        ])
    }

    /// Parses `name:category` entries separated by commas.
    ///
    /// Category is `alcoholic` or `soft` (also accepted: `non-alcoholic`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidCatalogEntry`] for a malformed entry and
    /// [`ConfigError::EmptyCatalog`] when nothing was listed.
    pub fn parse(list: &str) -> Result<Self, ConfigError> {
        let mut items = Vec::new();
        for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, category) = entry
                .rsplit_once(':')
                .ok_or_else(|| ConfigError::InvalidCatalogEntry(entry.to_string()))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(ConfigError::InvalidCatalogEntry(entry.to_string()));
            }
            let category = match category.trim().to_ascii_lowercase().as_str() {
                "alcoholic" | "alcool" => Category::Alcoholic,
                "soft" | "non-alcoholic" | "sans-alcool" => Category::NonAlcoholic,
                _ => return Err(ConfigError::InvalidCatalogEntry(entry.to_string())),
            };
            items.push(CatalogItem::new(name, category));
        }

        if items.is_empty() {
            return Err(ConfigError::EmptyCatalog);
        }
        Ok(Self::new(items))
    }

    /// Whether `name` is a catalog item
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.items.iter().any(|item| item.name == name)
    }

    /// Looks up an item by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CatalogItem> {
        self.items.iter().find(|item| item.name == name)
    }

    /// Items in catalog order
    pub fn iter(&self) -> impl Iterator<Item = &CatalogItem> {
        self.items.iter()
    }

    /// Item names in catalog order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.name.as_str())
    }

    /// Items of one category
    pub fn in_category(&self, category: Category) -> impl Iterator<Item = &CatalogItem> {
        self.items.iter().filter(move |item| item.category == category)
    }

    /// Number of items
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the catalog is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::default_beverages()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn default_catalog_has_both_categories() {
        let catalog = Catalog::default_beverages();
        assert!(catalog.contains("Coca"));
        assert!(catalog.contains("Champagne"));
        assert_eq!(catalog.in_category(Category::Alcoholic).count(), 4);
        assert_eq!(catalog.in_category(Category::NonAlcoholic).count(), 4);
    }

    #[test]
    fn parses_configured_catalog() {
        let catalog = Catalog::parse("Palm wine:alcoholic, Malta : soft ,Eau:non-alcoholic").unwrap();
        assert_eq!(catalog.names().collect::<Vec<_>>(), ["Palm wine", "Malta", "Eau"]);
        assert_eq!(catalog.get("Malta").unwrap().category, Category::NonAlcoholic);
    }

    #[test]
    fn rejects_malformed_entries() {
        assert_eq!(
            Catalog::parse("Champagne"),
            Err(ConfigError::InvalidCatalogEntry("Champagne".into()))
        );
        assert_eq!(
            Catalog::parse("Champagne:fizzy"),
            Err(ConfigError::InvalidCatalogEntry("Champagne:fizzy".into()))
        );
        assert_eq!(Catalog::parse(" , "), Err(ConfigError::EmptyCatalog));
    }

    #[test]
    fn duplicates_keep_first_entry() {
        let catalog = Catalog::parse("Coca:soft,Coca:alcoholic").unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("Coca").unwrap().category, Category::NonAlcoholic);
    }
}

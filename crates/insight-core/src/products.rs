use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Scraping and scoping settings for one tracked product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductConfig {
    /// Scope key stamped on every stored feedback point.
    pub id: i64,
    pub name: String,
    /// Query sent to search-capable sources. Falls back to `name`.
    #[serde(default)]
    pub search_query: Option<String>,
    #[serde(default)]
    pub reddit_subreddits: Vec<String>,
    /// YouTube comments are kept only if they mention one of these.
    #[serde(default)]
    pub youtube_keywords: Vec<String>,
    #[serde(default)]
    pub google_search: bool,
    #[serde(default)]
    pub max_posts: Option<usize>,
    #[serde(default)]
    pub max_videos: Option<usize>,
    #[serde(default)]
    pub max_results: Option<usize>,
}

impl ProductConfig {
    /// The search query for this product.
    #[must_use]
    pub fn query(&self) -> &str {
        self.search_query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .unwrap_or(&self.name)
    }
}

#[derive(Debug, Deserialize)]
pub struct ProductsFile {
    pub products: Vec<ProductConfig>,
}

impl ProductsFile {
    /// Look up a product by its scope ID.
    #[must_use]
    pub fn get(&self, id: i64) -> Option<&ProductConfig> {
        self.products.iter().find(|p| p.id == id)
    }
}

/// Load and validate the product catalog from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_products(path: &Path) -> Result<ProductsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ProductsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let products_file: ProductsFile =
        serde_yaml::from_str(&content).map_err(ConfigError::ProductsFileParse)?;

    validate_products(&products_file)?;

    Ok(products_file)
}

fn validate_products(products_file: &ProductsFile) -> Result<(), ConfigError> {
    let mut seen_ids = HashSet::new();
    let mut seen_names = HashSet::new();

    for product in &products_file.products {
        if product.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "product {} has an empty name",
                product.id
            )));
        }

        if !seen_ids.insert(product.id) {
            return Err(ConfigError::Validation(format!(
                "duplicate product id: {}",
                product.id
            )));
        }

        if !seen_names.insert(product.name.trim().to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate product name: '{}'",
                product.name
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "products_test.rs"]
mod tests;

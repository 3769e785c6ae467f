//! Seed the catalog from a YAML file.
//!
//! The file is a list of products:
//!
//! ```yaml
//! - name: Blue Mug
//!   price: "12.50"
//!   stock: 40
//! - name: Desk Lamp
//!   price: "39.00"
//!   stock: 5
//! ```

use std::path::Path;

use tracing::info;

use emporium_storefront::models::NewProduct;

use super::{CliError, connect};

/// Parse and validate a YAML catalog.
fn parse_catalog(content: &str) -> Result<Vec<NewProduct>, CliError> {
    let products: Vec<NewProduct> = serde_yaml::from_str(content)?;

    for (index, product) in products.iter().enumerate() {
        if product.name.trim().is_empty() {
            return Err(CliError::InvalidInput(format!(
                "product #{} has an empty name",
                index + 1
            )));
        }
    }

    Ok(products)
}

/// Add every product in a YAML catalog.
///
/// The whole file is parsed and validated before the database is touched,
/// and the products are inserted in one transaction: a failed insert leaves
/// the catalog as it was.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or an insert fails.
pub async fn products(file_path: &str) -> Result<(), CliError> {
    let path = Path::new(file_path);
    info!(path = %file_path, "Loading catalog from file");

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CliError::Io {
            path: file_path.to_owned(),
            source,
        })?;
    let catalog = parse_catalog(&content)?;
    info!(products = catalog.len(), "Parsed catalog");

    let store = connect().await?;
    let products = store.insert_products(&catalog).await?;
    for product in &products {
        info!(
            product_id = %product.id,
            name = %product.name,
            price = %product.price,
            stock = product.stock,
            "Added product"
        );
    }

    info!("Seeding complete!");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use emporium_core::Price;

    use super::*;

    #[test]
    fn test_parse_catalog() {
        let catalog = parse_catalog(
            r#"
- name: Blue Mug
  price: "12.50"
  stock: 40
- name: Desk Lamp
  price: "39"
  stock: 5
"#,
        )
        .unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[0].name, "Blue Mug");
        assert_eq!(catalog[0].price, Price::from_cents(1250));
        assert_eq!(catalog[1].stock, 5);
    }

    #[test]
    fn test_parse_catalog_rejects_bad_entries() {
        let negative = "- name: Mug\n  price: \"-1.00\"\n  stock: 1\n";
        assert!(matches!(parse_catalog(negative), Err(CliError::Yaml(_))));

        let negative_stock = "- name: Mug\n  price: \"1.00\"\n  stock: -3\n";
        assert!(matches!(parse_catalog(negative_stock), Err(CliError::Yaml(_))));

        let blank = "- name: \"  \"\n  price: \"1.00\"\n  stock: 1\n";
        assert!(matches!(
            parse_catalog(blank),
            Err(CliError::InvalidInput(_))
        ));
    }
}

//! # Category Commands
//!
//! Categories group products on the till. Deleting one leaves its products
//! uncategorized.

use tracing::{debug, info};

use kassa_core::validation::validate_category_name;
use kassa_core::Category;

use crate::error::ApiError;
use crate::state::DbState;

pub async fn list_categories(db: &DbState) -> Result<Vec<Category>, ApiError> {
    debug!("list_categories command");
    Ok(db.shop().categories().list().await?)
}

pub async fn create_category(db: &DbState, name: &str) -> Result<Category, ApiError> {
    let name = validate_category_name(name)?;
    let category = db.shop().categories().insert(&name).await?;
    info!(id = %category.id, name = %category.name, "Category created");
    Ok(category)
}

pub async fn rename_category(db: &DbState, id: &str, name: &str) -> Result<Category, ApiError> {
    let name = validate_category_name(name)?;
    Ok(db.shop().categories().rename(id, &name).await?)
}

pub async fn delete_category(db: &DbState, id: &str) -> Result<(), ApiError> {
    db.shop().categories().delete(id).await?;
    info!(id = %id, "Category deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::product::{create_product, get_product, CreateProductRequest};
    use crate::error::ErrorCode;
    use crate::AppContext;

    #[tokio::test]
    async fn test_duplicate_names_are_refused() {
        let ctx = AppContext::in_memory().await.unwrap();

        create_category(&ctx.db, "Drinks").await.unwrap();
        let err = create_category(&ctx.db, " Drinks ").await.unwrap_err();

        assert_eq!(err.code, ErrorCode::ValidationError);
        assert!(err.message.contains("Drinks"));
        assert_eq!(list_categories(&ctx.db).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_uncategorizes_products() {
        let ctx = AppContext::in_memory().await.unwrap();
        let drinks = create_category(&ctx.db, "Drinks").await.unwrap();
        let product = create_product(
            &ctx.db,
            CreateProductRequest {
                name: "Water 500ml".into(),
                price_cents: 80,
                stock: 10,
                category_id: Some(drinks.id.clone()),
                image_path: None,
            },
        )
        .await
        .unwrap();

        let renamed = rename_category(&ctx.db, &drinks.id, "Beverages").await.unwrap();
        assert_eq!(renamed.name, "Beverages");

        delete_category(&ctx.db, &drinks.id).await.unwrap();

        assert_eq!(get_product(&ctx.db, &product.id).await.unwrap().category_id, None);
        let err = delete_category(&ctx.db, &drinks.id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }
}

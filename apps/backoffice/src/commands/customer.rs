//! # Customer Commands
//!
//! Customers are who a debt sale is written against. Phone numbers are
//! normalized before they are stored, so the same number typed two ways
//! still hits the per-shop uniqueness rule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use kassa_core::validation::{validate_customer_name, validate_phone, validate_search_query};
use kassa_core::Customer;
use kassa_db::NewCustomer;

use crate::error::ApiError;
use crate::state::DbState;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDto {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

impl From<Customer> for CustomerDto {
    fn from(c: Customer) -> Self {
        CustomerDto {
            id: c.id,
            name: c.name,
            phone: c.phone,
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRequest {
    pub name: String,
    pub phone: String,
}

impl CustomerRequest {
    fn validated(&self) -> Result<NewCustomer, ApiError> {
        Ok(NewCustomer {
            name: validate_customer_name(&self.name)?,
            phone: validate_phone(&self.phone)?,
        })
    }
}

/// Lists customers by name; `search` matches name or phone.
pub async fn list_customers(
    db: &DbState,
    search: Option<&str>,
) -> Result<Vec<CustomerDto>, ApiError> {
    let search = search.map(validate_search_query).transpose()?;
    debug!(search = ?search, "list_customers command");

    let customers = db.shop().customers().list(search.as_deref()).await?;
    Ok(customers.into_iter().map(CustomerDto::from).collect())
}

pub async fn get_customer(db: &DbState, id: &str) -> Result<CustomerDto, ApiError> {
    let customer = db
        .shop()
        .customers()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Customer", id))?;
    Ok(CustomerDto::from(customer))
}

pub async fn create_customer(
    db: &DbState,
    request: CustomerRequest,
) -> Result<CustomerDto, ApiError> {
    let customer = db.shop().customers().insert(request.validated()?).await?;
    info!(id = %customer.id, "Customer created");
    Ok(CustomerDto::from(customer))
}

pub async fn update_customer(
    db: &DbState,
    id: &str,
    request: CustomerRequest,
) -> Result<CustomerDto, ApiError> {
    let changes = request.validated()?;
    let customer = db
        .shop()
        .customers()
        .update(id, &changes.name, &changes.phone)
        .await?;
    info!(id = %customer.id, "Customer updated");
    Ok(CustomerDto::from(customer))
}

/// Removes a customer who has never bought anything.
pub async fn delete_customer(db: &DbState, id: &str) -> Result<(), ApiError> {
    db.shop().customers().delete(id).await?;
    info!(id = %id, "Customer deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::AppContext;

    fn amina(phone: &str) -> CustomerRequest {
        CustomerRequest {
            name: "Amina Wanjiru".into(),
            phone: phone.into(),
        }
    }

    #[tokio::test]
    async fn test_phone_is_normalized_and_unique() {
        let ctx = AppContext::in_memory().await.unwrap();

        let created = create_customer(&ctx.db, amina("0712-345 678")).await.unwrap();
        assert_eq!(created.phone, "0712345678");

        let err = create_customer(&ctx.db, amina("0712 345 678")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let found = list_customers(&ctx.db, Some("0712")).await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let ctx = AppContext::in_memory().await.unwrap();
        let created = create_customer(&ctx.db, amina("0712345678")).await.unwrap();

        let updated = update_customer(
            &ctx.db,
            &created.id,
            CustomerRequest {
                name: "Amina W.".into(),
                phone: "+254 712 345 678".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.name, "Amina W.");
        assert_eq!(updated.phone, "+254712345678");

        delete_customer(&ctx.db, &created.id).await.unwrap();
        let err = get_customer(&ctx.db, &created.id).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_invalid_input_writes_nothing() {
        let ctx = AppContext::in_memory().await.unwrap();

        let err = create_customer(&ctx.db, amina("call me")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        let err = create_customer(
            &ctx.db,
            CustomerRequest {
                name: "   ".into(),
                phone: "0712345678".into(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);

        assert!(list_customers(&ctx.db, None).await.unwrap().is_empty());
    }
}

/// Products Module
///
/// Product catalogue operations: filtered listing, lookup with reviews,
/// create, update, delete with review cleanup, and name/description search.

use rusqlite::Connection;
use serde_json::{json, Value};
use tracing::info;

use super::{as_integer, new_id, now_timestamp, query_rows, Filter};
use crate::core::db::{self, Row};
use crate::core::{GatewayError, Result};

/// Optional product listing filters, AND-combined
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub seller_id: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

impl ProductFilter {
    fn to_filter(&self) -> Filter {
        let mut filter = Filter::new();
        if let Some(category) = &self.category {
            filter.push("category = ?", category.as_str());
        }
        if let Some(seller_id) = &self.seller_id {
            filter.push("seller_id = ?", seller_id.as_str());
        }
        if let Some(min) = self.min_price {
            filter.push("price >= ?", min);
        }
        if let Some(max) = self.max_price {
            filter.push("price <= ?", max);
        }
        filter
    }
}

pub fn list_products(conn: &Connection, filter: &ProductFilter) -> Result<Vec<Row>> {
    let filter = filter.to_filter();
    db::select(conn, "products", "*", filter.condition().as_deref(), filter.params())
}

pub fn seller_products(conn: &Connection, seller_id: &str) -> Result<Vec<Row>> {
    db::select(conn, "products", "*", Some("seller_id = ?"), &[json!(seller_id)])
}

/// Inserts a product, filling `product_id`, `created_at` and `updated_at`
/// when the caller left them out. Returns the rowid and the stored fields.
pub fn create_product(conn: &Connection, mut product: Row) -> Result<(i64, Row)> {
    let now = now_timestamp();
    product.entry("product_id").or_insert_with(|| json!(new_id()));
    product.entry("created_at").or_insert_with(|| json!(now));
    product.entry("updated_at").or_insert_with(|| json!(now));

    let rowid = db::insert(conn, "products", &product)?;
    Ok((rowid, product))
}

fn product_exists(conn: &Connection, product_id: &str) -> Result<bool> {
    let found = db::select(
        conn,
        "products",
        "product_id",
        Some("product_id = ?"),
        &[json!(product_id)],
    )?;
    Ok(!found.is_empty())
}

fn product_not_found(product_id: &str) -> GatewayError {
    GatewayError::NotFound(format!("Product with ID {} not found", product_id))
}

/// Fetches one product with its reviews embedded under `reviews`
pub fn get_product(conn: &Connection, product_id: &str) -> Result<Row> {
    let mut rows = db::select(conn, "products", "*", Some("product_id = ?"), &[json!(product_id)])?;
    if rows.is_empty() {
        return Err(product_not_found(product_id));
    }
    let mut product = rows.swap_remove(0);
    let reviews = list_reviews(conn, product_id)?;
    product.insert("reviews".to_string(), Value::Array(reviews.into_iter().map(Value::Object).collect()));
    Ok(product)
}

/// Applies `changes` to a product and refreshes `updated_at`
pub fn update_product(conn: &Connection, product_id: &str, mut changes: Row) -> Result<usize> {
    if !product_exists(conn, product_id)? {
        return Err(product_not_found(product_id));
    }
    changes.insert("updated_at".to_string(), json!(now_timestamp()));
    db::update(conn, "products", &changes, "product_id = ?", &[json!(product_id)])
}

/// Deletes a product after its reviews and order items.
///
/// Run this inside a transaction so a failure part-way leaves the dependent
/// rows in place.
pub fn delete_product(conn: &Connection, product_id: &str) -> Result<usize> {
    if !product_exists(conn, product_id)? {
        return Err(product_not_found(product_id));
    }
    let key = [json!(product_id)];
    db::delete(conn, "reviews", Some("product_id = ?"), &key)?;
    db::delete(conn, "order_items", Some("product_id = ?"), &key)?;
    let removed = db::delete(conn, "products", Some("product_id = ?"), &key)?;
    info!("Deleted product {}", product_id);
    Ok(removed)
}

pub fn list_reviews(conn: &Connection, product_id: &str) -> Result<Vec<Row>> {
    db::select(conn, "reviews", "*", Some("product_id = ?"), &[json!(product_id)])
}

/// Adds a review to a product. `rating` must be within 1..=5.
pub fn add_review(conn: &Connection, product_id: &str, mut review: Row) -> Result<(i64, Row)> {
    review.entry("review_id").or_insert_with(|| json!(new_id()));
    review.insert("product_id".to_string(), json!(product_id));
    review.entry("created_at").or_insert_with(|| json!(now_timestamp()));

    let rating = review.get("rating").and_then(as_integer);
    if !matches!(rating, Some(1..=5)) {
        return Err(GatewayError::InvalidRequest(
            "Rating must be between 1 and 5".to_string(),
        ));
    }

    let rowid = db::insert(conn, "reviews", &review)?;
    Ok((rowid, review))
}

/// Substring search over product name, description and category
pub fn search_products(conn: &Connection, term: &str) -> Result<Vec<Row>> {
    if term.is_empty() {
        return Err(GatewayError::InvalidRequest("Search query is required".to_string()));
    }
    let pattern = json!(format!("%{}%", term));
    let sql = "SELECT * FROM products WHERE name LIKE ? OR description LIKE ? OR category LIKE ?";
    query_rows(conn, sql, &[pattern.clone(), pattern.clone(), pattern])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commerce::create_test_tables as setup;

    fn product(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_create_product_fills_defaults() {
        let conn = Connection::open_in_memory().unwrap();
        setup(&conn);

        let (_, stored) = create_product(&conn, product(json!({"name": "Lamp", "price": 20.0}))).unwrap();
        assert_eq!(stored["product_id"].as_str().unwrap().len(), 36);
        assert_eq!(stored["created_at"], stored["updated_at"]);

        let (_, explicit) =
            create_product(&conn, product(json!({"product_id": "p1", "name": "Desk"}))).unwrap();
        assert_eq!(explicit["product_id"], json!("p1"));
    }

    #[test]
    fn test_list_products_filters() {
        let conn = Connection::open_in_memory().unwrap();
        setup(&conn);
        for (id, category, price) in [("a", "books", 5.0), ("b", "books", 15.0), ("c", "toys", 10.0)] {
            create_product(
                &conn,
                product(json!({"product_id": id, "name": id, "category": category, "price": price})),
            )
            .unwrap();
        }

        let filter = ProductFilter {
            category: Some("books".to_string()),
            min_price: Some(10.0),
            ..ProductFilter::default()
        };
        let rows = list_products(&conn, &filter).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["product_id"], json!("b"));

        assert_eq!(list_products(&conn, &ProductFilter::default()).unwrap().len(), 3);
    }

    #[test]
    fn test_get_product_embeds_reviews() {
        let conn = Connection::open_in_memory().unwrap();
        setup(&conn);
        create_product(&conn, product(json!({"product_id": "p1", "name": "Lamp"}))).unwrap();
        add_review(&conn, "p1", product(json!({"rating": "4", "comment": "ok"}))).unwrap();

        let found = get_product(&conn, "p1").unwrap();
        assert_eq!(found["reviews"].as_array().unwrap().len(), 1);

        assert!(matches!(get_product(&conn, "nope"), Err(GatewayError::NotFound(_))));
    }

    #[test]
    fn test_review_rating_validation() {
        let conn = Connection::open_in_memory().unwrap();
        setup(&conn);
        create_product(&conn, product(json!({"product_id": "p1", "name": "Lamp"}))).unwrap();

        for bad in [json!({"rating": 0}), json!({"rating": 6}), json!({"rating": "x"}), json!({})] {
            let result = add_review(&conn, "p1", product(bad));
            assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));
        }
        assert!(add_review(&conn, "p1", product(json!({"rating": 5}))).is_ok());
    }

    #[test]
    fn test_update_and_delete_product() {
        let conn = Connection::open_in_memory().unwrap();
        setup(&conn);
        create_product(&conn, product(json!({"product_id": "p1", "name": "Lamp"}))).unwrap();
        add_review(&conn, "p1", product(json!({"rating": 3}))).unwrap();

        assert_eq!(update_product(&conn, "p1", product(json!({"price": 9.5}))).unwrap(), 1);
        assert!(matches!(
            update_product(&conn, "missing", product(json!({"price": 1}))),
            Err(GatewayError::NotFound(_))
        ));

        assert_eq!(delete_product(&conn, "p1").unwrap(), 1);
        assert!(list_reviews(&conn, "p1").unwrap().is_empty());
    }

    #[test]
    fn test_search_products() {
        let conn = Connection::open_in_memory().unwrap();
        setup(&conn);
        create_product(&conn, product(json!({"product_id": "p1", "name": "Desk Lamp"}))).unwrap();
        create_product(
            &conn,
            product(json!({"product_id": "p2", "name": "Chair", "description": "pairs with a lamp"})),
        )
        .unwrap();
        create_product(&conn, product(json!({"product_id": "p3", "name": "Rug"}))).unwrap();

        assert_eq!(search_products(&conn, "lamp").unwrap().len(), 2);
        assert!(matches!(search_products(&conn, ""), Err(GatewayError::InvalidRequest(_))));
    }
}

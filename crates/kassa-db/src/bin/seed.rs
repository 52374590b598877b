//! # Seed Data Generator
//!
//! Populates a development database with a small shop: categories,
//! products, customers and a handful of sales.
//!
//! ## Usage
//! ```bash
//! # Generate 200 products (default)
//! cargo run -p kassa-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p kassa-db --bin seed -- --count 1000
//!
//! # Specify database path
//! cargo run -p kassa-db --bin seed -- --db ./data/kassa.db
//! ```
//!
//! ## Generated Data
//! - One category per entry in `CATEGORIES`
//! - Products: `{name} {size}`, price 1.99 - 9.99 plus a size addon, stock 0 - 100
//! - Customers from `CUSTOMERS`
//! - A few cash sales and one credit sale per customer

use std::env;

use kassa_core::checkout::{CheckoutLine, PaymentDetails};
use kassa_core::TenantId;
use kassa_db::{Database, DbConfig, NewCustomer, NewProduct};

/// Product categories for realistic test data
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "Beverages",
        &["Cola", "Orange Soda", "Mineral Water", "Mango Juice", "Iced Tea", "Coffee"],
    ),
    (
        "Snacks",
        &["Potato Crisps", "Peanuts", "Chocolate Bar", "Biscuits", "Popcorn"],
    ),
    (
        "Dairy",
        &["Whole Milk", "Yogurt", "Butter", "Cheddar", "Eggs Dozen"],
    ),
    (
        "Grocery",
        &["White Bread", "Maize Flour", "Rice", "Sugar", "Cooking Oil", "Salt", "Beans"],
    ),
    (
        "Household",
        &["Bar Soap", "Dish Liquid", "Matches", "Candles", "Tissue Roll"],
    ),
];

/// Size variants for products
const SIZES: &[(&str, i64)] = &[
    ("Small", 0),
    ("Medium", 100),
    ("Large", 200),
    ("Family", 350),
    ("6-Pack", 500),
];

const CUSTOMERS: &[(&str, &str)] = &[
    ("Amina Wanjiru", "+254712345678"),
    ("Brian Otieno", "+254722000111"),
    ("Chen Li", "+254733222333"),
    ("Dalia Hassan", "+254744555666"),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path = String::from("./kassa_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Kassa POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: ./kassa_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Kassa POS Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!("Products: {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let shop = db.tenant(TenantId::default());

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = shop.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Generating products...");

    let start = std::time::Instant::now();
    let mut generated = 0;
    let mut products = Vec::new();

    'outer: for (category_idx, (category_name, names)) in CATEGORIES.iter().enumerate() {
        let category = shop.categories().insert(category_name).await?;

        for (product_idx, name) in names.iter().enumerate() {
            for (size_idx, (size, price_addon)) in SIZES.iter().enumerate() {
                if generated >= count {
                    break 'outer;
                }

                let seed = category_idx * 1000 + product_idx * 20 + size_idx;
                let product = NewProduct {
                    name: format!("{} {}", name, size),
                    // 1.99 - 9.99 plus the size addon
                    price_cents: 199 + ((seed * 17) % 800) as i64 + price_addon,
                    stock: (seed % 101) as i64,
                    category_id: Some(category.id.clone()),
                    image_path: None,
                };

                match shop.products().insert(product).await {
                    Ok(p) => products.push(p),
                    Err(e) => {
                        eprintln!("Failed to insert {} {}: {}", name, size, e);
                        continue;
                    }
                }

                generated += 1;
                if generated % 50 == 0 {
                    println!("  Generated {} products...", generated);
                }
            }
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Generated {} products in {:?}", generated, elapsed);

    println!();
    println!("Generating customers and sales...");

    let in_stock: Vec<_> = products.iter().filter(|p| p.stock >= 2).collect();
    let mut sales = 0;

    for (idx, (name, phone)) in CUSTOMERS.iter().enumerate() {
        let customer = shop
            .customers()
            .insert(NewCustomer {
                name: name.to_string(),
                phone: phone.to_string(),
            })
            .await?;

        let Some(product) = in_stock.get(idx) else {
            continue;
        };
        let lines = [CheckoutLine::new(&product.id, 1)];

        let tendered = product.price_cents + 500;
        if let Err(e) = shop.ledger().checkout(&lines, &PaymentDetails::cash(tendered)).await {
            eprintln!("Cash sale failed: {}", e);
        } else {
            sales += 1;
        }

        match shop.ledger().checkout(&lines, &PaymentDetails::debt(&customer.id)).await {
            Ok(_) => sales += 1,
            Err(e) => eprintln!("Credit sale for {} failed: {}", name, e),
        }
    }

    println!("✓ {} customers, {} sales", CUSTOMERS.len(), sales);

    println!();
    println!("Verifying search...");
    let results = shop.products().search("cola", 10).await?;
    println!("  Search 'cola': {} results", results.len());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

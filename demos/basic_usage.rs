//! Basic table adapter usage
//!
//! This example demonstrates:
//! - Registering entity metadata
//! - Inserting change-tracked entities
//! - Querying with the predicate language
//! - Updating only what changed
//! - Batch inserts inside a transaction
//!
//! Run with: cargo run --example basic_usage

use rust_table_adapter::prelude::*;

fn register(registry: &MetadataRegistry) {
    registry.register_fn("Customer", |m| {
        m.register_entity(None, "Customer", false)
            .register_entity_field("CustomerId", DbType::Int, None, false, true, DatabaseValue::Long(0))
            .register_entity_field("Name", DbType::Varchar, Some(50), false, false, DatabaseValue::Null)
            .register_entity_field("Age", DbType::Int, None, true, false, DatabaseValue::Null)
            .register_entity_pri_key("CustomerId");
    });
}

fn main() -> Result<()> {
    env_logger::init();
    println!("=== Rust Table Adapter - Basic Usage Example ===\n");

    let registry = MetadataRegistry::new();
    register(&registry);

    println!("1. Connecting to database...");
    let config = ConnectionConfig::in_memory().concurrency_mode(ConcurrencyMode::FirstInWins);
    let conn = Connection::open(&config)?;
    conn.execute_non_query(&Command::new(
        "CREATE TABLE Customer (
            CustomerId INTEGER PRIMARY KEY AUTOINCREMENT,
            Name VARCHAR(50) NOT NULL UNIQUE,
            Age INTEGER
        )",
    ))?;
    println!("   ✓ Connected ({})\n", conn.database_type());

    println!("2. Inserting customers...");
    let mut customers = TableAdapter::new(&conn, &registry, "Customer")?;
    let mut batch = Vec::new();
    for (name, age) in [("Ann", Some(34)), ("Bob", None), ("Cid", Some(51))] {
        let mut customer = registry.create("Customer")?;
        customer.set("Name", name)?;
        customer.set("Age", age)?;
        batch.push(customer);
    }
    if customers.insert_all(&mut batch, true) {
        for customer in &batch {
            println!(
                "   ✓ {} -> id {}",
                customer.get("Name")?.as_string(),
                customer.get("CustomerId")?.as_string()
            );
        }
    }
    println!();

    println!("3. Querying...");
    let command = customers
        .filter("Age > 30 OR Age IS NULL")?
        .order_by_descending("Age")
        .take(10)
        .select_command();
    println!("   SQL: {}", command.text());
    for customer in customers.select()? {
        println!(
            "   - {} ({})",
            customer.get("Name")?.as_string(),
            customer.get("Age")?.as_string()
        );
    }
    println!("   Total customers: {}\n", customers.count()?);

    println!("4. Updating...");
    let mut bob = customers.filter("Name = 'Bob'")?.select_one()?;
    bob.set("Age", 29)?;
    println!("   Changed fields: {:?}", bob.changed_fields());
    let saved = customers.update(&mut bob)?;
    println!("   ✓ Saved: {}\n", saved);

    println!("5. Duplicate names are rejected...");
    let mut duplicate = registry.create("Customer")?;
    duplicate.set("Name", "Ann")?;
    match customers.insert(&mut duplicate) {
        Err(e) if e.is_duplicate_key() => println!("   ✓ {}\n", e),
        other => println!("   unexpected: {:?}\n", other),
    }

    conn.close()?;
    println!("=== Done ===");
    Ok(())
}

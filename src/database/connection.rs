use mongodb::{Client, Database};

pub async fn get_db_client(database_url: &str, db_name: &str) -> (Client, Database) {
    let client = Client::with_uri_str(database_url)
        .await
        .expect("Failed to connect to MongoDB");

    let db = client.database(db_name);

    // Verify database exists by listing collections
    match db.list_collection_names().await {
        Ok(collections) => {
            println!("✅ Connected to database: {}", db_name);
            println!("📂 Collections found: {:?}", collections);

            for required in ["users", "plans", "transactions"] {
                if !collections.contains(&required.to_string()) {
                    println!("⚠️ Warning: '{}' collection not found in database", required);
                }
            }
        }
        Err(e) => {
            eprintln!("❌ Database '{}' may not exist or is inaccessible: {}", db_name, e);
        }
    }

    (client, db)
}

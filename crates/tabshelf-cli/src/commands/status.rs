use anyhow::Result;
use tabshelf_config::Config;
use tabshelf_storage::Database;

pub async fn handle(db: &Database, config: &Config, json: bool) -> Result<()> {
    let has_user = db.has_user().await.map_err(|e| e.to_string());
    let tabs = db.kv().list_tabs().await?;

    if json {
        let status = serde_json::json!({
            "data_dir": config.storage.data_dir,
            "mode": db.mode().as_str(),
            "initialized": db.is_init_db(),
            "has_user": has_user.as_ref().ok(),
            "has_user_error": has_user.as_ref().err(),
            "seed": db.seed_outcome(),
            "tabs": tabs.len(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Data dir:    {}", config.storage.data_dir.display());
    println!("Tab storage: {}", db.mode());
    println!("Initialized: {}", if db.is_init_db() { "yes (this run)" } else { "no" });
    match has_user {
        Ok(true) => println!("Users:       yes"),
        Ok(false) => println!("Users:       none"),
        Err(e) => println!("Users:       unknown ({e})"),
    }
    println!("Demo seed:   {}", super::describe_seed(db.seed_outcome()));
    println!("Tabs:        {}", tabs.len());

    Ok(())
}

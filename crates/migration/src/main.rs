use config::Config;
use sea_orm_migration::prelude::*;
use std::env;

#[tokio::main]
async fn main() {
    // DATABASE_URL from the environment wins; otherwise read it from config.yaml
    if env::var("DATABASE_URL").is_err() {
        let settings = Config::builder()
            .add_source(config::File::with_name("config.yaml").required(false))
            .build()
            .expect("Failed to read config.yaml");
        if let Ok(url) = settings.get_string("database_url") {
            env::set_var("DATABASE_URL", url);
        }
    }
    cli::run_cli(migration::Migrator).await;
}

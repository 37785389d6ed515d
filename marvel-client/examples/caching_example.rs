use marvel_client::{
    auth::Auth, cache::CacheConfig, storage::StorageOrigin, ClientConfig, MarvelClient,
    DEFAULT_BASE_URL,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::init();

    let auth = Auth::Hash {
        public_key: std::env::var("MARVEL_PUBLIC_KEY")?,
        private_key: std::env::var("MARVEL_PRIVATE_KEY")?,
    };
    let origin = StorageOrigin::open("marvel-cache.json")?;
    let client = MarvelClient::with_cache(
        ClientConfig::new(DEFAULT_BASE_URL, auth),
        Arc::new(origin.context()),
        CacheConfig::default(),
    );

    // First search (will be cached)
    let start = std::time::Instant::now();
    let characters = client.fetch_characters("Spider").await?;
    println!("First search took: {:?} ({} characters)", start.elapsed(), characters.len());

    // Second search (should be from cache)
    let start = std::time::Instant::now();
    client.fetch_characters("Spider").await?;
    println!("Cached search took: {:?}", start.elapsed());

    if let Some(character) = characters.first() {
        let comics = client
            .fetch_comics_for_character(character.id, 20, "onsaleDate")
            .await?;
        println!("{} appears in {} comics, e.g.:", character.name, comics.len());
        for comic in comics.iter().take(5) {
            match comic.on_sale_year() {
                Some(year) => println!("  {} ({})", comic.title, year),
                None => println!("  {}", comic.title),
            }
        }
    }

    println!("Cache stats: {:?}", client.cache_stats());
    println!("Evicted {} expired entries", client.evict_expired_cache());

    Ok(())
}

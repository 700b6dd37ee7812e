use std::{env, sync::Once};

use docuhelper::{config, embedding, processing::IngestionService};

static INIT: Once = Once::new();

fn set_default_env(key: &str, value: &str) {
    let needs_value = env::var(key).map(|v| v.trim().is_empty()).unwrap_or(true);
    if needs_value {
        // SAFETY: Tests run serially via Once and we intentionally mutate process env.
        unsafe {
            env::set_var(key, value);
        }
    }
}

fn init_config_once() -> &'static config::Config {
    INIT.call_once(|| {
        set_default_env("SUMMARIZATION_PROVIDER", "ollama");
        set_default_env("SUMMARIZATION_MODEL", "llama3.2");
        set_default_env("EMBEDDING_PROVIDER", "ollama");
        set_default_env("EMBEDDING_MODEL", "all-minilm");
        set_default_env("EMBEDDING_DIMENSION", "384");
        set_default_env("OLLAMA_URL", "http://127.0.0.1:11434");
        config::init_config().expect("valid live configuration");
    });
    config::get_config()
}

#[tokio::test]
#[ignore = "Requires live Ollama embeddings"]
async fn live_ollama_embedding_matches_configured_dimension() {
    let config = init_config_once();
    let client = embedding::get_embedding_client(config).expect("embedding client");
    client
        .warm_up()
        .await
        .expect("embedding model should load with the configured dimension");
    let vector = client
        .generate_embedding("docuhelper live embedding")
        .await
        .expect("failed to request embeddings from provider");
    assert_eq!(
        vector.len(),
        config.embedding_dimension,
        "embedding dimension mismatch"
    );
}

#[tokio::test]
#[ignore = "Requires live Ollama summarization and embeddings"]
async fn live_ollama_ingests_text() {
    let config = init_config_once();
    let service = IngestionService::from_config(config).expect("service");
    service.warm_up().await.expect("models should load");

    let text = "Rust is a systems programming language focused on safety, speed, and \
                concurrency. It achieves memory safety without garbage collection by \
                checking ownership and borrowing rules at compile time.";
    let result = service.ingest_text(text).await.expect("live ingestion");
    let summary = result.summary.expect("summary for non-empty text");
    assert!(!summary.trim().is_empty());
    assert_eq!(result.chunks.len(), 1);
    assert_eq!(
        result.chunks[0].embedding.dimension(),
        config.embedding_dimension
    );
}

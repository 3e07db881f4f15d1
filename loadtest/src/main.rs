use goose::prelude::*;
use rand::Rng;

/// Load testing suite for the asset cache.
///
/// Simulates a browser pulling a mirrored site:
/// - A small set of hot assets requested over and over (cache hits after warmup)
/// - The default document at `/`
/// - Unique paths that always miss and go to the origin
///
/// # Usage
/// ```bash
/// cd loadtest
/// cargo run --release -- --host http://localhost:8080 --users 10 --hatch-rate 2 --run-time 60s
/// ```
///
/// Misses against an origin that does not have the path are expected to
/// answer 404 "Fora do ar"; they still measure the fetch-and-log path.

const HOT_ASSETS: [&str; 5] = [
    "/css/site.css",
    "/js/app.js",
    "/img/logo.png",
    "/data/menu.json",
    "/fonts/brand.woff2",
];

#[tokio::main]
async fn main() -> Result<(), GooseError> {
    GooseAttack::initialize()?
        .register_scenario(
            scenario!("BrowsePage")
                .register_transaction(transaction!(index_document).set_weight(2)?)
                .register_transaction(transaction!(hot_asset).set_weight(10)?)
        )
        .register_scenario(
            scenario!("ColdFill")
                // Unique paths never hit the local copy
                .register_transaction(transaction!(cold_asset).set_weight(1)?)
        )
        .execute()
        .await?;

    Ok(())
}

/// Default document, served from the mirror after the first fill.
async fn index_document(user: &mut GooseUser) -> TransactionResult {
    let _goose = user.get("/").await?;
    Ok(())
}

/// Steady-state hit latency on a fixed asset set.
async fn hot_asset(user: &mut GooseUser) -> TransactionResult {
    // Pick before await to satisfy Send bounds
    let path = {
        let mut rng = rand::thread_rng();
        HOT_ASSETS[rng.gen_range(0..HOT_ASSETS.len())]
    };
    let _goose = user.get(path).await?;
    Ok(())
}

/// Worst case: every request goes upstream.
async fn cold_asset(user: &mut GooseUser) -> TransactionResult {
    let path = {
        let mut rng = rand::thread_rng();
        format!("/cold/{:016x}.js", rng.gen::<u64>())
    };
    let request = GooseRequest::builder()
        .path(path.as_str())
        .expect_status_code(404)
        .build();
    let _goose = user.request(request).await?;
    Ok(())
}

//! Shared test utilities for the wallgrab test suite.

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::json;

/// Deterministic RNG for shuffle/choice assertions.
pub fn seeded(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Listing body for `(url, title, permalink)` triples, in the envelope
/// the listing endpoint serves.
pub fn listing_json(posts: &[(&str, &str, &str)]) -> Vec<u8> {
    let children: Vec<serde_json::Value> = posts
        .iter()
        .map(|(url, title, permalink)| {
            json!({"data": {"url": url, "title": title, "permalink": permalink}})
        })
        .collect();
    serde_json::to_vec(&json!({"data": {"children": children}})).unwrap()
}

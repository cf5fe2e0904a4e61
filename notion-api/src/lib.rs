pub mod client;
pub mod types;

pub use client::Notion;

use anyhow::{ensure, Result};

/// Normalize a database or page id into the dashed UUID form used by the API.
pub fn to_dashed_id(id: &str) -> Result<String> {
    let id = id.replace('-', "");
    ensure!(id.len() == 32, "invalid id: expected 32 hex characters");

    let a = &id[0..8];
    let b = &id[8..12];
    let c = &id[12..16];
    let d = &id[16..20];
    let e = &id[20..];
    Ok(format!("{a}-{b}-{c}-{d}-{e}"))
}

#[test]
fn test_to_dashed_id() {
    const ID: &str = "2131b10cebf64938a1277089ff02dbe4";
    assert_eq!(
        to_dashed_id(ID).ok(),
        Some("2131b10c-ebf6-4938-a127-7089ff02dbe4".to_string())
    );
    assert_eq!(
        to_dashed_id("2131b10c-ebf6-4938-a127-7089ff02dbe4").ok(),
        Some("2131b10c-ebf6-4938-a127-7089ff02dbe4".to_string())
    );
    assert!(to_dashed_id("too-short").is_err());
}

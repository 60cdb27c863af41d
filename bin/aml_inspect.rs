use aml::artifact;
use anyhow::{Result, anyhow};
use chrono::TimeZone;
use std::{env, fs};

/// Dump a compiled .caml artifact: header fields, then the stored program
/// as JSON.
fn main() -> Result<()> {
    let input = env::args()
        .nth(1)
        .ok_or_else(|| anyhow!("no input file provided"))?;
    let data = fs::read(&input)?;
    let decoded = artifact::decode(&data)?;

    println!("artifact: {input}");
    println!("  format version: {}", decoded.format_version);
    println!("  source name:    {}", decoded.source_name);
    println!("  fingerprint:    {:016x}", decoded.source_fingerprint);
    match chrono::Utc.timestamp_opt(decoded.built_at, 0).single() {
        Some(built) => println!("  built at:       {}", built.to_rfc3339()),
        None => println!("  built at:       {} (raw)", decoded.built_at),
    }
    println!(
        "  statements:     {}",
        decoded.program.statements.len()
    );
    println!();
    println!("{}", serde_json::to_string_pretty(&decoded.program)?);

    Ok(())
}

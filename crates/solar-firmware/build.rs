//! Injects station secrets from `.env` (or the environment) as compile-time
//! variables and adds the esp-hal linker script.

use std::path::PathBuf;

const REQUIRED: [&str; 5] = [
    "SOLAR_WIFI_SSID",
    "SOLAR_WIFI_PASSWORD",
    "SOLAR_THINGSPEAK_API_KEY",
    "SOLAR_BOT_TOKEN",
    "SOLAR_BOT_CHAT_ID",
];

const OPTIONAL: [&str; 1] = ["SOLAR_BOT_FALLBACK_NAME"];

fn main() {
    println!("cargo:rustc-link-arg=-Tlinkall.x");

    let manifest_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").unwrap_or_default());
    // Workspace root first, then the crate directory
    for dir in [manifest_dir.join("../.."), manifest_dir.clone()] {
        let env_path = dir.join(".env");
        if env_path.exists() {
            println!("cargo:rerun-if-changed={}", env_path.display());
            if let Err(e) = dotenvy::from_path(&env_path) {
                println!("cargo:warning=failed to load {}: {}", env_path.display(), e);
            }
        }
    }

    let mut missing = Vec::new();
    for name in REQUIRED {
        println!("cargo:rerun-if-env-changed={}", name);
        match std::env::var(name) {
            Ok(value) => println!("cargo:rustc-env={}={}", name, value),
            Err(_) => missing.push(name),
        }
    }
    for name in OPTIONAL {
        println!("cargo:rerun-if-env-changed={}", name);
        if let Ok(value) = std::env::var(name) {
            println!("cargo:rustc-env={}={}", name, value);
        }
    }

    if !missing.is_empty() {
        eprintln!(
            "error: missing station secrets: {}. Set them in .env or the environment.",
            missing.join(", ")
        );
        std::process::exit(1);
    }
}

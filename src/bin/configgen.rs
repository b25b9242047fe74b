// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Configuration Schema Generator
//!
//! Generates the JSON schema of the DNS manager configuration from the Rust
//! types in src/config.rs, plus a commented example configuration.
//!
//! Usage:
//!   cargo run --bin configgen
//!
//! Generated files will be written to deploy/config/.

use dnsman::config::{
    CacheConfig, DnsManagerConfiguration, ProviderDefinition, RemoteAccessServerConfig,
};
use std::fs;
use std::path::Path;

const COPYRIGHT_HEADER: &str = "# Copyright (c) 2025 Erick Bourgeois, firestoned
# SPDX-License-Identifier: MIT
#
# This file is AUTO-GENERATED from src/config.rs
# DO NOT EDIT MANUALLY - Run `cargo run --bin configgen` to regenerate
#
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output_dir = Path::new("deploy/config");
    fs::create_dir_all(output_dir)?;

    println!("Generating configuration schema from src/config.rs...");

    let schema = schemars::schema_for!(DnsManagerConfiguration);
    fs::write(
        output_dir.join("config.schema.json"),
        serde_json::to_string_pretty(&schema)?,
    )?;
    println!("  ✓ Generated config.schema.json");

    let yaml = serde_yaml::to_string(&example_configuration())?;
    fs::write(
        output_dir.join("config.example.yaml"),
        format!("{COPYRIGHT_HEADER}{yaml}"),
    )?;
    println!("  ✓ Generated config.example.yaml");

    Ok(())
}

fn example_configuration() -> DnsManagerConfiguration {
    DnsManagerConfiguration {
        cache: CacheConfig::default(),
        remote_access: Some(RemoteAccessServerConfig {
            port: 7777,
            server_secret_name: Some("dnsman-remote-server".to_string()),
            server_secret_namespace: None,
            server_cert_file: None,
            server_key_file: None,
            server_ca_file: "/etc/dnsman/remote/ca.crt".to_string(),
            token_ttl_secs: 3600,
            spinning_secs: 1,
        }),
        providers: vec![ProviderDefinition {
            namespace: "team-a".to_string(),
            name: "mock".to_string(),
            provider_type: "mock-inmemory".to_string(),
            provider_config: Some(serde_json::json!({
                "account": "demo",
                "zones": [{"dnsName": "example.org"}]
            })),
            remote_access: true,
            ..ProviderDefinition::default()
        }],
        ..DnsManagerConfiguration::default()
    }
}

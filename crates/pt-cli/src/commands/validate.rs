//! Validate command implementation

use std::fmt::Write;
use std::path::Path;

use anyhow::Result;

use pt_core::config::{resolve_image_selector, DevConfig};
use pt_core::ConfigError;

/// Validate the loaded config and print what each tunnel would carry
pub fn validate_command(path: &Path, config: &DevConfig) -> Result<()> {
    config.validate()?;
    print!("{}", summarize(config)?);
    println!("Configuration OK: {}", path.display());
    Ok(())
}

/// Resolved view of every definition, one block per tunnel
pub fn summarize(config: &DevConfig) -> Result<String, ConfigError> {
    let mut out = String::new();
    if config.tunnels.is_empty() {
        out.push_str("No tunnels configured\n");
        return Ok(out);
    }

    for definition in &config.tunnels {
        let _ = writeln!(out, "{}", definition.name);

        let selector = definition.label_selector_string();
        if !selector.is_empty() {
            let _ = writeln!(out, "  labels: {}", selector);
        }
        if let Some(image) = &definition.image_selector {
            let _ = writeln!(
                out,
                "  image: {}",
                resolve_image_selector(image, &config.images)?
            );
        }
        if let Some(namespace) = definition
            .namespace
            .as_ref()
            .or(config.kube.namespace.as_ref())
        {
            let _ = writeln!(out, "  namespace: {}", namespace);
        }

        for pair in definition.resolve_ports()? {
            let _ = writeln!(
                out,
                "  forward {}:{} -> {}",
                pair.bind_address, pair.local, pair.remote
            );
        }
        for mapping in &definition.reverse_ports {
            let _ = writeln!(out, "  reverse {}", mapping);
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pt_core::config::{PortMapping, ReversePortMapping, TunnelDefinition};

    #[test]
    fn test_summary_lists_resolved_pairs() {
        let mut api = TunnelDefinition::new("api");
        api.label_selector.insert("app".to_string(), "api".to_string());
        api.image_selector = Some("image(api)".to_string());
        api.ports = vec![
            PortMapping::local(8080),
            PortMapping {
                local_port: Some(9229),
                remote_port: Some(9230),
                bind_address: Some("0.0.0.0".to_string()),
            },
        ];

        let mut worker = TunnelDefinition::new("worker");
        worker.namespace = Some("jobs".to_string());
        worker.reverse_ports = vec![ReversePortMapping {
            local_port: Some(5432),
            ..Default::default()
        }];

        let mut config = DevConfig::default();
        config.images.insert("api".to_string(), "registry.local/api".to_string());
        config.kube.namespace = Some("dev".to_string());
        config.tunnels = vec![api, worker];

        assert_eq!(
            summarize(&config).unwrap(),
            "api\n  labels: app=api\n  image: registry.local/api\n  namespace: dev\n  \
             forward localhost:8080 -> 8080\n  forward 0.0.0.0:9229 -> 9230\n\
             worker\n  namespace: jobs\n  reverse 5432:5432\n"
        );
    }

    #[test]
    fn test_summary_of_empty_config() {
        assert_eq!(
            summarize(&DevConfig::default()).unwrap(),
            "No tunnels configured\n"
        );
    }
}

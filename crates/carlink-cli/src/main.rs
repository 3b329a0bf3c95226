use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use carlink_core::{ServiceDescriptor, ServiceNode, SidecarConfig};
use carlink_sidecar::SidecarClient;

/// carlink — talk to the local RPC/registry sidecar.
///
/// Registers services, looks them up, calls methods through the RPC gateway
/// and forwards raw HTTP calls.
#[derive(Parser, Debug)]
#[command(name = "carlink", version, about)]
struct Cli {
    /// Sidecar base address (overrides the config file).
    #[arg(short, long)]
    address: Option<String>,

    /// Path to a config file (defaults to ~/.config/carlink/config.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a service with the sidecar registry.
    Register {
        #[command(flatten)]
        service: ServiceArgs,

        /// Expire the registration unless renewed within this many seconds.
        #[arg(long)]
        ttl: Option<u64>,
    },
    /// Deregister a service from the sidecar registry.
    Deregister {
        #[command(flatten)]
        service: ServiceArgs,
    },
    /// List registered services, or show one by name.
    Services { name: Option<String> },
    /// Call a method through the RPC gateway.
    Rpc {
        /// Target service, e.g. go.micro.srv.greeter.
        service: String,
        /// Method in Type.Method form, e.g. Say.Hello.
        method: String,
        /// JSON request body.
        #[arg(default_value = "{}")]
        request: String,
        /// Call this node directly instead of letting the sidecar choose.
        #[arg(long)]
        node: Option<String>,
    },
    /// POST a raw body to a path on the sidecar.
    Http {
        /// Path beginning with '/', e.g. /greeter.
        path: String,
        /// Request body, sent as-is.
        #[arg(default_value = "")]
        body: String,
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Check sidecar health.
    Health {
        /// Keep polling for up to this many seconds.
        #[arg(long)]
        wait: Option<u64>,
    },
}

#[derive(Args, Debug)]
struct ServiceArgs {
    /// Full service descriptor as JSON. Takes precedence over the other flags.
    #[arg(long, conflicts_with_all = ["name", "host", "port", "node_id"])]
    json: Option<String>,

    /// Service name.
    #[arg(long, required_unless_present = "json")]
    name: Option<String>,

    /// Address the service listens on.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, required_unless_present = "json")]
    port: Option<u16>,

    /// Node id (defaults to <name>-<uuid>).
    #[arg(long)]
    node_id: Option<String>,
}

impl ServiceArgs {
    fn descriptor(&self) -> Result<ServiceDescriptor> {
        if let Some(ref json) = self.json {
            let value: Value = serde_json::from_str(json).context("Invalid service JSON")?;
            return Ok(ServiceDescriptor::try_from(value)?);
        }

        let name = self.name.as_deref().context("--name is required")?;
        let port = self.port.context("--port is required")?;
        let node_id = self
            .node_id
            .clone()
            .unwrap_or_else(|| format!("{}-{}", name, uuid::Uuid::new_v4()));
        Ok(ServiceDescriptor::with_node(
            name,
            ServiceNode::new(node_id, self.host.clone(), port),
        ))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging. Stdout carries command output, so logs go to stderr.
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load config.
    let mut config = match cli.config {
        Some(ref path) => SidecarConfig::load_from(path)?,
        None => SidecarConfig::load().unwrap_or_else(|e| {
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            SidecarConfig::default()
        }),
    };
    if let Some(address) = cli.address {
        config.base_address = address;
    }

    let client = SidecarClient::new(&config)?;
    tracing::info!(address = %config.base_address, "Using sidecar");

    match cli.command {
        Command::Register { service, ttl } => {
            let descriptor = service.descriptor()?;
            let resp = match ttl {
                Some(secs) => {
                    client
                        .register_with_ttl(&descriptor, Duration::from_secs(secs))
                        .await?
                }
                None => client.register(&descriptor).await?,
            };
            print_body(&resp.body)?;
            println!("{}", serde_json::to_string_pretty(&descriptor)?);
        }
        Command::Deregister { service } => {
            let resp = client.deregister(&service.descriptor()?).await?;
            print_body(&resp.body)?;
        }
        Command::Services { name } => {
            let services = match name {
                Some(ref name) => client.get_service(name).await?,
                None => client.list_services().await?,
            };
            ensure_found(name.as_deref(), &services)?;
            println!("{}", serde_json::to_string_pretty(&services)?);
        }
        Command::Rpc {
            service,
            method,
            request,
            node,
        } => {
            let request: Value =
                serde_json::from_str(&request).context("Request must be valid JSON")?;
            let response = match node {
                Some(ref address) => {
                    client
                        .rpc_call_remote(address, &service, &method, request)
                        .await?
                }
                None => client.rpc_call(&service, &method, request).await?,
            };
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Http {
            path,
            body,
            content_type,
        } => {
            let mut request = carlink_core::HttpCallRequest::new(path, body);
            if let Some(content_type) = content_type {
                request = request.with_content_type(content_type);
            }
            let resp = client.http_call_with(request).await?;
            print_body(&resp.body)?;
            if !resp.is_success() {
                anyhow::bail!("Sidecar returned status {}", resp.status);
            }
        }
        Command::Health { wait } => {
            match wait {
                Some(secs) => client.wait_for_healthy(Duration::from_secs(secs)).await?,
                None => {
                    client.health().await?;
                }
            }
            println!("ok");
        }
    }

    Ok(())
}

/// A named lookup with no result is an error; an empty registry is not.
fn ensure_found(name: Option<&str>, services: &[ServiceDescriptor]) -> Result<()> {
    match name {
        Some(name) if services.is_empty() => anyhow::bail!("Service not found: {name}"),
        _ => Ok(()),
    }
}

/// Write a sidecar response body to stdout as received.
fn print_body(body: &[u8]) -> Result<()> {
    if !body.is_empty() {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(body)?;
        if !body.ends_with(b"\n") {
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_registry_listing_is_not_an_error() {
        assert!(ensure_found(None, &[]).is_ok());
    }

    #[test]
    fn named_lookup_without_result_is_an_error() {
        let err = ensure_found(Some("go.micro.srv.missing"), &[]).unwrap_err();
        assert_eq!(err.to_string(), "Service not found: go.micro.srv.missing");

        let found = [ServiceDescriptor::new().set("name", "go.micro.srv.greeter")];
        assert!(ensure_found(Some("go.micro.srv.greeter"), &found).is_ok());
    }
}

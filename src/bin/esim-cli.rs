use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use esim_gateway::config::{self, GatewayConfig};
use esim_gateway::observability::logging;
use esim_gateway::reseller::{OrderRequest, ResellerClient};
use esim_gateway::resilience::generate_idempotency_key;

#[derive(Parser)]
#[command(name = "esim-cli")]
#[command(about = "Operator CLI for the reseller API", long_about = None)]
struct Cli {
    /// Gateway config file. Defaults plus environment when omitted.
    #[arg(short, long, env = "ESIM_GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch an access token and report its validity
    Token,
    /// List packages for an ISO country code
    Packages { country: String },
    /// Place an order for one package
    Order {
        package: String,
        #[arg(long, default_value_t = 1)]
        quantity: u32,
        #[arg(long)]
        description: Option<String>,
        /// Reuse the key printed by an earlier attempt
        #[arg(long)]
        idempotency_key: Option<String>,
    },
    /// Show an order
    GetOrder { id: String },
    /// List top-ups available for a SIM
    Topups { iccid: String },
    /// Show data usage for a SIM
    Usage { iccid: String },
    /// Generate an idempotency key
    Key { prefix: String, parts: Vec<String> },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config: GatewayConfig = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => config::loader::from_env()?,
    };
    logging::init_logging(&config.observability);

    if let Commands::Key { prefix, parts } = &cli.command {
        println!("{}", generate_idempotency_key(prefix, parts));
        return Ok(());
    }

    let client = ResellerClient::from_config(&config.reseller)?;

    match cli.command {
        Commands::Token => {
            let token = client.access_token().await?;
            print_json(&json!({ "ok": true, "token_prefix": token.chars().take(8).collect::<String>() }))?;
        }
        Commands::Packages { country } => {
            print_json(&client.packages(&country).await?)?;
        }
        Commands::Order {
            package,
            quantity,
            description,
            idempotency_key,
        } => {
            let mut order = OrderRequest::sim(&package);
            order.quantity = quantity;
            order.description = description;
            let key = idempotency_key.unwrap_or_else(|| generate_idempotency_key("order", [&package]));
            eprintln!("Idempotency-Key: {}", key);
            print_json(&client.create_order(&order, &key).await?)?;
        }
        Commands::GetOrder { id } => {
            print_json(&client.order(&id).await?)?;
        }
        Commands::Topups { iccid } => {
            print_json(&client.topups(&iccid).await?)?;
        }
        Commands::Usage { iccid } => {
            print_json(&client.usage(&iccid).await?)?;
        }
        Commands::Key { .. } => {}
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_order_arguments() {
        let cli = Cli::try_parse_from([
            "esim-cli",
            "order",
            "fr-1gb",
            "--quantity",
            "2",
            "--idempotency-key",
            "order-fr-1gb-1-abc",
        ])
        .unwrap();

        match cli.command {
            Commands::Order {
                package,
                quantity,
                description,
                idempotency_key,
            } => {
                assert_eq!(package, "fr-1gb");
                assert_eq!(quantity, 2);
                assert_eq!(description, None);
                assert_eq!(idempotency_key.as_deref(), Some("order-fr-1gb-1-abc"));
            }
            _ => panic!("expected order"),
        }
    }

    #[test]
    fn test_key_takes_trailing_parts() {
        let cli = Cli::try_parse_from(["esim-cli", "key", "topup", "8944500", "fr-1gb"]).unwrap();
        let Commands::Key { prefix, parts } = cli.command else {
            panic!("expected key");
        };
        assert_eq!(prefix, "topup");
        assert_eq!(parts, vec!["8944500", "fr-1gb"]);
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Cli::try_parse_from(["esim-cli"]).is_err());
    }
}

// crates/nanocli/src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nanocore::ExecutionContext;
use nanoruntime::{
    decode_message, encode_message, MessageType, NodeRegistry, NodeRequest,
    NodeRuntime, Payload, RuntimeConfig, XmlElement,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nano")]
#[command(about = "Nanoservice node runner CLI", long_about = None)]
struct Cli {
    /// Show debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one node against a context file
    Run {
        /// Registered node name
        #[arg(short, long)]
        node: String,

        /// Path to the execution context JSON file
        #[arg(short, long)]
        context: Option<PathBuf>,

        /// Abort the node after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// List available node types
    Nodes,

    /// Encode a file as a transport message
    Encode {
        /// Payload type: JSON, XML, TEXT, HTML or BINARY
        #[arg(short, long, default_value = "JSON")]
        r#type: String,

        /// File holding the payload
        file: PathBuf,
    },

    /// Decode a transport message and print its payload
    Decode {
        /// BASE64 or STRING
        #[arg(short, long, default_value = "BASE64")]
        encoding: String,

        /// Payload type: JSON, XML, TEXT, HTML or BINARY
        #[arg(short, long, default_value = "JSON")]
        r#type: String,

        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            node,
            context,
            timeout_ms,
        } => run_node(&node, context, timeout_ms).await?,

        Commands::Nodes => list_nodes(),

        Commands::Encode { r#type, file } => {
            let message_type: MessageType = r#type.parse()?;
            let raw = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            println!("{}", encode_message(&parse_payload(message_type, raw)?)?);
        }

        Commands::Decode {
            encoding,
            r#type,
            message,
        } => {
            let payload = decode_message(&message, encoding.parse()?, r#type.parse()?)?;
            print_payload(payload)?;
        }
    }

    Ok(())
}

fn create_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new();
    nanonodes::register_all(&mut registry);
    registry
}

async fn run_node(node: &str, context: Option<PathBuf>, timeout_ms: Option<u64>) -> Result<()> {
    let context = match context {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("{} is not valid JSON", path.display()))?
        }
        None => ExecutionContext::new().to_value(),
    };

    let runtime = NodeRuntime::with_config(
        Arc::new(create_registry()),
        RuntimeConfig {
            max_execution_time_ms: timeout_ms,
        },
    );

    tracing::debug!(node, "Running node locally");

    // Go through the transport path so the output matches what a server would send
    let reply = runtime
        .handle_request(NodeRequest::json(node, &context))
        .await;
    print_payload(reply.decode()?)
}

fn list_nodes() {
    println!("Available Node Types:");
    println!();

    let registry = create_registry();
    for node_type in registry.list_node_types() {
        if let Some(metadata) = registry.get_metadata(&node_type) {
            println!("  • {} ({})", node_type, metadata.category);
            println!("    {}", metadata.description);
        } else {
            println!("  • {}", node_type);
        }
    }
}

fn parse_payload(message_type: MessageType, raw: Vec<u8>) -> Result<Payload> {
    let payload = match message_type {
        MessageType::Binary => Payload::Binary(raw),
        MessageType::Json => Payload::Json(serde_json::from_slice(&raw)?),
        MessageType::Xml => Payload::Xml(XmlElement::parse(&String::from_utf8(raw)?)?),
        MessageType::Text => Payload::Text(String::from_utf8(raw)?),
        MessageType::Html => Payload::Html(String::from_utf8(raw)?),
    };
    Ok(payload)
}

fn print_payload(payload: Payload) -> Result<()> {
    match payload {
        Payload::Json(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Payload::Xml(root) => println!("{}", root.to_xml()?),
        Payload::Text(text) | Payload::Html(text) => println!("{}", text),
        Payload::Binary(bytes) => std::io::stdout().write_all(&bytes)?,
    }
    Ok(())
}

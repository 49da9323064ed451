//! Poll one meter and print the reading as JSON.

use std::env;
use std::process;

use anyhow::{bail, Result};
use tracing_subscriber::EnvFilter;

use arvaslink::transport::{serial, tcp};
use arvaslink::{Link, Meter, MeterConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        usage();
    }

    let link = match args[1].as_str() {
        "serial" => Link::Serial {
            device: args[2].clone(),
            baud: match args.get(3) {
                Some(baud) => baud.parse()?,
                None => serial::DEFAULT_BAUD,
            },
            timeout: serial::DEFAULT_TIMEOUT,
        },
        "tcp" => Link::Tcp {
            host: args[2].clone(),
            port: match args.get(3) {
                Some(port) => port.parse()?,
                None => tcp::DEFAULT_PORT,
            },
            timeout: tcp::DEFAULT_TIMEOUT,
        },
        other => bail!("unknown link type {other:?}; expected \"serial\" or \"tcp\""),
    };

    let mut config = MeterConfig::new(link);
    if let Ok(address) = env::var("ARVAS_ADDRESS") {
        config.address = address.parse()?;
    }

    let mut meter = Meter::connect(config).await?;
    let reading = meter.read_all().await?;
    meter.disconnect().await?;

    println!("{}", serde_json::to_string_pretty(&reading)?);
    Ok(())
}

fn usage() -> ! {
    eprintln!("Usage: arvas-poll serial <device> [baud]");
    eprintln!("       arvas-poll tcp <host> [port]");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  ARVAS_ADDRESS    meter network address (default: 1)");
    eprintln!("  RUST_LOG         log filter (default: info)");
    process::exit(1);
}

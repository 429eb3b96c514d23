use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use dnssec_signer::clock::{Clock, SystemClock};
use dnssec_signer::dns::DNSPacket;
use dnssec_signer::dns::enums::DNSResourceType;
use dnssec_signer::dns::question::DNSQuestion;
use dnssec_signer::dnssec::{Rrsig, load_key_pair, verify_rrsig};
use dnssec_signer::{ConfigError, ResponseSigner, Result, SignerConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Online DNSSEC signing tools", long_about = None)]
struct Args {
    /// TOML configuration file; DNSSEC_* environment variables apply otherwise
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a key pair and print its DNSKEY and key tag
    KeyInfo {
        /// Key basename, without the .key/.private suffix
        #[arg(short, long)]
        key: Option<PathBuf>,
    },
    /// Sign the key's own DNSKEY RRset, verify it and print the result
    SignDnskey {
        /// Key basename, without the .key/.private suffix
        #[arg(short, long)]
        key: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => SignerConfig::from_file(path)?,
        None => SignerConfig::from_env()?,
    };

    match args.command {
        Command::KeyInfo { key } => {
            let identity = load_key_pair(key_path(key, &config)?)?;
            println!("{}", identity.dnskey());
            println!(
                "; algorithm {} key tag {}{}",
                identity.algorithm(),
                identity.key_tag(),
                if identity.dnskey().is_sep() { " (SEP)" } else { "" }
            );
        }
        Command::SignDnskey { key } => {
            let identity = Arc::new(load_key_pair(key_path(key, &config)?)?);
            let dnskey = identity.dnskey().clone();
            let signer = Arc::new(ResponseSigner::from_config(identity, &config));

            let mut query = DNSPacket::default();
            query.questions.push(DNSQuestion {
                labels: dnskey.owner.clone(),
                qtype: DNSResourceType::DNSKEY,
                qclass: dnskey.class,
            });
            let mut response = DNSPacket::response_to(&query);
            response.answers.push(dnskey.to_resource());

            let (response, result) = signer.sign_response_async(response).await;
            if let Err(e) = result {
                error!("Signing failed: {}", e);
                return Err(e.into());
            }

            let rrset: Vec<_> = response
                .answers
                .iter()
                .filter(|rr| rr.rtype == DNSResourceType::DNSKEY)
                .cloned()
                .collect();
            for record in &response.answers {
                if record.rtype == DNSResourceType::RRSIG {
                    let rrsig = Rrsig::from_rdata(&record.rdata)?;
                    verify_rrsig(&dnskey, &rrsig, &rrset, SystemClock.now())?;
                    info!("RRSIG with key tag {} verified", rrsig.key_tag);
                    println!("{}", dnskey);
                    println!(
                        "{} {} {} RRSIG {}",
                        record.owner(),
                        record.ttl,
                        record.rclass,
                        rrsig
                    );
                }
            }
        }
    }

    Ok(())
}

fn key_path(
    cli: Option<PathBuf>,
    config: &SignerConfig,
) -> std::result::Result<PathBuf, ConfigError> {
    cli.or_else(|| config.key_file.clone())
        .ok_or(ConfigError::MissingKeyFile)
}

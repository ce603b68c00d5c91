//! Process configuration: CLI flags and the optional config file.
//!
//! Flags come first; when `--config-path` names a directory containing a
//! `phiremock.json`, values from that file fill in whatever the command line
//! left unset. The resolved [`Config`] is what the rest of the server
//! consumes. Contradictory TLS settings and malformed config files are fatal
//! configuration errors surfaced before anything binds.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::Parser;
use serde::Deserialize;

/// Default bind address.
const DEFAULT_IP: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
/// Default bind port.
const DEFAULT_PORT: u16 = 8086;
/// File looked up inside `--config-path`.
const CONFIG_FILE_NAME: &str = "phiremock.json";

/// Command line interface of the server binary.
#[derive(Debug, Parser)]
#[command(
    name = "phiremock-server",
    version,
    about = "HTTP mock server for test suites"
)]
pub struct Cli {
    /// Bind address.
    #[arg(long, short = 'i')]
    pub ip: Option<IpAddr>,
    /// Bind port.
    #[arg(long, short = 'p')]
    pub port: Option<u16>,
    /// Directory scanned once at boot for *.json expectation files.
    #[arg(long, short = 'e')]
    pub expectations_dir: Option<PathBuf>,
    /// Raise log verbosity to debug.
    #[arg(long, short = 'd')]
    pub debug: bool,
    /// Directory in which to look for a phiremock.json config file.
    #[arg(long)]
    pub config_path: Option<PathBuf>,
    /// PEM certificate chain; enables TLS together with --certificate-key.
    #[arg(long)]
    pub certificate: Option<PathBuf>,
    /// PEM private key for the certificate.
    #[arg(long)]
    pub certificate_key: Option<PathBuf>,
    /// Passphrase of the certificate key.
    #[arg(long)]
    pub cert_passphrase: Option<String>,
}

/// Values read from `phiremock.json`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct FileConfig {
    ip: Option<IpAddr>,
    port: Option<u16>,
    expectations_dir: Option<PathBuf>,
    debug: Option<bool>,
    certificate: Option<PathBuf>,
    certificate_key: Option<PathBuf>,
    cert_passphrase: Option<String>,
}

/// TLS material locations.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub certificate: PathBuf,
    pub certificate_key: PathBuf,
    pub cert_passphrase: Option<String>,
}

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub ip: IpAddr,
    pub port: u16,
    pub expectations_dir: Option<PathBuf>,
    pub debug: bool,
    pub tls: Option<TlsConfig>,
}

impl Config {
    /// Merges CLI flags with the optional config file and applies defaults.
    pub fn resolve(cli: Cli) -> anyhow::Result<Self> {
        let file = match &cli.config_path {
            Some(dir) => {
                let path = dir.join(CONFIG_FILE_NAME);
                if path.is_file() {
                    let content = std::fs::read_to_string(&path)
                        .with_context(|| format!("cannot read {}", path.display()))?;
                    serde_json::from_str::<FileConfig>(&content)
                        .with_context(|| format!("invalid config file {}", path.display()))?
                } else {
                    FileConfig::default()
                }
            }
            None => FileConfig::default(),
        };

        let certificate = cli.certificate.or(file.certificate);
        let certificate_key = cli.certificate_key.or(file.certificate_key);
        let cert_passphrase = cli.cert_passphrase.or(file.cert_passphrase);

        let tls = match (certificate, certificate_key) {
            (Some(certificate), Some(certificate_key)) => Some(TlsConfig {
                certificate,
                certificate_key,
                cert_passphrase,
            }),
            (None, None) => {
                if cert_passphrase.is_some() {
                    bail!("cert-passphrase requires certificate and certificate-key");
                }
                None
            }
            _ => bail!("certificate and certificate-key must be provided together"),
        };

        Ok(Self {
            ip: cli.ip.or(file.ip).unwrap_or(DEFAULT_IP),
            port: cli.port.or(file.port).unwrap_or(DEFAULT_PORT),
            expectations_dir: cli.expectations_dir.or(file.expectations_dir),
            debug: cli.debug || file.debug.unwrap_or(false),
            tls,
        })
    }

    /// Socket address to bind the listener to.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

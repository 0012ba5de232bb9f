//! # ldap-provision
//!
//! Applies XML change documents to an LDAP directory.
//!
//! ## Usage
//!
//! ```bash
//! ldap-provision --config provision.toml AddGrupo1.xml AddUsuario1.xml ModifyUsuario1.xml
//! ```
//!
//! Documents are processed in the order given, each over its own
//! connection. `--dry-run` validates and prints the planned operations
//! without connecting.
//!
//! ## Output Example
//!
//! ```text
//! AddUsuario1.xml: 1 applied, 1 failed
//!   ✓ add user msilva
//!       add entry cn=msilva,ou=users,dc=example,dc=com [cn, sn, uid, telephoneNumber, userPassword]
//!       add member value cn=msilva,ou=users,dc=example,dc=com on cn=TI,ou=groups,dc=example,dc=com
//!   ❌ add user mbad: Field 'Nome Completo' must contain only letters and spaces, got 'Maria123'
//! ```
//!
//! ## Exit Codes
//!
//! - `0`: every directive of every document was applied
//! - `1`: a document or directive failed
//! - `2`: the configuration is missing or inconsistent

use clap::{ArgAction, Parser, ValueEnum};
use ldap_provisioner::{
    BatchReport, ConfigError, DirectiveExecutor, DirectoryConfig, DocumentProcessor, LdapConnector,
};
use log::{LevelFilter, error};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "ldap-provision", version, about)]
struct Cli {
    /// Change documents, applied in the order given
    #[arg(required = true)]
    documents: Vec<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory URL (ldap:// or ldaps://)
    #[arg(long)]
    url: Option<String>,

    /// DN used for the simple bind
    #[arg(long)]
    bind_dn: Option<String>,

    /// Password used for the simple bind
    #[arg(long, env = "LDAP_BIND_PASSWORD", hide_env_values = true)]
    bind_password: Option<String>,

    /// Container for user entries
    #[arg(long)]
    users_base: Option<String>,

    /// Container for group entries
    #[arg(long)]
    groups_base: Option<String>,

    /// Validate and plan without connecting
    #[arg(long)]
    dry_run: bool,

    /// Report format
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn setup_logging(&self) {
        let level = match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };
        env_logger::Builder::new()
            .filter_level(level)
            .parse_default_env()
            .init();
    }

    fn load_config(&self) -> Result<DirectoryConfig, ConfigError> {
        let base = match &self.config {
            Some(path) => DirectoryConfig::read_file(path)?,
            None => DirectoryConfig::default(),
        };

        let mut builder = base.into_builder();
        if let Some(url) = &self.url {
            builder = builder.url(url);
        }
        if let Some(bind_dn) = &self.bind_dn {
            builder = builder.bind_dn(bind_dn);
        }
        if let Some(password) = &self.bind_password {
            builder = builder.bind_password(password);
        }
        if let Some(users_base) = &self.users_base {
            builder = builder.users_base(users_base);
        }
        if let Some(groups_base) = &self.groups_base {
            builder = builder.groups_base(groups_base);
        }
        builder.build()
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    cli.setup_logging();

    let config = match cli.load_config() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };

    let processor = DocumentProcessor::new(
        LdapConnector::new(Arc::clone(&config)),
        DirectiveExecutor::new(config),
    )
    .dry_run(cli.dry_run);

    let report = processor.process_all(cli.documents.as_slice()).await;

    match cli.format {
        Format::Text => print_text(&report),
        Format::Json => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: cannot serialize report: {}", e);
                return ExitCode::FAILURE;
            }
        },
    }

    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn print_text(report: &BatchReport) {
    for document in &report.documents {
        if let Some(error) = &document.error {
            println!("{}: ❌ {}", document.path.display(), error);
            continue;
        }

        println!(
            "{}: {} applied, {} failed",
            document.path.display(),
            document.succeeded(),
            document.failed_directives()
        );
        for directive in &document.directives {
            match &directive.error {
                None => println!("  ✓ {}", directive.directive),
                Some(error) => println!("  ❌ {}: {}", directive.directive, error),
            }
            for error in &directive.further_errors {
                println!("      ❌ {}", error);
            }
            for operation in &directive.operations {
                println!("      {}", operation);
            }
        }
        if let Some(error) = &document.unbind_error {
            println!("  unbind failed: {}", error);
        }
    }

    println!("\nSummary:");
    println!("  Directives applied: {}", report.directives_succeeded());
    println!("  Directives failed: {}", report.directives_failed());
    println!("  Documents not processed: {}", report.documents_failed());
}

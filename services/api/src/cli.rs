use crate::infra::build_generator;
use crate::server;
use clap::{Args, Parser, Subcommand};
use coi_generator::config::AppConfig;
use coi_generator::error::AppError;
use coi_generator::telemetry;
use coi_generator::workflows::certificate::{
    AdditionalInsured, Address, CoiRequested, Geography,
};

#[derive(Parser, Debug)]
#[command(
    name = "COI Generator",
    about = "Serve or run certificate-of-insurance generation from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Generate certificates for one policy and print the report as JSON
    Generate(GenerateArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug)]
pub(crate) struct GenerateArgs {
    /// Policy identifier shown to customers (policyFoxdenId)
    #[arg(long)]
    pub(crate) policy_id: String,
    /// Market the certificate is issued for (US or CA)
    #[arg(long, value_parser = parse_geography)]
    pub(crate) geography: Geography,
    /// Additional insured / certificate holder name
    #[arg(long)]
    pub(crate) ai_name: String,
    #[arg(long)]
    pub(crate) ai_street: String,
    #[arg(long)]
    pub(crate) ai_city: String,
    /// Province or state abbreviation
    #[arg(long)]
    pub(crate) ai_province: String,
    #[arg(long)]
    pub(crate) ai_postal_code: String,
}

impl GenerateArgs {
    fn into_request(self) -> CoiRequested {
        CoiRequested {
            policy_foxden_id: self.policy_id,
            geography: self.geography,
            additional_insured: AdditionalInsured {
                name: self.ai_name,
                address: Address {
                    street: self.ai_street,
                    city: self.ai_city,
                    province: self.ai_province,
                    postal_code: self.ai_postal_code,
                },
            },
        }
    }
}

fn parse_geography(raw: &str) -> Result<Geography, String> {
    Geography::parse(raw).ok_or_else(|| format!("unsupported geography '{raw}', expected US or CA"))
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Generate(args) => run_generate(args).await,
    }
}

async fn run_generate(args: GenerateArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry, config.environment)?;

    let generator = build_generator(&config)?;
    let report = generator.generate(&args.into_request()).await?;

    let rendered = serde_json::to_string_pretty(&report).map_err(std::io::Error::from)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_arguments_build_request() {
        let cli = Cli::try_parse_from([
            "coi-generator-api",
            "generate",
            "--policy-id",
            "FOX-1001",
            "--geography",
            "ca",
            "--ai-name",
            "Harbourfront Leasing Ltd.",
            "--ai-street",
            "200 Queens Quay W",
            "--ai-city",
            "Toronto",
            "--ai-province",
            "ON",
            "--ai-postal-code",
            "M5J 2Y5",
        ])
        .expect("arguments parse");

        let Some(Command::Generate(args)) = cli.command else {
            panic!("expected generate command");
        };
        let request = args.into_request();
        assert_eq!(request.policy_foxden_id, "FOX-1001");
        assert_eq!(request.geography, Geography::Canada);
        assert_eq!(request.additional_insured.address.postal_code, "M5J 2Y5");
    }

    #[test]
    fn unknown_geography_is_rejected() {
        let result = Cli::try_parse_from([
            "coi-generator-api",
            "generate",
            "--policy-id",
            "FOX-1001",
            "--geography",
            "MX",
            "--ai-name",
            "n",
            "--ai-street",
            "s",
            "--ai-city",
            "c",
            "--ai-province",
            "p",
            "--ai-postal-code",
            "z",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["coi-generator-api"]).expect("parses");
        assert!(cli.command.is_none());
    }
}

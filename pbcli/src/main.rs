//! # pbcli Entry Point
//!
//! 1. **Initialization**: Parses the static command line with [`cli::Cli`] and sets up logging.
//! 2. **Negotiation**: Picks the endpoint for the requested API version via `pbcli_core::negotiate`.
//! 3. **Discovery**: Connects and builds the action registry from the remote schema.
//! 4. **Execution**: Lists calls, documents one, or parses the call parameters and performs the call.
//!
//! Usage errors exit with status 2, every other reported error with status 1.
mod cli;
mod formatter;

use clap::{CommandFactory, error::ErrorKind};
use cli::{Cli, HelpRequest};
use formatter::{ActionList, FormattedString, GenericError};
use pbcli_core::{
    client::{ApiClient, ClientError},
    negotiate::{
        NegotiationRequest, negotiate_endpoint,
        resolve::{ProtocolRequest, RunningClient},
    },
    registry::{ActionRegistry, KEYWORDLESS, KEYWORDS},
    transport::{ConnectOptions, Credentials, GrpcTransport},
};
use serde_json::{Map, Value};
use std::{process, time::Duration};
use tracing_subscriber::EnvFilter;

const PROGRAM: &str = "pbcli";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = cli::parse_from(std::env::args_os()).unwrap_or_else(|err| err.exit());
    init_logging(args.verbose);

    if args.help_request() == Some(HelpRequest::General) {
        print_help();
        return;
    }

    if let Some(keyword) = &args.list {
        validate_keyword(keyword);
    }

    if args.help.is_none() && args.list.is_none() && args.call.is_none() {
        Cli::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "a call is required; use --list to see the available calls",
            )
            .exit();
    }

    if let Err(err) = run(args).await {
        eprintln!("{err}");
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_help() {
    let mut command = Cli::command();
    println!("{}", command.render_long_help());
}

fn validate_keyword(keyword: &str) {
    let valid = keyword == "all" || keyword == KEYWORDLESS || KEYWORDS.iter().any(|k| *k == keyword);
    if !valid {
        let choices = KEYWORDS
            .iter()
            .chain([&KEYWORDLESS, &"all"])
            .copied()
            .collect::<Vec<_>>()
            .join(", ");
        Cli::command()
            .error(
                ErrorKind::InvalidValue,
                format!("invalid keyword '{keyword}' for '--list' (possible values: {choices})"),
            )
            .exit();
    }
}

async fn run(args: Cli) -> Result<(), FormattedString> {
    let client = connect(&args).await?;
    let registry = client.registry();

    if let Some(keyword) = &args.list {
        println!("{}", FormattedString::from(ActionList(registry.group_by_keyword(keyword))));
        return Ok(());
    }

    if let Some(HelpRequest::Call(call)) = args.help_request() {
        let action = registry
            .get(call)
            .ok_or_else(|| pbcli_core::action::CallError::UnknownAction(call.to_string()))?;
        println!("{}", FormattedString(action.command_line_doc(PROGRAM)));
        return Ok(());
    }

    let Some(call) = args.call.as_deref() else {
        return Ok(());
    };

    let arguments = call_arguments(registry, call, &args.call_args)?;
    perform_call(client, call, arguments).await
}

async fn connect(args: &Cli) -> Result<ApiClient<GrpcTransport>, FormattedString> {
    let timeout = Duration::from_secs(args.timeout);

    let running = RunningClient::new(PROGRAM, env!("CARGO_PKG_VERSION"))
        .map_err(|e| GenericError("Invalid client version", e))?;

    let api_version = args
        .api_version
        .as_deref()
        .map(|v| v.parse::<ProtocolRequest>())
        .transpose()
        .map_err(|e| GenericError("Invalid API version", e))?;

    let endpoint = negotiate_endpoint(
        &running,
        NegotiationRequest {
            endpoint: args.endpoint.as_deref(),
            api_version,
            support_matrix_url: &args.support_matrix_url,
            timeout,
        },
    )
    .await?;

    let options = ConnectOptions {
        timeout,
        credentials: credentials(args)?,
        headers: args.headers.clone(),
    };

    let mut transport = GrpcTransport::connect(&endpoint, &options)
        .await
        .map_err(ClientError::from)?;

    if let Some(path) = &args.file_descriptor_set {
        let bytes = std::fs::read(path)?;
        transport = transport.with_file_descriptor(&bytes)?;
    }

    Ok(ApiClient::new(transport).await?)
}

fn credentials(args: &Cli) -> Result<Option<Credentials>, FormattedString> {
    let Some(username) = &args.username else {
        return Ok(None);
    };

    let password = match (&args.password_file, &args.password) {
        (Some(path), _) => std::fs::read_to_string(path)?
            .lines()
            .next()
            .unwrap_or_default()
            .to_string(),
        (None, Some(password)) => password.clone(),
        (None, None) => {
            return Err(GenericError(
                "Missing password",
                "use --password, --password-file or PBCLI_PASSWORD",
            )
            .into());
        }
    };

    Ok(Some(Credentials::new(username.clone(), password)))
}

/// Parses the raw `--name value` pairs given after the call name.
fn call_arguments(
    registry: &ActionRegistry,
    call: &str,
    raw: &[String],
) -> Result<Map<String, Value>, FormattedString> {
    let action = registry
        .get(call)
        .ok_or_else(|| pbcli_core::action::CallError::UnknownAction(call.to_string()))?;

    let names = registry.parameter_names();
    let matches = match cli::call_parameters(call, names).try_get_matches_from(raw) {
        Ok(matches) => matches,
        Err(err) => err.exit(),
    };

    let mut arguments = Map::new();
    for (name, value) in cli::given_parameters(&matches, names) {
        // Names the action does not take are passed through so the call reports them.
        let value = match action.parameter(name) {
            Some(parameter) => parameter.node.parse_value(value)?,
            None => Value::String(value.to_string()),
        };
        arguments.insert(name.to_string(), value);
    }

    Ok(arguments)
}

async fn perform_call(
    mut client: ApiClient<GrpcTransport>,
    call: &str,
    arguments: Map<String, Value>,
) -> Result<(), FormattedString> {
    let shown = arguments
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(", ");
    tracing::info!("Calling {call}({shown})");

    let result = client.call(call, arguments).await?;
    println!("{}", FormattedString::from(result));
    Ok(())
}

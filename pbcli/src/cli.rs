//! # CLI
//!
//! The command line interface of `pbcli`, parsed in two stages with `clap`:
//!
//! 1. [`Cli`] holds the static options and captures the call name and everything after it.
//!    Static options written after the call name are moved in front of it by [`parse_from`].
//! 2. Once the remote schema is known, [`call_parameters`] builds one `--name VALUE` flag per
//!    parameter of any action and parses the captured call arguments with it.
use clap::{Arg, ArgAction, ArgMatches, Command, CommandFactory, Parser};
use pbcli_core::negotiate::matrix::SUPPORT_MATRIX_URL;
use std::{ffi::OsString, path::PathBuf};

#[derive(Parser, Debug)]
#[command(
    name = "pbcli",
    version,
    about = "Command line client for the ProfitBricks API",
    disable_help_flag = true
)]
pub struct Cli {
    /// Show this help, or the documentation of CALL
    #[arg(short = 'h', long = "help", value_name = "CALL", num_args = 0..=1)]
    pub help: Option<Option<String>>,

    /// List the available calls, optionally only those matching KEYWORD
    #[arg(
        short = 'l',
        long = "list",
        value_name = "KEYWORD",
        num_args = 0..=1,
        default_missing_value = "all"
    )]
    pub list: Option<String>,

    /// User name of your account
    #[arg(short = 'u', long, env = "PBCLI_USERNAME")]
    pub username: Option<String>,

    /// Password of your account
    #[arg(short = 'p', long, env = "PBCLI_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Read the password from the first line of a file
    #[arg(long, value_name = "PATH")]
    pub password_file: Option<PathBuf>,

    /// API version to use; without a value, the latest one supported by this client
    #[arg(
        long,
        value_name = "VERSION",
        env = "PBCLI_API_VERSION",
        num_args = 0..=1,
        default_missing_value = "latest"
    )]
    pub api_version: Option<String>,

    /// Endpoint to talk to, skipping the support matrix lookup (e.g. https://api.example.com:443)
    #[arg(long, value_name = "URL", env = "PBCLI_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Where the support matrix is published
    #[arg(long, value_name = "URL", default_value = SUPPORT_MATRIX_URL)]
    pub support_matrix_url: String,

    /// Use a local descriptor set (.bin) instead of Server Reflection
    #[arg(long, value_name = "PATH")]
    pub file_descriptor_set: Option<PathBuf>,

    /// Extra request header, sent with every call
    #[arg(short = 'H', long = "header", value_name = "KEY:VALUE", value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Timeout in seconds for connecting and for every request
    #[arg(long, value_name = "SECS", default_value_t = 180)]
    pub timeout: u64,

    /// Log more (-v: calls, -vv: everything)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// The call to perform
    pub call: Option<String>,

    /// Parameters of the call, as `--name value`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "PARAMETERS")]
    pub call_args: Vec<String>,
}

/// What `-h` asks to be shown.
#[derive(Debug, PartialEq, Eq)]
pub enum HelpRequest<'a> {
    General,
    Call(&'a str),
}

impl Cli {
    /// `-h CALL` and `CALL -h` both document CALL; a bare `-h` shows the general help.
    pub fn help_request(&self) -> Option<HelpRequest<'_>> {
        match (&self.help, &self.call) {
            (None, _) => None,
            (Some(Some(call)), _) | (Some(None), Some(call)) => Some(HelpRequest::Call(call)),
            (Some(None), None) => Some(HelpRequest::General),
        }
    }
}

/// Parses `argv` like [`Parser::try_parse_from`], also accepting static options after the
/// call name (`pbcli createServer --cores 2 --endpoint URL`).
///
/// Anything after a literal `--` is left to the call.
pub fn parse_from<I, T>(argv: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let argv: Vec<OsString> = argv.into_iter().map(Into::into).collect();
    let cli = Cli::try_parse_from(&argv)?;

    let prefix = &argv[..argv.len() - cli.call_args.len()];
    if prefix.iter().any(|token| token == "--") {
        return Ok(cli);
    }

    let (options, call_args) = split_static_options(&cli.call_args);
    if options.is_empty() {
        return Ok(cli);
    }

    Cli::try_parse_from(
        prefix
            .iter()
            .cloned()
            .chain(options.into_iter().map(OsString::from))
            .chain(std::iter::once(OsString::from("--")))
            .chain(call_args.into_iter().map(OsString::from)),
    )
}

/// Separates the static options (with their values) from the call parameters in `tokens`.
fn split_static_options(tokens: &[String]) -> (Vec<String>, Vec<String>) {
    let mut command = Cli::command();
    command.build();

    let mut options = Vec::new();
    let mut call_args = Vec::new();
    let mut tokens = tokens.iter().peekable();

    while let Some(token) = tokens.next() {
        let Some(arg) = static_option(&command, token) else {
            call_args.push(token.clone());
            // Call parameters always carry a value, even one starting with '-'.
            if token.starts_with("--") && !token.contains('=') {
                call_args.extend(tokens.next().cloned());
            }
            continue;
        };

        options.push(token.clone());

        let attached = token.contains('=') || (!token.starts_with("--") && token.len() > 2);
        if !arg.get_action().takes_values() || attached {
            continue;
        }

        let optional = arg.get_num_args().is_some_and(|range| range.min_values() == 0);
        if let Some(value) = tokens.next_if(|next| !(optional && next.starts_with('-'))) {
            options.push(value.clone());
        }
    }

    (options, call_args)
}

fn static_option<'c>(command: &'c Command, token: &str) -> Option<&'c Arg> {
    if let Some(long) = token.strip_prefix("--") {
        let name = long.split_once('=').map_or(long, |(name, _)| name);
        command.get_arguments().find(|arg| arg.get_long() == Some(name))
    } else {
        let short = token.strip_prefix('-')?.chars().next()?;
        command.get_arguments().find(|arg| arg.get_short() == Some(short))
    }
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    s.split_once(':')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| "Format must be 'key:value'".to_string())
}

/// The parser of the arguments of `call`, with one flag per known parameter name.
pub fn call_parameters<'a>(call: &str, names: impl IntoIterator<Item = &'a String>) -> Command {
    names.into_iter().fold(
        Command::new(format!("pbcli {call}"))
            .no_binary_name(true)
            .disable_help_flag(true)
            .disable_version_flag(true),
        |command, name| {
            command.arg(
                Arg::new(name.clone())
                    .long(name.clone())
                    .value_name("VALUE")
                    .action(ArgAction::Set)
                    .allow_hyphen_values(true)
                    .help_heading("Call Parameters"),
            )
        },
    )
}

/// The raw values given for known parameters, in parameter name order.
pub fn given_parameters<'a>(
    matches: &'a ArgMatches,
    names: impl IntoIterator<Item = &'a String>,
) -> Vec<(&'a str, &'a str)> {
    names
        .into_iter()
        .filter_map(|name| {
            matches
                .get_one::<String>(name)
                .map(|value| (name.as_str(), value.as_str()))
        })
        .collect()
}

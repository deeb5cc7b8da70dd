use colored::*;
use pbcli_core::{
    action::CallError, client::ClientError, negotiate::NegotiationError, prost_reflect,
    schema::ValueError,
};
use std::fmt::Display;

/// A wrapper struct for a formatted, colored string.
///
/// Implements `Display` so it can be printed directly.
#[derive(Debug)]
pub struct FormattedString(pub String);

/// Action names grouped by keyword, as returned by `ActionRegistry::group_by_keyword`.
pub struct ActionList<'a>(pub Vec<(&'static str, Vec<&'a str>)>);

pub struct GenericError<T: Display>(pub &'static str, pub T);

impl std::fmt::Display for FormattedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}", self.0)?;
        Ok(())
    }
}

impl From<serde_json::Value> for FormattedString {
    fn from(value: serde_json::Value) -> Self {
        FormattedString(serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()))
    }
}

impl From<CallError> for FormattedString {
    fn from(err: CallError) -> Self {
        match err {
            CallError::UnknownAction(_) => FormattedString(format!(
                "{}\nTo see a list of valid calls, use --list.",
                err.to_string().red().bold()
            )),
            CallError::WrongCredentials(_) => FormattedString(err.to_string().red().bold().to_string()),
            err => FormattedString(format!("{}\n\n'{}'", "Call Failed:".red().bold(), err)),
        }
    }
}

impl From<ClientError> for FormattedString {
    fn from(err: ClientError) -> Self {
        let title = match err {
            ClientError::Connect(_) => "Connection Error:",
            ClientError::SchemaFetch(_) | ClientError::Schema(_) => "Schema Discovery Failed:",
        };
        FormattedString(format!("{}\n\n'{}'", title.red().bold(), err))
    }
}

impl From<NegotiationError> for FormattedString {
    fn from(err: NegotiationError) -> Self {
        FormattedString(format!(
            "{}\n\n{}",
            "Could not select an endpoint:".red().bold(),
            err
        ))
    }
}

impl From<ValueError> for FormattedString {
    fn from(err: ValueError) -> Self {
        FormattedString(format!("{}\n\n'{}'", "Invalid Parameter:".red().bold(), err))
    }
}

impl From<prost_reflect::DescriptorError> for FormattedString {
    fn from(err: prost_reflect::DescriptorError) -> Self {
        FormattedString(format!(
            "{}\n\n'{}'",
            "Failed to parse file descriptor:".red().bold(),
            err
        ))
    }
}

impl From<std::io::Error> for FormattedString {
    fn from(err: std::io::Error) -> Self {
        FormattedString(format!(
            "{}\n\n'{}'",
            "Failed to read file:".red().bold(),
            err
        ))
    }
}

impl<T: Display> From<GenericError<T>> for FormattedString {
    fn from(GenericError(msg, err): GenericError<T>) -> Self {
        FormattedString(format!("{}:\n\n'{}'", msg.red().bold(), err))
    }
}

impl From<ActionList<'_>> for FormattedString {
    fn from(ActionList(groups): ActionList<'_>) -> Self {
        if groups.is_empty() {
            return FormattedString("No calls found.".yellow().to_string());
        }

        let mut out = String::new();
        for (keyword, names) in groups {
            out.push_str(&format!("{}\n", format!("{keyword} calls:").cyan().bold()));
            for name in names {
                out.push_str(&format!("{}{}\n", pbcli_core::INDENTATION, name.green()));
            }
            out.push('\n');
        }
        FormattedString(out.trim_end().to_string())
    }
}

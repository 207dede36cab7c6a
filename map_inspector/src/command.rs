use std::num::ParseIntError;

use cemetery_core::{parse_interment_date, ExhumationDraft};
use plot_proto::{ExhumationStatus, PlotPatch, PlotStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
    #[error("invalid integer '{value}' for {context}: {source}")]
    InvalidInteger {
        value: String,
        context: &'static str,
        source: ParseIntError,
    },
    #[error("unknown plot field '{0}'")]
    UnknownField(String),
    #[error("unknown form field '{0}'")]
    UnknownFormField(String),
    #[error("invalid status '{0}'")]
    InvalidStatus(String),
    #[error("invalid interment date '{0}'")]
    InvalidDate(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Plot,
    Name,
    Email,
    Phone,
    Relationship,
    Reason,
    Destination,
    Document,
}

impl FormField {
    fn parse(raw: &str) -> Result<Self, CommandParseError> {
        match raw.to_ascii_lowercase().as_str() {
            "plot" => Ok(FormField::Plot),
            "name" => Ok(FormField::Name),
            "email" => Ok(FormField::Email),
            "phone" => Ok(FormField::Phone),
            "relationship" | "relation" => Ok(FormField::Relationship),
            "reason" => Ok(FormField::Reason),
            "destination" | "dest" => Ok(FormField::Destination),
            "document" | "doc" => Ok(FormField::Document),
            other => Err(CommandParseError::UnknownFormField(other.to_string())),
        }
    }

    pub fn apply(self, draft: &mut ExhumationDraft, value: &str) {
        let optional = || Some(value.to_string()).filter(|v| !v.is_empty());
        match self {
            FormField::Plot => draft.plot_id = value.to_string(),
            FormField::Name => draft.requester_name = value.to_string(),
            FormField::Email => draft.requester_email = value.to_string(),
            FormField::Phone => draft.requester_phone = optional(),
            FormField::Relationship => draft.relationship = optional(),
            FormField::Reason => draft.reason = value.to_string(),
            FormField::Destination => draft.destination_plot = optional(),
            FormField::Document => {
                if !value.is_empty() {
                    draft.documents.push(value.to_string());
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InspectorCommand {
    /// Click a map element by id.
    Goto(String),
    Level(u8),
    Open(String),
    Back,
    Set { plot_id: String, patch: PlotPatch },
    Clear(String),
    Refresh,
    Directions(Option<String>),
    Form { field: FormField, value: String },
    Submit,
    Requests,
    Review { id: String, status: ExhumationStatus },
}

/// Remainder of the line after `skip` words, with inner spacing kept.
fn rest_after<'a>(line: &'a str, skip: usize) -> &'a str {
    let mut rest = line.trim_start();
    for _ in 0..skip {
        rest = rest
            .find(char::is_whitespace)
            .map(|at| rest[at..].trim_start())
            .unwrap_or("");
    }
    rest.trim()
}

fn parse_set(plot_id: &str, field: &str, value: &str) -> Result<PlotPatch, CommandParseError> {
    // "-" clears a field
    let text = if value == "-" { String::new() } else { value.to_string() };
    let mut patch = PlotPatch::default();
    match field.to_ascii_lowercase().as_str() {
        "name" | "occupant" => patch.occupant_name = Some(text),
        "status" => {
            if !text.is_empty() && text.parse::<PlotStatus>().is_err() {
                return Err(CommandParseError::InvalidStatus(text));
            }
            patch.status = Some(text.to_ascii_lowercase());
        }
        "date" | "interment" => {
            if !text.is_empty() && parse_interment_date(&text).is_none() {
                return Err(CommandParseError::InvalidDate(text));
            }
            patch.date_of_interment = Some(text);
        }
        "section" => patch.section = Some(text),
        "level" => patch.level = Some(parse_u8(&text, "plot level")?),
        "age" => patch.age = Some(parse_u32(&text, "occupant age")?),
        "religion" => patch.religion = Some(text),
        "kin" | "next_of_kin" => patch.next_of_kin = Some(text),
        "contact" => patch.contact_number = Some(text),
        "notes" => patch.notes = Some(text),
        other => return Err(CommandParseError::UnknownField(other.to_string())),
    }
    if plot_id.is_empty() {
        return Err(CommandParseError::MissingArgument("plot id"));
    }
    Ok(patch)
}

pub fn parse_command_line(input: &str) -> Result<InspectorCommand, CommandParseError> {
    let trimmed = input.trim().trim_start_matches(':');
    if trimmed.trim().is_empty() {
        return Err(CommandParseError::Empty);
    }

    let mut parts = trimmed.split_whitespace();
    let verb = parts
        .next()
        .map(|v| v.to_ascii_lowercase())
        .ok_or(CommandParseError::Empty)?;

    match verb.as_str() {
        "goto" | "click" => {
            let id = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("element id"))?;
            Ok(InspectorCommand::Goto(id.to_string()))
        }
        "level" => {
            let level_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("level"))?;
            Ok(InspectorCommand::Level(parse_u8(level_str, "level")?))
        }
        "open" | "tomb" => {
            let id = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("tomb id"))?;
            Ok(InspectorCommand::Open(id.to_string()))
        }
        "back" => Ok(InspectorCommand::Back),
        "set" => {
            let plot_id = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("plot id"))?;
            let field = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("field"))?;
            let value = rest_after(trimmed, 3);
            if value.is_empty() {
                return Err(CommandParseError::MissingArgument("value"));
            }
            let patch = parse_set(plot_id, field, value)?;
            Ok(InspectorCommand::Set {
                plot_id: plot_id.to_string(),
                patch,
            })
        }
        "clear" => {
            let plot_id = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("plot id"))?;
            Ok(InspectorCommand::Clear(plot_id.to_string()))
        }
        "refresh" => Ok(InspectorCommand::Refresh),
        "directions" | "dir" => Ok(InspectorCommand::Directions(parts.next().map(str::to_string))),
        "form" => {
            let field_str = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("form field"))?;
            let field = FormField::parse(field_str)?;
            Ok(InspectorCommand::Form {
                field,
                value: rest_after(trimmed, 2).to_string(),
            })
        }
        "submit" => Ok(InspectorCommand::Submit),
        "requests" => Ok(InspectorCommand::Requests),
        "approve" | "reject" | "complete" => {
            let id = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("request id"))?;
            let status = match verb.as_str() {
                "approve" => ExhumationStatus::Approved,
                "reject" => ExhumationStatus::Rejected,
                _ => ExhumationStatus::Completed,
            };
            Ok(InspectorCommand::Review {
                id: id.to_string(),
                status,
            })
        }
        other => Err(CommandParseError::UnknownCommand(other.to_string())),
    }
}

fn parse_u8(value: &str, context: &'static str) -> Result<u8, CommandParseError> {
    value
        .parse::<u8>()
        .map_err(|source| CommandParseError::InvalidInteger {
            value: value.to_string(),
            context,
            source,
        })
}

fn parse_u32(value: &str, context: &'static str) -> Result<u32, CommandParseError> {
    value
        .parse::<u32>()
        .map_err(|source| CommandParseError::InvalidInteger {
            value: value.to_string(),
            context,
            source,
        })
}

//! Nom-based IRC line parser.
//!
//! This module splits a single line (terminators already removed) into its
//! raw components using the nom parser combinator library. Interpretation of
//! the pieces (tag unescaping, hostmask splitting, case normalization) happens
//! in [`Message`](super::Message).

use nom::{
    branch::alt,
    bytes::complete::{take_till, take_till1, take_while, take_while1},
    character::complete::char,
    combinator::{eof, opt, peek},
    error::{context, VerboseError, VerboseErrorKind},
    sequence::{preceded, terminated},
    IResult,
};

use crate::error::MessageParseError;

type ParseResult<I, O> = IResult<I, O, VerboseError<I>>;

fn spaces(input: &str) -> ParseResult<&str, &str> {
    take_while(|c| c == ' ')(input)
}

fn spaces1(input: &str) -> ParseResult<&str, &str> {
    take_while1(|c| c == ' ')(input)
}

/// Parse IRCv3 message tags (the part after `@` and before the first space).
fn parse_tags(input: &str) -> ParseResult<&str, &str> {
    context(
        "parsing IRCv3 message tags",
        terminated(preceded(char('@'), take_till(|c| c == ' ')), spaces1),
    )(input)
}

/// Parse message prefix (the part after `:` and before the first space).
fn parse_prefix(input: &str) -> ParseResult<&str, &str> {
    context(
        "parsing message prefix",
        terminated(preceded(char(':'), take_till1(|c| c == ' ')), spaces1),
    )(input)
}

/// Parse the command name: letters and digits, followed by a space or the
/// end of the line.
fn parse_command(input: &str) -> ParseResult<&str, &str> {
    context(
        "parsing IRC command",
        terminated(
            take_while1(|c: char| c.is_ascii_alphanumeric()),
            peek(alt((spaces1, eof))),
        ),
    )(input)
}

/// Parse a complete IRC line into its components.
///
/// IRC message format:
/// ```text
/// [@tags] [:prefix] <command> [params...] [:trailing]
/// ```
pub fn parse_message(input: &str) -> ParseResult<&str, ParsedMessage<'_>> {
    let (input, _) = spaces(input)?;
    let (input, tags) = opt(parse_tags)(input)?;
    let (input, prefix) = opt(parse_prefix)(input)?;
    let (input, command) = parse_command(input)?;

    let mut params: Vec<&str> = Vec::new();
    let mut rest = input;

    loop {
        let (after_spaces, _) = spaces(rest)?;
        if after_spaces.is_empty() {
            rest = after_spaces;
            break;
        }

        if let Some(trailing) = after_spaces.strip_prefix(':') {
            // Trailing parameter: everything to the end of the line.
            params.push(trailing);
            rest = "";
            break;
        }

        let (after_param, param) = take_till1(|c| c == ' ')(after_spaces)?;
        params.push(param);
        rest = after_param;
    }

    Ok((
        rest,
        ParsedMessage {
            tags,
            prefix,
            command,
            params,
        },
    ))
}

/// A parsed IRC line with borrowed string slices.
///
/// This is the intermediate representation produced by the nom parser.
/// It holds references into the original input string.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMessage<'a> {
    /// Raw tags string (without the leading `@`), if present.
    pub tags: Option<&'a str>,
    /// Raw prefix string (without the leading `:`), if present.
    pub prefix: Option<&'a str>,
    /// The command name, as it appeared on the wire.
    pub command: &'a str,
    /// Command parameters, including trailing.
    pub params: Vec<&'a str>,
}

impl<'a> ParsedMessage<'a> {
    /// Parse an IRC line into a `ParsedMessage`.
    ///
    /// The line must not contain CR or LF; framing is the caller's job.
    pub fn parse(input: &'a str) -> Result<Self, MessageParseError> {
        if input.trim().is_empty() {
            return Err(MessageParseError::EmptyMessage);
        }

        match parse_message(input) {
            Ok((_remaining, msg)) => Ok(msg),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                // Report the outermost context and the position it failed at.
                let mut position = input.len();
                let mut context_info = None;
                for (error_input, error_kind) in &e.errors {
                    position = input.len() - error_input.len();
                    if let VerboseErrorKind::Context(ctx) = error_kind {
                        context_info = Some(*ctx);
                    }
                }

                match context_info {
                    Some(ctx) => Err(MessageParseError::ParseContext {
                        position,
                        context: ctx.to_owned(),
                    }),
                    None => Err(MessageParseError::InvalidCommand),
                }
            }
            Err(nom::Err::Incomplete(_)) => Err(MessageParseError::ParseContext {
                position: input.len(),
                context: "incomplete input".to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_command() {
        let msg = ParsedMessage::parse("PING").unwrap();
        assert_eq!(msg.command, "PING");
        assert!(msg.tags.is_none());
        assert!(msg.prefix.is_none());
        assert!(msg.params.is_empty());
    }

    #[test]
    fn test_parse_command_with_params() {
        let msg = ParsedMessage::parse("PRIVMSG #channel :Hello, world!").unwrap();
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.params, vec!["#channel", "Hello, world!"]);
    }

    #[test]
    fn test_parse_with_tags_and_prefix() {
        let msg = ParsedMessage::parse("@time=2023-01-01T00:00:00Z :nick PRIVMSG #ch :Hi").unwrap();
        assert_eq!(msg.tags, Some("time=2023-01-01T00:00:00Z"));
        assert_eq!(msg.prefix, Some("nick"));
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.params, vec!["#ch", "Hi"]);
    }

    #[test]
    fn test_parse_trailing_keeps_spaces() {
        let msg = ParsedMessage::parse("CMD a b :c d  e").unwrap();
        assert_eq!(msg.params, vec!["a", "b", "c d  e"]);
    }

    #[test]
    fn test_parse_collapses_repeated_spaces() {
        let msg = ParsedMessage::parse(":srv  MODE   #chan  +o   nick ").unwrap();
        assert_eq!(msg.command, "MODE");
        assert_eq!(msg.params, vec!["#chan", "+o", "nick"]);
    }

    #[test]
    fn test_parse_empty_trailing() {
        let msg = ParsedMessage::parse("PRIVMSG #channel :").unwrap();
        assert_eq!(msg.params, vec!["#channel", ""]);
    }

    #[test]
    fn test_parse_numeric_response() {
        let msg = ParsedMessage::parse(":server 001 nick :Welcome").unwrap();
        assert_eq!(msg.prefix, Some("server"));
        assert_eq!(msg.command, "001");
        assert_eq!(msg.params, vec!["nick", "Welcome"]);
    }

    #[test]
    fn test_parse_failures() {
        assert_eq!(
            ParsedMessage::parse("   "),
            Err(MessageParseError::EmptyMessage)
        );
        assert!(ParsedMessage::parse("@a=b").is_err());
        assert!(ParsedMessage::parse(":nick").is_err());
        assert!(ParsedMessage::parse(":nick PRIV-MSG x").is_err());
        assert!(ParsedMessage::parse("@a=b :nick").is_err());
    }
}

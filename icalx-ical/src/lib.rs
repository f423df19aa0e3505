pub mod grammar;
pub mod unfold;
pub mod content_line;
pub mod component;
pub mod values;
pub mod properties;

use thiserror::Error;

#[derive(Clone, Debug, PartialEq)]
pub struct ParserError<'a> {
    span: ParserInput<'a>,
    message: Option<String>,
    context: Vec<String>,
}

impl<'a> std::fmt::Display for ParserError<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let message = self.message.clone().unwrap_or(String::from("-"));
        let context = self.context.join(" <- ");

        write!(f, "{message} in {context}")
    }
}

impl<'a> ParserError<'a> {
    pub fn new(message: String, span: ParserInput<'a>) -> Self {
        Self {
            span,
            message: Some(message),
            context: Vec::new(),
        }
    }

    pub fn span(&self) -> &ParserInput {
        &self.span
    }

    pub fn line(&self) -> u32 {
        self.span().location_line()
    }

    pub fn offset(&self) -> usize {
        self.span().location_offset()
    }
}

impl<'a> nom::error::ParseError<ParserInput<'a>> for ParserError<'a> {
    fn from_error_kind(input: ParserInput<'a>, kind: nom::error::ErrorKind) -> Self {
        Self::new(format!("parse error {:?}", kind), input)
    }

    fn append(_input: ParserInput<'a>, _kind: nom::error::ErrorKind, other: Self) -> Self {
        other
    }

    fn from_char(input: ParserInput<'a>, unexpected: char) -> Self {
        Self::new(format!("unexpected character '{}'", unexpected), input)
    }
}

impl<'a> nom::error::ContextError<ParserInput<'a>> for ParserError<'a> {
    fn add_context(_input: ParserInput, context: &'static str, mut other: Self) -> Self {
        other.context.push(String::from(context));
        other
    }
}

impl<'a, E> nom::error::FromExternalError<ParserInput<'a>, E> for ParserError<'a>
where
    E: ToString,
{
    fn from_external_error(input: ParserInput<'a>, _kind: nom::error::ErrorKind, error: E) -> Self {
        Self::new(error.to_string(), input)
    }
}

pub fn convert_error<I: core::ops::Deref<Target = str>>(_input: I, error: ParserError) -> String {
    format!("{error}")
}

pub type ParserInput<'a> = nom_locate::LocatedSpan<&'a str>;
pub type ParserResult<'a, O> = nom::IResult<ParserInput<'a>, O, ParserError<'a>>;

/// Shared by every lexical, parameter, value and property type in this crate: parse from an
/// RFC 5545 content line fragment, render back to one, optionally validate.
pub trait ICalendarEntity {
    fn parse_ical(input: ParserInput) -> ParserResult<Self>
    where
        Self: Sized;

    fn render_ical(&self) -> String;

    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

impl<T> ICalendarEntity for Option<T>
where
    T: ICalendarEntity,
{
    fn parse_ical(input: ParserInput) -> ParserResult<Self> {
        T::parse_ical(input).map(|(remaining, parsed)| (remaining, Some(parsed)))
    }

    fn render_ical(&self) -> String {
        self.as_ref().map(ICalendarEntity::render_ical).unwrap_or_default()
    }

    fn validate(&self) -> Result<(), String> {
        self.as_ref().map(ICalendarEntity::validate).unwrap_or(Ok(()))
    }
}

#[macro_export]
macro_rules! impl_icalendar_entity_traits {
    ($entity:ident) => {
        impl std::str::FromStr for $entity {
            type Err = String;

            fn from_str(input: &str) -> Result<Self, Self::Err> {
                let parser_result = nom::combinator::all_consuming(Self::parse_ical)(input.into());

                match parser_result {
                    Ok((_remaining, value)) => Ok(value),

                    Err(error) => {
                        if let nom::Err::Error(error) = error {
                            Err($crate::convert_error(input, error))
                        } else {
                            Err(error.to_string())
                        }
                    }
                }
            }
        }

        impl ToString for $entity {
            fn to_string(&self) -> String {
                self.render_ical()
            }
        }
    };
}

/// Lexical and structural errors raised while unfolding and tokenizing content lines, short of
/// anything needing typed-value knowledge (see [`DecodeError`] for that).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
    #[error("line {line} is a continuation with no preceding logical line")]
    DanglingContinuation { line: u32 },

    #[error("unterminated quoted parameter value starting at line {line}")]
    UnterminatedQuotedString { line: u32 },
}

/// Component nesting and content-line grammar errors raised by [`component`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("{0}")]
    Grammar(String),

    #[error("END:{found} does not match open BEGIN:{expected}")]
    MismatchedEnd { expected: String, found: String },

    #[error("END:{0} with no matching BEGIN")]
    UnmatchedEnd(String),

    #[error("unexpected end of input with {0} component(s) still open")]
    UnclosedComponent(usize),

    #[error("property line outside of any component")]
    PropertyOutsideComponent,
}

impl<'a> From<ParserError<'a>> for ParseError {
    fn from(error: ParserError<'a>) -> Self {
        ParseError::Grammar(error.to_string())
    }
}

/// Errors raised bridging raw grammar-level values into the typed value space (dates,
/// durations, recurrence rules) described by the calendar's property table.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("property {property} value {value:?} does not match its declared type")]
    ValueTypeMismatch { property: String, value: String },

    #[error("property {property} has VALUE={declared} but a TZID parameter was also present")]
    ValueTzidConflict { property: String, declared: String },

    #[error("UNTIL value type does not match DTSTART's value type")]
    UntilTypeMismatch,

    #[error("{0}")]
    Grammar(String),
}

impl<'a> From<ParserError<'a>> for DecodeError {
    fn from(error: ParserError<'a>) -> Self {
        DecodeError::Grammar(error.to_string())
    }
}

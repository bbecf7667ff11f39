// Configuration Module
// Config model, YAML/JSON parser and exporter

pub mod error;
pub mod export;
pub mod models;
pub mod parser;

pub use error::{ParseError, ParseErrorKind, ParseResult};
pub use models::{ComponentDecl, Config, ModuleDecl, SchemeDecl, Section, SectionDecl};
pub use parser::ConfigParser;

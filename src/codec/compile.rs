//! # Shape Compiler
//!
//! Turns a [`Shape`] description into a [`Blueprint`] layout. Compilation is
//! where bounds are resolved (string and slice maxima come from field
//! annotations or serializer constructor arguments), platform-word integers
//! pick their width, unsupported kinds are rejected, and recursive record
//! definitions are detected.
//!
//! ## Field annotations
//!
//! Record fields carry an annotation string with the grammar
//! `property[=value](;property[=value])*`. Recognized properties:
//!
//! | Property | Effect |
//! |----------|--------|
//! | `size=N` | maximum length for a string or slice field |
//! | `elementsize=N` | maximum length for string elements of a slice |
//! | `ignored` | the field contributes no bytes to the layout |
//!
//! Property names are case-insensitive and whitespace around names and
//! values is trimmed; empty segments are skipped. Anything else fails with
//! [`SchemaError::InvalidAnnotation`].

use hashbrown::HashMap;
use thiserror::Error;

use super::blueprint::{Blueprint, FieldLayout};
use super::shape::{Field, Shape};

/// Failure modes of schema compilation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("kind {0} is not supported")]
    UnsupportedType(&'static str),
    #[error("maximum length must be set for strings and slices")]
    LengthMustBeSet,
    #[error("annotation has invalid format: {0}")]
    InvalidAnnotation(String),
    #[error("record {0} cannot contain itself")]
    RecursiveRecord(&'static str),
}

/// Bounds and flags resolved for the shape currently being compiled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Config {
    pub length: u32,
    pub element_length: u32,
    pub ignore: bool,
}

impl Config {
    pub(crate) fn with_length(length: u32) -> Self {
        Self {
            length,
            ..Self::default()
        }
    }

    pub(crate) fn with_lengths(length: u32, element_length: u32) -> Self {
        Self {
            length,
            element_length,
            ignore: false,
        }
    }
}

pub(crate) fn parse_annotation(raw: &str) -> Result<Config, SchemaError> {
    let mut config = Config::default();
    for property in raw.split(';') {
        let mut parts = property.splitn(2, '=');
        let name = parts.next().unwrap_or("").trim().to_ascii_lowercase();
        let value = parts.next();
        match name.as_str() {
            "size" => config.length = parse_bound(&name, value)?,
            "elementsize" => config.element_length = parse_bound(&name, value)?,
            "ignored" => config.ignore = true,
            "" => continue,
            other => {
                return Err(SchemaError::InvalidAnnotation(format!(
                    "unknown property {other}"
                )))
            }
        }
    }
    Ok(config)
}

fn parse_bound(name: &str, value: Option<&str>) -> Result<u32, SchemaError> {
    let value = value.ok_or_else(|| {
        SchemaError::InvalidAnnotation(format!("property {name} must have a value"))
    })?;
    value.trim().parse().map_err(|_| {
        SchemaError::InvalidAnnotation(format!("property {name} must be an unsigned integer"))
    })
}

/// Compiles a shape into its layout. Bounds in `config` apply to the
/// outermost shape; nested bounds come from field annotations.
pub(crate) fn compile(shape: &Shape, config: Config) -> Result<Blueprint, SchemaError> {
    let mut ctx = Context::default();
    ctx.compile(shape, config)
}

/// Per-compilation state: the records currently being built (recursion
/// detection) and the ones already finished (memo, keyed by record name).
#[derive(Default)]
struct Context {
    building: Vec<&'static str>,
    finished: HashMap<&'static str, Blueprint>,
}

impl Context {
    fn compile(&mut self, shape: &Shape, config: Config) -> Result<Blueprint, SchemaError> {
        match shape {
            Shape::Bool => Ok(Blueprint::Bool),
            Shape::U8 => Ok(Blueprint::U8),
            Shape::U16 => Ok(Blueprint::U16),
            Shape::U32 => Ok(Blueprint::U32),
            Shape::U64 => Ok(Blueprint::U64),
            Shape::I8 => Ok(Blueprint::I8),
            Shape::I16 => Ok(Blueprint::I16),
            Shape::I32 => Ok(Blueprint::I32),
            Shape::I64 => Ok(Blueprint::I64),
            #[cfg(target_pointer_width = "64")]
            Shape::Usize => Ok(Blueprint::U64),
            #[cfg(target_pointer_width = "32")]
            Shape::Usize => Ok(Blueprint::U32),
            #[cfg(target_pointer_width = "64")]
            Shape::Isize => Ok(Blueprint::I64),
            #[cfg(target_pointer_width = "32")]
            Shape::Isize => Ok(Blueprint::I32),
            Shape::F32 => Ok(Blueprint::F32),
            Shape::F64 => Ok(Blueprint::F64),
            Shape::C64 => Ok(Blueprint::C64),
            Shape::C128 => Ok(Blueprint::C128),
            Shape::Str => {
                if config.length == 0 {
                    return Err(SchemaError::LengthMustBeSet);
                }
                Ok(Blueprint::Str { max: config.length })
            }
            Shape::Slice(element) => {
                if config.length == 0 {
                    return Err(SchemaError::LengthMustBeSet);
                }
                let element = self.compile(element, Config::with_length(config.element_length))?;
                Ok(Blueprint::Slice {
                    max: config.length,
                    element: Box::new(element),
                })
            }
            Shape::Array(len, element) => {
                let element = self.compile(element, Config::with_length(config.element_length))?;
                Ok(Blueprint::Array {
                    len: *len,
                    element: Box::new(element),
                })
            }
            Shape::Pointer(element) => {
                let element = self.compile(element, config)?;
                Ok(Blueprint::Pointer {
                    element: Box::new(element),
                })
            }
            Shape::Tuple(first, second) => {
                let first = self.compile(first, Config::default())?;
                let second = self.compile(second, Config::default())?;
                Ok(Blueprint::Tuple {
                    first: Box::new(first),
                    second: Box::new(second),
                })
            }
            Shape::Record { name, fields } => self.compile_record(*name, fields),
            Shape::Unsupported(kind) => Err(SchemaError::UnsupportedType(*kind)),
        }
    }

    fn compile_record(
        &mut self,
        name: &'static str,
        fields: &[Field],
    ) -> Result<Blueprint, SchemaError> {
        if self.building.contains(&name) {
            return Err(SchemaError::RecursiveRecord(name));
        }
        if let Some(done) = self.finished.get(name) {
            return Ok(done.clone());
        }

        self.building.push(name);
        let mut compiled = Vec::with_capacity(fields.len());
        let mut size = 0;
        for (index, field) in fields.iter().enumerate() {
            let config = parse_annotation(field.annotation)?;
            if config.ignore {
                continue;
            }
            let layout = self.compile(&field.shape, config)?;
            size += layout.size();
            compiled.push(FieldLayout {
                name: field.name.to_owned(),
                index,
                layout,
            });
        }
        self.building.pop();

        let record = Blueprint::Record {
            name: (*name).to_owned(),
            fields: compiled,
            size,
        };
        self.finished.insert(name, record.clone());
        Ok(record)
    }
}

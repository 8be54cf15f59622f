//! # Fixed-Size Binary Codec
//!
//! Every structure `eternal` puts on disk, including the file header, tree
//! metadata, and each node slot, is framed by this codec. Its defining
//! property is
//! that a compiled layout has a *static* size: serializing any value of a
//! given schema produces exactly `size()` bytes, with variable-length
//! content padded to its declared bound. Fixed-width slots are what make
//! node addresses a pure function of the node id.
//!
//! ## Pipeline
//!
//! ```text
//! Shape (type description)
//!    |  compile()           bounds resolved, recursion rejected
//!    v
//! Blueprint (layout tree)
//!    |  size / describe     static size, canonical description
//!    |  encode / decode     driven through the Schematic trait
//!    v
//! [u8; size()]              big-endian, content-independent width
//! ```
//!
//! A [`Serializer`] owns one compiled blueprint and pairs it with the value
//! type at the type level, so a layout can never be applied to a value it
//! was not compiled from.
//!
//! ## Schema signatures
//!
//! [`Serializer::signature`] hashes the blueprint's canonical description
//! with SHA-512. The persistent storage stores the signature of its node
//! payload layout in the file header and refuses files whose stored
//! signature differs, so schema drift is detected before any slot is read.
//!
//! ## Example
//!
//! ```ignore
//! use eternal::codec::Serializer;
//!
//! let keys: Serializer<String> = Serializer::for_str(5)?;
//! let bytes = keys.encode(&"hello".to_owned());
//! assert_eq!(bytes.len(), keys.size()); // 4-byte length prefix + 5 bytes
//! ```

mod blueprint;
mod compile;
mod shape;


use std::marker::PhantomData;

use sha2::{Digest, Sha512};

pub use blueprint::{Blueprint, FieldLayout};
pub use compile::SchemaError;
pub use shape::{Complex32, Complex64, Field, Schematic, Shape};

use compile::Config;

/// Bytes in a schema signature (SHA-512 digest width).
pub const SIGNATURE_LEN: usize = 64;

/// Schema signature: SHA-512 of a blueprint's canonical description.
pub type Signature = [u8; SIGNATURE_LEN];

/// A compiled, fixed-size codec for values of type `T`.
#[derive(Debug, Clone)]
pub struct Serializer<T> {
    blueprint: Blueprint,
    size: usize,
    _values: PhantomData<fn() -> T>,
}

impl<T: Schematic> Serializer<T> {
    /// Compiles `T`'s shape with no outer bounds. Fails when the shape
    /// needs a length bound (strings, slices) or contains an unsupported
    /// or recursive definition.
    pub fn new() -> Result<Self, SchemaError> {
        Self::with_config(Config::default())
    }

    fn with_config(config: Config) -> Result<Self, SchemaError> {
        let blueprint = compile::compile(&T::shape(), config)?;
        Ok(Self::from_blueprint(blueprint))
    }

    fn from_blueprint(blueprint: Blueprint) -> Self {
        Self {
            size: blueprint.size(),
            blueprint,
            _values: PhantomData,
        }
    }

    /// Exact encoded size in bytes, independent of content.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Serializes `value` into a freshly allocated, exactly-sized buffer.
    pub fn encode(&self, value: &T) -> Vec<u8> {
        let mut buf = vec![0; self.size];
        value.encode(&self.blueprint, &mut buf);
        buf
    }

    /// Serializes `value` into the front of `dest`.
    ///
    /// `dest` must hold at least [`size`](Self::size) bytes; bytes past the
    /// layout are left untouched.
    pub fn encode_into(&self, value: &T, dest: &mut [u8]) {
        value.encode(&self.blueprint, dest);
    }

    /// Reads a value back from the front of `src`, which must hold at
    /// least [`size`](Self::size) bytes of this layout.
    pub fn decode(&self, src: &[u8]) -> T {
        T::decode(&self.blueprint, src)
    }

    /// Appends the canonical description of the layout.
    pub fn describe(&self, out: &mut String) {
        self.blueprint.describe(out);
    }

    /// SHA-512 of the canonical description; equal for two serializers
    /// exactly when their byte layouts are identical.
    pub fn signature(&self) -> Signature {
        let mut description = String::new();
        self.blueprint.describe(&mut description);
        let digest = Sha512::digest(description.as_bytes());
        let mut signature = [0; SIGNATURE_LEN];
        signature.copy_from_slice(&digest);
        signature
    }
}

impl Serializer<String> {
    /// Codec for strings of at most `max` bytes of UTF-8.
    pub fn for_str(max: u32) -> Result<Self, SchemaError> {
        Self::with_config(Config::with_length(max))
    }
}

impl<E: Schematic> Serializer<Vec<E>> {
    /// Codec for slices of at most `max` elements.
    pub fn for_slice(max: u32) -> Result<Self, SchemaError> {
        Self::with_config(Config::with_length(max))
    }

    /// Codec for a slice of at most `max` elements reusing an already
    /// compiled element codec.
    pub fn slice_of(element: Serializer<E>, max: u32) -> Result<Self, SchemaError> {
        if max == 0 {
            return Err(SchemaError::LengthMustBeSet);
        }
        Ok(Self::from_blueprint(Blueprint::Slice {
            max,
            element: Box::new(element.blueprint),
        }))
    }
}

impl Serializer<Vec<String>> {
    /// Codec for at most `max` strings of at most `element_max` bytes each.
    pub fn for_string_slice(max: u32, element_max: u32) -> Result<Self, SchemaError> {
        Self::with_config(Config::with_lengths(max, element_max))
    }
}

impl<A: Schematic, B: Schematic> Serializer<(A, B)> {
    /// Codec for a pair, composed from two already compiled codecs.
    pub fn pair(first: Serializer<A>, second: Serializer<B>) -> Self {
        Self::from_blueprint(Blueprint::Tuple {
            first: Box::new(first.blueprint),
            second: Box::new(second.blueprint),
        })
    }
}

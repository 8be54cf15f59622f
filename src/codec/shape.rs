//! # Type Descriptions
//!
//! [`Shape`] is the declarative description a type provides of itself so
//! the shape compiler can turn it into a [`Blueprint`].
//! The [`Schematic`] trait ties the two together: a type states its shape
//! once, and encodes/decodes itself against whatever blueprint that shape
//! compiled to (string and slice bounds live in the blueprint, not the
//! type).
//!
//! Shapes deliberately mirror what a reflection walk would see: scalar
//! kinds, strings and slices that still need a length bound, pointers,
//! arrays, pairs, and named records whose fields carry their annotation
//! text verbatim. `Shape::Unsupported` lets a description name a field kind
//! the codec has no layout for (maps, functions, ...) so compilation can
//! reject it (or skip it, when the field is annotated `ignored`).

use super::blueprint::{get_u16, get_u32, get_u64, put_u16, put_u32, put_u64, Blueprint};
use super::blueprint::{LENGTH_PREFIX, POINTER_FLAG};

/// Declarative description of a serializable type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    Bool,
    U8,
    U16,
    U32,
    U64,
    /// Platform-word unsigned integer; compiles to 32 or 64 bits.
    Usize,
    I8,
    I16,
    I32,
    I64,
    /// Platform-word signed integer; compiles to 32 or 64 bits.
    Isize,
    F32,
    F64,
    C64,
    C128,
    /// Needs a `size` bound from an annotation or serializer constructor.
    Str,
    /// Needs a `size` bound; the element may need `elementsize`.
    Slice(Box<Shape>),
    Array(usize, Box<Shape>),
    Pointer(Box<Shape>),
    Tuple(Box<Shape>, Box<Shape>),
    Record {
        name: &'static str,
        fields: Vec<Field>,
    },
    /// A kind the codec cannot lay out, named for the error message.
    Unsupported(&'static str),
}

/// One declared record field: name, raw annotation text, shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub annotation: &'static str,
    pub shape: Shape,
}

impl Field {
    pub fn new(name: &'static str, shape: Shape) -> Self {
        Self {
            name,
            annotation: "",
            shape,
        }
    }

    pub fn annotated(name: &'static str, annotation: &'static str, shape: Shape) -> Self {
        Self {
            name,
            annotation,
            shape,
        }
    }
}

/// A type the codec can lay out and move through a compiled blueprint.
///
/// `encode` and `decode` are driven by a [`Blueprint`] compiled from this
/// type's [`shape`](Schematic::shape) (possibly bounded by serializer
/// constructor arguments or field annotations). Handing them a layout that
/// did not originate from this shape is a logic error and may panic; the
/// [`Serializer`](super::Serializer) surface makes that pairing impossible
/// to get wrong.
///
/// `dest`/`src` are at least `layout.size()` bytes; encode writes at most
/// that many, decode reads at most that many.
pub trait Schematic: Sized {
    fn shape() -> Shape;

    fn encode(&self, layout: &Blueprint, dest: &mut [u8]);

    fn decode(layout: &Blueprint, src: &[u8]) -> Self;
}

impl Schematic for bool {
    fn shape() -> Shape {
        Shape::Bool
    }

    fn encode(&self, _layout: &Blueprint, dest: &mut [u8]) {
        dest[0] = u8::from(*self);
    }

    fn decode(_layout: &Blueprint, src: &[u8]) -> Self {
        src[0] != 0
    }
}

impl Schematic for u8 {
    fn shape() -> Shape {
        Shape::U8
    }

    fn encode(&self, _layout: &Blueprint, dest: &mut [u8]) {
        dest[0] = *self;
    }

    fn decode(_layout: &Blueprint, src: &[u8]) -> Self {
        src[0]
    }
}

impl Schematic for i8 {
    fn shape() -> Shape {
        Shape::I8
    }

    fn encode(&self, _layout: &Blueprint, dest: &mut [u8]) {
        dest[0] = *self as u8;
    }

    fn decode(_layout: &Blueprint, src: &[u8]) -> Self {
        src[0] as i8
    }
}

macro_rules! wide_scalar {
    ($ty:ty, $shape:ident, $put:ident, $get:ident, $wire:ty) => {
        impl Schematic for $ty {
            fn shape() -> Shape {
                Shape::$shape
            }

            fn encode(&self, _layout: &Blueprint, dest: &mut [u8]) {
                $put(*self as $wire, dest);
            }

            fn decode(_layout: &Blueprint, src: &[u8]) -> Self {
                $get(src) as $ty
            }
        }
    };
}

wide_scalar!(u16, U16, put_u16, get_u16, u16);
wide_scalar!(u32, U32, put_u32, get_u32, u32);
wide_scalar!(u64, U64, put_u64, get_u64, u64);
wide_scalar!(i16, I16, put_u16, get_u16, u16);
wide_scalar!(i32, I32, put_u32, get_u32, u32);
wide_scalar!(i64, I64, put_u64, get_u64, u64);

impl Schematic for usize {
    fn shape() -> Shape {
        Shape::Usize
    }

    fn encode(&self, layout: &Blueprint, dest: &mut [u8]) {
        match layout {
            Blueprint::U32 => put_u32(*self as u32, dest),
            Blueprint::U64 => put_u64(*self as u64, dest),
            other => panic!("usize cannot use layout {other:?}"),
        }
    }

    fn decode(layout: &Blueprint, src: &[u8]) -> Self {
        match layout {
            Blueprint::U32 => get_u32(src) as usize,
            Blueprint::U64 => get_u64(src) as usize,
            other => panic!("usize cannot use layout {other:?}"),
        }
    }
}

impl Schematic for isize {
    fn shape() -> Shape {
        Shape::Isize
    }

    fn encode(&self, layout: &Blueprint, dest: &mut [u8]) {
        match layout {
            Blueprint::I32 => put_u32(*self as i32 as u32, dest),
            Blueprint::I64 => put_u64(*self as i64 as u64, dest),
            other => panic!("isize cannot use layout {other:?}"),
        }
    }

    fn decode(layout: &Blueprint, src: &[u8]) -> Self {
        match layout {
            Blueprint::I32 => get_u32(src) as i32 as isize,
            Blueprint::I64 => get_u64(src) as i64 as isize,
            other => panic!("isize cannot use layout {other:?}"),
        }
    }
}

impl Schematic for f32 {
    fn shape() -> Shape {
        Shape::F32
    }

    fn encode(&self, _layout: &Blueprint, dest: &mut [u8]) {
        put_u32(self.to_bits(), dest);
    }

    fn decode(_layout: &Blueprint, src: &[u8]) -> Self {
        f32::from_bits(get_u32(src))
    }
}

impl Schematic for f64 {
    fn shape() -> Shape {
        Shape::F64
    }

    fn encode(&self, _layout: &Blueprint, dest: &mut [u8]) {
        put_u64(self.to_bits(), dest);
    }

    fn decode(_layout: &Blueprint, src: &[u8]) -> Self {
        f64::from_bits(get_u64(src))
    }
}

/// Complex number over `f32` halves; laid out real then imaginary.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Complex32 {
    pub re: f32,
    pub im: f32,
}

/// Complex number over `f64` halves; laid out real then imaginary.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Complex64 {
    pub re: f64,
    pub im: f64,
}

impl Schematic for Complex32 {
    fn shape() -> Shape {
        Shape::C64
    }

    fn encode(&self, _layout: &Blueprint, dest: &mut [u8]) {
        put_u32(self.re.to_bits(), dest);
        put_u32(self.im.to_bits(), &mut dest[4..]);
    }

    fn decode(_layout: &Blueprint, src: &[u8]) -> Self {
        Self {
            re: f32::from_bits(get_u32(src)),
            im: f32::from_bits(get_u32(&src[4..])),
        }
    }
}

impl Schematic for Complex64 {
    fn shape() -> Shape {
        Shape::C128
    }

    fn encode(&self, _layout: &Blueprint, dest: &mut [u8]) {
        put_u64(self.re.to_bits(), dest);
        put_u64(self.im.to_bits(), &mut dest[8..]);
    }

    fn decode(_layout: &Blueprint, src: &[u8]) -> Self {
        Self {
            re: f64::from_bits(get_u64(src)),
            im: f64::from_bits(get_u64(&src[8..])),
        }
    }
}

impl Schematic for String {
    fn shape() -> Shape {
        Shape::Str
    }

    fn encode(&self, layout: &Blueprint, dest: &mut [u8]) {
        let max = match layout {
            Blueprint::Str { max } => *max as usize,
            other => panic!("string cannot use layout {other:?}"),
        };
        let mut written = 0;
        for ch in self.chars() {
            let len = ch.len_utf8();
            if written + len > max {
                // truncation is rune-aligned, a codepoint is never split
                break;
            }
            ch.encode_utf8(&mut dest[LENGTH_PREFIX + written..]);
            written += len;
        }
        put_u32(written as u32, dest);
    }

    fn decode(layout: &Blueprint, src: &[u8]) -> Self {
        let max = match layout {
            Blueprint::Str { max } => *max as usize,
            other => panic!("string cannot use layout {other:?}"),
        };
        let len = (get_u32(src) as usize).min(max);
        String::from_utf8_lossy(&src[LENGTH_PREFIX..LENGTH_PREFIX + len]).into_owned()
    }
}

impl<T: Schematic> Schematic for Vec<T> {
    fn shape() -> Shape {
        Shape::Slice(Box::new(T::shape()))
    }

    fn encode(&self, layout: &Blueprint, dest: &mut [u8]) {
        let (max, element) = match layout {
            Blueprint::Slice { max, element } => (*max as usize, element),
            other => panic!("slice cannot use layout {other:?}"),
        };
        let stored = self.len().min(max);
        let step = element.size();
        let mut offset = LENGTH_PREFIX;
        for item in &self[..stored] {
            item.encode(element, &mut dest[offset..]);
            offset += step;
        }
        put_u32(stored as u32, dest);
    }

    fn decode(layout: &Blueprint, src: &[u8]) -> Self {
        let (max, element) = match layout {
            Blueprint::Slice { max, element } => (*max as usize, element),
            other => panic!("slice cannot use layout {other:?}"),
        };
        let len = (get_u32(src) as usize).min(max);
        let step = element.size();
        let mut out = Vec::with_capacity(len);
        let mut offset = LENGTH_PREFIX;
        for _ in 0..len {
            out.push(T::decode(element, &src[offset..]));
            offset += step;
        }
        out
    }
}

impl<T: Schematic, const N: usize> Schematic for [T; N] {
    fn shape() -> Shape {
        Shape::Array(N, Box::new(T::shape()))
    }

    fn encode(&self, layout: &Blueprint, dest: &mut [u8]) {
        let element = match layout {
            Blueprint::Array { element, .. } => element,
            other => panic!("array cannot use layout {other:?}"),
        };
        let step = element.size();
        for (i, item) in self.iter().enumerate() {
            item.encode(element, &mut dest[i * step..]);
        }
    }

    fn decode(layout: &Blueprint, src: &[u8]) -> Self {
        let element = match layout {
            Blueprint::Array { element, .. } => element,
            other => panic!("array cannot use layout {other:?}"),
        };
        let step = element.size();
        std::array::from_fn(|i| T::decode(element, &src[i * step..]))
    }
}

impl<T: Schematic> Schematic for Option<T> {
    fn shape() -> Shape {
        Shape::Pointer(Box::new(T::shape()))
    }

    fn encode(&self, layout: &Blueprint, dest: &mut [u8]) {
        let element = match layout {
            Blueprint::Pointer { element } => element,
            other => panic!("pointer cannot use layout {other:?}"),
        };
        match self {
            None => dest[0] = 0,
            Some(value) => {
                dest[0] = 1;
                value.encode(element, &mut dest[POINTER_FLAG..]);
            }
        }
    }

    fn decode(layout: &Blueprint, src: &[u8]) -> Self {
        let element = match layout {
            Blueprint::Pointer { element } => element,
            other => panic!("pointer cannot use layout {other:?}"),
        };
        if src[0] == 0 {
            None
        } else {
            Some(T::decode(element, &src[POINTER_FLAG..]))
        }
    }
}

impl<A: Schematic, B: Schematic> Schematic for (A, B) {
    fn shape() -> Shape {
        Shape::Tuple(Box::new(A::shape()), Box::new(B::shape()))
    }

    fn encode(&self, layout: &Blueprint, dest: &mut [u8]) {
        let (first, second) = match layout {
            Blueprint::Tuple { first, second } => (first, second),
            other => panic!("pair cannot use layout {other:?}"),
        };
        self.0.encode(first, dest);
        self.1.encode(second, &mut dest[first.size()..]);
    }

    fn decode(layout: &Blueprint, src: &[u8]) -> Self {
        let (first, second) = match layout {
            Blueprint::Tuple { first, second } => (first, second),
            other => panic!("pair cannot use layout {other:?}"),
        };
        (
            A::decode(first, src),
            B::decode(second, &src[first.size()..]),
        )
    }
}

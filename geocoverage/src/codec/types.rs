//! Sample and value types.

use std::fmt;

/// Pixel sample encoding of a raster band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleType {
    Byte,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
    Float64,
    CInt16,
    CInt32,
    CFloat32,
    CFloat64,
}

impl SampleType {
    /// Width in bytes of one sample of one band.
    pub fn byte_width(self) -> usize {
        match self {
            SampleType::Byte => 1,
            SampleType::UInt16 | SampleType::Int16 => 2,
            SampleType::UInt32 | SampleType::Int32 | SampleType::Float32 => 4,
            SampleType::Float64 => 8,
            SampleType::CInt16 => 4,
            SampleType::CInt32 | SampleType::CFloat32 => 8,
            SampleType::CFloat64 => 16,
        }
    }

    pub fn is_complex(self) -> bool {
        matches!(
            self,
            SampleType::CInt16 | SampleType::CInt32 | SampleType::CFloat32 | SampleType::CFloat64
        )
    }

    /// Number of scalar components per band (2 for complex kinds).
    pub fn components(self) -> usize {
        if self.is_complex() {
            2
        } else {
            1
        }
    }

    /// Width in bytes of a single component.
    pub fn component_width(self) -> usize {
        self.byte_width() / self.components()
    }

    /// Parse a sample type name such as `byte`, `uint16` or `cfloat32`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "byte" | "u8" | "uint8" => Some(SampleType::Byte),
            "uint16" | "u16" => Some(SampleType::UInt16),
            "int16" | "i16" => Some(SampleType::Int16),
            "uint32" | "u32" => Some(SampleType::UInt32),
            "int32" | "i32" => Some(SampleType::Int32),
            "float32" | "f32" => Some(SampleType::Float32),
            "float64" | "f64" => Some(SampleType::Float64),
            "cint16" => Some(SampleType::CInt16),
            "cint32" => Some(SampleType::CInt32),
            "cfloat32" => Some(SampleType::CFloat32),
            "cfloat64" => Some(SampleType::CFloat64),
            _ => None,
        }
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Byte layout of one interleaved sample: `band_count` values of one type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleLayout {
    pub sample_type: SampleType,
    pub band_count: usize,
}

impl SampleLayout {
    pub fn new(sample_type: SampleType, band_count: usize) -> Self {
        Self {
            sample_type,
            band_count,
        }
    }

    /// Bytes per band value.
    pub fn pixel_bytes(&self) -> usize {
        self.sample_type.byte_width()
    }

    /// Bytes of one interleaved sample across all bands.
    pub fn sample_bytes(&self) -> usize {
        self.pixel_bytes() * self.band_count
    }

    /// Scalar channels per sample (bands × complex components).
    pub fn channel_count(&self) -> usize {
        self.band_count * self.sample_type.components()
    }
}

/// One decoded scalar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    U8(u8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    F32(f32),
    F64(f64),
}

impl Scalar {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Scalar::U8(v) => f64::from(v),
            Scalar::U16(v) => f64::from(v),
            Scalar::I16(v) => f64::from(v),
            Scalar::U32(v) => f64::from(v),
            Scalar::I32(v) => f64::from(v),
            Scalar::F32(v) => f64::from(v),
            Scalar::F64(v) => v,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::U8(v) => write!(f, "{}", v),
            Scalar::U16(v) => write!(f, "{}", v),
            Scalar::I16(v) => write!(f, "{}", v),
            Scalar::U32(v) => write!(f, "{}", v),
            Scalar::I32(v) => write!(f, "{}", v),
            Scalar::F32(v) => write!(f, "{}", v),
            Scalar::F64(v) => write!(f, "{}", v),
        }
    }
}

/// A decoded sample.
///
/// `Null` stands for "no value". A non-null value carries exactly as many
/// scalars as the coverage has channels.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TypedValue {
    #[default]
    Null,
    Scalar(Scalar),
    Array(Vec<Scalar>),
}

impl TypedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, TypedValue::Null)
    }

    /// Number of scalars held (0 for `Null`).
    pub fn arity(&self) -> usize {
        match self {
            TypedValue::Null => 0,
            TypedValue::Scalar(_) => 1,
            TypedValue::Array(values) => values.len(),
        }
    }

    /// Scalar at `index`; index 0 of a `Scalar` value is the value itself.
    pub fn channel(&self, index: usize) -> Option<Scalar> {
        match self {
            TypedValue::Null => None,
            TypedValue::Scalar(s) => (index == 0).then_some(*s),
            TypedValue::Array(values) => values.get(index).copied(),
        }
    }

    /// RGB triple when the value holds at least three 8-bit channels.
    pub fn as_rgb(&self) -> Option<(u8, u8, u8)> {
        match self {
            TypedValue::Array(values) if values.len() >= 3 => match (values[0], values[1], values[2]) {
                (Scalar::U8(r), Scalar::U8(g), Scalar::U8(b)) => Some((r, g, b)),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Null => write!(f, "null"),
            TypedValue::Scalar(s) => write!(f, "{}", s),
            TypedValue::Array(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
        }
    }
}

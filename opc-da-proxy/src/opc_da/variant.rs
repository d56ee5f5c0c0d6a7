//! Tagged values (`VARIANT`) and their `wireVARIANT` encoding.
//!
//! [`read_variant`] is the only place a wire variant becomes a [`Variant`];
//! every proxy that receives values goes through it.

use std::fmt;

use super::errors::{OpcError, OpcResult};
use super::ndr::{NdrReader, NdrWriter};

/// `VARTYPE` codes.
pub mod vt {
    pub const VT_EMPTY: u16 = 0;
    pub const VT_NULL: u16 = 1;
    pub const VT_I2: u16 = 2;
    pub const VT_I4: u16 = 3;
    pub const VT_R4: u16 = 4;
    pub const VT_R8: u16 = 5;
    pub const VT_CY: u16 = 6;
    pub const VT_DATE: u16 = 7;
    pub const VT_BSTR: u16 = 8;
    pub const VT_ERROR: u16 = 10;
    pub const VT_BOOL: u16 = 11;
    pub const VT_VARIANT: u16 = 12;
    pub const VT_I1: u16 = 16;
    pub const VT_UI1: u16 = 17;
    pub const VT_UI2: u16 = 18;
    pub const VT_UI4: u16 = 19;
    pub const VT_I8: u16 = 20;
    pub const VT_UI8: u16 = 21;
    pub const VT_INT: u16 = 22;
    pub const VT_UINT: u16 = 23;
    pub const VT_ARRAY: u16 = 0x2000;
    pub const VT_BYREF: u16 = 0x4000;
    pub const VT_TYPEMASK: u16 = 0x0FFF;
}

// SAFEARRAY union selectors
const SF_I1: u32 = 16;
const SF_I2: u32 = 2;
const SF_I4: u32 = 3;
const SF_I8: u32 = 20;
const SF_BSTR: u32 = 8;

const FADF_BSTR: u16 = 0x0100;
const FADF_HAVEVARTYPE: u16 = 0x0080;

const VARIANT_TRUE: i16 = -1;
const VARIANT_FALSE: i16 = 0;

/// A decoded OPC value: a scalar or a homogeneous one-dimensional array.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Variant {
    #[default]
    Empty,
    Null,
    I1(i8),
    I2(i16),
    I4(i32),
    I8(i64),
    Ui1(u8),
    Ui2(u16),
    Ui4(u32),
    Ui8(u64),
    Int(i32),
    Uint(u32),
    R4(f32),
    R8(f64),
    /// Fixed point, scaled by 10 000.
    Currency(i64),
    /// OLE automation date: days since 1899-12-30.
    Date(f64),
    Bool(bool),
    Error(u32),
    Bstr(String),
    Array(VariantArray),
}

/// Elements of a `VT_ARRAY` value.
#[derive(Debug, Clone, PartialEq)]
pub enum VariantArray {
    I1(Vec<i8>),
    I2(Vec<i16>),
    I4(Vec<i32>),
    I8(Vec<i64>),
    Ui1(Vec<u8>),
    Ui2(Vec<u16>),
    Ui4(Vec<u32>),
    Ui8(Vec<u64>),
    Int(Vec<i32>),
    Uint(Vec<u32>),
    R4(Vec<f32>),
    R8(Vec<f64>),
    Currency(Vec<i64>),
    Date(Vec<f64>),
    Bool(Vec<bool>),
    Error(Vec<u32>),
    Bstr(Vec<String>),
}

impl Variant {
    /// The `VARTYPE` this value is sent with.
    pub fn var_type(&self) -> u16 {
        use vt::*;

        match self {
            Self::Empty => VT_EMPTY,
            Self::Null => VT_NULL,
            Self::I1(_) => VT_I1,
            Self::I2(_) => VT_I2,
            Self::I4(_) => VT_I4,
            Self::I8(_) => VT_I8,
            Self::Ui1(_) => VT_UI1,
            Self::Ui2(_) => VT_UI2,
            Self::Ui4(_) => VT_UI4,
            Self::Ui8(_) => VT_UI8,
            Self::Int(_) => VT_INT,
            Self::Uint(_) => VT_UINT,
            Self::R4(_) => VT_R4,
            Self::R8(_) => VT_R8,
            Self::Currency(_) => VT_CY,
            Self::Date(_) => VT_DATE,
            Self::Bool(_) => VT_BOOL,
            Self::Error(_) => VT_ERROR,
            Self::Bstr(_) => VT_BSTR,
            Self::Array(array) => VT_ARRAY | array.element_type(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl VariantArray {
    /// The element `VARTYPE`, without `VT_ARRAY`.
    pub fn element_type(&self) -> u16 {
        use vt::*;

        match self {
            Self::I1(_) => VT_I1,
            Self::I2(_) => VT_I2,
            Self::I4(_) => VT_I4,
            Self::I8(_) => VT_I8,
            Self::Ui1(_) => VT_UI1,
            Self::Ui2(_) => VT_UI2,
            Self::Ui4(_) => VT_UI4,
            Self::Ui8(_) => VT_UI8,
            Self::Int(_) => VT_INT,
            Self::Uint(_) => VT_UINT,
            Self::R4(_) => VT_R4,
            Self::R8(_) => VT_R8,
            Self::Currency(_) => VT_CY,
            Self::Date(_) => VT_DATE,
            Self::Bool(_) => VT_BOOL,
            Self::Error(_) => VT_ERROR,
            Self::Bstr(_) => VT_BSTR,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::I1(v) => v.len(),
            Self::I2(v) => v.len(),
            Self::I4(v) | Self::Int(v) => v.len(),
            Self::I8(v) | Self::Currency(v) => v.len(),
            Self::Ui1(v) => v.len(),
            Self::Ui2(v) => v.len(),
            Self::Ui4(v) | Self::Uint(v) | Self::Error(v) => v.len(),
            Self::Ui8(v) => v.len(),
            Self::R4(v) => v.len(),
            Self::R8(v) | Self::Date(v) => v.len(),
            Self::Bool(v) => v.len(),
            Self::Bstr(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empty array of the given element type.
    fn empty(element_type: u16) -> OpcResult<Self> {
        from_elements(element_type, Elements::empty_for(element_type)?)
    }
}

/// SAFEARRAY payload grouped by element width, as it travels.
enum Elements {
    Bytes(Vec<u8>),
    Words(Vec<u16>),
    Dwords(Vec<u32>),
    Hypers(Vec<u64>),
    Strings(Vec<String>),
}

impl Elements {
    fn empty_for(element_type: u16) -> OpcResult<Self> {
        Ok(match sf_type_for(element_type)? {
            SF_I1 => Self::Bytes(Vec::new()),
            SF_I2 => Self::Words(Vec::new()),
            SF_I4 => Self::Dwords(Vec::new()),
            SF_I8 => Self::Hypers(Vec::new()),
            _ => Self::Strings(Vec::new()),
        })
    }

    fn len(&self) -> usize {
        match self {
            Self::Bytes(v) => v.len(),
            Self::Words(v) => v.len(),
            Self::Dwords(v) => v.len(),
            Self::Hypers(v) => v.len(),
            Self::Strings(v) => v.len(),
        }
    }
}

fn sf_type_for(element_type: u16) -> OpcResult<u32> {
    use vt::*;

    match element_type {
        VT_I1 | VT_UI1 => Ok(SF_I1),
        VT_I2 | VT_UI2 | VT_BOOL => Ok(SF_I2),
        VT_I4 | VT_UI4 | VT_INT | VT_UINT | VT_R4 | VT_ERROR => Ok(SF_I4),
        VT_I8 | VT_UI8 | VT_R8 | VT_CY | VT_DATE => Ok(SF_I8),
        VT_BSTR => Ok(SF_BSTR),
        other => Err(OpcError::Conversion(format!(
            "arrays of VARTYPE {other} are not supported"
        ))),
    }
}

#[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
fn to_elements(array: &VariantArray) -> Elements {
    use VariantArray as A;

    match array {
        A::I1(v) => Elements::Bytes(v.iter().map(|x| *x as u8).collect()),
        A::Ui1(v) => Elements::Bytes(v.clone()),
        A::I2(v) => Elements::Words(v.iter().map(|x| *x as u16).collect()),
        A::Ui2(v) => Elements::Words(v.clone()),
        A::Bool(v) => Elements::Words(
            v.iter()
                .map(|b| (if *b { VARIANT_TRUE } else { VARIANT_FALSE }) as u16)
                .collect(),
        ),
        A::I4(v) | A::Int(v) => Elements::Dwords(v.iter().map(|x| *x as u32).collect()),
        A::Ui4(v) | A::Uint(v) | A::Error(v) => Elements::Dwords(v.clone()),
        A::R4(v) => Elements::Dwords(v.iter().map(|x| x.to_bits()).collect()),
        A::I8(v) | A::Currency(v) => Elements::Hypers(v.iter().map(|x| *x as u64).collect()),
        A::Ui8(v) => Elements::Hypers(v.clone()),
        A::R8(v) | A::Date(v) => Elements::Hypers(v.iter().map(|x| x.to_bits()).collect()),
        A::Bstr(v) => Elements::Strings(v.clone()),
    }
}

#[allow(clippy::cast_possible_wrap)]
fn from_elements(element_type: u16, elements: Elements) -> OpcResult<VariantArray> {
    use vt::*;
    use VariantArray as A;

    Ok(match (element_type, elements) {
        (VT_I1, Elements::Bytes(v)) => A::I1(v.into_iter().map(|x| x as i8).collect()),
        (VT_UI1, Elements::Bytes(v)) => A::Ui1(v),
        (VT_I2, Elements::Words(v)) => A::I2(v.into_iter().map(|x| x as i16).collect()),
        (VT_UI2, Elements::Words(v)) => A::Ui2(v),
        (VT_BOOL, Elements::Words(v)) => A::Bool(v.into_iter().map(|x| x != 0).collect()),
        (VT_I4, Elements::Dwords(v)) => A::I4(v.into_iter().map(|x| x as i32).collect()),
        (VT_INT, Elements::Dwords(v)) => A::Int(v.into_iter().map(|x| x as i32).collect()),
        (VT_UI4, Elements::Dwords(v)) => A::Ui4(v),
        (VT_UINT, Elements::Dwords(v)) => A::Uint(v),
        (VT_ERROR, Elements::Dwords(v)) => A::Error(v),
        (VT_R4, Elements::Dwords(v)) => A::R4(v.into_iter().map(f32::from_bits).collect()),
        (VT_I8, Elements::Hypers(v)) => A::I8(v.into_iter().map(|x| x as i64).collect()),
        (VT_CY, Elements::Hypers(v)) => A::Currency(v.into_iter().map(|x| x as i64).collect()),
        (VT_UI8, Elements::Hypers(v)) => A::Ui8(v),
        (VT_R8, Elements::Hypers(v)) => A::R8(v.into_iter().map(f64::from_bits).collect()),
        (VT_DATE, Elements::Hypers(v)) => A::Date(v.into_iter().map(f64::from_bits).collect()),
        (VT_BSTR, Elements::Strings(v)) => A::Bstr(v),
        (element_type, _) => {
            return Err(OpcError::Decode(format!(
                "SAFEARRAY layout does not match element VARTYPE {element_type}"
            )));
        }
    })
}

/// Writes a top-level or embedded `VARIANT`: the pointer value followed by
/// the variant body.
pub fn write_variant(w: &mut NdrWriter, value: &Variant) -> OpcResult<()> {
    w.write_referent(true);
    write_variant_body(w, value)
}

/// Writes a `wireVARIANTStr` and its own pointees.
pub fn write_variant_body(w: &mut NdrWriter, value: &Variant) -> OpcResult<()> {
    w.align(8);
    let start = w.position();
    let var_type = value.var_type();

    w.write_u32(0); // clSize, patched below
    w.write_u32(0); // rpcReserved
    w.write_u16(var_type);
    w.write_u16(0);
    w.write_u16(0);
    w.write_u16(0);
    w.write_u32(u32::from(var_type));

    match value {
        Variant::Empty | Variant::Null => {}
        Variant::I1(v) => w.write_i8(*v),
        Variant::Ui1(v) => w.write_u8(*v),
        Variant::I2(v) => w.write_i16(*v),
        Variant::Ui2(v) => w.write_u16(*v),
        Variant::Bool(v) => w.write_i16(if *v { VARIANT_TRUE } else { VARIANT_FALSE }),
        Variant::I4(v) | Variant::Int(v) => w.write_i32(*v),
        Variant::Ui4(v) | Variant::Uint(v) | Variant::Error(v) => w.write_u32(*v),
        Variant::R4(v) => w.write_f32(*v),
        Variant::I8(v) | Variant::Currency(v) => w.write_i64(*v),
        Variant::Ui8(v) => w.write_u64(*v),
        Variant::R8(v) | Variant::Date(v) => w.write_f64(*v),
        Variant::Bstr(s) => {
            w.write_referent(true);
            write_bstr(w, s)?;
        }
        Variant::Array(array) => {
            w.write_referent(true);
            write_safearray(w, array)?;
        }
    }

    let size = w.position() - start;
    w.patch_u32(start, u32::try_from(size.div_ceil(8))?)
}

/// Conformant array of `VARIANT`s: max count, pointer values, then bodies.
pub fn write_variant_array<'a, I>(w: &mut NdrWriter, values: I) -> OpcResult<()>
where
    I: IntoIterator<Item = &'a Variant>,
    I::IntoIter: ExactSizeIterator + Clone,
{
    let values = values.into_iter();
    w.write_count(values.len())?;
    for _ in values.clone() {
        w.write_referent(true);
    }
    for value in values {
        write_variant_body(w, value)?;
    }
    Ok(())
}

fn write_bstr(w: &mut NdrWriter, value: &str) -> OpcResult<()> {
    let units: Vec<u16> = value.encode_utf16().collect();
    let count = w.write_count(units.len())?;
    w.write_u32(count * 2);
    w.write_u32(count);
    for unit in units {
        w.write_u16(unit);
    }
    Ok(())
}

fn write_safearray(w: &mut NdrWriter, array: &VariantArray) -> OpcResult<()> {
    let element_type = array.element_type();
    let sf_type = sf_type_for(element_type)?;
    let (element_size, features) = match sf_type {
        SF_I1 => (1, FADF_HAVEVARTYPE),
        SF_I2 => (2, FADF_HAVEVARTYPE),
        SF_I4 => (4, FADF_HAVEVARTYPE),
        SF_I8 => (8, FADF_HAVEVARTYPE),
        _ => (4, FADF_HAVEVARTYPE | FADF_BSTR),
    };
    let elements = to_elements(array);
    let len = u32::try_from(elements.len())?;

    w.write_u32(1); // conformance of rgsabound
    w.write_u16(1); // cDims
    w.write_u16(features);
    w.write_u32(element_size);
    w.write_u32(0); // cLocks
    w.write_u32(sf_type);
    w.write_u32(sf_type);
    w.write_u32(len);
    w.write_referent(true);
    w.write_u32(len); // rgsabound[0].cElements
    w.write_i32(0); // rgsabound[0].lLbound

    w.write_u32(len);
    match elements {
        Elements::Bytes(v) => w.write_bytes(&v),
        Elements::Words(v) => v.into_iter().for_each(|x| w.write_u16(x)),
        Elements::Dwords(v) => v.into_iter().for_each(|x| w.write_u32(x)),
        Elements::Hypers(v) => v.into_iter().for_each(|x| w.write_u64(x)),
        Elements::Strings(v) => {
            for _ in &v {
                w.write_referent(true);
            }
            for s in &v {
                write_bstr(w, s)?;
            }
        }
    }
    Ok(())
}

/// Reads a `VARIANT` pointer value and, when non-null, its body.
pub fn read_variant(r: &mut NdrReader) -> OpcResult<Variant> {
    if r.read_referent()? == 0 {
        return Ok(Variant::Empty);
    }
    read_variant_body(r)
}

/// Reads a `wireVARIANTStr` and its pointees.
pub fn read_variant_body(r: &mut NdrReader) -> OpcResult<Variant> {
    use vt::*;

    r.align(8)?;
    let _size = r.read_u32()?;
    let _reserved = r.read_u32()?;
    let var_type = r.read_u16()?;
    r.skip(6)?;
    let discriminant = r.read_u32()?;
    if discriminant != u32::from(var_type) {
        return Err(OpcError::Decode(format!(
            "variant discriminant {discriminant} does not match VARTYPE {var_type}"
        )));
    }

    if var_type & VT_BYREF != 0 {
        return Err(OpcError::Conversion(format!(
            "by-reference VARTYPE 0x{var_type:04X} is not supported"
        )));
    }

    if var_type & VT_ARRAY != 0 {
        let element_type = var_type & VT_TYPEMASK;
        if r.read_referent()? == 0 {
            return VariantArray::empty(element_type).map(Variant::Array);
        }
        return read_safearray(r, element_type).map(Variant::Array);
    }

    Ok(match var_type {
        VT_EMPTY => Variant::Empty,
        VT_NULL => Variant::Null,
        VT_I1 => Variant::I1(r.read_i8()?),
        VT_UI1 => Variant::Ui1(r.read_u8()?),
        VT_I2 => Variant::I2(r.read_i16()?),
        VT_UI2 => Variant::Ui2(r.read_u16()?),
        VT_BOOL => Variant::Bool(r.read_i16()? != VARIANT_FALSE),
        VT_I4 => Variant::I4(r.read_i32()?),
        VT_INT => Variant::Int(r.read_i32()?),
        VT_UI4 => Variant::Ui4(r.read_u32()?),
        VT_UINT => Variant::Uint(r.read_u32()?),
        VT_ERROR => Variant::Error(r.read_u32()?),
        VT_R4 => Variant::R4(r.read_f32()?),
        VT_I8 => Variant::I8(r.read_i64()?),
        VT_CY => Variant::Currency(r.read_i64()?),
        VT_UI8 => Variant::Ui8(r.read_u64()?),
        VT_R8 => Variant::R8(r.read_f64()?),
        VT_DATE => Variant::Date(r.read_f64()?),
        VT_BSTR => {
            if r.read_referent()? == 0 {
                Variant::Bstr(String::new())
            } else {
                Variant::Bstr(read_bstr(r)?)
            }
        }
        other => {
            return Err(OpcError::Conversion(format!(
                "VARTYPE {other} is not supported"
            )));
        }
    })
}

/// Conformant array of `VARIANT`s whose length must match `expected`.
pub fn read_variant_array(r: &mut NdrReader, expected: usize) -> OpcResult<Vec<Variant>> {
    let count = r.read_expected_count(expected, "values")?;
    let mut referents = Vec::with_capacity(count);
    for _ in 0..count {
        referents.push(r.read_referent()?);
    }
    referents
        .into_iter()
        .map(|referent| {
            if referent == 0 {
                Ok(Variant::Empty)
            } else {
                read_variant_body(r)
            }
        })
        .collect()
}

fn read_bstr(r: &mut NdrReader) -> OpcResult<String> {
    let _max = r.read_u32()?;
    let _bytes = r.read_u32()?;
    let len = r.read_count()?;
    let units = r.read_wchars(len)?;
    String::from_utf16(&units).map_err(|e| OpcError::Decode(format!("invalid BSTR: {e}")))
}

fn read_safearray(r: &mut NdrReader, element_type: u16) -> OpcResult<VariantArray> {
    let _conformance = r.read_u32()?;
    let dims = r.read_u16()?;
    let _features = r.read_u16()?;
    let _element_size = r.read_u32()?;
    let _locks = r.read_u32()?;
    let sf_type = r.read_u32()?;
    let _discriminant = r.read_u32()?;
    let _size = r.read_u32()?;
    let data = r.read_referent()?;
    for _ in 0..dims {
        let _elements = r.read_u32()?;
        let _lower_bound = r.read_i32()?;
    }

    if data == 0 {
        return VariantArray::empty(element_type);
    }

    let count = r.read_count()?;
    let elements = match sf_type {
        SF_I1 => Elements::Bytes(r.read_bytes(count)?.to_vec()),
        SF_I2 => Elements::Words((0..count).map(|_| r.read_u16()).collect::<OpcResult<_>>()?),
        SF_I4 => Elements::Dwords((0..count).map(|_| r.read_u32()).collect::<OpcResult<_>>()?),
        SF_I8 => Elements::Hypers((0..count).map(|_| r.read_u64()).collect::<OpcResult<_>>()?),
        SF_BSTR => {
            let referents = (0..count)
                .map(|_| r.read_referent())
                .collect::<OpcResult<Vec<_>>>()?;
            let strings = referents
                .into_iter()
                .map(|referent| {
                    if referent == 0 {
                        Ok(String::new())
                    } else {
                        read_bstr(r)
                    }
                })
                .collect::<OpcResult<_>>()?;
            Elements::Strings(strings)
        }
        other => {
            return Err(OpcError::Conversion(format!(
                "SAFEARRAY type {other} is not supported"
            )));
        }
    };
    from_elements(element_type, elements)
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Null => f.write_str("Null"),
            Self::I1(v) => write!(f, "{v}"),
            Self::I2(v) => write!(f, "{v}"),
            Self::I4(v) | Self::Int(v) => write!(f, "{v}"),
            Self::I8(v) => write!(f, "{v}"),
            Self::Ui1(v) => write!(f, "{v}"),
            Self::Ui2(v) => write!(f, "{v}"),
            Self::Ui4(v) | Self::Uint(v) => write!(f, "{v}"),
            Self::Ui8(v) => write!(f, "{v}"),
            Self::R4(v) => write!(f, "{v:.2}"),
            Self::R8(v) => write!(f, "{v:.2}"),
            Self::Currency(raw) => {
                let sign = if *raw < 0 { "-" } else { "" };
                let magnitude = raw.unsigned_abs();
                write!(f, "{sign}{}.{:04}", magnitude / 10_000, magnitude % 10_000)
            }
            Self::Date(v) => f.write_str(&crate::helpers::ole_date_to_string(*v)),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Error(code) => write!(f, "Error(0x{code:08X})"),
            Self::Bstr(s) => write!(f, "\"{s}\""),
            Self::Array(array) => write!(
                f,
                "Array[{}] (VT {})",
                array.len(),
                array.element_type()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: &Variant) -> Variant {
        let mut w = NdrWriter::new();
        write_variant(&mut w, value).unwrap();
        let mut r = NdrReader::new(w.into_bytes());
        let decoded = read_variant(&mut r).unwrap();
        assert_eq!(r.remaining(), 0);
        decoded
    }

    #[test]
    fn test_i4_layout() {
        let mut w = NdrWriter::new();
        write_variant(&mut w, &Variant::I4(-2)).unwrap();
        let bytes = w.into_bytes();
        // referent, pad to 8, clSize, reserved, vt, 3 x reserved, discriminant, value
        assert_eq!(bytes.len(), 4 + 4 + 4 + 4 + 8 + 4 + 4);
        assert_eq!(&bytes[8..12], &[3, 0, 0, 0]);
        assert_eq!(&bytes[16..18], &[3, 0]);
        assert_eq!(&bytes[24..28], &[3, 0, 0, 0]);
        assert_eq!(&bytes[28..32], &(-2i32).to_le_bytes());
    }

    #[test]
    fn test_bool_scalar_is_variant_bool() {
        let mut w = NdrWriter::new();
        write_variant(&mut w, &Variant::Bool(true)).unwrap();
        let bytes = w.into_bytes();
        assert_eq!(&bytes[28..30], &[0xFF, 0xFF]);
    }

    #[test]
    fn test_scalars_decode_through_one_path() {
        for value in [
            Variant::Empty,
            Variant::I1(-5),
            Variant::Ui2(65000),
            Variant::R4(1.5),
            Variant::R8(-273.15),
            Variant::I8(i64::MIN),
            Variant::Currency(12_345),
            Variant::Bool(false),
            Variant::Bstr("Random.Int4".into()),
            Variant::Bstr(String::new()),
        ] {
            assert_eq!(roundtrip(&value), value);
        }
    }

    #[test]
    fn test_bool_array_uses_16_bit_elements() {
        let value = Variant::Array(VariantArray::Bool(vec![true, false, true]));
        let mut w = NdrWriter::new();
        write_variant(&mut w, &value).unwrap();
        let bytes = w.as_bytes().to_vec();
        // VT_ARRAY | VT_BOOL
        assert_eq!(&bytes[16..18], &[0x0B, 0x20]);
        // last six bytes are the elements
        assert_eq!(&bytes[bytes.len() - 6..], &[0xFF, 0xFF, 0, 0, 0xFF, 0xFF]);
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_arrays_of_each_width() {
        for value in [
            VariantArray::Ui1(vec![1, 2, 3]),
            VariantArray::I2(vec![-1, 2]),
            VariantArray::R4(vec![0.5, 1.25]),
            VariantArray::R8(vec![3.0]),
            VariantArray::Ui8(vec![]),
            VariantArray::Bstr(vec!["a".into(), String::new(), "ccc".into()]),
        ] {
            let value = Variant::Array(value);
            assert_eq!(roundtrip(&value), value);
        }
    }

    #[test]
    fn test_null_pointer_is_empty() {
        let mut r = NdrReader::new(vec![0, 0, 0, 0]);
        assert_eq!(read_variant(&mut r).unwrap(), Variant::Empty);
    }

    #[test]
    fn test_byref_is_rejected() {
        let mut w = NdrWriter::new();
        w.write_referent(true);
        w.align(8);
        w.write_u32(3);
        w.write_u32(0);
        w.write_u16(vt::VT_BYREF | vt::VT_I4);
        w.write_u16(0);
        w.write_u16(0);
        w.write_u16(0);
        w.write_u32(u32::from(vt::VT_BYREF | vt::VT_I4));
        let mut r = NdrReader::new(w.into_bytes());
        assert!(matches!(read_variant(&mut r), Err(OpcError::Conversion(_))));
    }

    #[test]
    fn test_variant_array_bodies_follow_pointers() {
        let values = vec![Variant::I2(7), Variant::Bstr("x".into())];
        let mut w = NdrWriter::new();
        write_variant_array(&mut w, &values).unwrap();
        let mut r = NdrReader::new(w.into_bytes());
        assert_eq!(read_variant_array(&mut r, 2).unwrap(), values);
    }

    fn encoded(value: &Variant) -> Vec<u8> {
        let mut w = NdrWriter::new();
        write_variant(&mut w, value).unwrap();
        w.into_bytes()
    }

    #[test]
    fn test_inflated_bstr_length_is_a_decode_error() {
        let mut bytes = encoded(&Variant::Bstr("hi".into()));
        // BSTR character count follows the pointer, max size and byte length
        bytes[40..44].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        let mut r = NdrReader::new(bytes);
        assert!(matches!(read_variant(&mut r), Err(OpcError::Decode(_))));
    }

    #[test]
    fn test_truncated_bstr_is_a_decode_error() {
        let mut bytes = encoded(&Variant::Bstr("Random.String".into()));
        bytes.truncate(bytes.len() - 2);
        let mut r = NdrReader::new(bytes);
        assert!(matches!(read_variant(&mut r), Err(OpcError::Decode(_))));
    }

    #[test]
    fn test_truncated_safearray_is_a_decode_error() {
        for value in [
            VariantArray::I4(vec![1, 2, 3]),
            VariantArray::Bstr(vec!["a".into(), "bc".into()]),
        ] {
            let mut bytes = encoded(&Variant::Array(value));
            bytes.truncate(bytes.len() - 2);
            let mut r = NdrReader::new(bytes);
            assert!(matches!(read_variant(&mut r), Err(OpcError::Decode(_))));
        }
    }

    #[test]
    fn test_inflated_safearray_count_is_a_decode_error() {
        let mut bytes = encoded(&Variant::Array(VariantArray::I4(vec![1, 2])));
        // element count sits right before the two elements
        let at = bytes.len() - 12;
        bytes[at..at + 4].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
        let mut r = NdrReader::new(bytes);
        assert!(matches!(read_variant(&mut r), Err(OpcError::Decode(_))));
    }

    #[test]
    fn test_negative_currency_below_one_unit_keeps_sign() {
        assert_eq!(Variant::Currency(-5000).to_string(), "-0.5000");
        assert_eq!(Variant::Currency(-1).to_string(), "-0.0001");
        assert_eq!(Variant::Currency(5000).to_string(), "0.5000");
        assert_eq!(
            Variant::Currency(i64::MIN).to_string(),
            "-922337203685477.5808"
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Variant::Currency(-12_345).to_string(), "-1.2345");
        assert_eq!(Variant::R8(2.5).to_string(), "2.50");
        assert_eq!(Variant::Bstr("hi".into()).to_string(), "\"hi\"");
        assert_eq!(
            Variant::Array(VariantArray::I4(vec![1, 2])).to_string(),
            "Array[2] (VT 3)"
        );
    }
}

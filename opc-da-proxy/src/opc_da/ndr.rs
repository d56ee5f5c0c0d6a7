//! NDR20 marshalling for DCOM stub data.
//!
//! Little-endian, with natural alignment measured from the start of the
//! stub. Only the constructs used by the OPC DA interfaces are covered:
//! primitives, unique and embedded pointers, conformant (varying) arrays,
//! `[string]` wide strings, GUIDs and `MInterfacePointer` out parameters.
//!
//! Embedded pointees are deferred: an array of structs is written as all
//! flat bodies first, then each element's pointees in element order. The
//! [`ToNdr`] and [`FromNdr`] traits split a struct into those two phases.

use uuid::Uuid;

use super::errors::{OpcError, OpcResult};

/// First referent id handed out by a writer; later ids step by 4.
const REFERENT_BASE: u32 = 0x0002_0000;

/// Types whose NDR representation has a flat part and deferred pointees.
pub trait ToNdr {
    fn marshal_flat(&self, w: &mut NdrWriter) -> OpcResult<()>;

    fn marshal_deferred(&self, _w: &mut NdrWriter) -> OpcResult<()> {
        Ok(())
    }
}

/// Decoding counterpart of [`ToNdr`].
///
/// `Flat` carries whatever the deferred phase needs, typically the referent
/// ids seen in the flat part.
pub trait FromNdr: Sized {
    type Flat;

    fn unmarshal_flat(r: &mut NdrReader) -> OpcResult<Self::Flat>;

    fn unmarshal_deferred(flat: Self::Flat, r: &mut NdrReader) -> OpcResult<Self>;
}

/// Growable NDR encoder.
#[derive(Debug)]
pub struct NdrWriter {
    buf: Vec<u8>,
    next_referent: u32,
}

impl Default for NdrWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl NdrWriter {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            next_referent: REFERENT_BASE,
        }
    }

    /// Current offset from the start of the stub.
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Pads with zeros up to the next multiple of `alignment`.
    pub fn align(&mut self, alignment: usize) {
        let remainder = self.buf.len() % alignment;
        if remainder != 0 {
            self.buf.resize(self.buf.len() + alignment - remainder, 0);
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u16(&mut self, value: u16) {
        self.align(2);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i16(&mut self, value: i16) {
        self.align(2);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.align(4);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.align(4);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.align(4);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.align(8);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.align(8);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.align(8);
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Win32 `BOOL`: a 32-bit integer, 1 or 0.
    pub fn write_bool(&mut self, value: bool) {
        self.write_i32(i32::from(value));
    }

    /// NDR20 enums travel as 16-bit values.
    pub fn write_enum16(&mut self, value: u16) {
        self.write_u16(value);
    }

    pub fn write_guid(&mut self, guid: &Uuid) {
        self.align(4);
        self.buf.extend_from_slice(&guid.to_bytes_le());
    }

    /// Overwrites a previously written `u32` at `offset`.
    pub fn patch_u32(&mut self, offset: usize, value: u32) -> OpcResult<()> {
        let slot = self
            .buf
            .get_mut(offset..offset + 4)
            .ok_or_else(|| OpcError::Internal(format!("patch offset {offset} out of range")))?;
        slot.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Writes a pointer value: a fresh referent id, or 0 for null.
    pub fn write_referent(&mut self, present: bool) {
        if present {
            let id = self.next_referent;
            self.next_referent = self.next_referent.wrapping_add(4);
            self.write_u32(id);
        } else {
            self.write_u32(0);
        }
    }

    /// Writes a length as a 32-bit count.
    pub fn write_count(&mut self, len: usize) -> OpcResult<u32> {
        let count = u32::try_from(len)?;
        self.write_u32(count);
        Ok(count)
    }

    /// Writes a `[string] wchar_t*` pointee: max count, offset, actual
    /// count, then the UTF-16 units including the terminating NUL.
    pub fn write_string(&mut self, value: &str) -> OpcResult<()> {
        let units: Vec<u16> = value.encode_utf16().chain(std::iter::once(0)).collect();
        let count = self.write_count(units.len())?;
        self.write_u32(0);
        self.write_u32(count);
        for unit in units {
            self.write_u16(unit);
        }
        Ok(())
    }

    /// Top-level `[unique, string]` parameter.
    pub fn write_unique_string(&mut self, value: Option<&str>) -> OpcResult<()> {
        self.write_referent(value.is_some());
        match value {
            Some(value) => self.write_string(value),
            None => Ok(()),
        }
    }

    /// Conformant array of `u32`: max count followed by the elements.
    pub fn write_u32_array(&mut self, values: &[u32]) -> OpcResult<()> {
        self.write_count(values.len())?;
        for value in values {
            self.write_u32(*value);
        }
        Ok(())
    }

    /// Conformant array of `u16`.
    pub fn write_u16_array(&mut self, values: &[u16]) -> OpcResult<()> {
        self.write_count(values.len())?;
        for value in values {
            self.write_u16(*value);
        }
        Ok(())
    }

    /// Conformant array of wide-string pointers, pointees deferred.
    pub fn write_string_array(&mut self, values: &[String]) -> OpcResult<()> {
        self.write_count(values.len())?;
        for _ in values {
            self.write_referent(true);
        }
        for value in values {
            self.write_string(value)?;
        }
        Ok(())
    }

    /// A single struct with its pointees.
    pub fn write_struct<T: ToNdr>(&mut self, item: &T) -> OpcResult<()> {
        item.marshal_flat(self)?;
        item.marshal_deferred(self)
    }

    /// Conformant array of structs: max count, every flat body, then the
    /// pointees of each element in order.
    pub fn write_struct_array<T: ToNdr>(&mut self, items: &[T]) -> OpcResult<()> {
        self.write_count(items.len())?;
        for item in items {
            item.marshal_flat(self)?;
        }
        for item in items {
            item.marshal_deferred(self)?;
        }
        Ok(())
    }
}

/// NDR decoder over an owned response buffer.
#[derive(Debug, Clone)]
pub struct NdrReader {
    buf: Vec<u8>,
    pos: usize,
}

impl NdrReader {
    pub fn new(buf: Vec<u8>) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    /// Skips padding up to the next multiple of `alignment`.
    pub fn align(&mut self, alignment: usize) -> OpcResult<()> {
        let remainder = self.pos % alignment;
        if remainder != 0 {
            self.skip(alignment - remainder)?;
        }
        Ok(())
    }

    pub fn skip(&mut self, len: usize) -> OpcResult<()> {
        self.read_bytes(len).map(|_| ())
    }

    pub fn read_bytes(&mut self, len: usize) -> OpcResult<&[u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| {
                OpcError::Decode(format!(
                    "need {len} bytes at offset {}, only {} left",
                    self.pos,
                    self.remaining()
                ))
            })?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> OpcResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> OpcResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> OpcResult<i8> {
        Ok(i8::from_le_bytes(self.read_array()?))
    }

    pub fn read_u16(&mut self) -> OpcResult<u16> {
        self.align(2)?;
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_i16(&mut self) -> OpcResult<i16> {
        self.align(2)?;
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> OpcResult<u32> {
        self.align(4)?;
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> OpcResult<i32> {
        self.align(4)?;
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> OpcResult<f32> {
        self.align(4)?;
        Ok(f32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> OpcResult<u64> {
        self.align(8)?;
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> OpcResult<i64> {
        self.align(8)?;
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    pub fn read_f64(&mut self) -> OpcResult<f64> {
        self.align(8)?;
        Ok(f64::from_le_bytes(self.read_array()?))
    }

    pub fn read_bool(&mut self) -> OpcResult<bool> {
        Ok(self.read_i32()? != 0)
    }

    pub fn read_enum16(&mut self) -> OpcResult<u16> {
        self.read_u16()
    }

    pub fn read_guid(&mut self) -> OpcResult<Uuid> {
        self.align(4)?;
        Ok(Uuid::from_bytes_le(self.read_array()?))
    }

    /// Reads a pointer value; 0 means null.
    pub fn read_referent(&mut self) -> OpcResult<u32> {
        self.read_u32()
    }

    pub fn read_count(&mut self) -> OpcResult<usize> {
        Ok(usize::try_from(self.read_u32()?)?)
    }

    /// Reads a count and checks it against the number of elements the
    /// request asked for.
    pub fn read_expected_count(&mut self, expected: usize, what: &str) -> OpcResult<usize> {
        let count = self.read_count()?;
        if count != expected {
            return Err(OpcError::Decode(format!(
                "expected {expected} {what}, server sent {count}"
            )));
        }
        Ok(count)
    }

    /// Reads `count` UTF-16 code units. A count larger than the bytes left
    /// fails before anything is allocated.
    pub fn read_wchars(&mut self, count: usize) -> OpcResult<Vec<u16>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        self.align(2)?;
        let len = count.checked_mul(2).ok_or_else(|| {
            OpcError::Decode(format!("string of {count} characters overflows"))
        })?;
        let bytes = self.read_bytes(len)?;
        Ok(bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect())
    }

    /// Reads a `[string]` pointee and drops the terminating NUL.
    pub fn read_string(&mut self) -> OpcResult<String> {
        let _max = self.read_u32()?;
        let offset = self.read_count()?;
        let actual = self.read_count()?;
        if offset != 0 {
            self.read_wchars(offset)?;
        }
        let mut units = self.read_wchars(actual)?;
        while units.last() == Some(&0) {
            units.pop();
        }
        String::from_utf16(&units)
            .map_err(|e| OpcError::Decode(format!("invalid UTF-16 string: {e}")))
    }

    /// Top-level `[unique, string]` out parameter.
    pub fn read_unique_string(&mut self) -> OpcResult<Option<String>> {
        if self.read_referent()? == 0 {
            return Ok(None);
        }
        self.read_string().map(Some)
    }

    /// Conformant array of `u32` whose length must match `expected`.
    pub fn read_u32_array(&mut self, expected: usize, what: &str) -> OpcResult<Vec<u32>> {
        let count = self.read_expected_count(expected, what)?;
        (0..count).map(|_| self.read_u32()).collect()
    }

    /// Unique pointer to a conformant `u32` array; null reads as empty.
    pub fn read_unique_u32_array(&mut self, expected: usize, what: &str) -> OpcResult<Vec<u32>> {
        if self.read_referent()? == 0 {
            return self.empty_or_mismatch(expected, what);
        }
        self.read_u32_array(expected, what)
    }

    /// Unique pointer to a conformant array of structs.
    pub fn read_unique_struct_array<T: FromNdr>(
        &mut self,
        expected: usize,
        what: &str,
    ) -> OpcResult<Vec<T>> {
        if self.read_referent()? == 0 {
            return self.empty_or_mismatch(expected, what);
        }
        self.read_struct_array(expected, what)
    }

    /// Conformant array of structs: every flat body, then the pointees.
    pub fn read_struct_array<T: FromNdr>(&mut self, expected: usize, what: &str) -> OpcResult<Vec<T>> {
        let count = self.read_expected_count(expected, what)?;
        let mut flats = Vec::with_capacity(count);
        for _ in 0..count {
            flats.push(T::unmarshal_flat(self)?);
        }
        flats
            .into_iter()
            .map(|flat| T::unmarshal_deferred(flat, self))
            .collect()
    }

    /// A single struct with its pointees.
    pub fn read_struct<T: FromNdr>(&mut self) -> OpcResult<T> {
        let flat = T::unmarshal_flat(self)?;
        T::unmarshal_deferred(flat, self)
    }

    /// Conformant array of wide-string pointers. Null entries read as
    /// empty strings.
    pub fn read_string_array(&mut self, count: usize) -> OpcResult<Vec<String>> {
        let mut referents = Vec::with_capacity(count);
        for _ in 0..count {
            referents.push(self.read_referent()?);
        }
        referents
            .into_iter()
            .map(|referent| {
                if referent == 0 {
                    Ok(String::new())
                } else {
                    self.read_string()
                }
            })
            .collect()
    }

    /// Skips an `MInterfacePointer` out parameter and reports whether it
    /// was non-null. The live reference itself arrives out of band.
    pub fn read_interface_pointer(&mut self) -> OpcResult<bool> {
        if self.read_referent()? == 0 {
            return Ok(false);
        }
        let _cnt_data = self.read_u32()?;
        let len = self.read_count()?;
        self.skip(len)?;
        Ok(true)
    }

    fn empty_or_mismatch<T>(&self, expected: usize, what: &str) -> OpcResult<Vec<T>> {
        if expected == 0 {
            Ok(Vec::new())
        } else {
            Err(OpcError::Decode(format!(
                "expected {expected} {what}, server sent a null array"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment_is_measured_from_stub_start() {
        let mut w = NdrWriter::new();
        w.write_u8(1);
        w.write_u32(0xAABB_CCDD);
        w.write_u16(7);
        w.write_u64(1);
        assert_eq!(
            w.as_bytes(),
            &[
                1, 0, 0, 0, 0xDD, 0xCC, 0xBB, 0xAA, 7, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0
            ]
        );

        let mut r = NdrReader::new(w.into_bytes());
        assert_eq!(r.read_u8().unwrap(), 1);
        assert_eq!(r.read_u32().unwrap(), 0xAABB_CCDD);
        assert_eq!(r.read_u16().unwrap(), 7);
        assert_eq!(r.read_u64().unwrap(), 1);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_string_layout() {
        let mut w = NdrWriter::new();
        w.write_string("AB").unwrap();
        assert_eq!(
            w.as_bytes(),
            &[3, 0, 0, 0, 0, 0, 0, 0, 3, 0, 0, 0, b'A', 0, b'B', 0, 0, 0]
        );
        let mut r = NdrReader::new(w.into_bytes());
        assert_eq!(r.read_string().unwrap(), "AB");
    }

    #[test]
    fn test_inflated_string_length_is_a_decode_error() {
        let mut w = NdrWriter::new();
        w.write_u32(0xFFFF_FFFF);
        w.write_u32(0);
        w.write_u32(0xFFFF_FFFF);
        let mut r = NdrReader::new(w.into_bytes());
        assert!(matches!(r.read_string(), Err(OpcError::Decode(_))));
    }

    #[test]
    fn test_truncated_string_is_a_decode_error() {
        let mut w = NdrWriter::new();
        w.write_string("Tank.Level").unwrap();
        let mut bytes = w.into_bytes();
        bytes.truncate(bytes.len() - 3);
        let mut r = NdrReader::new(bytes);
        assert!(matches!(r.read_string(), Err(OpcError::Decode(_))));
    }

    #[test]
    fn test_inflated_string_offset_is_a_decode_error() {
        let mut w = NdrWriter::new();
        w.write_u32(3);
        w.write_u32(0xFFFF_FFFF);
        w.write_u32(3);
        let mut r = NdrReader::new(w.into_bytes());
        assert!(matches!(r.read_string(), Err(OpcError::Decode(_))));
    }

    #[test]
    fn test_unique_string_null_and_present() {
        let mut w = NdrWriter::new();
        w.write_unique_string(None).unwrap();
        w.write_unique_string(Some("Zürich")).unwrap();
        let mut r = NdrReader::new(w.into_bytes());
        assert_eq!(r.read_unique_string().unwrap(), None);
        assert_eq!(r.read_unique_string().unwrap().as_deref(), Some("Zürich"));
    }

    #[test]
    fn test_referents_are_distinct_and_nonzero() {
        let mut w = NdrWriter::new();
        w.write_referent(true);
        w.write_referent(false);
        w.write_referent(true);
        let mut r = NdrReader::new(w.into_bytes());
        let first = r.read_referent().unwrap();
        assert_eq!(r.read_referent().unwrap(), 0);
        let second = r.read_referent().unwrap();
        assert_ne!(first, 0);
        assert_ne!(first, second);
    }

    #[test]
    fn test_guid_is_little_endian_fields() {
        let iid = Uuid::from_u128(0x39C13A4D_011E_11D0_9675_0020AFD8ADB3);
        let mut w = NdrWriter::new();
        w.write_guid(&iid);
        assert_eq!(&w.as_bytes()[..4], &[0x4D, 0x3A, 0xC1, 0x39]);
        let mut r = NdrReader::new(w.into_bytes());
        assert_eq!(r.read_guid().unwrap(), iid);
    }

    #[test]
    fn test_short_buffer_is_decode_error() {
        let mut r = NdrReader::new(vec![1, 2]);
        let err = r.read_u32().unwrap_err();
        assert!(matches!(err, OpcError::Decode(_)));
    }

    #[test]
    fn test_count_mismatch_is_decode_error() {
        let mut w = NdrWriter::new();
        w.write_u32_array(&[1, 2, 3]).unwrap();
        let mut r = NdrReader::new(w.into_bytes());
        let err = r.read_u32_array(2, "errors").unwrap_err();
        assert!(err.to_string().contains("expected 2 errors"));
    }

    #[test]
    fn test_null_array_reads_empty_only_when_nothing_expected() {
        let mut r = NdrReader::new(vec![0, 0, 0, 0]);
        assert!(r.read_unique_u32_array(0, "errors").unwrap().is_empty());
        let mut r = NdrReader::new(vec![0, 0, 0, 0]);
        assert!(r.read_unique_u32_array(1, "errors").is_err());
    }

    #[test]
    fn test_interface_pointer_is_skipped() {
        let mut w = NdrWriter::new();
        w.write_referent(true);
        w.write_u32(5);
        w.write_u32(5);
        w.write_bytes(&[9, 9, 9, 9, 9]);
        w.write_u32(0x1234);
        let mut r = NdrReader::new(w.into_bytes());
        assert!(r.read_interface_pointer().unwrap());
        assert_eq!(r.read_u32().unwrap(), 0x1234);
    }

    #[test]
    fn test_patch_u32() {
        let mut w = NdrWriter::new();
        w.write_u32(0);
        w.write_u32(2);
        w.patch_u32(0, 9).unwrap();
        assert_eq!(&w.as_bytes()[..4], &[9, 0, 0, 0]);
        assert!(w.patch_u32(6, 1).is_err());
    }
}

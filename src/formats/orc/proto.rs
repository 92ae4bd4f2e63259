//! Protocol Buffers wire format, as far as the ORC file tail needs it

use super::corrupt;
use crate::error::Result;

const WIRE_VARINT: u64 = 0;
const WIRE_FIXED64: u64 = 1;
const WIRE_BYTES: u64 = 2;
const WIRE_FIXED32: u64 = 5;

pub(super) fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

pub(super) fn read_varint(bytes: &[u8], pos: &mut usize) -> Result<u64> {
    let mut value = 0u64;
    for shift in (0..64).step_by(7) {
        let byte = *bytes.get(*pos).ok_or_else(|| corrupt("truncated varint"))?;
        *pos += 1;
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(corrupt("varint longer than 64 bits"))
}

fn take<'a>(bytes: &'a [u8], pos: &mut usize, len: usize) -> Result<&'a [u8]> {
    let end = pos
        .checked_add(len)
        .filter(|end| *end <= bytes.len())
        .ok_or_else(|| corrupt("truncated message"))?;
    let slice = &bytes[*pos..end];
    *pos = end;
    Ok(slice)
}

/// Message encoder
#[derive(Debug, Default)]
pub(super) struct Message {
    buf: Vec<u8>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(&mut self, field: u32, wire: u64) {
        write_varint(&mut self.buf, (u64::from(field) << 3) | wire);
    }

    pub fn uint(&mut self, field: u32, value: u64) -> &mut Self {
        self.key(field, WIRE_VARINT);
        write_varint(&mut self.buf, value);
        self
    }

    pub fn bytes(&mut self, field: u32, value: &[u8]) -> &mut Self {
        self.key(field, WIRE_BYTES);
        write_varint(&mut self.buf, value.len() as u64);
        self.buf.extend_from_slice(value);
        self
    }

    pub fn message(&mut self, field: u32, value: &Message) -> &mut Self {
        self.bytes(field, &value.buf)
    }

    /// Repeated integers in packed form
    pub fn packed(&mut self, field: u32, values: &[u64]) -> &mut Self {
        let mut packed = Vec::new();
        for v in values {
            write_varint(&mut packed, *v);
        }
        self.bytes(field, &packed)
    }

    pub fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
}

#[derive(Debug, Clone, Copy)]
enum Value<'a> {
    Varint(u64),
    Bytes(&'a [u8]),
    Fixed,
}

/// Decoded fields of one message, in wire order
#[derive(Debug)]
pub(super) struct Fields<'a> {
    fields: Vec<(u32, Value<'a>)>,
}

impl<'a> Fields<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        let mut fields = Vec::new();
        let mut pos = 0;
        while pos < bytes.len() {
            let key = read_varint(bytes, &mut pos)?;
            let field = u32::try_from(key >> 3).map_err(|_| corrupt("field number"))?;
            let value = match key & 7 {
                WIRE_VARINT => Value::Varint(read_varint(bytes, &mut pos)?),
                WIRE_BYTES => {
                    let len = read_varint(bytes, &mut pos)?;
                    let len = usize::try_from(len).map_err(|_| corrupt("field length"))?;
                    Value::Bytes(take(bytes, &mut pos, len)?)
                }
                WIRE_FIXED64 => {
                    take(bytes, &mut pos, 8)?;
                    Value::Fixed
                }
                WIRE_FIXED32 => {
                    take(bytes, &mut pos, 4)?;
                    Value::Fixed
                }
                other => return Err(corrupt(&format!("wire type {}", other))),
            };
            fields.push((field, value));
        }
        Ok(Self { fields })
    }

    /// Last integer value of `field`
    pub fn uint(&self, field: u32) -> Option<u64> {
        self.fields.iter().rev().find_map(|(f, v)| match v {
            Value::Varint(x) if *f == field => Some(*x),
            _ => None,
        })
    }

    /// Last length-delimited value of `field`
    pub fn bytes(&self, field: u32) -> Option<&'a [u8]> {
        self.all_bytes(field).last()
    }

    pub fn all_bytes(&self, field: u32) -> impl Iterator<Item = &'a [u8]> + '_ {
        self.fields.iter().filter_map(move |(f, v)| match v {
            Value::Bytes(b) if *f == field => Some(*b),
            _ => None,
        })
    }

    /// Repeated integers, packed or not
    pub fn all_uints(&self, field: u32) -> Result<Vec<u64>> {
        let mut values = Vec::new();
        for (f, v) in &self.fields {
            if *f != field {
                continue;
            }
            match v {
                Value::Varint(x) => values.push(*x),
                Value::Bytes(packed) => {
                    let mut pos = 0;
                    while pos < packed.len() {
                        values.push(read_varint(packed, &mut pos)?);
                    }
                }
                Value::Fixed => {}
            }
        }
        Ok(values)
    }

    pub fn string(&self, field: u32) -> Option<String> {
        self.bytes(field).map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint() {
        let mut buf = Vec::new();
        for v in [0, 1, 127, 128, 300, u64::MAX] {
            write_varint(&mut buf, v);
        }
        assert_eq!(&buf[..4], &[0x00, 0x01, 0x7f, 0x80]);
        let mut pos = 0;
        let decoded: Vec<u64> = (0..6).map(|_| read_varint(&buf, &mut pos).unwrap()).collect();
        assert_eq!(decoded, vec![0, 1, 127, 128, 300, u64::MAX]);
        assert!(read_varint(&[0x80], &mut 0).is_err());
    }

    #[test]
    fn test_message_fields() {
        let mut inner = Message::new();
        inner.bytes(1, b"name");
        let mut msg = Message::new();
        msg.uint(1, 42).packed(2, &[1, 2, 300]).uint(2, 7).message(3, &inner).uint(1, 43);
        let bytes = msg.finish();

        let fields = Fields::parse(&bytes).unwrap();
        assert_eq!(fields.uint(1), Some(43));
        assert_eq!(fields.all_uints(2).unwrap(), vec![1, 2, 300, 7]);
        let inner = Fields::parse(fields.bytes(3).unwrap()).unwrap();
        assert_eq!(inner.string(1).as_deref(), Some("name"));
        assert_eq!(fields.uint(9), None);
    }

    #[test]
    fn test_truncated_message() {
        // field 1, length 10, only 2 bytes follow
        assert!(Fields::parse(&[0x0a, 0x0a, 0x01, 0x02]).is_err());
        assert!(Fields::parse(&[0x0b]).is_err());
    }
}

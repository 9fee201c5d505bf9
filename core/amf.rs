//! AMF0 (and minimal AMF3) value decoding for FLV script tags.
//!
//! FLV's `onMetaData` script tags are an AMF0-encoded key string followed
//! by an AMF0 (occasionally AMF3, via the 0x11 "avmplus object" switch
//! marker) value, decoded here into a free-form value tree. AMF3's full
//! object/trait-reference machinery is out of scope — only the common
//! scalar markers are decoded after a 0x11 switch, since that's what FLV
//! script tags are observed to carry.

use base::{bail, err, Error};
use byteorder::{BigEndian, ByteOrder};

use crate::bitreader::read_u32;

/// AMF value tree: a free-form decoded node.
#[derive(Debug, Clone, PartialEq)]
pub enum AmfValue {
    Number(f64),
    Boolean(bool),
    String(String),
    Object(Vec<(String, AmfValue)>),
    Null,
    Undefined,
    EcmaArray(Vec<(String, AmfValue)>),
    StrictArray(Vec<AmfValue>),
    Date { ms: f64, tz: i16 },
    LongString(String),
}

const AMF0_NUMBER: u8 = 0x00;
const AMF0_BOOLEAN: u8 = 0x01;
const AMF0_STRING: u8 = 0x02;
const AMF0_OBJECT: u8 = 0x03;
const AMF0_NULL: u8 = 0x05;
const AMF0_UNDEFINED: u8 = 0x06;
const AMF0_ECMA_ARRAY: u8 = 0x08;
const AMF0_OBJECT_END: u8 = 0x09;
const AMF0_STRICT_ARRAY: u8 = 0x0a;
const AMF0_DATE: u8 = 0x0b;
const AMF0_LONG_STRING: u8 = 0x0c;
const AMF0_AVMPLUS: u8 = 0x11;

/// Parses a single top-level AMF value (AMF0, switching to a minimal AMF3
/// scalar reader on `0x11`). Returns the value and the number of bytes
/// consumed.
pub fn parse(data: &[u8]) -> Result<(AmfValue, usize), Error> {
    parse_value(data)
}

fn parse_string0(data: &[u8]) -> Result<(String, usize), Error> {
    if data.len() < 2 {
        bail!(Internal, msg("truncated AMF0 string length"));
    }
    let len = BigEndian::read_u16(data) as usize;
    if data.len() < 2 + len {
        bail!(Internal, msg("truncated AMF0 string body"));
    }
    let s = String::from_utf8_lossy(&data[2..2 + len]).into_owned();
    Ok((s, 2 + len))
}

fn parse_long_string0(data: &[u8]) -> Result<(String, usize), Error> {
    if data.len() < 4 {
        bail!(Internal, msg("truncated AMF0 long string length"));
    }
    let len = read_u32(data, 0) as usize;
    if data.len() < 4 + len {
        bail!(Internal, msg("truncated AMF0 long string body"));
    }
    let s = String::from_utf8_lossy(&data[4..4 + len]).into_owned();
    Ok((s, 4 + len))
}

/// Parses AMF0 key/value pairs until the object-end marker (`00 00 09`).
fn parse_props(mut data: &[u8]) -> Result<(Vec<(String, AmfValue)>, usize), Error> {
    let mut consumed = 0;
    let mut props = Vec::new();
    loop {
        if data.len() >= 3 && data[0] == 0 && data[1] == 0 && data[2] == AMF0_OBJECT_END {
            consumed += 3;
            break;
        }
        let (key, key_len) = parse_string0(data)?;
        data = &data[key_len..];
        consumed += key_len;
        let (value, value_len) = parse_value(data)?;
        data = &data[value_len..];
        consumed += value_len;
        props.push((key, value));
    }
    Ok((props, consumed))
}

fn parse_value(data: &[u8]) -> Result<(AmfValue, usize), Error> {
    let marker = *data
        .first()
        .ok_or_else(|| err!(Internal, msg("empty AMF value")))?;
    let rest = &data[1..];
    match marker {
        AMF0_NUMBER => {
            if rest.len() < 8 {
                bail!(Internal, msg("truncated AMF0 number"));
            }
            Ok((AmfValue::Number(BigEndian::read_f64(rest)), 9))
        }
        AMF0_BOOLEAN => {
            let b = *rest
                .first()
                .ok_or_else(|| err!(Internal, msg("truncated AMF0 boolean")))?;
            Ok((AmfValue::Boolean(b != 0), 2))
        }
        AMF0_STRING => {
            let (s, len) = parse_string0(rest)?;
            Ok((AmfValue::String(s), 1 + len))
        }
        AMF0_OBJECT => {
            let (props, len) = parse_props(rest)?;
            Ok((AmfValue::Object(props), 1 + len))
        }
        AMF0_NULL => Ok((AmfValue::Null, 1)),
        AMF0_UNDEFINED => Ok((AmfValue::Undefined, 1)),
        AMF0_ECMA_ARRAY => {
            if rest.len() < 4 {
                bail!(Internal, msg("truncated AMF0 ECMA array count"));
            }
            // associative-array count is advisory; we just read until the
            // object-end marker like a regular object.
            let (props, len) = parse_props(&rest[4..])?;
            Ok((AmfValue::EcmaArray(props), 1 + 4 + len))
        }
        AMF0_STRICT_ARRAY => {
            if rest.len() < 4 {
                bail!(Internal, msg("truncated AMF0 strict array count"));
            }
            let count = read_u32(rest, 0) as usize;
            let mut items = Vec::with_capacity(count.min(4096));
            let mut off = 4;
            for _ in 0..count {
                let (v, len) = parse_value(&rest[off..])?;
                items.push(v);
                off += len;
            }
            Ok((AmfValue::StrictArray(items), 1 + off))
        }
        AMF0_DATE => {
            if rest.len() < 10 {
                bail!(Internal, msg("truncated AMF0 date"));
            }
            let ms = BigEndian::read_f64(rest);
            let tz = BigEndian::read_i16(&rest[8..]);
            Ok((AmfValue::Date { ms, tz }, 11))
        }
        AMF0_LONG_STRING => {
            let (s, len) = parse_long_string0(rest)?;
            Ok((AmfValue::LongString(s), 1 + len))
        }
        AMF0_AVMPLUS => {
            let (v, len) = parse_amf3_scalar(rest)?;
            Ok((v, 1 + len))
        }
        other => bail!(Internal, msg("unsupported AMF0 marker {other:#x}")),
    }
}

// AMF3 markers for the scalar subset we support after a 0x11 switch.
const AMF3_UNDEFINED: u8 = 0x00;
const AMF3_NULL: u8 = 0x01;
const AMF3_FALSE: u8 = 0x02;
const AMF3_TRUE: u8 = 0x03;
const AMF3_INTEGER: u8 = 0x04;
const AMF3_DOUBLE: u8 = 0x05;
const AMF3_STRING: u8 = 0x06;

fn parse_amf3_u29(data: &[u8]) -> Result<(u32, usize), Error> {
    let mut value: u32 = 0;
    for i in 0..4 {
        let b = *data
            .get(i)
            .ok_or_else(|| err!(Internal, msg("truncated AMF3 U29")))?;
        if i == 3 {
            value = (value << 8) | u32::from(b);
            return Ok((value, 4));
        }
        value = (value << 7) | u32::from(b & 0x7f);
        if b & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    unreachable!()
}

fn parse_amf3_scalar(data: &[u8]) -> Result<(AmfValue, usize), Error> {
    let marker = *data
        .first()
        .ok_or_else(|| err!(Internal, msg("empty AMF3 value")))?;
    let rest = &data[1..];
    match marker {
        AMF3_UNDEFINED => Ok((AmfValue::Undefined, 1)),
        AMF3_NULL => Ok((AmfValue::Null, 1)),
        AMF3_FALSE => Ok((AmfValue::Boolean(false), 1)),
        AMF3_TRUE => Ok((AmfValue::Boolean(true), 1)),
        AMF3_INTEGER => {
            let (v, len) = parse_amf3_u29(rest)?;
            // U29 is 29-bit two's complement.
            let signed = if v & 0x1000_0000 != 0 {
                v as i32 - 0x2000_0000
            } else {
                v as i32
            };
            Ok((AmfValue::Number(f64::from(signed)), 1 + len))
        }
        AMF3_DOUBLE => {
            if rest.len() < 8 {
                bail!(Internal, msg("truncated AMF3 double"));
            }
            Ok((AmfValue::Number(BigEndian::read_f64(rest)), 9))
        }
        AMF3_STRING => {
            let (len29, hdr_len) = parse_amf3_u29(rest)?;
            let byte_len = (len29 >> 1) as usize; // low bit is the "not a reference" flag
            let body = &rest[hdr_len..];
            if body.len() < byte_len {
                bail!(Internal, msg("truncated AMF3 string body"));
            }
            let s = String::from_utf8_lossy(&body[..byte_len]).into_owned();
            Ok((AmfValue::String(s), 1 + hdr_len + byte_len))
        }
        other => bail!(Internal, msg("unsupported AMF3 marker {other:#x}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_number() {
        let mut data = vec![AMF0_NUMBER];
        data.extend_from_slice(&42.5f64.to_be_bytes());
        let (v, len) = parse(&data).unwrap();
        assert_eq!(v, AmfValue::Number(42.5));
        assert_eq!(len, 9);
    }

    #[test]
    fn parses_string() {
        let mut data = vec![AMF0_STRING, 0x00, 0x05];
        data.extend_from_slice(b"hello");
        let (v, len) = parse(&data).unwrap();
        assert_eq!(v, AmfValue::String("hello".into()));
        assert_eq!(len, 8);
    }

    #[test]
    fn parses_ecma_array_like_onmetadata() {
        // { "width": 1920.0 }
        let mut data = vec![AMF0_ECMA_ARRAY, 0, 0, 0, 1];
        data.extend_from_slice(&[0x00, 0x05]);
        data.extend_from_slice(b"width");
        data.push(AMF0_NUMBER);
        data.extend_from_slice(&1920.0f64.to_be_bytes());
        data.extend_from_slice(&[0x00, 0x00, AMF0_OBJECT_END]);
        let (v, _) = parse(&data).unwrap();
        assert_eq!(
            v,
            AmfValue::EcmaArray(vec![("width".into(), AmfValue::Number(1920.0))])
        );
    }

    #[test]
    fn amf3_switch_decodes_double() {
        let mut data = vec![AMF0_AVMPLUS, AMF3_DOUBLE];
        data.extend_from_slice(&3.25f64.to_be_bytes());
        let (v, _) = parse(&data).unwrap();
        assert_eq!(v, AmfValue::Number(3.25));
    }
}

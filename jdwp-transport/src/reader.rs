// Helpers for reading and writing JDWP data types
//
// All multi-byte values are big-endian on the wire.

use crate::protocol::{JdwpError, JdwpResult};
use crate::types::{tags, Value, ValueData};
use bytes::Buf;
use bytes::BufMut;

fn need(buf: &&[u8], bytes: usize, what: &str) -> JdwpResult<()> {
    if buf.remaining() < bytes {
        return Err(JdwpError::Protocol(format!(
            "Not enough data for {what}: expected {bytes}, got {}",
            buf.remaining()
        )));
    }
    Ok(())
}

/// Read a JDWP string (4-byte length prefix + UTF-8 bytes)
pub fn read_string(buf: &mut &[u8]) -> JdwpResult<String> {
    need(buf, 4, "string length")?;
    let len = buf.get_u32() as usize;
    need(buf, len, "string body")?;

    let bytes = &buf[..len];
    buf.advance(len);

    String::from_utf8(bytes.to_vec())
        .map_err(|e| JdwpError::Protocol(format!("Invalid UTF-8 in string: {e}")))
}

/// Write a JDWP string (4-byte length prefix + UTF-8 bytes)
pub fn write_string(out: &mut Vec<u8>, s: &str) {
    out.put_u32(s.len() as u32);
    out.extend_from_slice(s.as_bytes());
}

pub fn read_u8(buf: &mut &[u8]) -> JdwpResult<u8> {
    need(buf, 1, "u8")?;
    Ok(buf.get_u8())
}

pub fn read_u16(buf: &mut &[u8]) -> JdwpResult<u16> {
    need(buf, 2, "u16")?;
    Ok(buf.get_u16())
}

pub fn read_i32(buf: &mut &[u8]) -> JdwpResult<i32> {
    need(buf, 4, "i32")?;
    Ok(buf.get_i32())
}

pub fn read_u32(buf: &mut &[u8]) -> JdwpResult<u32> {
    need(buf, 4, "u32")?;
    Ok(buf.get_u32())
}

pub fn read_u64(buf: &mut &[u8]) -> JdwpResult<u64> {
    need(buf, 8, "u64")?;
    Ok(buf.get_u64())
}

pub fn read_bool(buf: &mut &[u8]) -> JdwpResult<bool> {
    Ok(read_u8(buf)? != 0)
}

/// Read a tagged value (tag byte followed by the payload it implies)
pub fn read_tagged_value(buf: &mut &[u8]) -> JdwpResult<Value> {
    let tag = read_u8(buf)?;
    let data = read_value_payload(tag, buf)?;
    Ok(Value { tag, data })
}

/// Read a value payload for a known tag
pub fn read_value_payload(tag: u8, buf: &mut &[u8]) -> JdwpResult<ValueData> {
    match tag {
        tags::BYTE => {
            need(buf, 1, "byte value")?;
            Ok(ValueData::Byte(buf.get_i8()))
        }
        tags::CHAR => {
            need(buf, 2, "char value")?;
            Ok(ValueData::Char(buf.get_u16()))
        }
        tags::DOUBLE => {
            need(buf, 8, "double value")?;
            Ok(ValueData::Double(buf.get_f64()))
        }
        tags::FLOAT => {
            need(buf, 4, "float value")?;
            Ok(ValueData::Float(buf.get_f32()))
        }
        tags::INT => {
            need(buf, 4, "int value")?;
            Ok(ValueData::Int(buf.get_i32()))
        }
        tags::LONG => {
            need(buf, 8, "long value")?;
            Ok(ValueData::Long(buf.get_i64()))
        }
        tags::SHORT => {
            need(buf, 2, "short value")?;
            Ok(ValueData::Short(buf.get_i16()))
        }
        tags::BOOLEAN => Ok(ValueData::Boolean(read_u8(buf)? != 0)),
        tags::VOID => Ok(ValueData::Void),
        t if tags::is_object(t) => Ok(ValueData::Object(read_u64(buf)?)),
        other => Err(JdwpError::Protocol(format!("Unknown value tag: {other}"))),
    }
}

/// Write a tagged value (used by StackFrame.SetValues)
pub fn write_tagged_value(out: &mut Vec<u8>, value: &Value) {
    out.put_u8(value.tag);
    match &value.data {
        ValueData::Byte(v) => out.put_i8(*v),
        ValueData::Char(v) => out.put_u16(*v),
        ValueData::Double(v) => out.put_f64(*v),
        ValueData::Float(v) => out.put_f32(*v),
        ValueData::Int(v) => out.put_i32(*v),
        ValueData::Long(v) => out.put_i64(*v),
        ValueData::Short(v) => out.put_i16(*v),
        ValueData::Boolean(v) => out.put_u8(u8::from(*v)),
        ValueData::Object(id) => out.put_u64(*id),
        ValueData::Void => {}
    }
}

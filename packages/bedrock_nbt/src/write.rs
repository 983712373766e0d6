use crate::varint::{write_vari32, write_vari64, write_varu32};
use crate::{Compound, Encoding, Value};

/// Append a named root compound to `out`.
pub fn write_compound(out: &mut Vec<u8>, name: &str, map: &Compound, e: Encoding) {
    out.push(10);
    write_string(out, name, e);
    write_compound_body(out, map, e);
}

fn write_compound_body(out: &mut Vec<u8>, map: &Compound, e: Encoding) {
    for (name, value) in map {
        out.push(value.tag());
        write_string(out, name, e);
        write_value(out, value, e);
    }
    out.push(0);
}

fn write_value(out: &mut Vec<u8>, value: &Value, e: Encoding) {
    match value {
        Value::Byte(v) => out.push(*v),
        Value::Short(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::Int(v) => write_i32(out, *v, e),
        Value::Long(v) => write_i64(out, *v, e),
        Value::Float(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::Double(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::ByteArray(v) => {
            write_i32(out, v.len() as i32, e);
            out.extend_from_slice(v);
        }
        Value::String(v) => write_string(out, v, e),
        Value::List(v) => {
            let elem_tag = v.first().map(Value::tag).unwrap_or(0);
            out.push(elem_tag);
            write_i32(out, v.len() as i32, e);
            for elem in v {
                write_value(out, elem, e);
            }
        }
        Value::Compound(v) => write_compound_body(out, v, e),
        Value::IntArray(v) => {
            write_i32(out, v.len() as i32, e);
            for elem in v {
                write_i32(out, *elem, e);
            }
        }
        Value::LongArray(v) => {
            write_i32(out, v.len() as i32, e);
            for elem in v {
                write_i64(out, *elem, e);
            }
        }
    }
}

fn write_i32(out: &mut Vec<u8>, v: i32, e: Encoding) {
    match e {
        Encoding::LittleEndian => out.extend_from_slice(&v.to_le_bytes()),
        Encoding::NetworkLittleEndian => write_vari32(out, v),
    }
}

fn write_i64(out: &mut Vec<u8>, v: i64, e: Encoding) {
    match e {
        Encoding::LittleEndian => out.extend_from_slice(&v.to_le_bytes()),
        Encoding::NetworkLittleEndian => write_vari64(out, v),
    }
}

fn write_string(out: &mut Vec<u8>, v: &str, e: Encoding) {
    match e {
        Encoding::LittleEndian => out.extend_from_slice(&(v.len() as u16).to_le_bytes()),
        Encoding::NetworkLittleEndian => write_varu32(out, v.len() as u32),
    }
    out.extend_from_slice(v.as_bytes());
}

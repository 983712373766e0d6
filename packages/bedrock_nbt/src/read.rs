use crate::varint::{read_vari32, read_vari64, read_varu32};
use crate::{Compound, Encoding, Error, Result, Value};

/// Read a single named root compound from the front of `r`, advancing it.
pub fn read_compound(r: &mut &[u8], e: Encoding) -> Result<Compound> {
    let tag = read_u8(r)?;
    if tag != 10 {
        return Err(Error::RootNotCompound(tag));
    }
    // The root name is read and discarded.
    read_string(r, e)?;
    read_compound_body(r, e)
}

/// Read root compounds back to back until the input is exhausted.
///
/// This is the layout of the embedded block state catalogue and of the entity
/// and block entity streams in the world database.
pub fn read_compounds(mut data: &[u8], e: Encoding) -> Result<Vec<Compound>> {
    let r = &mut data;
    let mut out = Vec::new();
    while !r.is_empty() {
        out.push(read_compound(r, e)?);
    }
    Ok(out)
}

fn read_compound_body(r: &mut &[u8], e: Encoding) -> Result<Compound> {
    let mut map = Compound::new();
    loop {
        let tag = read_u8(r)?;
        if tag == 0 {
            return Ok(map);
        }
        let name = read_string(r, e)?;
        let value = read_value(r, e, tag)?;
        map.insert(name, value);
    }
}

fn read_value(r: &mut &[u8], e: Encoding, tag: u8) -> Result<Value> {
    Ok(match tag {
        1 => Value::Byte(read_u8(r)?),
        2 => Value::Short(i16::from_le_bytes(read_array(r)?)),
        3 => Value::Int(read_i32(r, e)?),
        4 => Value::Long(read_i64(r, e)?),
        5 => Value::Float(f32::from_le_bytes(read_array(r)?)),
        6 => Value::Double(f64::from_le_bytes(read_array(r)?)),
        7 => {
            let len = read_len(r, e)?;
            Value::ByteArray(read_exact(r, len)?.to_vec())
        }
        8 => Value::String(read_string(r, e)?),
        9 => {
            let elem_tag = read_u8(r)?;
            let len = read_len(r, e)?;
            if elem_tag == 0 && len != 0 {
                return Err(Error::InvalidList);
            }
            let mut list = Vec::with_capacity(len.min(4096));
            for _ in 0..len {
                list.push(read_value(r, e, elem_tag)?);
            }
            Value::List(list)
        }
        10 => Value::Compound(read_compound_body(r, e)?),
        11 => {
            let len = read_len(r, e)?;
            let mut array = Vec::with_capacity(len.min(4096));
            for _ in 0..len {
                array.push(read_i32(r, e)?);
            }
            Value::IntArray(array)
        }
        12 => {
            let len = read_len(r, e)?;
            let mut array = Vec::with_capacity(len.min(4096));
            for _ in 0..len {
                array.push(read_i64(r, e)?);
            }
            Value::LongArray(array)
        }
        tag => return Err(Error::UnknownTag(tag)),
    })
}

fn read_u8(r: &mut &[u8]) -> Result<u8> {
    let (&b, rest) = r.split_first().ok_or(Error::UnexpectedEof)?;
    *r = rest;
    Ok(b)
}

fn read_exact<'a>(r: &mut &'a [u8], n: usize) -> Result<&'a [u8]> {
    if r.len() < n {
        return Err(Error::UnexpectedEof);
    }
    let (data, rest) = r.split_at(n);
    *r = rest;
    Ok(data)
}

fn read_array<const N: usize>(r: &mut &[u8]) -> Result<[u8; N]> {
    let mut out = [0u8; N];
    out.copy_from_slice(read_exact(r, N)?);
    Ok(out)
}

fn read_i32(r: &mut &[u8], e: Encoding) -> Result<i32> {
    match e {
        Encoding::LittleEndian => Ok(i32::from_le_bytes(read_array(r)?)),
        Encoding::NetworkLittleEndian => read_vari32(r),
    }
}

fn read_i64(r: &mut &[u8], e: Encoding) -> Result<i64> {
    match e {
        Encoding::LittleEndian => Ok(i64::from_le_bytes(read_array(r)?)),
        Encoding::NetworkLittleEndian => read_vari64(r),
    }
}

fn read_len(r: &mut &[u8], e: Encoding) -> Result<usize> {
    let len = read_i32(r, e)?;
    usize::try_from(len).map_err(|_| Error::InvalidLength(len))
}

fn read_string(r: &mut &[u8], e: Encoding) -> Result<String> {
    let len = match e {
        Encoding::LittleEndian => u16::from_le_bytes(read_array(r)?) as usize,
        Encoding::NetworkLittleEndian => read_varu32(r)? as usize,
    };
    let data = read_exact(r, len)?;
    String::from_utf8(data.to_vec()).map_err(|_| Error::InvalidString)
}

//! Primitive wire codec for the replay capture format.
//!
//! Integers are 7-bit varints (little-endian groups, continuation in the
//! high bit), floats are fixed 32-bit little-endian IEEE, strings are
//! varint-length-prefixed single-byte payloads. Nearly every record is
//! dominated by one or two varints, which is what keeps captures compact.
//!
//! Any decode hitting the end of the stream surfaces an `UnexpectedEof`
//! IO error; callers classify that with [`crate::Error::is_eof`] since a
//! truncated read is the normal end-of-capture signal.

use std::collections::HashMap;
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::types::{Color, Point, Quaternion, Transform};
use crate::{Error, Result};

/// Reads a 7-bit encoded varint.
pub fn read_varint<R: Read>(reader: &mut R) -> Result<i32> {
    let mut result = 0i32;
    let mut shift = 0;
    loop {
        let byte = reader.read_u8()?;
        result |= ((byte & 0x7F) as i32) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift >= 32 {
            return Err(Error::VarIntTooLarge);
        }
    }
    Ok(result)
}

/// Writes a 7-bit encoded varint.
pub fn write_varint<W: Write>(writer: &mut W, mut value: i32) -> Result<()> {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value = ((value as u32) >> 7) as i32;
        if value != 0 {
            byte |= 0x80;
        }
        writer.write_u8(byte)?;
        if value == 0 {
            break;
        }
    }
    Ok(())
}

pub fn read_f32<R: Read>(reader: &mut R) -> Result<f32> {
    Ok(reader.read_f32::<LittleEndian>()?)
}

pub fn write_f32<W: Write>(writer: &mut W, value: f32) -> Result<()> {
    writer.write_f32::<LittleEndian>(value)?;
    Ok(())
}

/// Reads a plain 4-byte little-endian int. Used only for the mesh vertex
/// count and the uncompressed-file header sentinel, which predate the
/// varint convention.
pub fn read_i32<R: Read>(reader: &mut R) -> Result<i32> {
    Ok(reader.read_i32::<LittleEndian>()?)
}

pub fn write_i32<W: Write>(writer: &mut W, value: i32) -> Result<()> {
    writer.write_i32::<LittleEndian>(value)?;
    Ok(())
}

/// Reads a varint-length-prefixed string.
///
/// The format is nominally ASCII; the payload is decoded as UTF-8, of
/// which the single-byte range is a subset.
pub fn read_string<R: Read>(reader: &mut R) -> Result<String> {
    let len = read_varint(reader)? as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(String::from_utf8(buf)?)
}

pub fn write_string<W: Write>(writer: &mut W, value: &str) -> Result<()> {
    let bytes = value.as_bytes();
    write_varint(writer, bytes.len() as i32)?;
    writer.write_all(bytes)?;
    Ok(())
}

/// Reads a string map: varint pair count, then key/value strings.
/// Duplicate keys resolve last-write-wins; pair order is not preserved.
pub fn read_string_map<R: Read>(reader: &mut R) -> Result<HashMap<String, String>> {
    let count = read_varint(reader)?;
    let mut map = HashMap::with_capacity(count.max(0) as usize);
    for _ in 0..count {
        let key = read_string(reader)?;
        let value = read_string(reader)?;
        map.insert(key, value);
    }
    Ok(map)
}

pub fn write_string_map<W: Write>(writer: &mut W, map: &HashMap<String, String>) -> Result<()> {
    write_varint(writer, map.len() as i32)?;
    for (key, value) in map {
        write_string(writer, key)?;
        write_string(writer, value)?;
    }
    Ok(())
}

pub fn read_point<R: Read>(reader: &mut R) -> Result<Point> {
    Ok(Point {
        x: read_f32(reader)?,
        y: read_f32(reader)?,
        z: read_f32(reader)?,
    })
}

pub fn write_point<W: Write>(writer: &mut W, point: &Point) -> Result<()> {
    write_f32(writer, point.x)?;
    write_f32(writer, point.y)?;
    write_f32(writer, point.z)?;
    Ok(())
}

pub fn read_quaternion<R: Read>(reader: &mut R) -> Result<Quaternion> {
    Ok(Quaternion {
        x: read_f32(reader)?,
        y: read_f32(reader)?,
        z: read_f32(reader)?,
        w: read_f32(reader)?,
    })
}

pub fn write_quaternion<W: Write>(writer: &mut W, quat: &Quaternion) -> Result<()> {
    write_f32(writer, quat.x)?;
    write_f32(writer, quat.y)?;
    write_f32(writer, quat.z)?;
    write_f32(writer, quat.w)?;
    Ok(())
}

pub fn read_transform<R: Read>(reader: &mut R) -> Result<Transform> {
    Ok(Transform {
        translation: read_point(reader)?,
        rotation: read_quaternion(reader)?,
    })
}

pub fn write_transform<W: Write>(writer: &mut W, xform: &Transform) -> Result<()> {
    write_point(writer, &xform.translation)?;
    write_quaternion(writer, &xform.rotation)?;
    Ok(())
}

/// Reads a color as its varint palette index.
pub fn read_color<R: Read>(reader: &mut R) -> Result<Color> {
    let index = read_varint(reader)?;
    Color::from_index(index).ok_or(Error::InvalidColorIndex(index))
}

pub fn write_color<W: Write>(writer: &mut W, color: Color) -> Result<()> {
    write_varint(writer, color.index())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn varint_roundtrip(value: i32) -> Vec<u8> {
        let mut buf = Vec::new();
        write_varint(&mut buf, value).unwrap();
        assert_eq!(read_varint(&mut Cursor::new(&buf)).unwrap(), value);
        buf
    }

    #[test]
    fn test_varint_roundtrip() {
        assert_eq!(varint_roundtrip(0), [0x00]);
        assert_eq!(varint_roundtrip(1), [0x01]);
        assert_eq!(varint_roundtrip(127), [0x7F]);
        assert_eq!(varint_roundtrip(128), [0x80, 0x01]);
        assert_eq!(varint_roundtrip(255), [0xFF, 0x01]);
        varint_roundtrip(300);
        varint_roundtrip(1 << 20);
        varint_roundtrip(i32::MAX);
    }

    #[test]
    fn test_varint_eof_is_classified() {
        let err = read_varint(&mut Cursor::new(&[] as &[u8])).unwrap_err();
        assert!(err.is_eof());
        // Truncated continuation is also EOF.
        let err = read_varint(&mut Cursor::new(&[0x80u8][..])).unwrap_err();
        assert!(err.is_eof());
    }

    #[test]
    fn test_string_roundtrip() {
        let mut buf = Vec::new();
        write_string(&mut buf, "player/weapons/rifle").unwrap();
        write_string(&mut buf, "").unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(read_string(&mut cursor).unwrap(), "player/weapons/rifle");
        assert_eq!(read_string(&mut cursor).unwrap(), "");
    }

    #[test]
    fn test_string_truncated_payload_is_eof() {
        let mut buf = Vec::new();
        write_string(&mut buf, "abcdef").unwrap();
        buf.truncate(3);
        assert!(read_string(&mut Cursor::new(buf)).unwrap_err().is_eof());
    }

    #[test]
    fn test_string_map_roundtrip() {
        let mut map = HashMap::new();
        map.insert("team".to_string(), "red".to_string());
        map.insert("class".to_string(), "scout".to_string());

        let mut buf = Vec::new();
        write_string_map(&mut buf, &map).unwrap();
        let read = read_string_map(&mut Cursor::new(buf)).unwrap();
        assert_eq!(read, map);
    }

    #[test]
    fn test_transform_roundtrip() {
        let xform = Transform {
            translation: Point::new(1.0, -2.5, 3.25),
            rotation: Quaternion { x: 0.5, y: 0.5, z: 0.5, w: 0.5 },
        };
        let mut buf = Vec::new();
        write_transform(&mut buf, &xform).unwrap();
        assert_eq!(buf.len(), 28);
        assert_eq!(read_transform(&mut Cursor::new(buf)).unwrap(), xform);
    }

    #[test]
    fn test_color_wire_index() {
        let mut buf = Vec::new();
        write_color(&mut buf, Color::Red).unwrap();
        assert_eq!(buf, [61]);
        assert_eq!(read_color(&mut Cursor::new(buf)).unwrap(), Color::Red);

        let err = read_color(&mut Cursor::new(vec![0xFE, 0x01])).unwrap_err();
        assert!(matches!(err, Error::InvalidColorIndex(254)));
    }
}

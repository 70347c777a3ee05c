//! Minimal class-file decoder.
//!
//! Only the constant pool, `this_class` and the method table are
//! interpreted; everything else is skipped by length. See the
//! [class file format](https://docs.oracle.com/javase/specs/jvms/se21/html/jvms-4.html).

use byteorder::{BigEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use crate::error::ClassParseError;

const MAGIC: u32 = 0xCAFE_BABE;

const TAG_UTF8: u8 = 1;
const TAG_INTEGER: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_LONG: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_CLASS: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_FIELDREF: u8 = 9;
const TAG_METHODREF: u8 = 10;
const TAG_INTERFACE_METHODREF: u8 = 11;
const TAG_NAME_AND_TYPE: u8 = 12;
const TAG_METHOD_HANDLE: u8 = 15;
const TAG_METHOD_TYPE: u8 = 16;
const TAG_DYNAMIC: u8 = 17;
const TAG_INVOKE_DYNAMIC: u8 = 18;
const TAG_MODULE: u8 = 19;
const TAG_PACKAGE: u8 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassEntry {
    pub fully_qualified_name: String,
    pub simple_name: String,
    pub method_names: Vec<String>,
}

#[derive(Debug, Clone)]
enum Constant {
    Unused,
    Utf8(String),
    Class(u16),
    Other,
}

struct ClassReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> ClassReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(bytes),
        }
    }

    fn u1(&mut self) -> Result<u8, ClassParseError> {
        Ok(self.cursor.read_u8()?)
    }

    fn u2(&mut self) -> Result<u16, ClassParseError> {
        Ok(self.cursor.read_u16::<BigEndian>()?)
    }

    fn u4(&mut self) -> Result<u32, ClassParseError> {
        Ok(self.cursor.read_u32::<BigEndian>()?)
    }

    fn skip(&mut self, n: u64) -> Result<(), ClassParseError> {
        let end = self.cursor.position() + n;
        if end > self.cursor.get_ref().len() as u64 {
            return Err(ClassParseError::Truncated);
        }
        self.cursor.set_position(end);
        Ok(())
    }

    fn utf8(&mut self, len: usize) -> Result<String, ClassParseError> {
        let start = self.cursor.position() as usize;
        let bytes = self
            .cursor
            .get_ref()
            .get(start..start + len)
            .ok_or(ClassParseError::Truncated)?;
        let text = String::from_utf8_lossy(bytes).into_owned();
        self.cursor.set_position((start + len) as u64);
        Ok(text)
    }

    fn skip_attributes(&mut self) -> Result<(), ClassParseError> {
        let count = self.u2()?;
        for _ in 0..count {
            self.u2()?;
            let len = self.u4()?;
            self.skip(u64::from(len))?;
        }
        Ok(())
    }
}

/// Decodes the class name and method names from raw class-file bytes.
///
/// Constructors and static initializers are left out of `method_names`.
pub fn parse_class(bytes: &[u8]) -> Result<ClassEntry, ClassParseError> {
    let mut r = ClassReader::new(bytes);

    let magic = r.u4()?;
    if magic != MAGIC {
        return Err(ClassParseError::BadMagic(magic));
    }
    r.u2()?; // minor
    r.u2()?; // major

    let pool = read_constant_pool(&mut r)?;

    r.u2()?; // access flags
    let this_class = r.u2()?;
    let internal_name = resolve_class(&pool, this_class).ok_or(ClassParseError::MissingClassName)?;
    let fully_qualified_name = internal_name.replace('/', ".");

    r.u2()?; // super class
    let interfaces = r.u2()?;
    r.skip(u64::from(interfaces) * 2)?;

    let fields = r.u2()?;
    for _ in 0..fields {
        r.skip(6)?;
        r.skip_attributes()?;
    }

    let methods = r.u2()?;
    let mut method_names = Vec::with_capacity(methods as usize);
    for _ in 0..methods {
        r.u2()?; // access flags
        let name_index = r.u2()?;
        r.u2()?; // descriptor
        if let Some(name) = resolve_utf8(&pool, name_index)
            && name != "<init>"
            && name != "<clinit>"
        {
            method_names.push(name.to_string());
        }
        r.skip_attributes()?;
    }

    let simple_name = fully_qualified_name
        .rsplit('.')
        .next()
        .unwrap_or(&fully_qualified_name)
        .to_string();

    Ok(ClassEntry {
        fully_qualified_name,
        simple_name,
        method_names,
    })
}

fn read_constant_pool(r: &mut ClassReader<'_>) -> Result<Vec<Constant>, ClassParseError> {
    let count = r.u2()?;
    let mut pool = vec![Constant::Unused; count as usize];

    // Slots are 1-indexed; long and double occupy two.
    let mut slot = 1u16;
    while slot < count {
        let tag = r.u1()?;
        let mut width = 1;
        let constant = match tag {
            TAG_UTF8 => {
                let len = r.u2()?;
                Constant::Utf8(r.utf8(len as usize)?)
            }
            TAG_CLASS => Constant::Class(r.u2()?),
            TAG_INTEGER | TAG_FLOAT => {
                r.skip(4)?;
                Constant::Other
            }
            TAG_LONG | TAG_DOUBLE => {
                r.skip(8)?;
                width = 2;
                Constant::Other
            }
            TAG_STRING | TAG_METHOD_TYPE | TAG_MODULE | TAG_PACKAGE => {
                r.skip(2)?;
                Constant::Other
            }
            TAG_FIELDREF | TAG_METHODREF | TAG_INTERFACE_METHODREF | TAG_NAME_AND_TYPE
            | TAG_DYNAMIC | TAG_INVOKE_DYNAMIC => {
                r.skip(4)?;
                Constant::Other
            }
            TAG_METHOD_HANDLE => {
                r.skip(3)?;
                Constant::Other
            }
            other => return Err(ClassParseError::UnknownTag { tag: other, slot }),
        };
        pool[slot as usize] = constant;
        slot = slot.saturating_add(width);
    }

    Ok(pool)
}

fn resolve_utf8(pool: &[Constant], index: u16) -> Option<&str> {
    match pool.get(index as usize)? {
        Constant::Utf8(s) if index > 0 => Some(s.as_str()),
        _ => None,
    }
}

fn resolve_class(pool: &[Constant], index: u16) -> Option<&str> {
    match pool.get(index as usize)? {
        Constant::Class(name_index) if index > 0 => resolve_utf8(pool, *name_index),
        _ => None,
    }
}

//! ABI definition model.
//!
//! The JSON form is what accounts store; the binary form is what `setabi`
//! carries on chain.

use serde::{Deserialize, Serialize};

use crate::abi::stream::{AbiReader, AbiWriter};
use crate::abi::AbiError;
use crate::name::Name;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    pub new_type_name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructDef {
    pub name: String,
    #[serde(default)]
    pub base: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDef {
    pub name: Name,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub ricardian_contract: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: Name,
    #[serde(default)]
    pub index_type: String,
    #[serde(default)]
    pub key_names: Vec<String>,
    #[serde(default)]
    pub key_types: Vec<String>,
    #[serde(rename = "type")]
    pub type_name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClausePair {
    pub id: String,
    pub body: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub error_code: u64,
    pub error_msg: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiExtension {
    pub tag: u16,
    #[serde(with = "hex::serde")]
    pub value: Vec<u8>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantDef {
    pub name: String,
    #[serde(default)]
    pub types: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbiDef {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub types: Vec<TypeDef>,
    #[serde(default)]
    pub structs: Vec<StructDef>,
    #[serde(default)]
    pub actions: Vec<ActionDef>,
    #[serde(default)]
    pub tables: Vec<TableDef>,
    #[serde(default)]
    pub ricardian_clauses: Vec<ClausePair>,
    #[serde(default)]
    pub error_messages: Vec<ErrorMessage>,
    #[serde(default)]
    pub abi_extensions: Vec<AbiExtension>,
    #[serde(default)]
    pub variants: Vec<VariantDef>,
}

fn read_vec<'a, T>(
    reader: &mut AbiReader<'a>,
    mut read: impl FnMut(&mut AbiReader<'a>) -> Result<T, AbiError>,
) -> Result<Vec<T>, AbiError> {
    let count = reader.read_varuint32()? as usize;
    // Every element takes at least one byte, so a larger count is corrupt.
    if count > reader.remaining() {
        return Err(AbiError::InvalidData(format!("vector of {count} elements exceeds remaining data")));
    }
    (0..count).map(|_| read(reader)).collect()
}

fn write_vec<T>(
    writer: &mut AbiWriter,
    items: &[T],
    mut write: impl FnMut(&mut AbiWriter, &T) -> Result<(), AbiError>,
) -> Result<(), AbiError> {
    let count = u32::try_from(items.len()).map_err(|_| AbiError::InvalidData("vector too long".to_string()))?;
    writer.write_varuint32(count);
    items.iter().try_for_each(|item| write(writer, item))
}

fn read_strings(reader: &mut AbiReader<'_>) -> Result<Vec<String>, AbiError> {
    read_vec(reader, |r| r.read_string())
}

fn write_strings(writer: &mut AbiWriter, items: &[String]) -> Result<(), AbiError> {
    write_vec(writer, items, |w, s| w.write_string(s))
}

impl AbiDef {
    /// Parses the binary ABI carried by `setabi`.
    pub fn unpack(data: &[u8]) -> Result<Self, AbiError> {
        let mut r = AbiReader::new(data);

        let version = r.read_string()?;
        if !version.starts_with("eosio::abi/1.") {
            return Err(AbiError::UnsupportedVersion(version));
        }

        let types = read_vec(&mut r, |r| {
            Ok(TypeDef { new_type_name: r.read_string()?, type_name: r.read_string()? })
        })?;
        let structs = read_vec(&mut r, |r| {
            Ok(StructDef {
                name: r.read_string()?,
                base: r.read_string()?,
                fields: read_vec(r, |r| Ok(FieldDef { name: r.read_string()?, type_name: r.read_string()? }))?,
            })
        })?;
        let actions = read_vec(&mut r, |r| {
            Ok(ActionDef {
                name: Name::new(r.read_u64()?),
                type_name: r.read_string()?,
                ricardian_contract: r.read_string()?,
            })
        })?;
        let tables = read_vec(&mut r, |r| {
            Ok(TableDef {
                name: Name::new(r.read_u64()?),
                index_type: r.read_string()?,
                key_names: read_strings(r)?,
                key_types: read_strings(r)?,
                type_name: r.read_string()?,
            })
        })?;

        // Everything past the tables was added in later ABI revisions and may be absent.
        let mut abi = AbiDef { version, types, structs, actions, tables, ..Default::default() };
        if r.is_empty() {
            return Ok(abi);
        }
        abi.ricardian_clauses =
            read_vec(&mut r, |r| Ok(ClausePair { id: r.read_string()?, body: r.read_string()? }))?;
        if r.is_empty() {
            return Ok(abi);
        }
        abi.error_messages =
            read_vec(&mut r, |r| Ok(ErrorMessage { error_code: r.read_u64()?, error_msg: r.read_string()? }))?;
        if r.is_empty() {
            return Ok(abi);
        }
        abi.abi_extensions =
            read_vec(&mut r, |r| Ok(AbiExtension { tag: r.read_u16()?, value: r.read_blob()?.to_vec() }))?;
        if r.is_empty() {
            return Ok(abi);
        }
        abi.variants = read_vec(&mut r, |r| Ok(VariantDef { name: r.read_string()?, types: read_strings(r)? }))?;

        Ok(abi)
    }

    pub fn pack(&self) -> Result<Vec<u8>, AbiError> {
        let mut w = AbiWriter::new();

        w.write_string(&self.version)?;
        write_vec(&mut w, &self.types, |w, t| {
            w.write_string(&t.new_type_name)?;
            w.write_string(&t.type_name)
        })?;
        write_vec(&mut w, &self.structs, |w, s| {
            w.write_string(&s.name)?;
            w.write_string(&s.base)?;
            write_vec(w, &s.fields, |w, f| {
                w.write_string(&f.name)?;
                w.write_string(&f.type_name)
            })
        })?;
        write_vec(&mut w, &self.actions, |w, a| {
            w.write_u64(a.name.as_u64());
            w.write_string(&a.type_name)?;
            w.write_string(&a.ricardian_contract)
        })?;
        write_vec(&mut w, &self.tables, |w, t| {
            w.write_u64(t.name.as_u64());
            w.write_string(&t.index_type)?;
            write_strings(w, &t.key_names)?;
            write_strings(w, &t.key_types)?;
            w.write_string(&t.type_name)
        })?;
        write_vec(&mut w, &self.ricardian_clauses, |w, c| {
            w.write_string(&c.id)?;
            w.write_string(&c.body)
        })?;
        write_vec(&mut w, &self.error_messages, |w, e| {
            w.write_u64(e.error_code);
            w.write_string(&e.error_msg)
        })?;
        write_vec(&mut w, &self.abi_extensions, |w, e| {
            w.write_u16(e.tag);
            w.write_blob(&e.value)
        })?;
        if !self.variants.is_empty() {
            write_vec(&mut w, &self.variants, |w, v| {
                w.write_string(&v.name)?;
                write_strings(w, &v.types)
            })?;
        }

        Ok(w.into_bytes())
    }

    pub fn from_json(json: &str) -> Result<Self, AbiError> {
        serde_json::from_str(json).map_err(|e| AbiError::InvalidDefinition(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, AbiError> {
        serde_json::to_string(self).map_err(|e| AbiError::InvalidDefinition(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_abi() -> AbiDef {
        AbiDef {
            version: "eosio::abi/1.1".to_string(),
            structs: vec![StructDef {
                name: "issue".to_string(),
                base: String::new(),
                fields: vec![
                    FieldDef { name: "to".to_string(), type_name: "name".to_string() },
                    FieldDef { name: "quantity".to_string(), type_name: "asset".to_string() },
                ],
            }],
            actions: vec![ActionDef {
                name: Name::from_str_unchecked("issue"),
                type_name: "issue".to_string(),
                ricardian_contract: String::new(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_binary_abi_survives_pack() {
        let abi = token_abi();
        let unpacked = AbiDef::unpack(&abi.pack().unwrap()).unwrap();
        assert_eq!(unpacked, abi);
    }

    #[test]
    fn test_old_binary_abi_without_trailing_sections() {
        let mut w = AbiWriter::new();
        w.write_string("eosio::abi/1.0").unwrap();
        for _ in 0..4 {
            w.write_varuint32(0);
        }
        let abi = AbiDef::unpack(&w.into_bytes()).unwrap();
        assert_eq!(abi.version, "eosio::abi/1.0");
        assert!(abi.error_messages.is_empty());
    }

    #[test]
    fn test_rejects_unknown_version() {
        let mut w = AbiWriter::new();
        w.write_string("something/2.0").unwrap();
        assert!(matches!(AbiDef::unpack(&w.into_bytes()), Err(AbiError::UnsupportedVersion(_))));
    }

    #[test]
    fn test_json_uses_type_key() {
        let json = token_abi().to_json().unwrap();
        assert!(json.contains(r#""type":"issue""#));
        assert_eq!(AbiDef::from_json(&json).unwrap(), token_abi());
    }
}

//! Converts between the ABI binary encoding and JSON values.
//!
//! Type expressions may carry one trailing modifier, applied outside in:
//! `T[]` (varuint32 length prefixed array), `T?` (one byte presence flag) and
//! `T$` (binary extension: a trailing struct field that may be missing from
//! older payloads).

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime};
use serde_json::{json, Map, Number, Value};

use crate::abi::def::{AbiDef, StructDef, VariantDef};
use crate::abi::stream::{AbiReader, AbiWriter};
use crate::abi::AbiError;
use crate::asset::{Asset, Symbol, SymbolCode};
use crate::crypto::{KeyType, PublicKey, Signature, COMPACT_SIGNATURE_LEN, COMPRESSED_KEY_LEN};
use crate::name::Name;

pub const MAX_RECURSION_DEPTH: usize = 32;

/// Milliseconds from the unix epoch to 2000-01-01, the block timestamp epoch.
const BLOCK_TIMESTAMP_EPOCH_MS: i64 = 946_684_800_000;
const BLOCK_INTERVAL_MS: i64 = 500;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BuiltinType {
    Bool,
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Int128,
    Uint128,
    VarInt32,
    VarUint32,
    Float32,
    Float64,
    Float128,
    TimePoint,
    TimePointSec,
    BlockTimestamp,
    Name,
    Bytes,
    String,
    Checksum160,
    Checksum256,
    Checksum512,
    PublicKey,
    Signature,
    Symbol,
    SymbolCode,
    Asset,
    ExtendedAsset,
}

impl BuiltinType {
    fn from_name(name: &str) -> Option<Self> {
        use BuiltinType as B;
        Some(match name {
            "bool" => B::Bool,
            "int8" => B::Int8,
            "uint8" => B::Uint8,
            "int16" => B::Int16,
            "uint16" => B::Uint16,
            "int32" => B::Int32,
            "uint32" => B::Uint32,
            "int64" => B::Int64,
            "uint64" => B::Uint64,
            "int128" => B::Int128,
            "uint128" => B::Uint128,
            "varint32" => B::VarInt32,
            "varuint32" => B::VarUint32,
            "float32" => B::Float32,
            "float64" => B::Float64,
            "float128" => B::Float128,
            "time_point" => B::TimePoint,
            "time_point_sec" => B::TimePointSec,
            "block_timestamp_type" => B::BlockTimestamp,
            "name" => B::Name,
            "bytes" => B::Bytes,
            "string" => B::String,
            "checksum160" => B::Checksum160,
            "checksum256" => B::Checksum256,
            "checksum512" => B::Checksum512,
            "public_key" => B::PublicKey,
            "signature" => B::Signature,
            "symbol" => B::Symbol,
            "symbol_code" => B::SymbolCode,
            "asset" => B::Asset,
            "extended_asset" => B::ExtendedAsset,
            _ => return None,
        })
    }
}

/// Strips one trailing modifier from a type expression.
enum TypeShape<'t> {
    Array(&'t str),
    Optional(&'t str),
    Extension(&'t str),
    Plain(&'t str),
}

fn shape(type_name: &str) -> TypeShape<'_> {
    if let Some(inner) = type_name.strip_suffix("[]") {
        TypeShape::Array(inner)
    } else if let Some(inner) = type_name.strip_suffix('?') {
        TypeShape::Optional(inner)
    } else if let Some(inner) = type_name.strip_suffix('$') {
        TypeShape::Extension(inner)
    } else {
        TypeShape::Plain(type_name)
    }
}

pub struct AbiSerializer {
    typedefs: HashMap<String, String>,
    structs: HashMap<String, StructDef>,
    variants: HashMap<String, VariantDef>,
    actions: HashMap<Name, String>,
}

impl AbiSerializer {
    /// Indexes `abi` and checks that every type it mentions can be resolved.
    pub fn new(abi: &AbiDef) -> Result<Self, AbiError> {
        let mut serializer = AbiSerializer {
            typedefs: HashMap::with_capacity(abi.types.len()),
            structs: HashMap::with_capacity(abi.structs.len()),
            variants: HashMap::with_capacity(abi.variants.len()),
            actions: HashMap::with_capacity(abi.actions.len()),
        };

        for t in &abi.types {
            if BuiltinType::from_name(&t.new_type_name).is_some() {
                return Err(AbiError::InvalidDefinition(format!("typedef redefines built-in {}", t.new_type_name)));
            }
            if serializer.typedefs.insert(t.new_type_name.clone(), t.type_name.clone()).is_some() {
                return Err(AbiError::InvalidDefinition(format!("duplicate typedef {}", t.new_type_name)));
            }
        }
        for s in &abi.structs {
            if serializer.structs.insert(s.name.clone(), s.clone()).is_some() {
                return Err(AbiError::InvalidDefinition(format!("duplicate struct {}", s.name)));
            }
        }
        for v in &abi.variants {
            if serializer.variants.insert(v.name.clone(), v.clone()).is_some() {
                return Err(AbiError::InvalidDefinition(format!("duplicate variant {}", v.name)));
            }
        }
        for a in &abi.actions {
            serializer.actions.insert(a.name, a.type_name.clone());
        }

        serializer.validate()?;
        Ok(serializer)
    }

    fn validate(&self) -> Result<(), AbiError> {
        for target in self.typedefs.values() {
            self.check_type(target)?;
        }
        for s in self.structs.values() {
            self.base_chain_len(s)?;
            for field in &s.fields {
                self.check_type(&field.type_name)
                    .map_err(|e| e.in_field(&s.name, &field.name))?;
            }
        }
        for v in self.variants.values() {
            for t in &v.types {
                self.check_type(t)?;
            }
        }
        for t in self.actions.values() {
            self.check_type(t)?;
        }
        Ok(())
    }

    fn check_type(&self, type_name: &str) -> Result<(), AbiError> {
        let mut current = type_name;
        for _ in 0..MAX_RECURSION_DEPTH {
            current = match shape(self.resolve(current)?) {
                TypeShape::Array(inner) | TypeShape::Optional(inner) | TypeShape::Extension(inner) => inner,
                TypeShape::Plain(plain) => {
                    let known = BuiltinType::from_name(plain).is_some()
                        || self.structs.contains_key(plain)
                        || self.variants.contains_key(plain);
                    return if known { Ok(()) } else { Err(AbiError::UnknownType(type_name.to_string())) };
                }
            };
        }
        Err(AbiError::RecursionLimit)
    }

    fn base_chain_len(&self, s: &StructDef) -> Result<usize, AbiError> {
        let mut current = s;
        let mut len = 0;
        while !current.base.is_empty() {
            len += 1;
            if len > MAX_RECURSION_DEPTH {
                return Err(AbiError::InvalidDefinition(format!("circular base of struct {}", s.name)));
            }
            let base = self.resolve(&current.base)?;
            current = self
                .structs
                .get(base)
                .ok_or_else(|| AbiError::InvalidDefinition(format!("base {base} of {} is not a struct", current.name)))?;
        }
        Ok(len)
    }

    /// Follows typedefs down to a type that is not an alias.
    fn resolve<'a>(&'a self, type_name: &'a str) -> Result<&'a str, AbiError> {
        let mut current = type_name;
        for _ in 0..MAX_RECURSION_DEPTH {
            match self.typedefs.get(current) {
                Some(target) => current = target,
                None => return Ok(current),
            }
        }
        Err(AbiError::InvalidDefinition(format!("circular typedef {type_name}")))
    }

    pub fn action_type(&self, action: Name) -> Option<&str> {
        self.actions.get(&action).map(String::as_str)
    }

    pub fn decode_action(&self, action: Name, data: &[u8]) -> Result<Value, AbiError> {
        let type_name = self.action_type(action).ok_or(AbiError::UnknownAction(action))?;
        self.binary_to_value(type_name, data)
    }

    pub fn encode_action(&self, action: Name, value: &Value) -> Result<Vec<u8>, AbiError> {
        let type_name = self.action_type(action).ok_or(AbiError::UnknownAction(action))?;
        self.value_to_binary(type_name, value)
    }

    /// Decodes `data` as `type_name`. Trailing bytes are ignored, as the
    /// node does for action payloads.
    pub fn binary_to_value(&self, type_name: &str, data: &[u8]) -> Result<Value, AbiError> {
        let mut reader = AbiReader::new(data);
        self.read_type(type_name, &mut reader, 0)
    }

    pub fn value_to_binary(&self, type_name: &str, value: &Value) -> Result<Vec<u8>, AbiError> {
        let mut writer = AbiWriter::new();
        self.write_type(type_name, value, &mut writer, 0)?;
        Ok(writer.into_bytes())
    }

    fn read_type(&self, type_name: &str, r: &mut AbiReader<'_>, depth: usize) -> Result<Value, AbiError> {
        if depth > MAX_RECURSION_DEPTH {
            return Err(AbiError::RecursionLimit);
        }
        let resolved = self.resolve(type_name)?;

        match shape(resolved) {
            TypeShape::Array(inner) => {
                let count = r.read_varuint32()? as usize;
                if count > r.remaining() {
                    return Err(AbiError::InvalidData(format!("array of {count} {inner} exceeds remaining data")));
                }
                let items = (0..count)
                    .map(|_| self.read_type(inner, r, depth + 1))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Array(items))
            }
            TypeShape::Optional(inner) => match r.read_u8()? {
                0 => Ok(Value::Null),
                1 => self.read_type(inner, r, depth + 1),
                flag => Err(AbiError::InvalidData(format!("optional flag {flag} for {inner}"))),
            },
            TypeShape::Extension(inner) => self.read_type(inner, r, depth + 1),
            TypeShape::Plain(plain) => {
                if let Some(builtin) = BuiltinType::from_name(plain) {
                    return read_builtin(builtin, r);
                }
                if let Some(variant) = self.variants.get(plain) {
                    let index = r.read_varuint32()? as usize;
                    let alternative = variant.types.get(index).ok_or_else(|| {
                        AbiError::InvalidData(format!("variant index {index} out of range for {plain}"))
                    })?;
                    let value = self.read_type(alternative, r, depth + 1)?;
                    return Ok(json!([alternative, value]));
                }
                if let Some(s) = self.structs.get(plain) {
                    let mut object = Map::new();
                    self.read_struct(s, r, depth + 1, &mut object)?;
                    return Ok(Value::Object(object));
                }
                Err(AbiError::UnknownType(plain.to_string()))
            }
        }
    }

    fn read_struct(
        &self,
        s: &StructDef,
        r: &mut AbiReader<'_>,
        depth: usize,
        out: &mut Map<String, Value>,
    ) -> Result<(), AbiError> {
        if depth > MAX_RECURSION_DEPTH {
            return Err(AbiError::RecursionLimit);
        }
        if !s.base.is_empty() {
            let base_name = self.resolve(&s.base)?;
            let base = self.structs.get(base_name).ok_or_else(|| AbiError::UnknownType(base_name.to_string()))?;
            self.read_struct(base, r, depth + 1, out)?;
        }
        for field in &s.fields {
            if field.type_name.ends_with('$') && r.is_empty() {
                break;
            }
            let value = self
                .read_type(&field.type_name, r, depth + 1)
                .map_err(|e| e.in_field(&s.name, &field.name))?;
            out.insert(field.name.clone(), value);
        }
        Ok(())
    }

    fn write_type(&self, type_name: &str, value: &Value, w: &mut AbiWriter, depth: usize) -> Result<(), AbiError> {
        if depth > MAX_RECURSION_DEPTH {
            return Err(AbiError::RecursionLimit);
        }
        let resolved = self.resolve(type_name)?;

        match shape(resolved) {
            TypeShape::Array(inner) => {
                let items = value.as_array().ok_or_else(|| AbiError::invalid_value(resolved, "expected an array"))?;
                let count = u32::try_from(items.len()).map_err(|_| AbiError::invalid_value(resolved, "too many items"))?;
                w.write_varuint32(count);
                items.iter().try_for_each(|item| self.write_type(inner, item, w, depth + 1))
            }
            TypeShape::Optional(inner) => {
                if value.is_null() {
                    w.write_u8(0);
                    Ok(())
                } else {
                    w.write_u8(1);
                    self.write_type(inner, value, w, depth + 1)
                }
            }
            TypeShape::Extension(inner) => self.write_type(inner, value, w, depth + 1),
            TypeShape::Plain(plain) => {
                if let Some(builtin) = BuiltinType::from_name(plain) {
                    return write_builtin(builtin, plain, value, w);
                }
                if let Some(variant) = self.variants.get(plain) {
                    let (alternative, inner) = match value.as_array().map(Vec::as_slice) {
                        Some([Value::String(alternative), inner]) => (alternative, inner),
                        _ => return Err(AbiError::invalid_value(plain, "expected [type, value]")),
                    };
                    let index = variant
                        .types
                        .iter()
                        .position(|t| t == alternative)
                        .ok_or_else(|| AbiError::invalid_value(plain, format!("{alternative} is not an alternative")))?;
                    w.write_varuint32(index as u32);
                    return self.write_type(alternative, inner, w, depth + 1);
                }
                if let Some(s) = self.structs.get(plain) {
                    let object = value.as_object().ok_or_else(|| AbiError::invalid_value(plain, "expected an object"))?;
                    let mut skipping_extensions = false;
                    return self.write_struct(s, object, w, depth + 1, &mut skipping_extensions);
                }
                Err(AbiError::UnknownType(plain.to_string()))
            }
        }
    }

    fn write_struct(
        &self,
        s: &StructDef,
        object: &Map<String, Value>,
        w: &mut AbiWriter,
        depth: usize,
        skipping_extensions: &mut bool,
    ) -> Result<(), AbiError> {
        if depth > MAX_RECURSION_DEPTH {
            return Err(AbiError::RecursionLimit);
        }
        if !s.base.is_empty() {
            let base_name = self.resolve(&s.base)?;
            let base = self.structs.get(base_name).ok_or_else(|| AbiError::UnknownType(base_name.to_string()))?;
            self.write_struct(base, object, w, depth + 1, skipping_extensions)?;
        }
        for field in &s.fields {
            let is_extension = field.type_name.ends_with('$');
            match object.get(&field.name) {
                // Once an extension is omitted, everything after it must be too.
                Some(value) if !*skipping_extensions => self
                    .write_type(&field.type_name, value, w, depth + 1)
                    .map_err(|e| e.in_field(&s.name, &field.name))?,
                Some(_) => {
                    return Err(AbiError::InvalidData(format!(
                        "{}.{} follows an omitted binary extension",
                        s.name, field.name
                    )))
                }
                None if is_extension => *skipping_extensions = true,
                None => return Err(AbiError::MissingField(format!("{}.{}", s.name, field.name))),
            }
        }
        Ok(())
    }
}

/// 64-bit integers beyond 32 bits are rendered as strings so that JSON
/// consumers with double precision numbers do not lose digits.
fn wide_int(value: i128) -> Value {
    if value.unsigned_abs() > u32::MAX as u128 {
        Value::String(value.to_string())
    } else {
        Value::Number(Number::from(value as i64))
    }
}

fn float_value(value: f64) -> Value {
    Number::from_f64(value).map(Value::Number).unwrap_or_else(|| Value::String(value.to_string()))
}

fn format_micros(micros: i64, seconds_only: bool) -> Result<String, AbiError> {
    let secs = micros.div_euclid(1_000_000);
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    let time = DateTime::from_timestamp(secs, nanos)
        .ok_or_else(|| AbiError::InvalidData(format!("time {micros}us out of range")))?
        .naive_utc();
    let format = if seconds_only { "%Y-%m-%dT%H:%M:%S" } else { "%Y-%m-%dT%H:%M:%S%.3f" };
    Ok(time.format(format).to_string())
}

fn parse_micros(type_name: &str, value: &Value) -> Result<i64, AbiError> {
    let text = value.as_str().ok_or_else(|| AbiError::invalid_value(type_name, "expected a time string"))?;
    let trimmed = text.trim_end_matches('Z');
    let time = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .map_err(|e| AbiError::invalid_value(type_name, format!("{text}: {e}")))?;
    Ok(time.and_utc().timestamp_micros())
}

fn read_key_data<'a>(r: &mut AbiReader<'a>, key_type: KeyType, fixed_len: usize) -> Result<&'a [u8], AbiError> {
    let start = r.position();
    r.read_bytes(fixed_len)?;
    if key_type == KeyType::WebAuthn {
        if fixed_len == COMPRESSED_KEY_LEN {
            // user presence flag, relying party id
            r.read_u8()?;
            r.read_blob()?;
        } else {
            // authenticator data, client json
            r.read_blob()?;
            r.read_blob()?;
        }
    }
    Ok(r.consumed_since(start))
}

fn read_builtin(builtin: BuiltinType, r: &mut AbiReader<'_>) -> Result<Value, AbiError> {
    use BuiltinType as B;
    Ok(match builtin {
        B::Bool => match r.read_u8()? {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            other => return Err(AbiError::InvalidData(format!("bool byte {other}"))),
        },
        B::Int8 => json!(r.read_u8()? as i8),
        B::Uint8 => json!(r.read_u8()?),
        B::Int16 => json!(r.read_u16()? as i16),
        B::Uint16 => json!(r.read_u16()?),
        B::Int32 => json!(r.read_u32()? as i32),
        B::Uint32 => json!(r.read_u32()?),
        B::Int64 => wide_int(r.read_u64()? as i64 as i128),
        B::Uint64 => wide_int(r.read_u64()? as i128),
        B::Int128 => Value::String((r.read_u128()? as i128).to_string()),
        B::Uint128 => Value::String(r.read_u128()?.to_string()),
        B::VarInt32 => json!(r.read_varint32()?),
        B::VarUint32 => json!(r.read_varuint32()?),
        B::Float32 => float_value(f32::from_le_bytes(r.read_array()?) as f64),
        B::Float64 => float_value(f64::from_le_bytes(r.read_array()?)),
        B::Float128 => Value::String(format!("0x{}", hex::encode(r.read_bytes(16)?))),
        B::TimePoint => Value::String(format_micros(r.read_u64()? as i64, false)?),
        B::TimePointSec => Value::String(format_micros(r.read_u32()? as i64 * 1_000_000, true)?),
        B::BlockTimestamp => {
            let ms = r.read_u32()? as i64 * BLOCK_INTERVAL_MS + BLOCK_TIMESTAMP_EPOCH_MS;
            Value::String(format_micros(ms * 1_000, false)?)
        }
        B::Name => Value::String(Name::new(r.read_u64()?).to_string()),
        B::Bytes => Value::String(hex::encode(r.read_blob()?)),
        B::String => Value::String(r.read_string()?),
        B::Checksum160 => Value::String(hex::encode(r.read_bytes(20)?)),
        B::Checksum256 => Value::String(hex::encode(r.read_bytes(32)?)),
        B::Checksum512 => Value::String(hex::encode(r.read_bytes(64)?)),
        B::PublicKey => {
            let key_type = KeyType::from_index(r.read_varuint32()?)?;
            let data = read_key_data(r, key_type, COMPRESSED_KEY_LEN)?;
            Value::String(PublicKey::new(key_type, data.to_vec()).to_string())
        }
        B::Signature => {
            let key_type = KeyType::from_index(r.read_varuint32()?)?;
            let data = read_key_data(r, key_type, COMPACT_SIGNATURE_LEN)?;
            Value::String(Signature::new(key_type, data.to_vec()).to_string())
        }
        B::Symbol => Value::String(Symbol::from_u64(r.read_u64()?)?.to_string()),
        B::SymbolCode => Value::String(SymbolCode::new(r.read_u64()?).to_string()),
        B::Asset => Value::String(read_asset(r)?.to_string()),
        B::ExtendedAsset => {
            let quantity = read_asset(r)?;
            let contract = Name::new(r.read_u64()?);
            json!({ "quantity": quantity.to_string(), "contract": contract.to_string() })
        }
    })
}

fn read_asset(r: &mut AbiReader<'_>) -> Result<Asset, AbiError> {
    let amount = r.read_u64()? as i64;
    let symbol = Symbol::from_u64(r.read_u64()?)?;
    Ok(Asset::new(amount, symbol))
}

fn integer(type_name: &str, value: &Value) -> Result<i128, AbiError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from))
            .ok_or_else(|| AbiError::invalid_value(type_name, format!("{n} is not an integer"))),
        Value::String(s) => s.trim().parse::<i128>().map_err(|e| AbiError::invalid_value(type_name, format!("{s}: {e}"))),
        other => Err(AbiError::invalid_value(type_name, format!("expected an integer, got {other}"))),
    }
}

fn bounded<T: TryFrom<i128>>(type_name: &str, value: &Value) -> Result<T, AbiError> {
    let wide = integer(type_name, value)?;
    T::try_from(wide).map_err(|_| AbiError::invalid_value(type_name, format!("{wide} out of range")))
}

fn text<'v>(type_name: &str, value: &'v Value) -> Result<&'v str, AbiError> {
    value.as_str().ok_or_else(|| AbiError::invalid_value(type_name, "expected a string"))
}

fn fixed_hex(type_name: &str, value: &Value, len: usize) -> Result<Vec<u8>, AbiError> {
    let bytes = hex::decode(text(type_name, value)?).map_err(|e| AbiError::invalid_value(type_name, e))?;
    if bytes.len() != len {
        return Err(AbiError::invalid_value(type_name, format!("expected {len} bytes, got {}", bytes.len())));
    }
    Ok(bytes)
}

fn parsed<T>(type_name: &str, value: &Value) -> Result<T, AbiError>
where
    T: std::str::FromStr,
    AbiError: From<T::Err>,
{
    Ok(text(type_name, value)?.parse::<T>()?)
}

fn write_asset(w: &mut AbiWriter, asset: &Asset) {
    w.write_u64(asset.amount as u64);
    w.write_u64(asset.symbol.as_u64());
}

fn write_builtin(builtin: BuiltinType, type_name: &str, value: &Value, w: &mut AbiWriter) -> Result<(), AbiError> {
    use BuiltinType as B;
    match builtin {
        B::Bool => {
            let b = value.as_bool().ok_or_else(|| AbiError::invalid_value(type_name, "expected a bool"))?;
            w.write_u8(b as u8);
        }
        B::Int8 => w.write_u8(bounded::<i8>(type_name, value)? as u8),
        B::Uint8 => w.write_u8(bounded(type_name, value)?),
        B::Int16 => w.write_u16(bounded::<i16>(type_name, value)? as u16),
        B::Uint16 => w.write_u16(bounded(type_name, value)?),
        B::Int32 => w.write_u32(bounded::<i32>(type_name, value)? as u32),
        B::Uint32 => w.write_u32(bounded(type_name, value)?),
        B::Int64 => w.write_u64(bounded::<i64>(type_name, value)? as u64),
        B::Uint64 => w.write_u64(bounded(type_name, value)?),
        B::Int128 => w.write_u128(integer(type_name, value)? as u128),
        B::Uint128 => {
            let n = text(type_name, value)?
                .parse::<u128>()
                .map_err(|e| AbiError::invalid_value(type_name, e))?;
            w.write_u128(n);
        }
        B::VarInt32 => w.write_varint32(bounded(type_name, value)?),
        B::VarUint32 => w.write_varuint32(bounded(type_name, value)?),
        B::Float32 | B::Float64 => {
            let f = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.parse::<f64>().ok(),
                _ => None,
            }
            .ok_or_else(|| AbiError::invalid_value(type_name, "expected a number"))?;
            if builtin == B::Float32 {
                w.write_bytes(&(f as f32).to_le_bytes());
            } else {
                w.write_bytes(&f.to_le_bytes());
            }
        }
        B::Float128 => {
            let raw = text(type_name, value)?;
            let digits = raw.strip_prefix("0x").unwrap_or(raw);
            w.write_bytes(&fixed_hex(type_name, &Value::String(digits.to_string()), 16)?);
        }
        B::TimePoint => w.write_u64(parse_micros(type_name, value)? as u64),
        B::TimePointSec => {
            let secs = parse_micros(type_name, value)?.div_euclid(1_000_000);
            w.write_u32(u32::try_from(secs).map_err(|_| AbiError::invalid_value(type_name, "out of range"))?);
        }
        B::BlockTimestamp => {
            let ms = parse_micros(type_name, value)? / 1_000;
            let slot = (ms - BLOCK_TIMESTAMP_EPOCH_MS) / BLOCK_INTERVAL_MS;
            w.write_u32(u32::try_from(slot).map_err(|_| AbiError::invalid_value(type_name, "out of range"))?);
        }
        B::Name => w.write_u64(parsed::<Name>(type_name, value)?.as_u64()),
        B::Bytes => {
            let bytes = hex::decode(text(type_name, value)?).map_err(|e| AbiError::invalid_value(type_name, e))?;
            w.write_blob(&bytes)?;
        }
        B::String => w.write_string(text(type_name, value)?)?,
        B::Checksum160 => w.write_bytes(&fixed_hex(type_name, value, 20)?),
        B::Checksum256 => w.write_bytes(&fixed_hex(type_name, value, 32)?),
        B::Checksum512 => w.write_bytes(&fixed_hex(type_name, value, 64)?),
        B::PublicKey => {
            let key = parsed::<PublicKey>(type_name, value)?;
            w.write_varuint32(key.key_type.index());
            w.write_bytes(&key.data);
        }
        B::Signature => {
            let signature = parsed::<Signature>(type_name, value)?;
            w.write_varuint32(signature.key_type.index());
            w.write_bytes(&signature.data);
        }
        B::Symbol => w.write_u64(parsed::<Symbol>(type_name, value)?.as_u64()),
        B::SymbolCode => w.write_u64(parsed::<SymbolCode>(type_name, value)?.as_u64()),
        B::Asset => write_asset(w, &parsed::<Asset>(type_name, value)?),
        B::ExtendedAsset => {
            let quantity = value.get("quantity").ok_or_else(|| AbiError::MissingField("extended_asset.quantity".into()))?;
            let contract = value.get("contract").ok_or_else(|| AbiError::MissingField("extended_asset.contract".into()))?;
            write_asset(w, &parsed::<Asset>(type_name, quantity)?);
            w.write_u64(parsed::<Name>(type_name, contract)?.as_u64());
        }
    }
    Ok(())
}

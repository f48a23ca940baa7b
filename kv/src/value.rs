//! Value kinds and the command interpreter shared by every backend.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::command::{Command, Reply};
use crate::{KVError, KVResult};

/// A stored value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum Value {
    Str(Vec<u8>),
    Hash(BTreeMap<String, Vec<u8>>),
    Set(BTreeSet<String>),
}

impl Value {
    pub(crate) fn encode(&self) -> KVResult<Vec<u8>> {
        rmp_serde::to_vec(self).map_err(|e| KVError::Serialization(e.to_string()))
    }

    pub(crate) fn decode(data: &[u8]) -> KVResult<Self> {
        rmp_serde::from_slice(data).map_err(|e| KVError::Serialization(e.to_string()))
    }
}

/// Raw keyed access a backend provides to the interpreter.
pub(crate) trait Backend {
    fn load(&mut self, key: &str) -> KVResult<Option<Value>>;
    fn store(&mut self, key: &str, value: Value) -> KVResult<()>;
    fn erase(&mut self, key: &str) -> KVResult<bool>;
}

/// Apply one command to a backend.
pub(crate) fn apply<B: Backend + ?Sized>(b: &mut B, cmd: Command) -> KVResult<Reply> {
    match cmd {
        Command::Get(key) => match b.load(&key)? {
            None => Ok(Reply::Nil),
            Some(Value::Str(v)) => Ok(Reply::Bytes(v)),
            Some(_) => Err(wrong_type(key, "string")),
        },
        Command::Set(key, value) => {
            b.store(&key, Value::Str(value))?;
            Ok(Reply::Ok)
        }
        Command::Exists(key) => Ok(Reply::Int(b.load(&key)?.is_some() as i64)),
        Command::Del(key) => Ok(Reply::Int(b.erase(&key)? as i64)),
        Command::HGet(key, field) => {
            let mut hash = load_hash(b, &key)?;
            Ok(hash.remove(&field).map_or(Reply::Nil, Reply::Bytes))
        }
        Command::HGetAll(key) => match b.load(&key)? {
            None => Ok(Reply::Nil),
            Some(Value::Hash(h)) => Ok(Reply::Hash(h)),
            Some(_) => Err(wrong_type(key, "hash")),
        },
        Command::HSet(key, fields) => {
            let mut hash = load_hash(b, &key)?;
            let mut added = 0;
            for (f, v) in fields {
                if hash.insert(f, v).is_none() {
                    added += 1;
                }
            }
            if !hash.is_empty() {
                b.store(&key, Value::Hash(hash))?;
            }
            Ok(Reply::Int(added))
        }
        Command::HDel(key, fields) => {
            let mut hash = load_hash(b, &key)?;
            let removed = fields.iter().filter(|f| hash.remove(*f).is_some()).count();
            if hash.is_empty() {
                b.erase(&key)?;
            } else if removed > 0 {
                b.store(&key, Value::Hash(hash))?;
            }
            Ok(Reply::Int(removed as i64))
        }
        Command::SAdd(key, members) => {
            let mut set = load_set(b, &key)?;
            let added = members.into_iter().filter(|m| set.insert(m.clone())).count();
            if !set.is_empty() {
                b.store(&key, Value::Set(set))?;
            }
            Ok(Reply::Int(added as i64))
        }
        Command::SRem(key, members) => {
            let mut set = load_set(b, &key)?;
            let removed = members.iter().filter(|m| set.remove(*m)).count();
            if set.is_empty() {
                b.erase(&key)?;
            } else if removed > 0 {
                b.store(&key, Value::Set(set))?;
            }
            Ok(Reply::Int(removed as i64))
        }
        Command::SMembers(key) => Ok(Reply::Members(load_set(b, &key)?.into_iter().collect())),
        Command::SCard(key) => Ok(Reply::Int(load_set(b, &key)?.len() as i64)),
    }
}

fn load_hash<B: Backend + ?Sized>(b: &mut B, key: &str) -> KVResult<BTreeMap<String, Vec<u8>>> {
    match b.load(key)? {
        None => Ok(BTreeMap::new()),
        Some(Value::Hash(h)) => Ok(h),
        Some(_) => Err(wrong_type(key.to_string(), "hash")),
    }
}

fn load_set<B: Backend + ?Sized>(b: &mut B, key: &str) -> KVResult<BTreeSet<String>> {
    match b.load(key)? {
        None => Ok(BTreeSet::new()),
        Some(Value::Set(s)) => Ok(s),
        Some(_) => Err(wrong_type(key.to_string(), "set")),
    }
}

fn wrong_type(key: String, want: &'static str) -> KVError {
    KVError::WrongType { key, want }
}

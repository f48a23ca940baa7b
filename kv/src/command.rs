//! Commands, replies and the pipeline builder.

use std::collections::BTreeMap;

use crate::{KVError, KVResult};

/// A single storage command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Get(String),
    Set(String, Vec<u8>),
    Exists(String),
    Del(String),
    HGet(String, String),
    HGetAll(String),
    HSet(String, Vec<(String, Vec<u8>)>),
    HDel(String, Vec<String>),
    SAdd(String, Vec<String>),
    SRem(String, Vec<String>),
    SMembers(String),
    SCard(String),
}

impl Command {
    /// Short command name, used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Get(_) => "GET",
            Command::Set(..) => "SET",
            Command::Exists(_) => "EXISTS",
            Command::Del(_) => "DEL",
            Command::HGet(..) => "HGET",
            Command::HGetAll(_) => "HGETALL",
            Command::HSet(..) => "HSET",
            Command::HDel(..) => "HDEL",
            Command::SAdd(..) => "SADD",
            Command::SRem(..) => "SREM",
            Command::SMembers(_) => "SMEMBERS",
            Command::SCard(_) => "SCARD",
        }
    }

    /// The key the command operates on.
    pub fn key(&self) -> &str {
        match self {
            Command::Get(k)
            | Command::Set(k, _)
            | Command::Exists(k)
            | Command::Del(k)
            | Command::HGet(k, _)
            | Command::HGetAll(k)
            | Command::HSet(k, _)
            | Command::HDel(k, _)
            | Command::SAdd(k, _)
            | Command::SRem(k, _)
            | Command::SMembers(k)
            | Command::SCard(k) => k,
        }
    }
}

/// The reply to one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Missing key or field.
    Nil,
    /// Write acknowledged.
    Ok,
    Int(i64),
    Bytes(Vec<u8>),
    Hash(BTreeMap<String, Vec<u8>>),
    Members(Vec<String>),
}

impl Reply {
    pub fn into_bytes(self) -> KVResult<Option<Vec<u8>>> {
        match self {
            Reply::Nil => Ok(None),
            Reply::Bytes(b) => Ok(Some(b)),
            _ => Err(KVError::UnexpectedReply { command: "GET" }),
        }
    }

    pub fn into_int(self) -> KVResult<i64> {
        match self {
            Reply::Int(n) => Ok(n),
            _ => Err(KVError::UnexpectedReply { command: "integer" }),
        }
    }

    pub fn into_hash(self) -> KVResult<Option<BTreeMap<String, Vec<u8>>>> {
        match self {
            Reply::Nil => Ok(None),
            Reply::Hash(h) => Ok(Some(h)),
            _ => Err(KVError::UnexpectedReply { command: "HGETALL" }),
        }
    }

    pub fn into_members(self) -> KVResult<Vec<String>> {
        match self {
            Reply::Members(m) => Ok(m),
            _ => Err(KVError::UnexpectedReply { command: "SMEMBERS" }),
        }
    }
}

/// An ordered queue of commands executed in one round trip by
/// [`crate::KVStore::exec`].
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    commands: Vec<Command>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            commands: Vec::with_capacity(n),
        }
    }

    /// Queue a raw command.
    pub fn push(&mut self, cmd: Command) -> &mut Self {
        self.commands.push(cmd);
        self
    }

    pub fn get(&mut self, key: &str) -> &mut Self {
        self.push(Command::Get(key.to_string()))
    }

    pub fn set(&mut self, key: &str, value: &[u8]) -> &mut Self {
        self.push(Command::Set(key.to_string(), value.to_vec()))
    }

    pub fn exists(&mut self, key: &str) -> &mut Self {
        self.push(Command::Exists(key.to_string()))
    }

    pub fn del(&mut self, key: &str) -> &mut Self {
        self.push(Command::Del(key.to_string()))
    }

    pub fn hget(&mut self, key: &str, field: &str) -> &mut Self {
        self.push(Command::HGet(key.to_string(), field.to_string()))
    }

    pub fn hgetall(&mut self, key: &str) -> &mut Self {
        self.push(Command::HGetAll(key.to_string()))
    }

    pub fn hset(&mut self, key: &str, fields: &[(&str, &[u8])]) -> &mut Self {
        let fields = fields
            .iter()
            .map(|(f, v)| (f.to_string(), v.to_vec()))
            .collect();
        self.push(Command::HSet(key.to_string(), fields))
    }

    pub fn hdel(&mut self, key: &str, fields: &[&str]) -> &mut Self {
        let fields = fields.iter().map(|f| f.to_string()).collect();
        self.push(Command::HDel(key.to_string(), fields))
    }

    pub fn sadd(&mut self, key: &str, members: &[&str]) -> &mut Self {
        let members = members.iter().map(|m| m.to_string()).collect();
        self.push(Command::SAdd(key.to_string(), members))
    }

    pub fn srem(&mut self, key: &str, members: &[&str]) -> &mut Self {
        let members = members.iter().map(|m| m.to_string()).collect();
        self.push(Command::SRem(key.to_string(), members))
    }

    pub fn smembers(&mut self, key: &str) -> &mut Self {
        self.push(Command::SMembers(key.to_string()))
    }

    pub fn scard(&mut self, key: &str) -> &mut Self {
        self.push(Command::SCard(key.to_string()))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }
}

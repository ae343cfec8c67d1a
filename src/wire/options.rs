// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Negotiate-phase options proposal strings and negotiation rules
//! (spec §4.11): `name=value;name=value;...`, with `min`/`and`/`or`/
//! set-intersection combinators and `.local`/`.client`/`.server`-scoped
//! names exempt from negotiation.

use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Int(i64),
    Bool(bool),
    List(Vec<String>),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::List(items) => write!(f, "{}", items.join(",")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Options(BTreeMap<String, OptionValue>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError(pub String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed options entry: {}", self.0)
    }
}

impl std::error::Error for ParseError {}

impl Options {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: OptionValue) {
        self.0.insert(name.into(), value);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Encode as `name=value;name=value;...`, lists comma-joined.
    #[must_use]
    pub fn encode(&self) -> String {
        self.0
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Parse a proposal string. Every value parses as a list first; callers
    /// that expect `Int`/`Bool` convert via [`OptionValue::as_int`] /
    /// [`OptionValue::as_bool`] once the option's declared type is known,
    /// since the wire format carries no type tag of its own.
    pub fn parse(src: &str) -> Result<Self, ParseError> {
        let mut opts = Self::new();
        if src.is_empty() {
            return Ok(opts);
        }
        for entry in src.split(';') {
            let (name, value) = entry
                .split_once('=')
                .ok_or_else(|| ParseError(entry.to_string()))?;
            if name.is_empty() {
                return Err(ParseError(entry.to_string()));
            }
            let items: Vec<String> = value.split(',').map(str::to_string).collect();
            opts.set(name, OptionValue::List(items));
        }
        Ok(opts)
    }
}

impl OptionValue {
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::List(items) if items.len() == 1 => items[0].parse().ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::List(items) if items.len() == 1 => items[0].parse().ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Vec<String> {
        match self {
            Self::List(items) => items.clone(),
            Self::Int(n) => vec![n.to_string()],
            Self::Bool(b) => vec![b.to_string()],
        }
    }
}

/// An option name suffixed `.local`, `.client`, or `.server` describes a
/// side's own configuration and is exchanged informationally but never
/// negotiated down to a shared value.
#[must_use]
pub fn is_scoped(name: &str) -> bool {
    name.ends_with(".local") || name.ends_with(".client") || name.ends_with(".server")
}

/// `min(a, b)` for bounded integers (queue depth, max frame size, ...).
#[must_use]
pub fn negotiate_min(a: i64, b: i64) -> i64 {
    a.min(b)
}

/// `and` for restrictive booleans (`orderedExecution`): both sides must
/// agree to enable.
#[must_use]
pub fn negotiate_and(a: bool, b: bool) -> bool {
    a && b
}

/// `or` for permissive booleans (`digestData`): either side enabling it
/// turns it on.
#[must_use]
pub fn negotiate_or(a: bool, b: bool) -> bool {
    a || b
}

/// Set-intersection of `local` and `remote` string lists (digest/compress
/// algorithm names), ordered by `local`'s preference order.
#[must_use]
pub fn negotiate_list<'a>(local: &'a [String], remote: &[String]) -> Vec<&'a str> {
    local
        .iter()
        .filter(|item| remote.iter().any(|r| r == *item))
        .map(String::as_str)
        .collect()
}

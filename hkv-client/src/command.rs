//! # Command Descriptors
//!
//! Purpose: Describe one command as a name plus opaque byte arguments, and
//! remember where its first key sits so routing can find it.
//!
//! ## Design Principles
//! 1. **Value Object**: A `Cmd` is frozen once built; only getters are public.
//! 2. **Binary-Safe**: Arguments are raw bytes, never interpreted here.
//! 3. **Key Awareness**: Builders mark the key explicitly; custom commands
//!    fall back to a small table of keyless commands.

use crate::resp::encode_command;

/// Immutable command descriptor: `name arg0 arg1 ...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmd {
    name: String,
    args: Vec<Vec<u8>>,
    // Index into `args` of the first key, if the command has one.
    key_index: Option<usize>,
}

impl Cmd {
    pub(crate) fn new(name: &str) -> Self {
        Cmd {
            name: name.to_string(),
            args: Vec::new(),
            key_index: None,
        }
    }

    pub(crate) fn arg(mut self, arg: impl Into<Vec<u8>>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends a key argument, marking it as the routing key if it is the first.
    pub(crate) fn key(mut self, key: impl Into<Vec<u8>>) -> Self {
        if self.key_index.is_none() {
            self.key_index = Some(self.args.len());
        }
        self.args.push(key.into());
        self
    }

    pub(crate) fn int_arg(self, value: i64) -> Self {
        self.arg(value.to_string())
    }

    pub(crate) fn float_arg(self, value: f64) -> Self {
        self.arg(value.to_string())
    }

    /// Builds a descriptor from raw command-line style parts (`["SET", "k", "v"]`).
    ///
    /// Returns `None` when `parts` is empty.
    pub fn custom<I, A>(parts: I) -> Option<Self>
    where
        I: IntoIterator<Item = A>,
        A: Into<Vec<u8>>,
    {
        let mut parts = parts.into_iter().map(Into::into);
        let name = parts.next()?;
        let name = String::from_utf8_lossy(&name).into_owned();
        let args: Vec<Vec<u8>> = parts.collect();
        let key_index = default_key_index(&name, &args);
        Some(Cmd {
            name,
            args,
            key_index,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[Vec<u8>] {
        &self.args
    }

    /// First key argument, used by key-derived routing.
    pub fn first_key(&self) -> Option<&[u8]> {
        self.key_index
            .and_then(|idx| self.args.get(idx))
            .map(Vec::as_slice)
    }

    /// Appends the RESP2 frame for this command to `out`.
    pub(crate) fn write_frame(&self, out: &mut Vec<u8>) {
        let mut parts: Vec<&[u8]> = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.name.as_bytes());
        parts.extend(self.args.iter().map(Vec::as_slice));
        encode_command(&parts, out);
    }
}

/// Commands that never take a key in their first argument.
const KEYLESS_COMMANDS: &[&str] = &[
    "ACL", "AUTH", "BGREWRITEAOF", "BGSAVE", "CLIENT", "CLUSTER", "COMMAND", "CONFIG", "DBSIZE",
    "DEBUG", "DISCARD", "ECHO", "EXEC", "FLUSHALL", "FLUSHDB", "FUNCTION", "HELLO", "INFO",
    "KEYS", "LASTSAVE", "LATENCY", "MEMORY", "MODULE", "MONITOR", "MULTI", "PING", "PSUBSCRIBE",
    "PUBLISH", "PUBSUB", "PUNSUBSCRIBE", "QUIT", "RANDOMKEY", "READONLY", "READWRITE", "SAVE",
    "SCAN", "SCRIPT", "SELECT", "SHUTDOWN", "SLOWLOG", "SUBSCRIBE", "SWAPDB", "TIME",
    "UNSUBSCRIBE", "UNWATCH", "WAIT",
];

fn default_key_index(name: &str, args: &[Vec<u8>]) -> Option<usize> {
    if args.is_empty() {
        return None;
    }
    let upper = name.to_ascii_uppercase();
    if KEYLESS_COMMANDS.contains(&upper.as_str()) {
        return None;
    }
    match upper.as_str() {
        // EVAL script numkeys key [key ...] arg [arg ...]
        "EVAL" | "EVALSHA" | "EVAL_RO" | "EVALSHA_RO" | "FCALL" | "FCALL_RO" => {
            let numkeys = args.get(1).and_then(|raw| std::str::from_utf8(raw).ok())?;
            match numkeys.parse::<usize>() {
                Ok(count) if count > 0 && args.len() > 2 => Some(2),
                _ => None,
            }
        }
        _ => Some(0),
    }
}

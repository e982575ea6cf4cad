//! # Transaction Builder
//!
//! Purpose: Accumulate an ordered list of commands that a node executes as
//! one atomic unit between `MULTI` and `EXEC`.
//!
//! ## Design Principles
//! 1. **Builder Pattern**: Every method consumes and returns the builder, so
//!    a transaction reads as one chain and is moved into `exec` afterwards.
//! 2. **Order Is Meaning**: Commands are only ever appended; index `i` of the
//!    result always belongs to command `i`.
//! 3. **Deferred Rejection**: Shape errors (e.g. `DEL` with no keys) are
//!    recorded instead of panicking; `exec` reports the first one before any
//!    I/O happens.
//!
//! ## Usage
//!
//! ```ignore
//! let tx = Transaction::new().set("key", "foo").get("key");
//! let outcome = client.exec(tx).await?;
//! ```

use thiserror::Error;

use crate::command::Cmd;

/// Input shape rejected while building a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// `custom_command` was given no parts at all.
    #[error("custom command needs at least a command name")]
    EmptyCommand,
    /// A variadic command received an empty list.
    #[error("{command} needs at least one {what}")]
    MissingArguments {
        command: &'static str,
        what: &'static str,
    },
}

/// Ordered batch of commands executed atomically on the target node(s).
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    commands: Vec<Cmd>,
    invalid: Option<BuildError>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of accumulated commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[Cmd] {
        &self.commands
    }

    /// First key touched by the transaction, in command order.
    pub fn first_key(&self) -> Option<&[u8]> {
        self.commands.iter().find_map(Cmd::first_key)
    }

    /// Hands the command list over for execution.
    ///
    /// Fails with the first shape error recorded while building.
    pub fn into_commands(self) -> Result<Vec<Cmd>, BuildError> {
        match self.invalid {
            Some(err) => Err(err),
            None => Ok(self.commands),
        }
    }

    fn push(mut self, cmd: Cmd) -> Self {
        self.commands.push(cmd);
        self
    }

    fn reject(mut self, err: BuildError) -> Self {
        if self.invalid.is_none() {
            self.invalid = Some(err);
        }
        self
    }

    fn missing(self, command: &'static str, what: &'static str) -> Self {
        self.reject(BuildError::MissingArguments { command, what })
    }

    /// Appends an arbitrary command given as `[name, arg, ...]`.
    pub fn custom_command<I, A>(self, parts: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Vec<u8>>,
    {
        match Cmd::custom(parts) {
            Some(cmd) => self.push(cmd),
            None => self.reject(BuildError::EmptyCommand),
        }
    }

    // ---- server --------------------------------------------------------

    pub fn ping(self) -> Self {
        self.push(Cmd::new("PING"))
    }

    pub fn ping_message(self, message: impl Into<Vec<u8>>) -> Self {
        self.push(Cmd::new("PING").arg(message))
    }

    pub fn echo(self, message: impl Into<Vec<u8>>) -> Self {
        self.push(Cmd::new("ECHO").arg(message))
    }

    /// `INFO` with the server's default sections.
    pub fn info(self) -> Self {
        self.push(Cmd::new("INFO"))
    }

    pub fn info_sections<I, S>(self, sections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Vec<u8>>,
    {
        let cmd = sections
            .into_iter()
            .fold(Cmd::new("INFO"), |cmd, section| cmd.arg(section));
        self.push(cmd)
    }

    pub fn dbsize(self) -> Self {
        self.push(Cmd::new("DBSIZE"))
    }

    // ---- strings and keys ------------------------------------------------

    pub fn get(self, key: impl Into<Vec<u8>>) -> Self {
        self.push(Cmd::new("GET").key(key))
    }

    pub fn set(self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        self.push(Cmd::new("SET").key(key).arg(value))
    }

    /// `SET key value EX seconds`.
    pub fn set_ex(self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>, seconds: u64) -> Self {
        self.push(
            Cmd::new("SET")
                .key(key)
                .arg(value)
                .arg("EX")
                .arg(seconds.to_string()),
        )
    }

    /// `SET key value NX`; the reply is `Nil` when the key already exists.
    pub fn set_nx(self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        self.push(Cmd::new("SET").key(key).arg(value).arg("NX"))
    }

    pub fn getdel(self, key: impl Into<Vec<u8>>) -> Self {
        self.push(Cmd::new("GETDEL").key(key))
    }

    pub fn mget<I, K>(self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Vec<u8>>,
    {
        self.keys_command("MGET", keys)
    }

    pub fn mset<I, K, V>(self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Vec<u8>>,
        V: Into<Vec<u8>>,
    {
        let mut cmd = Cmd::new("MSET");
        let mut count = 0;
        for (key, value) in pairs {
            cmd = cmd.key(key).arg(value);
            count += 1;
        }
        if count == 0 {
            return self.missing("MSET", "key/value pair");
        }
        self.push(cmd)
    }

    pub fn del<I, K>(self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Vec<u8>>,
    {
        self.keys_command("DEL", keys)
    }

    pub fn exists<I, K>(self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Vec<u8>>,
    {
        self.keys_command("EXISTS", keys)
    }

    pub fn incr(self, key: impl Into<Vec<u8>>) -> Self {
        self.push(Cmd::new("INCR").key(key))
    }

    pub fn incr_by(self, key: impl Into<Vec<u8>>, amount: i64) -> Self {
        self.push(Cmd::new("INCRBY").key(key).int_arg(amount))
    }

    pub fn incr_by_float(self, key: impl Into<Vec<u8>>, amount: f64) -> Self {
        self.push(Cmd::new("INCRBYFLOAT").key(key).float_arg(amount))
    }

    pub fn decr(self, key: impl Into<Vec<u8>>) -> Self {
        self.push(Cmd::new("DECR").key(key))
    }

    pub fn decr_by(self, key: impl Into<Vec<u8>>, amount: i64) -> Self {
        self.push(Cmd::new("DECRBY").key(key).int_arg(amount))
    }

    pub fn expire(self, key: impl Into<Vec<u8>>, seconds: u64) -> Self {
        self.push(Cmd::new("EXPIRE").key(key).arg(seconds.to_string()))
    }

    pub fn ttl(self, key: impl Into<Vec<u8>>) -> Self {
        self.push(Cmd::new("TTL").key(key))
    }

    pub fn persist(self, key: impl Into<Vec<u8>>) -> Self {
        self.push(Cmd::new("PERSIST").key(key))
    }

    /// `TYPE key`.
    pub fn type_of(self, key: impl Into<Vec<u8>>) -> Self {
        self.push(Cmd::new("TYPE").key(key))
    }

    // ---- hashes ----------------------------------------------------------

    pub fn hget(self, key: impl Into<Vec<u8>>, field: impl Into<Vec<u8>>) -> Self {
        self.push(Cmd::new("HGET").key(key).arg(field))
    }

    pub fn hset<I, F, V>(self, key: impl Into<Vec<u8>>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (F, V)>,
        F: Into<Vec<u8>>,
        V: Into<Vec<u8>>,
    {
        let mut cmd = Cmd::new("HSET").key(key);
        let mut count = 0;
        for (field, value) in pairs {
            cmd = cmd.arg(field).arg(value);
            count += 1;
        }
        if count == 0 {
            return self.missing("HSET", "field/value pair");
        }
        self.push(cmd)
    }

    pub fn hsetnx(
        self,
        key: impl Into<Vec<u8>>,
        field: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        self.push(Cmd::new("HSETNX").key(key).arg(field).arg(value))
    }

    pub fn hdel<I, F>(self, key: impl Into<Vec<u8>>, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Vec<u8>>,
    {
        self.key_and_items("HDEL", "field", key, fields)
    }

    pub fn hlen(self, key: impl Into<Vec<u8>>) -> Self {
        self.push(Cmd::new("HLEN").key(key))
    }

    pub fn hvals(self, key: impl Into<Vec<u8>>) -> Self {
        self.push(Cmd::new("HVALS").key(key))
    }

    pub fn hmget<I, F>(self, key: impl Into<Vec<u8>>, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Vec<u8>>,
    {
        self.key_and_items("HMGET", "field", key, fields)
    }

    pub fn hexists(self, key: impl Into<Vec<u8>>, field: impl Into<Vec<u8>>) -> Self {
        self.push(Cmd::new("HEXISTS").key(key).arg(field))
    }

    pub fn hgetall(self, key: impl Into<Vec<u8>>) -> Self {
        self.push(Cmd::new("HGETALL").key(key))
    }

    pub fn hincr_by(self, key: impl Into<Vec<u8>>, field: impl Into<Vec<u8>>, amount: i64) -> Self {
        self.push(Cmd::new("HINCRBY").key(key).arg(field).int_arg(amount))
    }

    pub fn hincr_by_float(
        self,
        key: impl Into<Vec<u8>>,
        field: impl Into<Vec<u8>>,
        amount: f64,
    ) -> Self {
        self.push(Cmd::new("HINCRBYFLOAT").key(key).arg(field).float_arg(amount))
    }

    // ---- sets ------------------------------------------------------------

    pub fn sadd<I, M>(self, key: impl Into<Vec<u8>>, members: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<Vec<u8>>,
    {
        self.key_and_items("SADD", "member", key, members)
    }

    pub fn srem<I, M>(self, key: impl Into<Vec<u8>>, members: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<Vec<u8>>,
    {
        self.key_and_items("SREM", "member", key, members)
    }

    pub fn smembers(self, key: impl Into<Vec<u8>>) -> Self {
        self.push(Cmd::new("SMEMBERS").key(key))
    }

    pub fn scard(self, key: impl Into<Vec<u8>>) -> Self {
        self.push(Cmd::new("SCARD").key(key))
    }

    pub fn sismember(self, key: impl Into<Vec<u8>>, member: impl Into<Vec<u8>>) -> Self {
        self.push(Cmd::new("SISMEMBER").key(key).arg(member))
    }

    // ---- helpers ---------------------------------------------------------

    fn keys_command<I, K>(self, name: &'static str, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Vec<u8>>,
    {
        let cmd = keys.into_iter().fold(Cmd::new(name), |cmd, key| cmd.key(key));
        if cmd.args().is_empty() {
            return self.missing(name, "key");
        }
        self.push(cmd)
    }

    fn key_and_items<I, T>(
        self,
        name: &'static str,
        what: &'static str,
        key: impl Into<Vec<u8>>,
        items: I,
    ) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Vec<u8>>,
    {
        let cmd = items
            .into_iter()
            .fold(Cmd::new(name).key(key), |cmd, item| cmd.arg(item));
        if cmd.args().len() < 2 {
            return self.missing(name, what);
        }
        self.push(cmd)
    }
}

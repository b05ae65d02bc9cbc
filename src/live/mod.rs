//! Live configuration snapshots.
//!
//! # Responsibilities
//! - Map configuration keys to typed setters ([`Schema`])
//! - Hold the current snapshot and swap it atomically ([`LiveConfig`])
//!
//! # Data Flow
//! ```text
//! parser values [(key, value)]
//!     → Schema setters on a clone of the current snapshot
//!     → validators (VALIDATE)
//!     → compare with current: equal → NoOp
//!     → CHECK: report Applied, keep current
//!     → UPDATE: ArcSwap::store(new snapshot)
//! ```
//!
//! # Design Decisions
//! - Readers never observe a half-applied update; they hold an `Arc<T>`
//! - Unknown keys are ignored
//! - Local-only keys are refused when the values come from the remote center

use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use crate::parser::{ParseFlags, ParseOutcome};

/// Something a parser can push key/value pairs into.
pub trait ConfigTarget: Send + Sync {
    fn apply(&self, values: &[(String, String)], flags: ParseFlags) -> ParseOutcome;
}

type Setter<T> = Box<dyn Fn(&mut T, &str) -> Result<(), String> + Send + Sync>;
type Validator<T> = Box<dyn Fn(&T) -> Result<(), String> + Send + Sync>;

struct Field<T> {
    setter: Setter<T>,
    local_only: bool,
}

/// Key → setter table for a configuration type.
pub struct Schema<T> {
    fields: HashMap<String, Field<T>>,
    validators: Vec<Validator<T>>,
}

impl<T> Default for Schema<T> {
    fn default() -> Self {
        Self {
            fields: HashMap::new(),
            validators: Vec::new(),
        }
    }
}

impl<T> Schema<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a raw string setter.
    pub fn field<F>(mut self, key: &str, setter: F) -> Self
    where
        F: Fn(&mut T, &str) -> Result<(), String> + Send + Sync + 'static,
    {
        self.fields.insert(
            key.to_string(),
            Field {
                setter: Box::new(setter),
                local_only: false,
            },
        );
        self
    }

    /// Register a setter for a value parsed with `FromStr`.
    pub fn parsed<V, F>(self, key: &str, assign: F) -> Self
    where
        V: FromStr,
        V::Err: Display,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        let name = key.to_string();
        self.field(key, move |target, raw| {
            let value = raw
                .parse::<V>()
                .map_err(|e| format!("{}: invalid value '{}': {}", name, raw, e))?;
            assign(target, value);
            Ok(())
        })
    }

    /// Mark a registered key as settable from local files only.
    pub fn local_only(mut self, key: &str) -> Self {
        if let Some(field) = self.fields.get_mut(key) {
            field.local_only = true;
        }
        self
    }

    /// Add a whole-snapshot validator, run under [`ParseFlags::VALIDATE`].
    pub fn validate<F>(mut self, check: F) -> Self
    where
        F: Fn(&T) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validators.push(Box::new(check));
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// The current configuration of type `T`.
pub struct LiveConfig<T> {
    current: ArcSwap<T>,
    schema: Schema<T>,
}

impl<T> LiveConfig<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(initial: T, schema: Schema<T>) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
            schema,
        }
    }

    /// Current snapshot.
    pub fn load(&self) -> Arc<T> {
        self.current.load_full()
    }

    fn build(&self, values: &[(String, String)], flags: ParseFlags) -> Result<T, String> {
        let mut next = T::clone(&self.current.load());
        for (key, value) in values {
            let Some(field) = self.schema.fields.get(key) else {
                tracing::debug!(key = %key, "Ignoring unknown configuration key");
                continue;
            };
            if field.local_only && flags.contains(ParseFlags::REMOTE) {
                tracing::warn!(key = %key, "Refusing remote value for local-only key");
                continue;
            }
            (field.setter)(&mut next, value)?;
        }
        if flags.contains(ParseFlags::VALIDATE) {
            for check in &self.schema.validators {
                check(&next)?;
            }
        }
        Ok(next)
    }
}

impl<T> ConfigTarget for LiveConfig<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn apply(&self, values: &[(String, String)], flags: ParseFlags) -> ParseOutcome {
        let next = match self.build(values, flags) {
            Ok(next) => next,
            Err(reason) => {
                tracing::warn!(reason = %reason, "Configuration values rejected");
                return ParseOutcome::Invalid;
            }
        };
        if next == **self.current.load() {
            return ParseOutcome::NoOp;
        }
        if flags.contains(ParseFlags::CHECK) {
            return ParseOutcome::Applied;
        }
        if !flags.contains(ParseFlags::UPDATE) {
            return ParseOutcome::NoOp;
        }
        self.current.store(Arc::new(next));
        ParseOutcome::Applied
    }
}

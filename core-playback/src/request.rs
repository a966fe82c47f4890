//! Request decoding.
//!
//! Callers speak in [`MethodCall`]s: a method name plus positional JSON
//! arguments. Decoding turns them into a typed [`Request`] up front so that
//! malformed calls are rejected before they reach the player task.

use crate::descriptor::AudioSourceDescriptor;
use crate::error::{PlaybackError, Result};
use bridge_traits::RepeatMode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Untyped method invocation as received from the host channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }
}

/// Mutation of a concatenating source.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaylistEdit {
    Add(AudioSourceDescriptor),
    Insert(usize, AudioSourceDescriptor),
    AddAll(Vec<AudioSourceDescriptor>),
    InsertAll(usize, Vec<AudioSourceDescriptor>),
    RemoveAt(usize),
    RemoveRange { from: usize, to: usize },
    Move { from: usize, to: usize },
    Clear,
}

impl PlaylistEdit {
    pub fn name(&self) -> &'static str {
        match self {
            PlaylistEdit::Add(_) => "concatenating.add",
            PlaylistEdit::Insert(..) => "concatenating.insert",
            PlaylistEdit::AddAll(_) => "concatenating.addAll",
            PlaylistEdit::InsertAll(..) => "concatenating.insertAll",
            PlaylistEdit::RemoveAt(_) => "concatenating.removeAt",
            PlaylistEdit::RemoveRange { .. } => "concatenating.removeRange",
            PlaylistEdit::Move { .. } => "concatenating.move",
            PlaylistEdit::Clear => "concatenating.clear",
        }
    }
}

/// Typed player request.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Load(AudioSourceDescriptor),
    Play,
    Pause,
    Stop,
    SetVolume(f32),
    SetSpeed(f32),
    SetLoopMode(RepeatMode),
    SetShuffleModeEnabled(bool),
    /// Accepted for API parity; this engine has no stall control.
    SetAutomaticallyWaitsToMinimizeStalling(bool),
    Seek {
        position_ms: Option<i64>,
        index: Option<usize>,
    },
    Dispose,
    Concatenating {
        target: String,
        edit: PlaylistEdit,
    },
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::Load(_) => "load",
            Request::Play => "play",
            Request::Pause => "pause",
            Request::Stop => "stop",
            Request::SetVolume(_) => "setVolume",
            Request::SetSpeed(_) => "setSpeed",
            Request::SetLoopMode(_) => "setLoopMode",
            Request::SetShuffleModeEnabled(_) => "setShuffleModeEnabled",
            Request::SetAutomaticallyWaitsToMinimizeStalling(_) => {
                "setAutomaticallyWaitsToMinimizeStalling"
            }
            Request::Seek { .. } => "seek",
            Request::Dispose => "dispose",
            Request::Concatenating { edit, .. } => edit.name(),
        }
    }

    /// Decode a method call.
    ///
    /// # Errors
    ///
    /// - [`PlaybackError::NotImplemented`] for unknown method names
    /// - [`PlaybackError::Decode`] for missing or malformed arguments
    pub fn decode(call: &MethodCall) -> Result<Self> {
        let args = Args::new(&call.method, &call.args);

        let request = match call.method.as_str() {
            "load" => Request::Load(args.source(0)?),
            "play" => Request::Play,
            "pause" => Request::Pause,
            "stop" => Request::Stop,
            "setVolume" => Request::SetVolume(args.required::<f32>(0)?),
            "setSpeed" => Request::SetSpeed(args.required::<f32>(0)?),
            "setLoopMode" => Request::SetLoopMode(args.loop_mode(0)?),
            "setShuffleModeEnabled" => Request::SetShuffleModeEnabled(args.required(0)?),
            "setAutomaticallyWaitsToMinimizeStalling" => {
                Request::SetAutomaticallyWaitsToMinimizeStalling(args.required(0)?)
            }
            "seek" => Request::Seek {
                position_ms: args.optional(0)?,
                index: args.optional(1)?,
            },
            "dispose" => Request::Dispose,
            method => match method.strip_prefix("concatenating.") {
                Some(op) => Request::Concatenating {
                    target: args.required(0)?,
                    edit: Self::decode_edit(op, &args)?,
                },
                None => return Err(PlaybackError::NotImplemented(method.to_string())),
            },
        };

        Ok(request)
    }

    fn decode_edit(op: &str, args: &Args<'_>) -> Result<PlaylistEdit> {
        let edit = match op {
            "add" => PlaylistEdit::Add(args.source(1)?),
            "insert" => PlaylistEdit::Insert(args.required(1)?, args.source(2)?),
            "addAll" => PlaylistEdit::AddAll(args.sources(1)?),
            "insertAll" => PlaylistEdit::InsertAll(args.required(1)?, args.sources(2)?),
            "removeAt" => PlaylistEdit::RemoveAt(args.required(1)?),
            "removeRange" => PlaylistEdit::RemoveRange {
                from: args.required(1)?,
                to: args.required(2)?,
            },
            "move" => PlaylistEdit::Move {
                from: args.required(1)?,
                to: args.required(2)?,
            },
            "clear" => PlaylistEdit::Clear,
            _ => return Err(PlaybackError::NotImplemented(args.method.to_string())),
        };
        Ok(edit)
    }
}

/// Positional argument accessor with method-aware error messages.
struct Args<'a> {
    method: &'a str,
    values: &'a [Value],
}

impl<'a> Args<'a> {
    fn new(method: &'a str, values: &'a [Value]) -> Self {
        Self { method, values }
    }

    fn value(&self, index: usize) -> &Value {
        self.values.get(index).unwrap_or(&Value::Null)
    }

    fn required<T: DeserializeOwned>(&self, index: usize) -> Result<T> {
        let value = self.value(index);
        if value.is_null() {
            return Err(PlaybackError::decode(format!(
                "{}: missing argument {}",
                self.method, index
            )));
        }
        T::deserialize(value).map_err(|e| {
            PlaybackError::decode(format!("{}: argument {}: {}", self.method, index, e))
        })
    }

    fn optional<T: DeserializeOwned>(&self, index: usize) -> Result<Option<T>> {
        Option::<T>::deserialize(self.value(index)).map_err(|e| {
            PlaybackError::decode(format!("{}: argument {}: {}", self.method, index, e))
        })
    }

    fn source(&self, index: usize) -> Result<AudioSourceDescriptor> {
        let value = self.required::<Value>(index)?;
        AudioSourceDescriptor::from_value(value)
    }

    fn sources(&self, index: usize) -> Result<Vec<AudioSourceDescriptor>> {
        self.required::<Vec<Value>>(index)?
            .into_iter()
            .map(AudioSourceDescriptor::from_value)
            .collect()
    }

    fn loop_mode(&self, index: usize) -> Result<RepeatMode> {
        let value = self.value(index);
        let mode = match value {
            Value::Number(n) => n.as_i64().and_then(RepeatMode::from_index),
            Value::String(_) => RepeatMode::deserialize(value).ok(),
            _ => None,
        };
        mode.ok_or_else(|| {
            PlaybackError::decode(format!("{}: invalid loop mode {}", self.method, value))
        })
    }
}

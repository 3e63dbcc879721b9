//! Error types for plugin hosting

use std::path::PathBuf;
use thiserror::Error;

use crate::instance::LifecycleState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    Opening,
    EntryPoint,
    Instantiation,
    Setup,
}

impl std::fmt::Display for LoadStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadStage::Opening => write!(f, "opening library"),
            LoadStage::EntryPoint => write!(f, "resolving entry point"),
            LoadStage::Instantiation => write!(f, "creating instance"),
            LoadStage::Setup => write!(f, "setting up audio"),
        }
    }
}

#[derive(Error, Debug)]
pub enum HostError {
    #[error("Plugin module not found: {path}\n  Reason: {reason}")]
    ModuleNotFound { path: PathBuf, reason: String },

    #[error("No entry point ({tried}) in {path}")]
    EntryPointNotFound { path: PathBuf, tried: String },

    #[error("Not a VST plugin: {path} (failed while {stage})")]
    NotAPlugin { path: PathBuf, stage: LoadStage },

    #[error("Host callback table is full ({0} instances)")]
    TooManyInstances(usize),

    #[error("Invalid lifecycle transition: {from:?} -> {to:?}")]
    InvalidState {
        from: LifecycleState,
        to: LifecycleState,
    },

    #[error("Event queue full ({capacity} events pending)")]
    EventQueueFull { capacity: usize },

    #[error("Render of {requested} frames exceeds block size {block_size}")]
    BlockSizeExceeded { requested: usize, block_size: usize },

    #[error("Program {index} out of range ({count} programs)")]
    InvalidProgram { index: usize, count: usize },

    #[error("Plugin has no editor")]
    NoEditor,

    #[error("Plugin editor error: {0}")]
    EditorError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HostError>;

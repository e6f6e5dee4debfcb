//! Error Types
//!
//! This module defines the error types used throughout the engine.
//!
//! # Overview
//!
//! The main error type [`UmbraError`] covers the failure modes that the
//! renderer reports to its caller instead of asserting on:
//! - GPU initialization failures
//! - Shader source loading and validation errors
//! - Resource lookups coming from the application layer
//!
//! Contract violations inside the frame (instance capacity, shadow light
//! capacity, misaligned index regions) are not represented here: they are
//! programming errors and abort through `assert!`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use umbra::errors::{UmbraError, Result};
//!
//! fn create_context() -> Result<()> {
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for the Umbra engine.
#[derive(Error, Debug)]
pub enum UmbraError {
    // ========================================================================
    // GPU & Rendering Errors
    // ========================================================================
    /// Failed to request a compatible GPU adapter.
    #[error("Failed to request WGPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// Failed to create the GPU device.
    #[error("Failed to create WGPU device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    /// Failed to create the presentation surface.
    #[error("Failed to create surface: {0}")]
    SurfaceCreateFailed(#[from] wgpu::CreateSurfaceError),

    /// The adapter cannot present to the surface.
    #[error("Surface is not supported by the selected adapter")]
    SurfaceNotSupported,

    // ========================================================================
    // Shader Errors
    // ========================================================================
    /// WGSL parsing or validation failed.
    #[error("Shader '{label}' failed to compile:\n{message}")]
    ShaderCompile {
        /// Label of the program being compiled
        label: String,
        /// Diagnostic emitted by the shader front-end
        message: String,
    },

    /// A file-backed shader source could not be read.
    #[error("Failed to read shader source '{}': {source}", path.display())]
    ShaderSourceRead {
        /// Path of the source file
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// A technique annotation does not name a known pass.
    #[error("Unknown pass annotation '{0}'")]
    UnknownPassAnnotation(String),

    /// An index region does not fit inside its vertex stream.
    #[error("Index region {first}..{end} exceeds the {available} indices of stream '{stream}'")]
    InvalidIndexRegion {
        /// Label of the vertex stream
        stream: String,
        /// First index of the region
        first: u32,
        /// One past the last index of the region
        end: u32,
        /// Number of indices in the stream
        available: u32,
    },
}

/// Alias for `Result<T, UmbraError>`.
pub type Result<T> = std::result::Result<T, UmbraError>;

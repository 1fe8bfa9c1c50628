//! Image description and Dockerfile rendering.
//!
//! The repository `Dockerfile` is the rendering of [`ImageSpec::default`].
//! A different image can be described in TOML:
//!
//! ```toml
//! [builder]
//! image = "rust:1.82.0-slim-bookworm"
//! build = "cargo build --release --bin fanout-gateway"
//!
//! [runtime]
//! image = "debian:12.7-slim"
//! port = 8080
//! entry = ["/app/fanout-gateway"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::dockerfile::{is_file_path, ImageRef};

/// Stage alias of the build stage
pub const BUILD_STAGE: &str = "build";

const HEADER: &str = "# Rendered by `fanout-image render`. Check with `fanout-image check`.";

/// Image description errors
#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },
    #[error("failed to parse image spec: {0}")]
    Parse(String),
    #[error("invalid image spec: {0}")]
    Invalid(String),
}

/// Full image description: a build stage and the runtime stage it feeds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSpec {
    pub builder: BuilderStage,
    pub runtime: RuntimeStage,
}

/// Stage that resolves dependencies and compiles the entry binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderStage {
    /// Pinned toolchain image
    pub image: String,
    pub workdir: String,
    /// Dependency manifests, copied before any source
    pub manifests: Vec<String>,
    /// Empty source files created so the manifests resolve without sources
    pub stub_sources: Vec<String>,
    /// Dependency install command
    pub install: String,
    pub build: String,
    /// Built entry binary, relative to `workdir`
    pub artifact: String,
}

impl Default for BuilderStage {
    fn default() -> Self {
        Self {
            image: "rust:1.82.0-slim-bookworm".to_string(),
            workdir: "/build".to_string(),
            manifests: vec![
                "Cargo.toml".to_string(),
                "crates/fanout-gateway/Cargo.toml".to_string(),
                "crates/fanout-telemetry/Cargo.toml".to_string(),
                "crates/fanout-image/Cargo.toml".to_string(),
                "tests/Cargo.toml".to_string(),
            ],
            stub_sources: vec![
                "crates/fanout-gateway/src/lib.rs".to_string(),
                "crates/fanout-gateway/src/main.rs".to_string(),
                "crates/fanout-telemetry/src/lib.rs".to_string(),
                "crates/fanout-image/src/lib.rs".to_string(),
                "crates/fanout-image/src/bin/fanout-image.rs".to_string(),
                "tests/src/lib.rs".to_string(),
            ],
            install: "cargo fetch".to_string(),
            build: "cargo build --release --bin fanout-gateway".to_string(),
            artifact: "target/release/fanout-gateway".to_string(),
        }
    }
}

/// Stage that becomes the image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeStage {
    pub image: String,
    pub workdir: String,
    /// Advertised port
    pub port: u16,
    /// Launch argv; `entry[0]` is where the artifact is installed
    pub entry: Vec<String>,
}

impl Default for RuntimeStage {
    fn default() -> Self {
        Self {
            image: "debian:12.7-slim".to_string(),
            workdir: "/app".to_string(),
            port: 8080,
            entry: vec!["/app/fanout-gateway".to_string()],
        }
    }
}

impl ImageSpec {
    /// Load from a TOML file and validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SpecError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| SpecError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, SpecError> {
        let spec: Self = toml::from_str(text).map_err(|e| SpecError::Parse(e.to_string()))?;
        spec.validate()?;
        Ok(spec)
    }

    /// Reject descriptions whose rendering could not satisfy the image
    /// contract.
    pub fn validate(&self) -> Result<(), SpecError> {
        for image in [&self.builder.image, &self.runtime.image] {
            if !ImageRef::parse(image).is_pinned() {
                return Err(SpecError::Invalid(format!(
                    "image {} is not pinned to an exact version",
                    image
                )));
            }
        }
        for workdir in [&self.builder.workdir, &self.runtime.workdir] {
            if !workdir.starts_with('/') || workdir.split('/').any(|c| c == "..") {
                return Err(SpecError::Invalid(format!(
                    "workdir {:?} must be absolute without '..'",
                    workdir
                )));
            }
        }
        if self.builder.manifests.is_empty() {
            return Err(SpecError::Invalid("at least one manifest is required".into()));
        }
        if let Some(manifest) = self.builder.manifests.iter().find(|m| !is_file_path(m)) {
            return Err(SpecError::Invalid(format!(
                "manifest {:?} must name a single file",
                manifest
            )));
        }
        if self.builder.install.trim().is_empty() || self.builder.build.trim().is_empty() {
            return Err(SpecError::Invalid("install and build commands are required".into()));
        }
        if self.builder.artifact.trim().is_empty() {
            return Err(SpecError::Invalid("artifact path is required".into()));
        }
        if self.runtime.port == 0 {
            return Err(SpecError::Invalid("port must be non-zero".into()));
        }
        match self.runtime.entry.first() {
            Some(program) if program.starts_with('/') => Ok(()),
            Some(program) => Err(SpecError::Invalid(format!(
                "entry program {:?} must be an absolute path",
                program
            ))),
            None => Err(SpecError::Invalid("entry command is empty".into())),
        }
    }

    /// Where the build stage leaves the entry binary
    pub fn artifact_path(&self) -> String {
        format!(
            "{}/{}",
            self.builder.workdir.trim_end_matches('/'),
            self.builder.artifact.trim_start_matches('/')
        )
    }

    /// Render the Dockerfile text.
    pub fn render(&self) -> String {
        let builder = &self.builder;
        let runtime = &self.runtime;
        let mut lines = vec![HEADER.to_string(), String::new()];

        lines.push(format!("FROM {} AS {}", builder.image, BUILD_STAGE));
        lines.push(format!("WORKDIR {}", builder.workdir));
        for manifest in &builder.manifests {
            lines.push(format!("COPY {} {}", manifest, manifest));
        }
        if !builder.stub_sources.is_empty() {
            lines.extend(stub_command(&builder.stub_sources));
        }
        lines.push(format!("RUN {}", builder.install));
        lines.push("COPY . .".to_string());
        lines.push(format!("RUN {}", builder.build));
        lines.push(String::new());

        let program = runtime.entry.first().cloned().unwrap_or_default();
        lines.push(format!("FROM {}", runtime.image));
        lines.push(format!("WORKDIR {}", runtime.workdir));
        lines.push(format!(
            "COPY --from={} {} {}",
            BUILD_STAGE,
            self.artifact_path(),
            program
        ));
        lines.push(format!("EXPOSE {}", runtime.port));
        lines.push(format!("CMD {}", serde_json::json!(runtime.entry)));

        let mut text = lines.join("\n");
        text.push('\n');
        text
    }
}

/// `RUN [mkdir -p <dirs> &&] touch <files>`, one path per line
fn stub_command(stubs: &[String]) -> Vec<String> {
    let mut dirs = BTreeSet::new();
    for stub in stubs {
        if let Some(parent) = Path::new(stub).parent() {
            let parent = parent.to_string_lossy();
            if !parent.is_empty() {
                dirs.insert(parent.into_owned());
            }
        }
    }

    let mut lines = Vec::new();
    if dirs.is_empty() {
        lines.push("RUN touch \\".to_string());
    } else {
        lines.push("RUN mkdir -p \\".to_string());
        lines.extend(dirs.iter().map(|d| format!("        {} \\", d)));
        lines.push("    && touch \\".to_string());
    }
    let last = stubs.len() - 1;
    for (i, stub) in stubs.iter().enumerate() {
        let tail = if i == last { "" } else { " \\" };
        lines.push(format!("        {}{}", stub, tail));
    }
    lines
}

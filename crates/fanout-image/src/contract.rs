//! Packaging contract verification.
//!
//! A descriptor satisfies the contract when:
//!
//! - every base image is pinned to an exact version
//! - each stage sets an absolute `WORKDIR` before it copies or runs anything
//! - dependency manifests (individual files) are copied and installed before
//!   any other part of the build context, so the install layer survives
//!   source-only changes
//! - the final stage advertises exactly one port
//! - the final stage launches exactly one process, in exec form
//!
//! Base images may take their version from an `ARG` default declared before
//! the first `FROM`; an argument without a default counts as unpinned.
//!
//! Whether the launched program exists is deliberately not checked: a
//! missing entry point fails at run time, not at build time.

use serde::Serialize;
use std::fmt;
use std::path::{Component, Path};

use crate::dockerfile::{Dockerfile, Instruction, LaunchForm, Stage};

/// A single contract breach
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum ContractViolation {
    #[error("stage {stage}: base image {image} is not pinned to an exact version")]
    UnpinnedBase { stage: String, image: String },
    #[error("stage {stage}: no WORKDIR before line {line}")]
    WorkdirNotFirst { stage: String, line: usize },
    #[error("stage {stage}: WORKDIR {path:?} must be absolute without '..'")]
    InvalidWorkdir { stage: String, path: String },
    #[error("stage {stage}: source tree copied on line {line} before dependencies are installed")]
    SourceCopiedBeforeDependencies { stage: String, line: usize },
    #[error("final stage exposes no port")]
    MissingExposedPort,
    #[error("final stage exposes {0:?}, expected exactly one port")]
    MultipleExposedPorts(Vec<u16>),
    #[error("final stage has no CMD or ENTRYPOINT")]
    MissingLaunch,
    #[error("final stage has {0} launch instructions, expected one")]
    MultipleLaunch(usize),
    #[error("line {line}: launch uses shell form, which wraps the process in a shell")]
    ShellFormLaunch { line: usize },
    #[error("line {line}: launch command is empty")]
    EmptyLaunch { line: usize },
}

/// Every violation found in a descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractViolations(pub Vec<ContractViolation>);

impl fmt::Display for ContractViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} contract violation(s):", self.0.len())?;
        for violation in &self.0 {
            writeln!(f, "  - {}", violation)?;
        }
        Ok(())
    }
}

impl std::error::Error for ContractViolations {}

/// What a conforming descriptor declares
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractReport {
    pub stages: usize,
    pub base_images: Vec<String>,
    /// Working directory the launch command resolves against
    pub workdir: String,
    /// Advertised port
    pub port: u16,
    /// Argument vector of the single foreground process
    pub launch: Vec<String>,
}

/// Check a parsed descriptor against the packaging contract.
pub fn verify(dockerfile: &Dockerfile) -> Result<ContractReport, ContractViolations> {
    let mut violations = Vec::new();
    let mut aliases: Vec<&str> = Vec::new();

    for (index, stage) in dockerfile.stages.iter().enumerate() {
        let name = stage.display_name(index);
        check_base(stage, &name, &aliases, &mut violations);
        check_workdir(stage, &name, &mut violations);
        check_install_order(stage, &name, &mut violations);
        if let Some(alias) = &stage.alias {
            aliases.push(alias);
        }
    }

    let Some(final_stage) = dockerfile.final_stage() else {
        return Err(ContractViolations(vec![ContractViolation::MissingLaunch]));
    };
    let port = check_port(final_stage, &mut violations);
    let launch = check_launch(final_stage, &mut violations);

    if !violations.is_empty() {
        return Err(ContractViolations(violations));
    }

    Ok(ContractReport {
        stages: dockerfile.stages.len(),
        base_images: dockerfile.stages.iter().map(|s| s.base.to_string()).collect(),
        workdir: last_workdir(final_stage).unwrap_or_else(|| "/".to_string()),
        port: port.unwrap_or_default(),
        launch: launch.unwrap_or_default(),
    })
}

fn check_base(stage: &Stage, name: &str, aliases: &[&str], out: &mut Vec<ContractViolation>) {
    let base = &stage.base;
    let is_stage_ref = base.tag.is_none() && aliases.contains(&base.name.as_str());
    if is_stage_ref || base.name == "scratch" || base.is_pinned() {
        return;
    }
    out.push(ContractViolation::UnpinnedBase {
        stage: name.to_string(),
        image: base.to_string(),
    });
}

fn check_workdir(stage: &Stage, name: &str, out: &mut Vec<ContractViolation>) {
    let mut seen_workdir = false;
    let mut reported = false;

    for located in &stage.instructions {
        match &located.instruction {
            Instruction::Workdir(path) => {
                seen_workdir = true;
                if !is_rooted(path) {
                    out.push(ContractViolation::InvalidWorkdir {
                        stage: name.to_string(),
                        path: path.clone(),
                    });
                }
            }
            Instruction::Copy { .. } | Instruction::Run(_) if !seen_workdir && !reported => {
                reported = true;
                out.push(ContractViolation::WorkdirNotFirst {
                    stage: name.to_string(),
                    line: located.line,
                });
            }
            _ => {}
        }
    }
}

fn is_rooted(path: &str) -> bool {
    let path = Path::new(path);
    path.is_absolute() && !path.components().any(|c| c == Component::ParentDir)
}

/// Commands that only lay out files. A `RUN` made of nothing else does not
/// install anything.
const SCAFFOLDING: &[&str] = &[
    "mkdir", "touch", "cp", "mv", "ln", "rm", "chmod", "echo", "true",
];

/// A `RUN` that does more than create or move files
fn is_install_step(command: &str) -> bool {
    command
        .split(|c: char| matches!(c, ';' | '&' | '|'))
        .filter_map(|segment| segment.split_whitespace().next())
        .any(|program| !SCAFFOLDING.contains(&program))
}

/// Install step: the first real `RUN` after a manifest copy. Every
/// build-context copy before it must be a manifest copy, and the full tree
/// may only be copied after it.
fn check_install_order(stage: &Stage, name: &str, out: &mut Vec<ContractViolation>) {
    let mut manifest_copied = false;
    let mut install_at = None;
    for (index, located) in stage.instructions.iter().enumerate() {
        match &located.instruction {
            i if i.is_manifest_copy() => manifest_copied = true,
            Instruction::Run(command) if manifest_copied && is_install_step(command) => {
                install_at = Some(index);
                break;
            }
            _ => {}
        }
    }

    let end = install_at.unwrap_or(stage.instructions.len());
    let before_install = &stage.instructions[..end];
    let offending = before_install.iter().find(|l| {
        let instruction = &l.instruction;
        if install_at.is_some() {
            (instruction.is_selective_copy() && !instruction.is_manifest_copy())
                || instruction.is_full_tree_copy()
        } else {
            instruction.is_full_tree_copy()
        }
    });

    if let Some(located) = offending {
        out.push(ContractViolation::SourceCopiedBeforeDependencies {
            stage: name.to_string(),
            line: located.line,
        });
    }
}

fn check_port(stage: &Stage, out: &mut Vec<ContractViolation>) -> Option<u16> {
    let ports: Vec<u16> = stage
        .instructions
        .iter()
        .filter_map(|l| match &l.instruction {
            Instruction::Expose(ports) => Some(ports.iter().map(|p| p.port)),
            _ => None,
        })
        .flatten()
        .collect();

    match ports.as_slice() {
        [] => {
            out.push(ContractViolation::MissingExposedPort);
            None
        }
        [port] => Some(*port),
        _ => {
            out.push(ContractViolation::MultipleExposedPorts(ports));
            None
        }
    }
}

fn check_launch(stage: &Stage, out: &mut Vec<ContractViolation>) -> Option<Vec<String>> {
    let launches: Vec<_> = stage
        .instructions
        .iter()
        .filter_map(|l| match &l.instruction {
            Instruction::Launch { form, .. } => Some((l.line, form)),
            _ => None,
        })
        .collect();

    match launches.as_slice() {
        [] => {
            out.push(ContractViolation::MissingLaunch);
            None
        }
        [(line, LaunchForm::Shell(_))] => {
            out.push(ContractViolation::ShellFormLaunch { line: *line });
            None
        }
        [(line, LaunchForm::Exec(argv))] if argv.is_empty() => {
            out.push(ContractViolation::EmptyLaunch { line: *line });
            None
        }
        [(_, LaunchForm::Exec(argv))] => Some(argv.clone()),
        _ => {
            out.push(ContractViolation::MultipleLaunch(launches.len()));
            None
        }
    }
}

fn last_workdir(stage: &Stage) -> Option<String> {
    stage
        .instructions
        .iter()
        .rev()
        .find_map(|l| match &l.instruction {
            Instruction::Workdir(path) => Some(path.clone()),
            _ => None,
        })
}

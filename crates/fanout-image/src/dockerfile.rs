//! Dockerfile parsing.
//!
//! Only the instructions the image contract cares about are modelled in
//! detail (`FROM`, `WORKDIR`, `COPY`/`ADD`, `RUN`, `EXPOSE`, `CMD`,
//! `ENTRYPOINT`); everything else is kept verbatim as [`Instruction::Other`].

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Dockerfile parse errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("dockerfile has no FROM instruction")]
    NoStages,
    #[error("line {line}: {keyword} before the first FROM")]
    InstructionBeforeFrom { line: usize, keyword: String },
    #[error("line {line}: {keyword} requires arguments")]
    MissingArguments { line: usize, keyword: String },
    #[error("line {line}: invalid exec form: {reason}")]
    InvalidExecForm { line: usize, reason: String },
    #[error("line {line}: invalid port {value:?}")]
    InvalidPort { line: usize, value: String },
    #[error("line {line}: COPY needs at least one source and a destination")]
    InvalidCopy { line: usize },
}

/// Image reference of a `FROM` line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRef {
    pub name: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

impl ImageRef {
    pub fn parse(reference: &str) -> Self {
        let (rest, digest) = match reference.split_once('@') {
            Some((rest, digest)) => (rest, Some(digest.to_string())),
            None => (reference, None),
        };

        // A ':' before the last '/' belongs to a registry port, not a tag
        let name_start = rest.rfind('/').map(|i| i + 1).unwrap_or(0);
        match rest[name_start..].rfind(':') {
            Some(i) => {
                let split = name_start + i;
                Self {
                    name: rest[..split].to_string(),
                    tag: Some(rest[split + 1..].to_string()),
                    digest,
                }
            }
            None => Self {
                name: rest.to_string(),
                tag: None,
                digest,
            },
        }
    }

    /// Pinned to an exact version: a digest, or a tag other than `latest`
    /// that carries a version number.
    pub fn is_pinned(&self) -> bool {
        if self.digest.is_some() {
            return true;
        }
        match &self.tag {
            Some(tag) => tag != "latest" && tag.chars().any(|c| c.is_ascii_digit()),
            None => false,
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

/// `CMD` or `ENTRYPOINT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LaunchKind {
    Cmd,
    Entrypoint,
}

/// How a launch instruction spells its command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LaunchForm {
    /// JSON array, executed directly
    Exec(Vec<String>),
    /// Plain string, wrapped in `/bin/sh -c`
    Shell(String),
}

/// Exposed port with protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExposedPort {
    pub port: u16,
    pub udp: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Instruction {
    Workdir(String),
    Copy {
        /// `--from=<stage>`; `None` copies from the build context
        from: Option<String>,
        sources: Vec<String>,
        dest: String,
    },
    Run(String),
    Expose(Vec<ExposedPort>),
    Launch { kind: LaunchKind, form: LaunchForm },
    Other { keyword: String, args: String },
}

impl Instruction {
    /// Copies the whole build context rather than selected files
    pub fn is_full_tree_copy(&self) -> bool {
        match self {
            Instruction::Copy { from: None, sources, .. } => sources
                .iter()
                .any(|s| matches!(s.as_str(), "." | "./" | "*")),
            _ => false,
        }
    }

    /// Copies selected files from the build context
    pub fn is_selective_copy(&self) -> bool {
        matches!(self, Instruction::Copy { from: None, .. }) && !self.is_full_tree_copy()
    }

    /// Copies only individual named files from the build context, the shape
    /// of a dependency manifest copy
    pub fn is_manifest_copy(&self) -> bool {
        match self {
            Instruction::Copy { from: None, sources, .. } => {
                !sources.is_empty() && sources.iter().all(|s| is_file_path(s))
            }
            _ => false,
        }
    }
}

/// A single file: no glob, no trailing `/`, and a final component with an
/// extension. Extensionless names cannot be told apart from directories.
pub fn is_file_path(path: &str) -> bool {
    if path.ends_with('/') || path.contains(|c| matches!(c, '*' | '?' | '[')) {
        return false;
    }
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((stem, ext)) => !stem.is_empty() && !ext.is_empty(),
        None => false,
    }
}

/// Instruction with the line it starts on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Located {
    pub line: usize,
    pub instruction: Instruction,
}

/// One `FROM` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stage {
    pub line: usize,
    pub base: ImageRef,
    pub alias: Option<String>,
    pub instructions: Vec<Located>,
}

impl Stage {
    pub fn display_name(&self, index: usize) -> String {
        self.alias.clone().unwrap_or_else(|| format!("#{}", index))
    }
}

/// Parsed Dockerfile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dockerfile {
    /// Defaults of the `ARG`s declared before the first `FROM`
    pub build_args: BTreeMap<String, String>,
    pub stages: Vec<Stage>,
}

impl Dockerfile {
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut stages: Vec<Stage> = Vec::new();
        let mut build_args = BTreeMap::new();

        for (line, content) in logical_lines(text) {
            let (keyword, args) = match content.split_once(char::is_whitespace) {
                Some((k, a)) => (k.to_ascii_uppercase(), a.trim().to_string()),
                None => (content.to_ascii_uppercase(), String::new()),
            };

            if keyword == "FROM" {
                stages.push(parse_from(line, &substitute_args(&args, &build_args))?);
                continue;
            }

            let Some(stage) = stages.last_mut() else {
                // Only ARG may precede the first FROM
                if keyword == "ARG" {
                    let (name, default) = match args.split_once('=') {
                        Some((name, value)) => (name, value.trim_matches('"')),
                        None => (args.as_str(), ""),
                    };
                    build_args.insert(name.trim().to_string(), default.to_string());
                    continue;
                }
                return Err(ParseError::InstructionBeforeFrom { line, keyword });
            };

            let instruction = parse_instruction(line, &keyword, args)?;
            stage.instructions.push(Located { line, instruction });
        }

        if stages.is_empty() {
            return Err(ParseError::NoStages);
        }
        Ok(Self { build_args, stages })
    }

    /// The stage that becomes the image
    pub fn final_stage(&self) -> Option<&Stage> {
        self.stages.last()
    }
}

/// Expand `${NAME}` and `$NAME` from pre-FROM `ARG` defaults. Unknown names
/// are left as written.
fn substitute_args(text: &str, args: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('$') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];

        let (name, consumed) = match after.strip_prefix('{') {
            Some(braced) => match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            },
            None => {
                let end = after
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or(after.len());
                (&after[..end], end)
            }
        };

        match args.get(name).filter(|v| !name.is_empty() && !v.is_empty()) {
            Some(value) => out.push_str(value),
            None => out.push_str(&rest[start..start + 1 + consumed]),
        }
        rest = &after[consumed..];
    }
    out.push_str(rest);
    out
}

/// Join `\` continuations, drop blank and comment lines.
/// Yields the 1-based line each instruction starts on.
fn logical_lines(text: &str) -> Vec<(usize, String)> {
    let mut out = Vec::new();
    let mut current: Option<(usize, String)> = None;

    for (index, raw) in text.lines().enumerate() {
        let trimmed = raw.trim();
        if trimmed.starts_with('#') || trimmed.is_empty() {
            continue;
        }

        let (body, continues) = match trimmed.strip_suffix('\\') {
            Some(body) => (body.trim_end(), true),
            None => (trimmed, false),
        };

        let entry = current.get_or_insert_with(|| (index + 1, String::new()));
        if !body.is_empty() {
            if !entry.1.is_empty() {
                entry.1.push(' ');
            }
            entry.1.push_str(body);
        }

        if !continues {
            if let Some(done) = current.take() {
                if !done.1.is_empty() {
                    out.push(done);
                }
            }
        }
    }

    if let Some(done) = current {
        if !done.1.is_empty() {
            out.push(done);
        }
    }
    out
}

fn parse_from(line: usize, args: &str) -> Result<Stage, ParseError> {
    let words: Vec<&str> = args
        .split_whitespace()
        .filter(|w| !w.starts_with("--"))
        .collect();

    let image = words.first().ok_or_else(|| ParseError::MissingArguments {
        line,
        keyword: "FROM".to_string(),
    })?;

    let alias = match words.as_slice() {
        [_, as_kw, alias] if as_kw.eq_ignore_ascii_case("as") => Some(alias.to_string()),
        _ => None,
    };

    Ok(Stage {
        line,
        base: ImageRef::parse(image),
        alias,
        instructions: Vec::new(),
    })
}

fn parse_instruction(line: usize, keyword: &str, args: String) -> Result<Instruction, ParseError> {
    let require_args = |args: &str| {
        if args.is_empty() {
            Err(ParseError::MissingArguments {
                line,
                keyword: keyword.to_string(),
            })
        } else {
            Ok(())
        }
    };

    let instruction = match keyword {
        "WORKDIR" => {
            require_args(&args)?;
            Instruction::Workdir(args)
        }
        "RUN" => {
            require_args(&args)?;
            Instruction::Run(args)
        }
        "COPY" | "ADD" => parse_copy(line, &args)?,
        "EXPOSE" => {
            require_args(&args)?;
            Instruction::Expose(parse_ports(line, &args)?)
        }
        "CMD" | "ENTRYPOINT" => {
            require_args(&args)?;
            let kind = if keyword == "CMD" {
                LaunchKind::Cmd
            } else {
                LaunchKind::Entrypoint
            };
            Instruction::Launch {
                kind,
                form: parse_launch_form(line, &args)?,
            }
        }
        _ => Instruction::Other {
            keyword: keyword.to_string(),
            args,
        },
    };
    Ok(instruction)
}

fn parse_copy(line: usize, args: &str) -> Result<Instruction, ParseError> {
    let mut from = None;
    let mut rest = args.trim();

    while let Some(flag_end) = rest.strip_prefix("--").map(|r| r.find(char::is_whitespace)) {
        let end = flag_end.map(|i| i + 2).unwrap_or(rest.len());
        let flag = &rest[2..end];
        if let Some(stage) = flag.strip_prefix("from=") {
            from = Some(stage.to_string());
        }
        rest = rest[end..].trim_start();
    }

    let mut paths: Vec<String> = if rest.starts_with('[') {
        serde_json::from_str(rest).map_err(|e| ParseError::InvalidExecForm {
            line,
            reason: e.to_string(),
        })?
    } else {
        rest.split_whitespace().map(str::to_string).collect()
    };

    if paths.len() < 2 {
        return Err(ParseError::InvalidCopy { line });
    }
    // len >= 2 checked above
    let dest = paths.pop().unwrap_or_default();

    Ok(Instruction::Copy {
        from,
        sources: paths,
        dest,
    })
}

fn parse_ports(line: usize, args: &str) -> Result<Vec<ExposedPort>, ParseError> {
    args.split_whitespace()
        .map(|word| {
            let (number, protocol) = match word.split_once('/') {
                Some((n, p)) => (n, p.to_ascii_lowercase()),
                None => (word, "tcp".to_string()),
            };
            let port = number.parse::<u16>().ok().filter(|p| *p != 0);
            match (port, protocol.as_str()) {
                (Some(port), "tcp") => Ok(ExposedPort { port, udp: false }),
                (Some(port), "udp") => Ok(ExposedPort { port, udp: true }),
                _ => Err(ParseError::InvalidPort {
                    line,
                    value: word.to_string(),
                }),
            }
        })
        .collect()
}

fn parse_launch_form(line: usize, args: &str) -> Result<LaunchForm, ParseError> {
    if args.starts_with('[') {
        serde_json::from_str::<Vec<String>>(args)
            .map(LaunchForm::Exec)
            .map_err(|e| ParseError::InvalidExecForm {
                line,
                reason: e.to_string(),
            })
    } else {
        Ok(LaunchForm::Shell(args.to_string()))
    }
}

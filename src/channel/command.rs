//! Domain-tagged commands exchanged over the command channel
//!
//! A command is a `(domain, verb, args...)` tuple. Several workers can share
//! one channel pair; each consumer claims only the commands addressed to its
//! own domain and puts the rest back.

use std::fmt;
use std::path::{Path, PathBuf};

/// Which worker a command is addressed to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Domain {
    /// The pose worker
    Pose,
    /// The video writer worker
    Writer,
    /// The capture process
    Camera,
    /// Any other consumer
    Other(String),
}

impl Domain {
    pub fn as_str(&self) -> &str {
        match self {
            Domain::Pose => "pose",
            Domain::Writer => "writer",
            Domain::Camera => "camera",
            Domain::Other(name) => name,
        }
    }
}

impl From<&str> for Domain {
    fn from(s: &str) -> Self {
        match s {
            "pose" => Domain::Pose,
            "writer" => Domain::Writer,
            "camera" => Domain::Camera,
            other => Domain::Other(other.to_string()),
        }
    }
}

/// What the command asks for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Verb {
    /// Worker start-up report
    Start,
    /// Toggle persistence
    Write,
    /// Persist accumulated results
    Save,
    /// Shut down
    End,
    Other(String),
}

impl Verb {
    pub fn as_str(&self) -> &str {
        match self {
            Verb::Start => "start",
            Verb::Write => "write",
            Verb::Save => "save",
            Verb::End => "end",
            Verb::Other(name) => name,
        }
    }
}

impl From<&str> for Verb {
    fn from(s: &str) -> Self {
        match s {
            "start" => Verb::Start,
            "write" => Verb::Write,
            "save" => Verb::Save,
            "end" => Verb::End,
            other => Verb::Other(other.to_string()),
        }
    }
}

/// A positional command argument
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Flag(bool),
    Path(PathBuf),
    Text(String),
    Number(f64),
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Flag(b) => write!(f, "{}", b),
            Arg::Path(p) => write!(f, "{}", p.display()),
            Arg::Text(s) => write!(f, "{}", s),
            Arg::Number(n) => write!(f, "{}", n),
        }
    }
}

/// A domain-tagged command
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub domain: Domain,
    pub verb: Verb,
    pub args: Vec<Arg>,
}

impl Command {
    pub fn new(domain: impl Into<Domain>, verb: impl Into<Verb>, args: Vec<Arg>) -> Self {
        Self {
            domain: domain.into(),
            verb: verb.into(),
            args,
        }
    }

    /// `(pose,start,<ready>)`
    pub fn pose_start(ready: bool) -> Self {
        Self::new(Domain::Pose, Verb::Start, vec![Arg::Flag(ready)])
    }

    /// `(pose,write,<enabled>)`
    pub fn pose_write(enabled: bool) -> Self {
        Self::new(Domain::Pose, Verb::Write, vec![Arg::Flag(enabled)])
    }

    /// `(pose,save,<path>)`
    pub fn pose_save(path: impl AsRef<Path>) -> Self {
        Self::new(
            Domain::Pose,
            Verb::Save,
            vec![Arg::Path(path.as_ref().to_path_buf())],
        )
    }

    /// `(pose,save,<path>,<success>)`
    pub fn pose_save_reply(path: impl AsRef<Path>, success: bool) -> Self {
        Self::new(
            Domain::Pose,
            Verb::Save,
            vec![Arg::Path(path.as_ref().to_path_buf()), Arg::Flag(success)],
        )
    }

    /// `(pose,end)`
    pub fn pose_end() -> Self {
        Self::new(Domain::Pose, Verb::End, Vec::new())
    }

    /// Whether this command has the given domain and verb
    pub fn is(&self, domain: &Domain, verb: &Verb) -> bool {
        &self.domain == domain && &self.verb == verb
    }

    /// Boolean argument at `index`
    pub fn flag(&self, index: usize) -> Option<bool> {
        match self.args.get(index) {
            Some(Arg::Flag(b)) => Some(*b),
            _ => None,
        }
    }

    /// Path argument at `index`; text arguments are accepted as paths
    pub fn path(&self, index: usize) -> Option<PathBuf> {
        match self.args.get(index) {
            Some(Arg::Path(p)) => Some(p.clone()),
            Some(Arg::Text(s)) => Some(PathBuf::from(s)),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{}", self.domain.as_str(), self.verb.as_str())?;
        for arg in &self.args {
            write!(f, ",{}", arg)?;
        }
        write!(f, ")")
    }
}

/// A decoded command for the pose worker
#[derive(Debug, Clone, PartialEq)]
pub enum PoseCommand {
    /// Enable or disable persistence
    Write(bool),
    /// Save accumulated results under this path prefix
    Save(PathBuf),
    /// Leave the loop
    End,
}

impl PoseCommand {
    /// Decode a `pose` domain command, describing why it is malformed otherwise
    pub fn parse(cmd: &Command) -> std::result::Result<Self, String> {
        if cmd.domain != Domain::Pose {
            return Err(format!("not a pose command: {}", cmd));
        }
        match cmd.verb {
            Verb::Write => cmd
                .flag(0)
                .map(PoseCommand::Write)
                .ok_or_else(|| format!("write expects a boolean: {}", cmd)),
            Verb::Save => cmd
                .path(0)
                .map(PoseCommand::Save)
                .ok_or_else(|| format!("save expects a path: {}", cmd)),
            Verb::End => Ok(PoseCommand::End),
            _ => Err(format!("unknown pose verb: {}", cmd)),
        }
    }
}

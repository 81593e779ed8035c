use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Builder describing how to launch a tracee.
#[derive(Clone, Debug)]
pub struct Command {
    /// Program to launch.
    pub program: PathBuf,

    /// Arguments passed to the program.
    pub args: Vec<String>,

    /// Environment of the tracee.
    pub env: CommandEnv,

    /// Working directory of the tracee (defaults to ours).
    pub current_dir: Option<PathBuf>,

    /// Standard streams of the tracee.
    pub stdio: StdioMode,
}

impl Command {
    /// Creates a command launching `program` without arguments, with our
    /// environment, working directory and standard streams.
    ///
    /// A bare program name (without `/`) is looked up in `PATH`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: CommandEnv::Inherit(BTreeMap::new()),
            current_dir: None,
            stdio: StdioMode::Inherit,
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        args.into_iter().fold(self, |cmd, arg| cmd.arg(arg))
    }

    /// Sets an environment variable, overriding any inherited value.
    pub fn env(mut self, key: impl Into<String>, val: impl Into<String>) -> Self {
        match self.env {
            CommandEnv::Inherit(ref mut env) => {
                env.insert(key.into(), Some(val.into()));
            }
            CommandEnv::NoInherit(ref mut env) => {
                env.insert(key.into(), val.into());
            }
        }

        self
    }

    /// Sets several environment variables.
    pub fn envs<I, K, V>(self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        vars.into_iter().fold(self, |cmd, (k, v)| cmd.env(k, v))
    }

    /// Unsets an environment variable, even if inherited.
    pub fn env_remove(mut self, key: impl Into<String>) -> Self {
        match self.env {
            CommandEnv::Inherit(ref mut env) => {
                env.insert(key.into(), None);
            }
            CommandEnv::NoInherit(ref mut env) => {
                env.remove(&key.into());
            }
        }

        self
    }

    /// Starts from an empty environment instead of inheriting ours.
    pub fn env_clear(mut self) -> Self {
        self.env = CommandEnv::NoInherit(BTreeMap::new());
        self
    }

    /// Sets the working directory of the tracee.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Sets the standard streams of the tracee.
    pub const fn stdio(mut self, stdio: StdioMode) -> Self {
        self.stdio = stdio;
        self
    }

    /// Path of the executable to launch, if it exists.
    ///
    /// Paths containing a `/` are taken as-is (relative to the working
    /// directory of the tracee). Bare names are searched in `PATH`.
    pub fn resolve_program(&self) -> Option<PathBuf> {
        if self.program.to_string_lossy().contains('/') {
            let path = match &self.current_dir {
                Some(dir) if self.program.is_relative() => dir.join(&self.program),
                _ => self.program.clone(),
            };

            return is_executable(&path).then_some(path);
        }

        let path_var = match &self.env {
            CommandEnv::Inherit(env) => match env.get("PATH") {
                Some(overridden) => overridden.clone(),
                None => std::env::var("PATH").ok(),
            },
            CommandEnv::NoInherit(env) => env.get("PATH").cloned(),
        }?;

        std::env::split_paths(&path_var)
            .map(|dir| dir.join(&self.program))
            .find(|path| is_executable(path))
    }
}

/// Environment of a tracee, see [`Command`].
#[derive(Clone, Debug)]
pub enum CommandEnv {
    /// Our environment, with overrides. `None` unsets a variable.
    Inherit(BTreeMap<String, Option<String>>),

    /// Only these variables.
    NoInherit(BTreeMap<String, String>),
}

/// Where the standard streams of a tracee go.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StdioMode {
    /// Shared with the tracer.
    #[default]
    Inherit,

    /// Piped back to the tracer, see [`Process::take_stdio`](crate::Process::take_stdio).
    Piped,

    /// Redirected to `/dev/null`.
    Null,
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

//! Git invocation
//!
//! Every importer step that touches source control is a single `git`
//! subprocess. The subprocess' stdout and stderr share one pipe, and that
//! combined stream is echoed to our stdout line by line as it arrives.
//!
//! Running commands goes through [`CommandRunner`] so the import sequence
//! can be exercised without a real git binary.

use crate::error::ImportError;
use std::fmt;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Importer steps that shell out to git
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Fetch,
    CheckoutTag,
    ClearDestination,
    RestoreBranch,
    DeleteBranch,
    Stage,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Fetch => "fetch",
            Step::CheckoutTag => "checkout-tag",
            Step::ClearDestination => "clear-destination",
            Step::RestoreBranch => "restore-branch",
            Step::DeleteBranch => "delete-branch",
            Step::Stage => "stage",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Exit status of a finished step
///
/// `code` is None when the process was terminated by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepStatus {
    pub code: Option<i32>,
}

impl StepStatus {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit status {}", code),
            None => f.write_str("termination by signal"),
        }
    }
}

/// One git invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCommand {
    pub step: Step,
    /// Directory to run in (None = current directory)
    pub dir: Option<PathBuf>,
    pub args: Vec<String>,
}

impl GitCommand {
    pub fn new<I, S>(step: Step, dir: Option<&Path>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            step,
            dir: dir.map(Path::to_path_buf),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// `git clone --no-checkout <url> <working_dir>`
    pub fn clone_no_checkout(url: &str, working_dir: &Path) -> Self {
        Self::new(
            Step::Fetch,
            None,
            [
                "clone".to_string(),
                "--no-checkout".to_string(),
                url.to_string(),
                working_dir.display().to_string(),
            ],
        )
    }

    /// `git checkout -b <branch> <tag>` inside the working directory
    pub fn checkout_new_branch(working_dir: &Path, branch: &str, tag: &str) -> Self {
        Self::new(
            Step::CheckoutTag,
            Some(working_dir),
            ["checkout", "-b", branch, tag],
        )
    }

    /// `git rm -r -f --ignore-unmatch <tree>` in the local repository
    pub fn remove_tree(repo_root: &Path, tree: &Path) -> Self {
        Self::new(
            Step::ClearDestination,
            Some(repo_root),
            [
                "rm".to_string(),
                "-r".to_string(),
                "-f".to_string(),
                "--ignore-unmatch".to_string(),
                tree.display().to_string(),
            ],
        )
    }

    /// `git checkout <branch>` inside the working directory
    pub fn checkout(working_dir: &Path, branch: &str) -> Self {
        Self::new(Step::RestoreBranch, Some(working_dir), ["checkout", branch])
    }

    /// `git branch -d <branch>` inside the working directory
    pub fn delete_branch(working_dir: &Path, branch: &str) -> Self {
        Self::new(Step::DeleteBranch, Some(working_dir), ["branch", "-d", branch])
    }

    /// `git add -A <tree>` in the local repository
    pub fn add_tree(repo_root: &Path, tree: &Path) -> Self {
        Self::new(
            Step::Stage,
            Some(repo_root),
            ["add".to_string(), "-A".to_string(), tree.display().to_string()],
        )
    }

    /// Human-readable command line, e.g. `git checkout master`
    pub fn command_line(&self) -> String {
        let mut line = String::from("git");
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Something that can execute a [`GitCommand`]
pub trait CommandRunner {
    fn run(&mut self, command: &GitCommand) -> Result<StepStatus, ImportError>;
}

/// Runs commands with the system `git` binary
pub struct SystemGit {
    program: String,
}

impl SystemGit {
    pub fn new() -> Self {
        Self::with_program("git")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn spawn_error(&self, source: io::Error) -> ImportError {
        ImportError::Spawn {
            program: self.program.clone(),
            source,
        }
    }
}

impl Default for SystemGit {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemGit {
    /// Run `command`, echoing its combined output to `out`
    fn run_to<W: Write>(
        &self,
        command: &GitCommand,
        out: &mut W,
    ) -> Result<StepStatus, ImportError> {
        let dir = command
            .dir
            .as_deref()
            .map(|d| d.display().to_string())
            .unwrap_or_else(|| ".".to_string());

        writeln!(out, "{}", dir).map_err(ImportError::Output)?;
        writeln!(out, "{}", command.command_line()).map_err(ImportError::Output)?;
        out.flush().map_err(ImportError::Output)?;
        debug!("[{}] running '{}' in {}", command.step, command.command_line(), dir);

        let (reader, writer) = io::pipe().map_err(|e| self.spawn_error(e))?;

        // The Command holds a copy of the write end; it has to be dropped
        // before reading, or the read loop never sees EOF.
        let mut child = {
            let mut cmd = Command::new(&self.program);
            cmd.args(&command.args)
                .stdin(Stdio::null())
                .stdout(writer.try_clone().map_err(|e| self.spawn_error(e))?)
                .stderr(writer);
            if let Some(dir) = &command.dir {
                cmd.current_dir(dir);
            }
            cmd.spawn().map_err(|e| self.spawn_error(e))?
        };

        // The reader is dropped on return, so a child still writing gets
        // EPIPE instead of blocking the wait below.
        let echoed = echo_lines(BufReader::new(reader), out);
        let status = child.wait().map_err(|e| self.spawn_error(e))?;
        echoed.map_err(ImportError::Output)?;

        let status = StepStatus {
            code: status.code(),
        };
        debug!("[{}] finished with {}", command.step, status);
        Ok(status)
    }
}

impl CommandRunner for SystemGit {
    fn run(&mut self, command: &GitCommand) -> Result<StepStatus, ImportError> {
        self.run_to(command, &mut io::stdout().lock())
    }
}

/// Copy a line stream to `out`, flushing after each line
///
/// Trailing whitespace is dropped and invalid UTF-8 is replaced, so progress
/// output from git shows up the same way on every platform.
pub fn echo_lines<R: BufRead, W: Write>(mut input: R, out: &mut W) -> io::Result<usize> {
    let mut buf = Vec::new();
    let mut count = 0;
    loop {
        buf.clear();
        if input.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        writeln!(out, "{}", line.trim_end())?;
        out.flush()?;
        count += 1;
    }
    Ok(count)
}

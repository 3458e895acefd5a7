//! Child-process launch helpers shared across the workspace.
//!
//! Two concerns live here:
//! - hiding the console window of spawned children on Windows (`NoWindowExt`)
//! - choosing *how* an external binary is launched (`LaunchStrategy`): either
//!   executed directly, or routed through the platform command interpreter.
//!
//! A strategy never changes the argument list handed to the target program;
//! it only decides which executable the OS is asked to start.

use std::ffi::{OsStr, OsString};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Apply the Windows `CREATE_NO_WINDOW` flag to child processes.
///
/// On non-Windows targets this is a no-op.
pub trait NoWindowExt {
    fn no_window(&mut self);
}

impl NoWindowExt for std::process::Command {
    fn no_window(&mut self) {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.creation_flags(CREATE_NO_WINDOW);
        }
    }
}

#[cfg(feature = "tokio")]
impl NoWindowExt for tokio::process::Command {
    fn no_window(&mut self) {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.as_std_mut().creation_flags(CREATE_NO_WINDOW);
        }
    }
}

/// How an external program is started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchStrategy {
    /// Execute the program binary directly.
    Direct,
    /// Run the program through a command interpreter, e.g. `cmd.exe /c program args...`.
    ShellWrapped {
        /// Interpreter executable.
        interpreter: OsString,
        /// Switch telling the interpreter to run the remaining arguments as a command.
        switch: OsString,
    },
}

impl LaunchStrategy {
    /// Select the strategy for the current platform.
    ///
    /// Always `Direct`: the OS (and, on Windows, `PATH`/`PATHEXT` lookup in
    /// `Command`) starts the binary without an interpreter, so arguments reach
    /// the program byte for byte. Wrapping is opt-in through [`Self::comspec`]
    /// or [`Self::shell`].
    pub fn detect() -> Self {
        Self::Direct
    }

    /// `%ComSpec% /c` (falling back to `cmd.exe`), for hosts where the binary
    /// can only be reached through the command interpreter.
    ///
    /// The interpreter parses the command line a second time: arguments that
    /// contain `&`, `|`, `<`, `>`, `^` or `%` are interpreted by it.
    pub fn comspec() -> Self {
        let interpreter = std::env::var_os("ComSpec").unwrap_or_else(|| OsString::from("cmd.exe"));
        Self::shell(interpreter, "/c")
    }

    /// Shell-wrapped strategy with an explicit interpreter.
    pub fn shell(interpreter: impl Into<OsString>, switch: impl Into<OsString>) -> Self {
        Self::ShellWrapped {
            interpreter: interpreter.into(),
            switch: switch.into(),
        }
    }

    /// Resolve the `(executable, argv)` pair the OS will actually be asked to start.
    pub fn command_line<I, S>(&self, program: impl AsRef<OsStr>, args: I) -> (OsString, Vec<OsString>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args = args.into_iter().map(|a| a.as_ref().to_os_string());
        match self {
            Self::Direct => (program.as_ref().to_os_string(), args.collect()),
            Self::ShellWrapped {
                interpreter,
                switch,
            } => {
                let mut argv = Vec::new();
                argv.push(switch.clone());
                argv.push(program.as_ref().to_os_string());
                argv.extend(args);
                (interpreter.clone(), argv)
            }
        }
    }

    /// Build a `std::process::Command` for `program args...` using this strategy.
    pub fn std_command<I, S>(&self, program: impl AsRef<OsStr>, args: I) -> std::process::Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let (executable, argv) = self.command_line(program, args);
        let mut cmd = std::process::Command::new(executable);
        cmd.args(argv);
        cmd.no_window();
        cmd
    }

    /// Build a `tokio::process::Command` for `program args...` using this strategy.
    #[cfg(feature = "tokio")]
    pub fn tokio_command<I, S>(
        &self,
        program: impl AsRef<OsStr>,
        args: I,
    ) -> tokio::process::Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let (executable, argv) = self.command_line(program, args);
        let mut cmd = tokio::process::Command::new(executable);
        cmd.args(argv);
        cmd.no_window();
        cmd
    }
}

impl Default for LaunchStrategy {
    fn default() -> Self {
        Self::detect()
    }
}

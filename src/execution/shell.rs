use crate::errors::{AppError, AppResult};
use std::io::Write;
use std::process::{Command, Stdio};

fn shell_command(command: &str) -> Command {
    if cfg!(target_os = "windows") {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    }
}

fn failed(command: &str, status: impl ToString) -> AppError {
    AppError::CommandFailed {
        command: command.to_string(),
        status: status.to_string(),
    }
}

/// Run a user configured command line through the platform shell.
/// Blocks until it exits; there is no timeout.
pub fn run_shell(command: &str) -> AppResult<()> {
    let status = shell_command(command)
        .status()
        .map_err(|e| failed(command, e))?;

    if status.success() {
        Ok(())
    } else {
        Err(failed(command, status))
    }
}

/// Run a helper program and return its trimmed stdout.
pub fn run_capture(program: &str, args: &[&str]) -> AppResult<String> {
    let label = display(program, args);
    let output = Command::new(program)
        .args(args)
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| failed(&label, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let status = if stderr.trim().is_empty() {
            output.status.to_string()
        } else {
            format!("{} ({})", output.status, stderr.trim())
        };
        return Err(failed(&label, status));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Run a helper program, feeding `input` on stdin.
pub fn run_with_input(program: &str, args: &[&str], input: &str) -> AppResult<()> {
    let label = display(program, args);
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .spawn()
        .map_err(|e| failed(&label, e))?;

    if let Some(mut stdin) = child.stdin.take()
        && let Err(e) = stdin.write_all(input.as_bytes())
    {
        // reap the child before bailing out
        let _ = child.kill();
        let _ = child.wait();
        return Err(failed(&label, format!("writing stdin: {e}")));
    }

    let status = child.wait().map_err(|e| failed(&label, e))?;
    if status.success() {
        Ok(())
    } else {
        Err(failed(&label, status))
    }
}

/// Whether `program` can be spawned at all.
pub fn is_available(program: &str, version_arg: &str) -> bool {
    Command::new(program)
        .arg(version_arg)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

fn display(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

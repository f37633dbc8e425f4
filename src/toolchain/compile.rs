//! Compiler invocation.

use std::fs;
use std::path::Path;
use std::process::Command;

use crate::core::error::ToolchainError;

/// Flags every shared-object build gets, before the backend's own flags.
pub const BASE_FLAGS: &[&str] = &["-fPIC", "-shared"];

/// Write `lines` to `path`, one per line.
pub fn write_assembly(path: &Path, lines: &[String]) -> Result<(), ToolchainError> {
    let mut text = lines.join("\n");
    text.push('\n');
    fs::write(path, text).map_err(|source| ToolchainError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("wrote {} ({} lines)", path.display(), lines.len());
    Ok(())
}

/// `<compiler> -fPIC -shared <flags> <asm> -o <object>`.
pub fn compile_command(compiler: &Path, flags: &[&str], asm: &Path, object: &Path) -> Command {
    let mut cmd = Command::new(compiler);
    cmd.args(BASE_FLAGS).args(flags).arg(asm).arg("-o").arg(object);
    cmd
}

fn render(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|part| part.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build a shared object from `asm`.
///
/// Diagnostics printed by a successful compiler are logged as warnings; a
/// non-zero exit returns the exact command line and its combined output.
pub fn compile(
    compiler: &Path,
    flags: &[&str],
    asm: &Path,
    object: &Path,
) -> Result<(), ToolchainError> {
    let mut cmd = compile_command(compiler, flags, asm, object);
    let command = render(&cmd);
    log::debug!("running `{}`", command);

    let output = cmd.output().map_err(|source| ToolchainError::Spawn {
        command: command.clone(),
        source,
    })?;
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        return Err(ToolchainError::CompilerFailed {
            command,
            status: output.status.to_string(),
            output: combined,
        });
    }
    if !combined.trim().is_empty() {
        log::warn!("`{}` reported:\n{}", command, combined.trim_end());
    }
    log::info!("compiled {}", object.display());
    Ok(())
}

// SPDX-License-Identifier: GPL-2.0-only

//! Colored console output helpers.

use std::io::Write;

use is_terminal::IsTerminal;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Determine whether colored output should be used for stdout, honoring
/// `--color`/`--no-color` if present on `matches` and otherwise falling back to
/// whether stdout is a terminal.
pub(crate) fn use_color(matches: &clap::ArgMatches) -> bool {
    if matches.get_flag("no-color") {
        false
    } else if matches.get_flag("color") {
        true
    } else {
        std::io::stdout().is_terminal()
    }
}

/// Get a [`StandardStream`] for stdout with the given color choice.
pub(crate) fn get_color_stdout(use_color: bool) -> StandardStream {
    let choice = if use_color {
        ColorChoice::Always
    } else {
        ColorChoice::Never
    };
    StandardStream::stdout(choice)
}

/// Print the `Applying: <subject>` progress line, bolding `Applying:` the way
/// `git am` itself does.
pub(crate) fn print_applying(stdout: &mut StandardStream, subject: &str) -> anyhow::Result<()> {
    stdout.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true))?;
    write!(stdout, "Applying:")?;
    stdout.reset()?;
    writeln!(stdout, " {subject}")?;
    Ok(())
}

pub(crate) fn color_args() -> Vec<clap::Arg> {
    vec![
        clap::Arg::new("color")
            .long("color")
            .help("Force colored output")
            .action(clap::ArgAction::SetTrue)
            .conflicts_with("no-color"),
        clap::Arg::new("no-color")
            .long("no-color")
            .help("Disable colored output")
            .action(clap::ArgAction::SetTrue),
    ]
}

// SPDX-License-Identifier: GPL-2.0-only

//! `ambox`: resumable application of mailbox-formatted patch queues onto a
//! git branch. See spec.md for the full design; this binary is the thinnest
//! possible wrapper around [`cli::dispatch`].

mod am;
mod argset;
mod cli;
mod color;
mod commit;
mod error;
mod ext;
mod format;
mod mailinfo;
mod mailsplit;
mod session;
mod stupid;
mod wrap;

fn main() {
    let matches = cli::build().get_matches();
    if let Err(err) = cli::dispatch(&matches) {
        eprintln!("error: {err:#}");
        std::process::exit(error::exit_code_for(&err));
    }
}

use anyhow::{Result, bail};
use std::io::{self, IsTerminal};
use zeroize::Zeroizing;

/// Reads a secret for a CLI command.
///
/// Tried in order: the environment variable `var`, piped stdin, then an
/// interactive prompt.
pub fn read_secret(var: &str, prompt: &str) -> Result<Zeroizing<String>> {
    //  Environment Variable
    //  CRYPTE_SECRET="supersecret" crypte encrypt
    if let Ok(secret) = std::env::var(var) {
        if !secret.is_empty() {
            return Ok(Zeroizing::new(secret));
        }
    }

    //  stdin (Pipeline)
    //  echo "supersecret" | crypte encrypt
    if !io::stdin().is_terminal() {
        let mut buf = Zeroizing::new(String::new());
        io::stdin().read_line(&mut buf)?;
        trim_newline(&mut buf);

        if !buf.is_empty() {
            return Ok(buf);
        }
    }

    //  Interactive (TTY)
    if io::stdin().is_terminal() {
        let secret = Zeroizing::new(rpassword::prompt_password(prompt)?);
        if !secret.is_empty() {
            return Ok(secret);
        }
    }

    bail!("no secret provided (set {var}, pipe it on stdin or type it at the prompt)")
}

fn trim_newline(s: &mut String) {
    while s.ends_with('\n') || s.ends_with('\r') {
        s.pop();
    }
}

//! Terminal-backed signer.

use async_trait::async_trait;
use hashvault_ledger::{Authorization, Signer, SignerError};
use hashvault_types::OwnerId;
use std::io::{self, BufRead, IsTerminal, Write};

/// Asks on the terminal which account signs and whether to approve.
///
/// Prompts go to stderr so stdout stays machine readable.
#[derive(Debug, Default, Clone, Copy)]
pub struct PromptSigner;

impl PromptSigner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Signer for PromptSigner {
    fn is_available(&self) -> bool {
        io::stdin().is_terminal()
    }

    async fn request_authorization(
        &self,
        preferred: Option<&OwnerId>,
    ) -> Result<Authorization, SignerError> {
        let preferred = preferred.copied();
        tokio::task::spawn_blocking(move || {
            let stdin = io::stdin();
            prompt(preferred, &mut stdin.lock(), &mut io::stderr())
        })
        .await
        .map_err(|err| SignerError::Unavailable(format!("prompt task failed: {err}")))?
    }
}

fn prompt(
    preferred: Option<OwnerId>,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> Result<Authorization, SignerError> {
    let identity = match preferred {
        Some(identity) => identity,
        None => {
            let answer = ask(input, output, "Account address to sign with: ")?;
            if answer.is_empty() {
                return Err(SignerError::Declined);
            }
            OwnerId::parse(&answer)
                .map_err(|err| SignerError::Unavailable(format!("invalid account: {err}")))?
        }
    };

    let question = format!(
        "Register provenance as {}? [y/N] ",
        identity.to_checksum()
    );
    let answer = ask(input, output, &question)?;
    if answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes") {
        Ok(Authorization::new(identity))
    } else {
        Err(SignerError::Declined)
    }
}

fn ask(
    input: &mut impl BufRead,
    output: &mut impl Write,
    question: &str,
) -> Result<String, SignerError> {
    let io_error = |err: io::Error| SignerError::Unavailable(format!("terminal error: {err}"));

    output.write_all(question.as_bytes()).map_err(io_error)?;
    output.flush().map_err(io_error)?;

    let mut line = String::new();
    if input.read_line(&mut line).map_err(io_error)? == 0 {
        return Err(SignerError::Unavailable("terminal closed".to_string()));
    }
    Ok(line.trim().to_string())
}

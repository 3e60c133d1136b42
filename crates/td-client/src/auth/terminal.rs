//! Terminal prompts for the interactive strategy.

use super::interactive::AuthorizerHandle;
use crate::error::AuthError;
use std::io;
use td_types::AuthorizationState;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};

/// Answer the handshake from a line-oriented reader.
///
/// Reads observed states from `handle` and prompts on `writer` for the phone
/// number, code, names (unregistered accounts only) and password. Returns
/// once the state is `Ready` or the handshake has ended. Parameters are not
/// prompted for; supply them through the handle beforehand.
pub async fn prompt_loop<R, W>(handle: &mut AuthorizerHandle, reader: R, mut writer: W) -> Result<(), AuthError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    while let Some(state) = handle.next_state().await {
        match state {
            AuthorizationState::WaitPhoneNumber => {
                let phone_number = ask(&mut lines, &mut writer, "Enter phone number: ").await?;
                handle.supply_phone_number(phone_number).await?;
            }
            AuthorizationState::WaitCode { is_registered } => {
                let code = ask(&mut lines, &mut writer, "Enter code: ").await?;
                if !is_registered {
                    writer.write_all(b"Phone number is not registered.\n").await?;
                    let first_name = ask(&mut lines, &mut writer, "Enter first name: ").await?;
                    let last_name = ask(&mut lines, &mut writer, "Enter last name: ").await?;
                    handle.supply_names(first_name, last_name).await?;
                }
                handle.supply_code(code).await?;
            }
            AuthorizationState::WaitPassword { password_hint, .. } => {
                let prompt = if password_hint.is_empty() {
                    "Enter password: ".to_owned()
                } else {
                    format!("Enter password (hint: {password_hint}): ")
                };
                let password = ask(&mut lines, &mut writer, &prompt).await?;
                handle.supply_password(password).await?;
            }
            AuthorizationState::Ready => return Ok(()),
            _ => {}
        }
    }
    Ok(())
}

/// [`prompt_loop`] on standard input and output.
pub async fn prompt_stdio(handle: &mut AuthorizerHandle) -> Result<(), AuthError> {
    prompt_loop(handle, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}

async fn ask<R, W>(lines: &mut Lines<R>, writer: &mut W, prompt: &str) -> Result<String, AuthError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    writer.write_all(prompt.as_bytes()).await?;
    writer.flush().await?;

    match lines.next_line().await? {
        Some(line) => Ok(line.trim().to_owned()),
        None => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed").into()),
    }
}

//! The credential-bearing ClickHouse client command line.

use std::fmt;

use zeroize::Zeroizing;

use super::quote::{quote, squotef};
use crate::config::ConnectionConfig;
use crate::error::Result;
use crate::secrets::Secret;

/// Client invocation, one `%s` slot per connection parameter.
pub const CLICKHOUSE_CLIENT_TEMPLATE: &str =
    "clickhouse client --host %s --port %s --user %s --password %s --secure --format CSV";

/// Placeholder substituted for the credential in redacted text.
pub const REDACTED: &str = "[REDACTED]";

const PASSWORD_FLAG: &str = "--password";

/// A fully quoted shell script, ready for `sh -c`.
///
/// WARNING: the script embeds the plaintext password. It is never printed by
/// `Debug`, and its memory is zeroed on drop.
pub struct ShellCommand {
    script: Zeroizing<String>,
    /// `--password <quoted>` as it appears in the script.
    slot: Option<Zeroizing<String>>,
    /// Quoted credential, when quoting changed it.
    quoted: Option<Zeroizing<String>>,
    /// Plaintext credential, replaced only as a whole word.
    plain: Option<Zeroizing<String>>,
}

impl ShellCommand {
    /// Builds the `clickhouse client` command line for `config`.
    ///
    /// The port is rendered as plain base-10 before quoting.
    pub fn clickhouse_client(config: &ConnectionConfig, password: &Secret) -> Result<Self> {
        let port = config.port.to_string();
        let script = squotef(
            CLICKHOUSE_CLIENT_TEMPLATE,
            &[&config.host, &port, &config.user, password.expose()],
        )?;
        Self::with_credential(script, password)
    }

    /// Wraps an already quoted script that embeds `password`.
    pub(crate) fn with_credential(script: String, password: &Secret) -> Result<Self> {
        let mut command = Self {
            script: Zeroizing::new(script),
            slot: None,
            quoted: None,
            plain: None,
        };
        if password.expose().is_empty() {
            return Ok(command);
        }

        let quoted = Zeroizing::new(quote(password.expose())?);
        command.slot = Some(Zeroizing::new(format!("{PASSWORD_FLAG} {}", quoted.as_str())));
        if quoted.as_str() != password.expose() {
            command.quoted = Some(quoted);
        }
        command.plain = Some(Zeroizing::new(password.expose().to_string()));
        Ok(command)
    }

    /// Returns the script text. Handle with the same care as the password.
    pub fn expose(&self) -> &str {
        &self.script
    }

    /// Replaces the credential in `text` with `[REDACTED]`.
    ///
    /// The `--password` argument and the quoted form are replaced wherever
    /// they occur. The plaintext is only replaced where it stands as a whole
    /// word, so a short password does not mangle unrelated text.
    pub fn redact(&self, text: &str) -> String {
        let mut redacted = text.to_string();
        if let Some(slot) = &self.slot {
            redacted = redacted.replace(slot.as_str(), &format!("{PASSWORD_FLAG} {REDACTED}"));
        }
        if let Some(quoted) = &self.quoted {
            redacted = redacted.replace(quoted.as_str(), REDACTED);
        }
        match &self.plain {
            Some(plain) => replace_whole_words(&redacted, plain),
            None => redacted,
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Replaces occurrences of `needle` not glued to a word character on either side.
fn replace_whole_words(text: &str, needle: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (start, _) in text.match_indices(needle) {
        let end = start + needle.len();
        let glued_before = text[..start].chars().next_back().is_some_and(is_word_char);
        let glued_after = text[end..].chars().next().is_some_and(is_word_char);
        if glued_before || glued_after {
            continue;
        }
        out.push_str(&text[last..start]);
        out.push_str(REDACTED);
        last = end;
    }
    out.push_str(&text[last..]);
    out
}

impl fmt::Debug for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShellCommand")
            .field("script", &REDACTED)
            .finish()
    }
}

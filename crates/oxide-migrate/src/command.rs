//! Executable command batches and the builder that produces them.

use serde::Serialize;

const INDENT: &str = "    ";

/// One independently executable SQL batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationCommand {
    sql: String,
    suppress_transaction: bool,
}

impl MigrationCommand {
    #[must_use]
    pub fn new(sql: impl Into<String>, suppress_transaction: bool) -> Self {
        Self {
            sql: sql.into(),
            suppress_transaction,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// True when the command must run outside the ambient transaction.
    pub const fn suppress_transaction(&self) -> bool {
        self.suppress_transaction
    }
}

/// Accumulates SQL text with indentation and cuts it into commands.
///
/// Text is appended to the current command until [`end_command`] is called.
/// Once [`suppress_following_transactions`] has been called, every command
/// ended afterwards is marked as transaction-suppressed.
///
/// [`end_command`]: Self::end_command
/// [`suppress_following_transactions`]: Self::suppress_following_transactions
#[derive(Debug, Clone)]
pub struct MigrationCommandListBuilder {
    commands: Vec<MigrationCommand>,
    text: String,
    indent: usize,
    at_line_start: bool,
    suppress_all: bool,
}

impl Default for MigrationCommandListBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationCommandListBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            commands: Vec::new(),
            text: String::new(),
            indent: 0,
            at_line_start: true,
            suppress_all: false,
        }
    }

    /// Appends text, indenting every line that starts inside it.
    pub fn append(&mut self, value: impl AsRef<str>) -> &mut Self {
        for (i, line) in value.as_ref().split('\n').enumerate() {
            if i > 0 {
                self.text.push('\n');
                self.at_line_start = true;
            }
            if line.is_empty() {
                continue;
            }
            if self.at_line_start {
                for _ in 0..self.indent {
                    self.text.push_str(INDENT);
                }
                self.at_line_start = false;
            }
            self.text.push_str(line);
        }
        self
    }

    pub fn append_line(&mut self, value: impl AsRef<str>) -> &mut Self {
        self.append(value);
        self.text.push('\n');
        self.at_line_start = true;
        self
    }

    pub fn increment_indent(&mut self) -> &mut Self {
        self.indent += 1;
        self
    }

    pub fn decrement_indent(&mut self) -> &mut Self {
        self.indent = self.indent.saturating_sub(1);
        self
    }

    /// Runs `f` one indentation level deeper.
    pub fn indented<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.increment_indent();
        let result = f(self);
        self.decrement_indent();
        result
    }

    /// Ends the current command. Whitespace-only text produces no command.
    pub fn end_command(&mut self, suppress_transaction: bool) -> &mut Self {
        if !self.text.trim().is_empty() {
            let sql = std::mem::take(&mut self.text);
            self.commands.push(MigrationCommand {
                sql,
                suppress_transaction: suppress_transaction || self.suppress_all,
            });
        }
        self.text.clear();
        self.at_line_start = true;
        self
    }

    /// Marks every command ended from now on as transaction-suppressed.
    pub fn suppress_following_transactions(&mut self) -> &mut Self {
        self.suppress_all = true;
        self
    }

    /// Text appended since the last ended command.
    pub fn pending(&self) -> &str {
        &self.text
    }

    pub fn commands(&self) -> &[MigrationCommand] {
        &self.commands
    }

    /// An empty builder that continues this one's indentation and
    /// suppression state, to be merged back with [`merge`](Self::merge).
    #[must_use]
    pub fn scratch(&self) -> Self {
        Self {
            commands: Vec::new(),
            text: String::new(),
            indent: self.indent,
            at_line_start: self.at_line_start,
            suppress_all: self.suppress_all,
        }
    }

    /// Appends everything `other` produced.
    pub fn merge(&mut self, other: Self) {
        self.commands.extend(other.commands);
        if !other.text.is_empty() {
            self.text.push_str(&other.text);
            self.at_line_start = other.at_line_start;
        }
        self.indent = other.indent;
        self.suppress_all |= other.suppress_all;
    }

    /// Ends any pending text and returns the commands.
    #[must_use]
    pub fn build(mut self) -> Vec<MigrationCommand> {
        self.end_command(false);
        self.commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indentation_applies_per_line() {
        let mut builder = MigrationCommandListBuilder::new();
        builder.append_line("CREATE TABLE t (");
        builder.indented(|b| {
            b.append_line("a int,\nb int");
        });
        builder.append(");");
        let commands = builder.build();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].sql(), "CREATE TABLE t (\n    a int,\n    b int\n);");
    }

    #[test]
    fn test_blank_commands_are_skipped() {
        let mut builder = MigrationCommandListBuilder::new();
        builder.append_line("  ").end_command(true);
        builder.append_line("SELECT 1;").end_command(false);
        let commands = builder.build();
        assert_eq!(commands.len(), 1);
        assert!(!commands[0].suppress_transaction());
    }

    #[test]
    fn test_suppression_sticks_for_following_commands() {
        let mut builder = MigrationCommandListBuilder::new();
        builder.append_line("A;").end_command(false);
        let mut scratch = builder.scratch();
        scratch
            .append_line("B;")
            .end_command(true)
            .suppress_following_transactions();
        builder.merge(scratch);
        builder.append_line("C;").end_command(false);

        let flags: Vec<_> = builder
            .build()
            .iter()
            .map(MigrationCommand::suppress_transaction)
            .collect();
        assert_eq!(flags, [false, true, true]);
    }
}

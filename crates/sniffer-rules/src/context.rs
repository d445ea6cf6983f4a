//! Per-pass view handed to sniffs

use sniffer_core::{Fixer, TokenStore};

use crate::logging::{self, RunEvent};
use crate::sink::{DiagnosticSink, Severity};
use crate::sniff::{FileIdentity, SniffError};

/// Everything a sniff may touch while processing one token: the token store
/// (read-only), the diagnostic sink and, in fix mode, the fixer
pub struct SniffContext<'a> {
    store: &'a TokenStore,
    file: &'a FileIdentity,
    sink: &'a mut DiagnosticSink,
    fixer: Option<&'a mut Fixer>,
    sniff: &'static str,
}

impl<'a> SniffContext<'a> {
    pub fn new(
        store: &'a TokenStore,
        file: &'a FileIdentity,
        sink: &'a mut DiagnosticSink,
        fixer: Option<&'a mut Fixer>,
    ) -> Self {
        Self {
            store,
            file,
            sink,
            fixer,
            sniff: "",
        }
    }

    /// Name the sniff that the following reports and edits belong to
    pub(crate) fn enter(&mut self, sniff: &'static str) {
        self.sniff = sniff;
    }

    pub fn store(&self) -> &'a TokenStore {
        self.store
    }

    pub fn file(&self) -> &'a FileIdentity {
        self.file
    }

    /// Whether proposed edits will be applied
    pub fn is_fixing(&self) -> bool {
        self.fixer.is_some()
    }

    pub fn add_error(&mut self, position: usize, code: &str, message: &str, args: &[&str]) -> bool {
        self.report(position, code, None, Severity::Error, message, args, false)
    }

    pub fn add_warning(&mut self, position: usize, code: &str, message: &str, args: &[&str]) -> bool {
        self.report(position, code, None, Severity::Warning, message, args, false)
    }

    /// Report a fixable error. Returns true when the error was recorded and
    /// the caller should propose its fix.
    pub fn add_fixable_error(
        &mut self,
        position: usize,
        code: &str,
        message: &str,
        args: &[&str],
    ) -> bool {
        self.report(position, code, None, Severity::Error, message, args, true) && self.is_fixing()
    }

    pub fn add_fixable_warning(
        &mut self,
        position: usize,
        code: &str,
        message: &str,
        args: &[&str],
    ) -> bool {
        self.report(position, code, None, Severity::Warning, message, args, true)
            && self.is_fixing()
    }

    /// Report an error whose dedup key is widened by `discriminator`
    pub fn add_error_keyed(
        &mut self,
        position: usize,
        code: &str,
        discriminator: usize,
        message: &str,
        args: &[&str],
    ) -> bool {
        self.report(
            position,
            code,
            Some(discriminator),
            Severity::Error,
            message,
            args,
            false,
        )
    }

    /// Fixable variant of [`add_error_keyed`](Self::add_error_keyed)
    pub fn add_fixable_error_keyed(
        &mut self,
        position: usize,
        code: &str,
        discriminator: usize,
        message: &str,
        args: &[&str],
    ) -> bool {
        self.report(
            position,
            code,
            Some(discriminator),
            Severity::Error,
            message,
            args,
            true,
        ) && self.is_fixing()
    }

    #[allow(clippy::too_many_arguments)]
    fn report(
        &mut self,
        position: usize,
        code: &str,
        discriminator: Option<usize>,
        severity: Severity,
        message: &str,
        args: &[&str],
        fixable: bool,
    ) -> bool {
        let code = format!("{}.{}", self.sniff, code);
        match discriminator {
            Some(key) => self.sink.report_keyed(
                self.store, position, &code, key, severity, message, args, fixable,
            ),
            None => self
                .sink
                .report(self.store, position, &code, severity, message, args, fixable),
        }
    }

    pub fn replace_token(&mut self, position: usize, content: impl Into<String>) -> bool {
        let Some(fixer) = self.fixer.as_deref_mut() else {
            return false;
        };
        let conflicts = fixer.conflicts();
        let accepted = fixer.replace_token(position, content);
        if fixer.conflicts() > conflicts {
            logging::record(RunEvent::EditConflict {
                path: self.file.path(),
                sniff: self.sniff,
                position,
            });
        }
        accepted
    }

    pub fn add_content_before(&mut self, position: usize, content: impl Into<String>) -> bool {
        self.fixer
            .as_deref_mut()
            .is_some_and(|f| f.add_content_before(position, content))
    }

    pub fn add_content(&mut self, position: usize, content: impl Into<String>) -> bool {
        self.fixer
            .as_deref_mut()
            .is_some_and(|f| f.add_content(position, content))
    }

    pub fn begin_changeset(&mut self) -> Result<(), SniffError> {
        match self.fixer.as_deref_mut() {
            Some(fixer) => Ok(fixer.begin_changeset()?),
            None => Ok(()),
        }
    }

    /// Commit the open changeset; false when any of its edits was rejected
    pub fn end_changeset(&mut self) -> Result<bool, SniffError> {
        match self.fixer.as_deref_mut() {
            Some(fixer) => Ok(fixer.end_changeset()?),
            None => Ok(false),
        }
    }

    pub fn rollback_changeset(&mut self) {
        if let Some(fixer) = self.fixer.as_deref_mut() {
            fixer.rollback_changeset();
        }
    }

    /// Drop a changeset a sniff left open
    pub(crate) fn close_dangling_changeset(&mut self) -> bool {
        match self.fixer.as_deref_mut() {
            Some(fixer) if fixer.in_changeset() => {
                fixer.rollback_changeset();
                true
            }
            _ => false,
        }
    }
}

//! Position-keyed edit accumulator
//!
//! Sniffs propose edits against token positions of the current pass. Nothing
//! is applied until [`Fixer::materialize`] rebuilds the whole text once, so
//! positions stay valid for every sniff in the pass.

use std::collections::HashSet;

use crate::edit::{apply_edits, Edit, EditError};
use crate::tokens::TokenStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixOperation {
    InsertBefore,
    InsertAfter,
    Replace,
}

impl FixOperation {
    /// Order of operations landing on the same byte offset: text added after
    /// the previous token, then text added before this token, then the
    /// token's replacement.
    fn rank(self) -> u8 {
        match self {
            FixOperation::InsertAfter => 0,
            FixOperation::InsertBefore => 1,
            FixOperation::Replace => 2,
        }
    }
}

/// A proposed change against one token of the current pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixEdit {
    pub position: usize,
    pub operation: FixOperation,
    pub content: String,
}

#[derive(Debug, Default)]
struct Changeset {
    edits: Vec<FixEdit>,
    rejected: bool,
}

/// Edit accumulator for one fix pass
#[derive(Debug, Default)]
pub struct Fixer {
    token_count: usize,
    edits: Vec<FixEdit>,
    replaced: HashSet<usize>,
    changeset: Option<Changeset>,
    conflicts: usize,
}

impl Fixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all edits and bind the fixer to the tokens of a new pass
    pub fn start_pass(&mut self, store: &TokenStore) {
        self.token_count = store.len();
        self.edits.clear();
        self.replaced.clear();
        self.changeset = None;
        self.conflicts = 0;
    }

    /// Replace the content of the token at `position`. Only the first
    /// replacement of a token in a pass is kept.
    pub fn replace_token(&mut self, position: usize, content: impl Into<String>) -> bool {
        self.propose(FixEdit {
            position,
            operation: FixOperation::Replace,
            content: content.into(),
        })
    }

    /// Insert `content` in front of the token at `position`
    pub fn add_content_before(&mut self, position: usize, content: impl Into<String>) -> bool {
        self.propose(FixEdit {
            position,
            operation: FixOperation::InsertBefore,
            content: content.into(),
        })
    }

    /// Insert `content` after the token at `position`
    pub fn add_content(&mut self, position: usize, content: impl Into<String>) -> bool {
        self.propose(FixEdit {
            position,
            operation: FixOperation::InsertAfter,
            content: content.into(),
        })
    }

    /// Group the following edits so they are committed or dropped together
    pub fn begin_changeset(&mut self) -> Result<(), EditError> {
        if self.changeset.is_some() {
            return Err(EditError::ChangesetAlreadyOpen);
        }
        self.changeset = Some(Changeset::default());
        Ok(())
    }

    /// Commit the open changeset. Returns false when one of its edits was
    /// rejected, in which case none of them is kept.
    pub fn end_changeset(&mut self) -> Result<bool, EditError> {
        let changeset = self.changeset.take().ok_or(EditError::NoOpenChangeset)?;
        if changeset.rejected {
            return Ok(false);
        }
        for edit in changeset.edits {
            self.commit(edit);
        }
        Ok(true)
    }

    /// Drop the open changeset, if any
    pub fn rollback_changeset(&mut self) {
        self.changeset = None;
    }

    pub fn in_changeset(&self) -> bool {
        self.changeset.is_some()
    }

    pub fn edits(&self) -> &[FixEdit] {
        &self.edits
    }

    pub fn edit_count(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Replacements rejected because the token was already replaced
    pub fn conflicts(&self) -> usize {
        self.conflicts
    }

    /// Rebuild the text of `store` with every committed edit applied
    pub fn materialize(&self, store: &TokenStore) -> Result<String, EditError> {
        let source = store.source();
        let mut ordered: Vec<(usize, u8, usize, &FixEdit)> = Vec::with_capacity(self.edits.len());

        for (sequence, edit) in self.edits.iter().enumerate() {
            let Some(token) = store.get(edit.position) else {
                let len = source.len();
                return Err(EditError::SpanOutOfBounds {
                    start: len,
                    end: len,
                    len,
                });
            };
            let offset = match edit.operation {
                FixOperation::InsertAfter => token.end_offset(),
                _ => token.offset,
            };
            ordered.push((offset, edit.operation.rank(), sequence, edit));
        }
        ordered.sort_by_key(|&(offset, rank, sequence, _)| (offset, rank, sequence));

        let edits: Vec<Edit> = ordered
            .into_iter()
            .map(|(offset, _, _, edit)| match edit.operation {
                FixOperation::Replace => {
                    let end = store.get(edit.position).map_or(offset, |t| t.end_offset());
                    Edit::from_offsets(offset, end, edit.content.as_str(), "replace")
                }
                FixOperation::InsertBefore => Edit::insert(offset, edit.content.as_str(), "insert before"),
                FixOperation::InsertAfter => Edit::insert(offset, edit.content.as_str(), "insert after"),
            })
            .collect();

        apply_edits(&source, &edits)
    }

    fn propose(&mut self, edit: FixEdit) -> bool {
        if edit.position >= self.token_count {
            self.reject();
            return false;
        }

        if edit.operation == FixOperation::Replace {
            let pending = self.changeset.as_ref().is_some_and(|c| {
                c.edits
                    .iter()
                    .any(|e| e.operation == FixOperation::Replace && e.position == edit.position)
            });
            if pending || self.replaced.contains(&edit.position) {
                self.conflicts += 1;
                self.reject();
                return false;
            }
        }

        match self.changeset.as_mut() {
            Some(changeset) if changeset.rejected => false,
            Some(changeset) => {
                changeset.edits.push(edit);
                true
            }
            None => {
                self.commit(edit);
                true
            }
        }
    }

    fn reject(&mut self) {
        if let Some(changeset) = self.changeset.as_mut() {
            changeset.rejected = true;
        }
    }

    fn commit(&mut self, edit: FixEdit) {
        if edit.operation == FixOperation::Replace {
            self.replaced.insert(edit.position);
        }
        self.edits.push(edit);
    }
}

//! Sniff: Function parameters must declare a native type
//!
//! When the function's `@param` tag for the parameter maps to a native type,
//! the type is inserted. A `= null` default makes the inserted type nullable.
//!
//! Example:
//! ```php
//! // Before
//! /**
//!  * @param string $name
//!  * @param int $limit
//!  */
//! function find($name, $limit = null) {}
//!
//! // After
//! /**
//!  * @param string $name
//!  * @param int $limit
//!  */
//! function find(string $name, ?int $limit = null) {}
//! ```

use sniffer_core::{Argument, TokenKind, TokenStore};

use super::{declaration_start, defaults_to_null, nullable_for_default};
use crate::context::SniffContext;
use crate::docblock::{native_type, DocBlock, TypeSlot};
use crate::sniff::{Sniff, SniffError};

#[derive(Debug, Clone, Default)]
pub struct ParameterTypeSniff;

/// Layout of one parameter
struct Parameter {
    variable: usize,
    /// First token after attributes and promotion modifiers
    insert_at: usize,
    typed: bool,
}

fn parameter(store: &TokenStore, arg: &Argument) -> Option<Parameter> {
    let variable = store.find_next(&[TokenKind::Variable], arg.start, Some(arg.end + 1), false)?;

    let mut insert_at = None;
    let mut typed = false;
    let mut i = arg.start;
    while i < variable {
        let token = store.get(i)?;
        match token.kind {
            TokenKind::Attribute => {
                i = token.matching_closer?;
            }
            kind if kind.is_empty() || kind.is_modifier() => {}
            TokenKind::BitwiseAnd | TokenKind::Ellipsis => {
                insert_at.get_or_insert(i);
            }
            _ => {
                insert_at.get_or_insert(i);
                typed = true;
            }
        }
        i += 1;
    }

    Some(Parameter {
        variable,
        insert_at: insert_at.unwrap_or(variable),
        typed,
    })
}

impl Sniff for ParameterTypeSniff {
    fn code(&self) -> &'static str {
        "Types.ParameterType"
    }

    fn description(&self) -> &'static str {
        "Function parameters must declare a native type"
    }

    fn register(&self) -> &'static [TokenKind] {
        &[TokenKind::Function, TokenKind::Closure, TokenKind::Fn]
    }

    fn process(&mut self, ctx: &mut SniffContext<'_>, position: usize) -> Result<(), SniffError> {
        let store = ctx.store();
        let Some(opener) = store.get(position).and_then(|t| t.parenthesis_opener) else {
            return Ok(());
        };
        let doc = DocBlock::for_declaration(store, declaration_start(store, position));

        for arg in store.call_arguments(opener) {
            let Some(param) = parameter(store, &arg) else {
                continue;
            };
            if param.typed {
                continue;
            }

            let name = store.content(param.variable);
            let doc_type = doc
                .as_ref()
                .and_then(|d| d.param_type(name))
                .and_then(|t| native_type(t, TypeSlot::Parameter))
                .map(|t| nullable_for_default(t, defaults_to_null(store, param.variable)));

            match doc_type {
                Some(ty) => {
                    if ctx.add_fixable_error_keyed(
                        param.variable,
                        "MissingParameterType",
                        param.variable,
                        "Parameter %s has no native type; @param declares %s",
                        &[name, ty.as_str()],
                    ) {
                        ctx.add_content_before(param.insert_at, format!("{} ", ty));
                    }
                }
                None => {
                    ctx.add_error_keyed(
                        param.variable,
                        "MissingParameterType",
                        param.variable,
                        "Parameter %s has no native type",
                        &[name],
                    );
                }
            }
        }
        Ok(())
    }

    fn fork(&self) -> Box<dyn Sniff> {
        Box::new(self.clone())
    }
}

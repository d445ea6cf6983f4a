//! Sniff: Hook callbacks must not be closures
//!
//! A closure registered with `add_action()` or `add_filter()` cannot be
//! unhooked by other code. The callback is argument 2 or the named argument
//! `callback`; closures and arrow functions, static or not, are reported at
//! their keyword.
//!
//! Example:
//! ```php
//! // Reported
//! add_action('init', function () { register_types(); });
//!
//! // Accepted
//! add_action('init', 'register_types');
//! add_action('init', [$this, 'register_types']);
//! ```

use std::collections::HashSet;

use sniffer_core::{argument, TokenKind};

use super::function_call;
use crate::context::SniffContext;
use crate::sniff::{ConfigValue, OptionType, Sniff, SniffError, SniffOption};

const DEFAULT_HOOK_FUNCTIONS: &[&str] = &["add_action", "add_filter"];

#[derive(Debug, Clone)]
pub struct ClosureHookCallbackSniff {
    /// Lowercase
    hook_functions: HashSet<String>,
}

impl Default for ClosureHookCallbackSniff {
    fn default() -> Self {
        Self {
            hook_functions: DEFAULT_HOOK_FUNCTIONS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl Sniff for ClosureHookCallbackSniff {
    fn code(&self) -> &'static str {
        "Calls.ClosureHookCallback"
    }

    fn description(&self) -> &'static str {
        "Hook callbacks must be named callables so they can be removed"
    }

    fn register(&self) -> &'static [TokenKind] {
        &[TokenKind::String, TokenKind::NameFullyQualified]
    }

    fn process(&mut self, ctx: &mut SniffContext<'_>, position: usize) -> Result<(), SniffError> {
        let store = ctx.store();
        let Some((name, open)) = function_call(store, position) else {
            return Ok(());
        };
        if !self.hook_functions.contains(&name) {
            return Ok(());
        }

        let args = store.call_arguments(open);
        let Some(callback) = argument(&args, 2, "callback") else {
            return Ok(());
        };
        let mut start = callback.start;
        if store.kind(start) == Some(TokenKind::Static) {
            let Some(next) = store.next_non_empty(start) else {
                return Ok(());
            };
            start = next;
        }

        if matches!(store.kind(start), Some(TokenKind::Closure | TokenKind::Fn)) {
            ctx.add_error(
                start,
                "ClosureHookCallback",
                "Closure passed as the callback of %s(); use a named function or method so the hook can be removed",
                &[name.as_str()],
            );
        }
        Ok(())
    }

    fn options(&self) -> Vec<SniffOption> {
        vec![SniffOption {
            name: "hook_functions",
            description: "Functions whose second argument is a hook callback",
            option_type: OptionType::StringArray,
            default: Some(ConfigValue::Array(
                DEFAULT_HOOK_FUNCTIONS.iter().map(|f| f.to_string()).collect(),
            )),
        }]
    }

    fn configure(&mut self, name: &str, value: &ConfigValue) -> Result<(), SniffError> {
        match name {
            "hook_functions" => {
                self.hook_functions = value
                    .expect_array(name)?
                    .iter()
                    .map(|f| f.trim_start_matches('\\').to_ascii_lowercase())
                    .collect();
            }
            _ => return Err(SniffError::UnknownOption(name.to_string())),
        }
        Ok(())
    }

    fn fork(&self) -> Box<dyn Sniff> {
        Box::new(self.clone())
    }
}

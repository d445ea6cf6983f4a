//! Sniff: REST routes must declare a permission callback
//!
//! The third argument of `register_rest_route()` (or the named argument
//! `args`) is either one endpoint definition or a list of them. Every endpoint
//! given as an array literal must have a `permission_callback` key. Endpoints
//! with computed keys are skipped since the key could be anything.
//!
//! Example:
//! ```php
//! // Reported at the inner array
//! register_rest_route('app/v1', '/items', [
//!     ['methods' => 'GET', 'callback' => 'list_items'],
//!     ['methods' => 'POST', 'callback' => 'add_item', 'permission_callback' => 'can_edit'],
//! ]);
//! ```

use sniffer_core::{argument, TokenKind, TokenStore};

use super::function_call;
use crate::context::SniffContext;
use crate::sniff::{Sniff, SniffError};

const PERMISSION_KEY: &str = "permission_callback";

#[derive(Debug, Clone, Default)]
pub struct RestRoutePermissionSniff;

/// Whether the endpoint literal at `opener` lacks the permission key;
/// `None` when a computed key makes that undecidable
fn missing_permission(store: &TokenStore, opener: usize) -> Option<bool> {
    let mut found = false;
    for item in store.array_items(opener) {
        if item.key.is_none() {
            continue;
        }
        let key = store.literal_key(&item)?;
        if key == PERMISSION_KEY {
            found = true;
        }
    }
    Some(!found)
}

impl RestRoutePermissionSniff {
    fn report(ctx: &mut SniffContext<'_>, literal: usize, keyed: bool) {
        let message = "REST route endpoint has no `permission_callback`";
        if keyed {
            ctx.add_error_keyed(literal, "MissingPermissionCallback", literal, message, &[]);
        } else {
            ctx.add_error(literal, "MissingPermissionCallback", message, &[]);
        }
    }
}

impl Sniff for RestRoutePermissionSniff {
    fn code(&self) -> &'static str {
        "Calls.RestRoutePermission"
    }

    fn description(&self) -> &'static str {
        "REST route endpoints must declare a permission_callback"
    }

    fn register(&self) -> &'static [TokenKind] {
        &[TokenKind::String, TokenKind::NameFullyQualified]
    }

    fn process(&mut self, ctx: &mut SniffContext<'_>, position: usize) -> Result<(), SniffError> {
        let store = ctx.store();
        let Some((name, open)) = function_call(store, position) else {
            return Ok(());
        };
        if name != "register_rest_route" {
            return Ok(());
        }

        let args = store.call_arguments(open);
        let Some(endpoints) = argument(&args, 3, "args") else {
            return Ok(());
        };
        let Some((outer, _)) = store.array_bounds(endpoints.start) else {
            // Built elsewhere; nothing to inspect
            return Ok(());
        };

        let items = store.array_items(outer);
        let is_list = items.iter().any(|item| item.key.is_none());
        if !is_list {
            if missing_permission(store, outer) == Some(true) {
                Self::report(ctx, endpoints.start, false);
            }
            return Ok(());
        }

        for item in items.iter().filter(|item| item.key.is_none()) {
            let Some((inner, _)) = store.array_bounds(item.value_start) else {
                continue;
            };
            if missing_permission(store, inner) == Some(true) {
                Self::report(ctx, item.value_start, true);
            }
        }
        Ok(())
    }

    fn fork(&self) -> Box<dyn Sniff> {
        Box::new(self.clone())
    }
}

//! Call-pattern sniffs
//!
//! Both sniffs look for calls to a global function by name and inspect one of
//! its arguments.

mod closure_hook_callback;
mod rest_route_permission;

pub use closure_hook_callback::ClosureHookCallbackSniff;
pub use rest_route_permission::RestRoutePermissionSniff;

use sniffer_core::{TokenKind, TokenStore};

/// The `(` of a global function call whose name token is at `position`, with
/// the name lowercased and stripped of a leading `\`
fn function_call(store: &TokenStore, position: usize) -> Option<(String, usize)> {
    let prev = store.previous_non_empty(position).and_then(|p| store.kind(p));
    let member_or_declaration = matches!(
        prev,
        Some(
            TokenKind::ObjectOperator
                | TokenKind::NullsafeObjectOperator
                | TokenKind::DoubleColon
                | TokenKind::Function
                | TokenKind::New
        )
    );
    if member_or_declaration {
        return None;
    }
    let open = store
        .next_non_empty(position)
        .filter(|&n| store.kind(n) == Some(TokenKind::OpenParenthesis))?;
    let name = store
        .content(position)
        .trim_start_matches('\\')
        .to_ascii_lowercase();
    Some((name, open))
}

//! Test fixtures for common types.

use std::sync::Arc;

use warden_approval::{PermissionDialog, SecurityContext};
use warden_capabilities::{DomainPolicyStore, PermissionVector};
use warden_scheduler::SuiteInfo;

/// A small policy with one domain per interesting ceiling.
///
/// - `trusted`: network always allowed
/// - `identified`: network and interrupts up to blanket
/// - `untrusted`: network up to session, messaging one-shot
pub const TEST_POLICY: &str = "\
alias: net net.http,net.https

domain: trusted
allow: net,push.interrupt,alarm.interrupt

domain: identified
blanket(session): net,push.register,messaging.send
blanket(blanket): push.interrupt,alarm.interrupt

domain: untrusted
session(oneshot): net
oneshot(oneshot): messaging.send,file.read
blanket(session): push.interrupt,alarm.interrupt
";

/// Policy store over [`TEST_POLICY`].
#[must_use]
pub fn test_policy_store() -> DomainPolicyStore {
    DomainPolicyStore::from_text(TEST_POLICY)
}

/// Fresh security context for suite `test` in `domain` of [`TEST_POLICY`].
///
/// # Panics
///
/// Panics if the test policy fails to parse.
#[must_use]
pub fn test_security_context(domain: &str, dialog: Arc<dyn PermissionDialog>) -> SecurityContext {
    let permissions = test_policy_store()
        .for_domain(domain)
        .expect("test policy parses");
    SecurityContext::new(
        "test",
        "Test Suite",
        permissions.name(),
        PermissionVector::from_domain(&permissions),
        dialog,
    )
}

/// Suite description for scheduler tests.
#[must_use]
pub fn test_suite_info(id: &str) -> SuiteInfo {
    SuiteInfo::new(id, format!("Suite {id}"), "untrusted")
}

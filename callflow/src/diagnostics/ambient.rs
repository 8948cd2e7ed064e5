//! Thread-scoped diagnostic tags.
//!
//! Each worker thread owns one ambient mapping. Synchronous code brackets a
//! region with [`enter`]/[`exit`] or a [`DiagnosticScope`]; async code must
//! use [`super::with_diagnostics`] so the mapping follows the task across
//! suspension points.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::marker::PhantomData;

/// Ordered string-to-string diagnostic tags.
pub type DiagnosticTags = BTreeMap<String, String>;

thread_local! {
    static AMBIENT: RefCell<DiagnosticTags> = RefCell::new(DiagnosticTags::new());
}

/// The ambient mapping as it was before an [`enter`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[must_use = "a snapshot must be passed to `exit` to restore the prior tags"]
pub struct DiagnosticSnapshot(DiagnosticTags);

impl DiagnosticSnapshot {
    /// The captured tags.
    #[must_use]
    pub fn tags(&self) -> &DiagnosticTags {
        &self.0
    }
}

/// Returns a copy of the current thread's ambient tags.
#[must_use]
pub fn current() -> DiagnosticTags {
    AMBIENT.with(|ambient| ambient.borrow().clone())
}

/// Looks up one ambient tag.
#[must_use]
pub fn get(key: &str) -> Option<String> {
    AMBIENT.with(|ambient| ambient.borrow().get(key).cloned())
}

/// Sets one ambient tag.
pub fn put(key: impl Into<String>, value: impl Into<String>) {
    AMBIENT.with(|ambient| {
        ambient.borrow_mut().insert(key.into(), value.into());
    });
}

/// Removes one ambient tag.
pub fn remove(key: &str) -> Option<String> {
    AMBIENT.with(|ambient| ambient.borrow_mut().remove(key))
}

/// Clears all ambient tags on this thread.
pub fn clear() {
    AMBIENT.with(|ambient| ambient.borrow_mut().clear());
}

/// Installs `tags` as the ambient mapping, returning the previous one.
pub(crate) fn replace(tags: DiagnosticTags) -> DiagnosticTags {
    AMBIENT.with(|ambient| std::mem::replace(&mut *ambient.borrow_mut(), tags))
}

/// Merges `call_tags` over the ambient mapping and installs the result.
///
/// Call entries overwrite ambient entries with the same key. Returns the
/// prior mapping, which must be handed back to [`exit`].
pub fn enter(call_tags: &DiagnosticTags) -> DiagnosticSnapshot {
    let mut merged = current();
    merged.extend(call_tags.iter().map(|(k, v)| (k.clone(), v.clone())));
    DiagnosticSnapshot(replace(merged))
}

/// Restores the ambient mapping captured by [`enter`] exactly, dropping
/// anything added since.
pub fn exit(snapshot: DiagnosticSnapshot) {
    replace(snapshot.0);
}

/// RAII form of [`enter`]/[`exit`] for synchronous regions.
///
/// The prior mapping is restored on drop, including during unwinding. The
/// guard is `!Send`: it belongs to the thread that created it and must not
/// be held across an `.await`.
#[derive(Debug)]
pub struct DiagnosticScope {
    prior: Option<DiagnosticSnapshot>,
    _thread_bound: PhantomData<*const ()>,
}

impl DiagnosticScope {
    /// Enters a scope with `call_tags` merged over the ambient mapping.
    #[must_use = "the scope closes as soon as the guard is dropped"]
    pub fn enter(call_tags: &DiagnosticTags) -> Self {
        Self {
            prior: Some(enter(call_tags)),
            _thread_bound: PhantomData,
        }
    }
}

impl Drop for DiagnosticScope {
    fn drop(&mut self) {
        if let Some(prior) = self.prior.take() {
            exit(prior);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tags(pairs: &[(&str, &str)]) -> DiagnosticTags {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_enter_merges_and_exit_restores() {
        clear();
        put("service", "api");
        put("user", "ambient");

        let prior = enter(&tags(&[("user", "alice"), ("call", "c1")]));
        assert_eq!(
            current(),
            tags(&[("call", "c1"), ("service", "api"), ("user", "alice")])
        );

        put("added", "during-call");
        exit(prior);

        assert_eq!(current(), tags(&[("service", "api"), ("user", "ambient")]));
        clear();
    }

    #[test]
    fn test_nested_scopes_restore_exactly() {
        clear();
        put("root", "r");
        let outer_before = current();

        {
            let _outer = DiagnosticScope::enter(&tags(&[("a", "1")]));
            let inner_before = current();
            {
                let _inner = DiagnosticScope::enter(&tags(&[("a", "2"), ("b", "3")]));
                assert_eq!(get("a").as_deref(), Some("2"));
                assert_eq!(get("b").as_deref(), Some("3"));
            }
            assert_eq!(current(), inner_before);
        }

        assert_eq!(current(), outer_before);
        clear();
    }

    #[test]
    fn test_scope_restores_on_panic() {
        clear();
        put("stable", "yes");
        let before = current();

        let result = std::panic::catch_unwind(|| {
            let _scope = DiagnosticScope::enter(&tags(&[("call", "doomed")]));
            panic!("interceptor blew up");
        });

        assert!(result.is_err());
        assert_eq!(current(), before);
        clear();
    }

    #[test]
    fn test_put_get_remove() {
        clear();
        put("k", "v");
        assert_eq!(get("k").as_deref(), Some("v"));
        assert_eq!(remove("k").as_deref(), Some("v"));
        assert!(get("k").is_none());
    }
}

//! Lifecycle hooks run around model mutations.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::Result;
use crate::record::Record;

/// The moments a hook can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookEvent {
    /// Before the INSERT; may mutate the row to insert.
    BeforeCreate,
    /// After the INSERT, with the primary key set.
    AfterCreate,
    /// Before the UPDATE, with the partial merged over the stored row.
    BeforeUpdate,
    /// After an UPDATE that changed a row.
    AfterUpdate,
    /// Before the DELETE, with the stored row.
    BeforeDelete,
    /// After a DELETE that removed a row.
    AfterDelete,
}

impl HookEvent {
    /// Returns the event's name, e.g. `before_create`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BeforeCreate => "before_create",
            Self::AfterCreate => "after_create",
            Self::BeforeUpdate => "before_update",
            Self::AfterUpdate => "after_update",
            Self::BeforeDelete => "before_delete",
            Self::AfterDelete => "after_delete",
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An async hook. It may mutate the record it is given.
pub type HookFn = dyn for<'a> Fn(&'a mut Record) -> BoxFuture<'a, Result<()>> + Send + Sync;

/// Per-event ordered hook lists.
#[derive(Clone, Default)]
pub struct Hooks {
    registered: HashMap<HookEvent, Vec<Arc<HookFn>>>,
}

impl Hooks {
    /// Appends a hook to `event`'s list.
    pub fn add<F>(&mut self, event: HookEvent, hook: F)
    where
        F: for<'a> Fn(&'a mut Record) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
    {
        self.registered.entry(event).or_default().push(Arc::new(hook));
    }

    /// Number of hooks registered for `event`.
    #[must_use]
    pub fn len(&self, event: HookEvent) -> usize {
        self.registered.get(&event).map_or(0, Vec::len)
    }

    /// Returns whether no hook is registered at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registered.values().all(Vec::is_empty)
    }

    /// Runs `event`'s hooks in registration order, one at a time.
    ///
    /// The first failure stops the sequence and is returned.
    pub async fn run(&self, event: HookEvent, record: &mut Record) -> Result<()> {
        if let Some(hooks) = self.registered.get(&event) {
            for hook in hooks {
                hook(record).await?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts: Vec<_> = self
            .registered
            .iter()
            .map(|(event, hooks)| (event.as_str(), hooks.len()))
            .collect();
        counts.sort_unstable();
        f.debug_struct("Hooks").field("registered", &counts).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrmError;
    use quarry_sql::SqlValue;

    #[tokio::test]
    async fn test_hooks_run_in_registration_order() {
        let mut hooks = Hooks::default();
        for tag in ["a", "b", "c"] {
            hooks.add(HookEvent::BeforeCreate, move |record| {
                Box::pin(async move {
                    let trail = record.get_str("trail").unwrap_or_default().to_string();
                    record.set("trail", format!("{trail}{tag}"));
                    Ok(())
                })
            });
        }

        let mut record = Record::new();
        hooks.run(HookEvent::BeforeCreate, &mut record).await.unwrap();
        assert_eq!(record.get_str("trail"), Some("abc"));
        assert_eq!(hooks.len(HookEvent::BeforeCreate), 3);
        assert_eq!(hooks.len(HookEvent::AfterCreate), 0);
    }

    #[tokio::test]
    async fn test_failure_stops_sequence() {
        let mut hooks = Hooks::default();
        hooks.add(HookEvent::BeforeDelete, |_| {
            Box::pin(async { Err(OrmError::Hook("locked".into())) })
        });
        hooks.add(HookEvent::BeforeDelete, |record| {
            Box::pin(async move {
                record.set("reached", true);
                Ok(())
            })
        });

        let mut record = Record::new();
        let err = hooks.run(HookEvent::BeforeDelete, &mut record).await.unwrap_err();
        assert!(matches!(err, OrmError::Hook(ref m) if m == "locked"));
        assert_eq!(record.get("reached"), None::<&SqlValue>);
    }

    #[tokio::test]
    async fn test_no_hooks_is_ok() {
        let hooks = Hooks::default();
        assert!(hooks.is_empty());
        let mut record = Record::new().with("id", 1);
        hooks.run(HookEvent::AfterUpdate, &mut record).await.unwrap();
        assert_eq!(record.len(), 1);
    }
}

//! Standing reactive listeners, indexed by trigger kind
//!
//! Units register the reactive triggers they care about when they are armed
//! and are dropped when they leave play or are silenced, so dispatch only
//! looks at holders of the trigger that fired instead of scanning both
//! boards.

use crate::core::{InstanceId, Trigger};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerRegistry {
    by_trigger: BTreeMap<Trigger, Vec<InstanceId>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `instance` for each reactive trigger; self triggers are ignored
    pub fn arm(&mut self, instance: InstanceId, triggers: &[Trigger]) {
        for trigger in triggers.iter().filter(|t| t.is_reactive()) {
            let holders = self.by_trigger.entry(*trigger).or_default();
            if !holders.contains(&instance) {
                holders.push(instance);
            }
        }
    }

    pub fn disarm(&mut self, instance: InstanceId) {
        for holders in self.by_trigger.values_mut() {
            holders.retain(|id| *id != instance);
        }
        self.by_trigger.retain(|_, holders| !holders.is_empty());
    }

    /// Holders of `trigger`, in the order they were armed
    pub fn listeners(&self, trigger: Trigger) -> &[InstanceId] {
        self.by_trigger.get(&trigger).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_armed(&self, instance: InstanceId) -> bool {
        self.by_trigger.values().any(|holders| holders.contains(&instance))
    }

    pub fn len(&self) -> usize {
        self.by_trigger.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_trigger.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arm_keeps_order_and_skips_self_triggers() {
        let mut registry = ListenerRegistry::new();
        registry.arm(InstanceId::new(2), &[Trigger::OnDraw, Trigger::OnPlay]);
        registry.arm(InstanceId::new(1), &[Trigger::OnDraw]);
        assert_eq!(
            registry.listeners(Trigger::OnDraw),
            &[InstanceId::new(2), InstanceId::new(1)]
        );
        assert!(registry.listeners(Trigger::OnPlay).is_empty());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_disarm() {
        let mut registry = ListenerRegistry::new();
        registry.arm(InstanceId::new(1), &[Trigger::TurnEnd, Trigger::EnemyPlay]);
        registry.disarm(InstanceId::new(1));
        assert!(registry.is_empty());
        assert!(!registry.is_armed(InstanceId::new(1)));
    }

    #[test]
    fn test_serializes_with_trigger_keys() {
        let mut registry = ListenerRegistry::new();
        registry.arm(InstanceId::new(4), &[Trigger::AllyDestroy]);
        let json = serde_json::to_string(&registry).unwrap();
        let back: ListenerRegistry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, registry);
    }
}

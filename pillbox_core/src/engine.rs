//! Next-action resolver for a single medication.
//!
//! Given the dose rules and the events recorded today, this decides which
//! dose the user should take next:
//! - Count today's handled events (TAKEN and SKIPPED; LOST by policy)
//! - Pair them with today's active slots in time order
//! - Point at the first open slot, flagged overdue if its time has passed
//! - Otherwise point at tomorrow's first dose, or report that nothing is scheduled
//!
//! Overdue is derived from the wall clock on every call and never stored.

use crate::{DoseAction, DoseEvent, DoseRule, NextActionState};
use chrono::{DateTime, Datelike, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// How today's events are paired with today's scheduled slots
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SlotMatching {
    /// The Nth handled event of the day fulfils the Nth slot in time order
    #[default]
    Positional,
    /// Events tagged with an active slot's rule id fulfil that slot; the
    /// rest fill the earliest open slots
    Explicit,
}

/// Knobs for the resolver; the default reproduces the historical behavior
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolverPolicy {
    /// Whether a LOST report counts as handling a slot
    #[serde(default)]
    pub lost_consumes_slot: bool,

    #[serde(default)]
    pub slot_matching: SlotMatching,
}

/// Resolve the next action using the default policy
pub fn resolve_next_action<Tz: TimeZone>(
    rules: &[DoseRule],
    todays_events: &[DoseEvent],
    now: &DateTime<Tz>,
) -> NextActionState {
    resolve_next_action_with(rules, todays_events, now, &ResolverPolicy::default())
}

/// Resolve the next action for one medication at `now`.
///
/// `now` carries the device-local time zone: it decides which events fall on
/// "today" and where each `HH:MM` lands. Events from other days are ignored,
/// so callers may pass a medication's full history.
pub fn resolve_next_action_with<Tz: TimeZone>(
    rules: &[DoseRule],
    todays_events: &[DoseEvent],
    now: &DateTime<Tz>,
    policy: &ResolverPolicy,
) -> NextActionState {
    let today = now.date_naive();
    let tz = now.timezone();

    let handled: Vec<&DoseEvent> = todays_events
        .iter()
        .filter(|e| counts_as_handled(e.action, policy))
        .filter(|e| e.timestamp.with_timezone(&tz).date_naive() == today)
        .collect();

    let mut sorted: Vec<&DoseRule> = rules.iter().collect();
    sorted.sort_by_key(|rule| rule.time);

    let weekday = today.weekday();
    let todays_slots: Vec<&DoseRule> = sorted
        .iter()
        .copied()
        .filter(|rule| rule.recurrence.is_active_on(weekday))
        .collect();

    let next_open = match policy.slot_matching {
        SlotMatching::Positional => todays_slots.get(handled.len()).copied(),
        SlotMatching::Explicit => first_open_slot(&todays_slots, &handled),
    };

    tracing::debug!(
        "{} handled events against {} slots today ({:?})",
        handled.len(),
        todays_slots.len(),
        weekday
    );

    let Some(next) = next_open else {
        return match sorted.first() {
            Some(first) => NextActionState {
                label: format!("Next: {} Pill(s)", first.quantity),
                sublabel: format!("Tomorrow {}", first.time),
                is_overdue: false,
                is_upcoming_tomorrow: true,
                target_dose_rule: Some((*first).clone()),
            },
            None => NextActionState {
                label: "All Done".to_string(),
                sublabel: "Relax".to_string(),
                is_overdue: false,
                is_upcoming_tomorrow: false,
                target_dose_rule: None,
            },
        };
    };

    let scheduled = today.and_time(next.time.to_naive_time());
    let is_overdue = now.naive_local() > scheduled;

    if is_overdue {
        NextActionState {
            label: format!("Take {} (Overdue)", next.quantity),
            sublabel: format!("{} Today", next.time),
            is_overdue: true,
            is_upcoming_tomorrow: false,
            target_dose_rule: Some(next.clone()),
        }
    } else {
        NextActionState {
            label: format!("Take {}", next.quantity),
            sublabel: format!("at {}", next.time),
            is_overdue: false,
            is_upcoming_tomorrow: false,
            target_dose_rule: Some(next.clone()),
        }
    }
}

fn counts_as_handled(action: DoseAction, policy: &ResolverPolicy) -> bool {
    match action {
        DoseAction::Taken | DoseAction::Skipped => true,
        DoseAction::Lost => policy.lost_consumes_slot,
    }
}

/// First slot not fulfilled by an explicit tag or by an untagged event
fn first_open_slot<'a>(slots: &[&'a DoseRule], handled: &[&DoseEvent]) -> Option<&'a DoseRule> {
    let mut fulfilled: HashSet<Uuid> = HashSet::new();
    let mut untagged = 0usize;

    for event in handled {
        match event.dose_rule_id {
            Some(id) if slots.iter().any(|s| s.id == id) && !fulfilled.contains(&id) => {
                fulfilled.insert(id);
            }
            _ => untagged += 1,
        }
    }

    slots
        .iter()
        .copied()
        .filter(|slot| !fulfilled.contains(&slot.id))
        .nth(untagged)
}

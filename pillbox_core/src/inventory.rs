//! Stock and event mutations for medications.
//!
//! Every operation checks its preconditions before touching anything, then
//! updates stock and appends the matching record together. A failed call
//! leaves the medication exactly as it was.

use crate::engine::{resolve_next_action_with, ResolverPolicy};
use crate::types::validate_quantity;
use crate::{
    Cabinet, DoseAction, DoseEvent, DoseRule, Error, Medication, Refill, Result, Unit,
};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

/// Display ceiling used when a medication has no recorded stock level
pub const DEFAULT_TOTAL_STOCK: f64 = 100.0;

impl Medication {
    /// Create a medication with its initial schedule
    ///
    /// The initial stock doubles as the display ceiling.
    pub fn new(name: impl Into<String>, current_stock: f64, doses: Vec<DoseRule>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::State("medication name must not be empty".into()));
        }
        if !current_stock.is_finite() || current_stock < 0.0 {
            return Err(Error::InvalidQuantity(format!(
                "stock {} must be zero or more",
                current_stock
            )));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            description: None,
            unit: Unit::default(),
            current_stock,
            total_stock_level: Some(current_stock),
            created_at: Utc::now(),
            doses,
            events: Vec::new(),
            refills: Vec::new(),
        })
    }

    pub fn dose_rule(&self, id: Uuid) -> Option<&DoseRule> {
        self.doses.iter().find(|d| d.id == id)
    }

    /// Record a TAKEN dose and take its quantity out of stock
    ///
    /// An untargeted dose counts as one unit.
    pub fn take_dose(&mut self, dose_rule_id: Option<Uuid>, at: DateTime<Utc>) -> Result<&DoseEvent> {
        if self.current_stock <= 0.0 {
            return Err(Error::OutOfStock(self.name.clone()));
        }
        let quantity = match dose_rule_id {
            Some(id) => {
                self.dose_rule(id)
                    .ok_or_else(|| Error::UnknownDoseRule(id.to_string()))?
                    .quantity
            }
            None => 1.0,
        };

        self.current_stock = (self.current_stock - quantity).max(0.0);
        self.events.push(DoseEvent::new(DoseAction::Taken, at, dose_rule_id));

        tracing::info!(
            "Took {} of {}, {} left",
            quantity,
            self.name,
            self.current_stock
        );
        self.last_event()
    }

    /// Record a SKIPPED dose; stock is unchanged
    pub fn skip_dose(&mut self, dose_rule_id: Option<Uuid>, at: DateTime<Utc>) -> Result<&DoseEvent> {
        if let Some(id) = dose_rule_id {
            if self.dose_rule(id).is_none() {
                return Err(Error::UnknownDoseRule(id.to_string()));
            }
        }

        self.events.push(DoseEvent::new(DoseAction::Skipped, at, dose_rule_id));
        tracing::info!("Skipped a dose of {}", self.name);
        self.last_event()
    }

    /// Take the dose the resolver says is due at `now`
    ///
    /// Fails with `Error::NothingDue` once today's doses are all handled, so
    /// tomorrow's first dose cannot be logged early.
    pub fn take_next<Tz: TimeZone>(
        &mut self,
        now: &DateTime<Tz>,
        policy: &ResolverPolicy,
    ) -> Result<&DoseEvent> {
        let target = self.due_dose(now, policy)?;
        self.take_dose(target, now.with_timezone(&Utc))
    }

    /// Skip the dose the resolver says is due at `now`
    pub fn skip_next<Tz: TimeZone>(
        &mut self,
        now: &DateTime<Tz>,
        policy: &ResolverPolicy,
    ) -> Result<&DoseEvent> {
        let target = self.due_dose(now, policy)?;
        self.skip_dose(target, now.with_timezone(&Utc))
    }

    /// Change the description and unit; `None` keeps the current value and
    /// a blank description clears it
    pub fn set_details(&mut self, description: Option<String>, unit: Option<Unit>) {
        if let Some(description) = description {
            let description = description.trim();
            self.description = (!description.is_empty()).then(|| description.to_string());
        }
        if let Some(unit) = unit {
            self.unit = unit;
        }
        tracing::info!("Updated details of {}", self.name);
    }

    /// Record lost or dropped units, not tied to any scheduled slot
    pub fn report_lost(&mut self, quantity: f64, at: DateTime<Utc>) -> Result<&DoseEvent> {
        validate_quantity(quantity)?;

        self.current_stock = (self.current_stock - quantity).max(0.0);
        self.events.push(DoseEvent::new(DoseAction::Lost, at, None));

        tracing::info!(
            "Reported {} of {} lost, {} left",
            quantity,
            self.name,
            self.current_stock
        );
        self.last_event()
    }

    /// Add purchased stock and record the purchase
    pub fn restock(
        &mut self,
        quantity: f64,
        price: Option<f64>,
        pharmacy: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<&Refill> {
        validate_quantity(quantity)?;
        if let Some(price) = price {
            if !price.is_finite() || price < 0.0 {
                return Err(Error::InvalidQuantity(format!(
                    "price {} must be zero or more",
                    price
                )));
            }
        }

        self.current_stock += quantity;
        self.refills.push(Refill {
            id: Uuid::new_v4(),
            quantity,
            price,
            pharmacy: pharmacy.filter(|p| !p.trim().is_empty()),
            refilled_at: at,
        });

        tracing::info!(
            "Restocked {} with {}, now {}",
            self.name,
            quantity,
            self.current_stock
        );
        self.refills
            .last()
            .ok_or_else(|| Error::State("refill was not recorded".into()))
    }

    pub fn add_dose_rule(&mut self, rule: DoseRule) {
        tracing::info!("Added {} dose at {} to {}", rule.recurrence, rule.time, self.name);
        self.doses.push(rule);
    }

    /// Remove a rule; past events keep their (now dangling) reference
    pub fn remove_dose_rule(&mut self, id: Uuid) -> Result<DoseRule> {
        let index = self
            .doses
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| Error::UnknownDoseRule(id.to_string()))?;
        Ok(self.doses.remove(index))
    }

    /// Delete a single event; stock is not restored
    pub fn delete_event(&mut self, id: Uuid) -> Option<DoseEvent> {
        let index = self.events.iter().position(|e| e.id == id)?;
        Some(self.events.remove(index))
    }

    /// Events recorded on the local calendar day `day` in zone `tz`
    pub fn events_on<Tz: TimeZone>(&self, day: NaiveDate, tz: &Tz) -> Vec<DoseEvent> {
        self.events
            .iter()
            .filter(|e| e.timestamp.with_timezone(tz).date_naive() == day)
            .cloned()
            .collect()
    }

    /// Events recorded on the same local day as `now`
    pub fn todays_events<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Vec<DoseEvent> {
        self.events_on(now.date_naive(), &now.timezone())
    }

    /// Share of the display ceiling still in stock, capped at 1.0
    pub fn stock_fraction(&self) -> f64 {
        let total = self
            .total_stock_level
            .filter(|t| *t > 0.0)
            .unwrap_or(DEFAULT_TOTAL_STOCK);
        (self.current_stock / total).clamp(0.0, 1.0)
    }

    fn due_dose<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
        policy: &ResolverPolicy,
    ) -> Result<Option<Uuid>> {
        let state = resolve_next_action_with(&self.doses, &self.todays_events(now), now, policy);
        if state.is_upcoming_tomorrow {
            return Err(Error::NothingDue(self.name.clone()));
        }
        Ok(state.target_dose_rule.map(|rule| rule.id))
    }

    fn last_event(&self) -> Result<&DoseEvent> {
        self.events
            .last()
            .ok_or_else(|| Error::State("event was not recorded".into()))
    }
}

impl Cabinet {
    /// Add a medication; names are unique ignoring case
    pub fn add(&mut self, medication: Medication) -> Result<&mut Medication> {
        if self
            .medications
            .iter()
            .any(|m| m.name.eq_ignore_ascii_case(&medication.name))
        {
            return Err(Error::DuplicateMedication(medication.name));
        }

        tracing::info!("Added medication {}", medication.name);
        self.medications.push(medication);
        self.medications
            .last_mut()
            .ok_or_else(|| Error::State("medication was not recorded".into()))
    }

    /// Rename a medication; the new name must not collide with another one
    pub fn rename(&mut self, query: &str, new_name: &str) -> Result<&mut Medication> {
        let index = self.position(query)?;
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(Error::State("medication name must not be empty".into()));
        }
        let taken = self
            .medications
            .iter()
            .enumerate()
            .any(|(i, m)| i != index && m.name.eq_ignore_ascii_case(new_name));
        if taken {
            return Err(Error::DuplicateMedication(new_name.to_string()));
        }

        let medication = &mut self.medications[index];
        tracing::info!("Renamed {} to {}", medication.name, new_name);
        medication.name = new_name.to_string();
        Ok(medication)
    }

    /// Remove a medication together with its rules, events and refills
    pub fn remove(&mut self, query: &str) -> Result<Medication> {
        let index = self.position(query)?;
        let removed = self.medications.remove(index);
        tracing::info!("Removed medication {}", removed.name);
        Ok(removed)
    }

    /// Find by case-insensitive name or by id prefix
    pub fn find(&self, query: &str) -> Result<&Medication> {
        let index = self.position(query)?;
        Ok(&self.medications[index])
    }

    pub fn find_mut(&mut self, query: &str) -> Result<&mut Medication> {
        let index = self.position(query)?;
        Ok(&mut self.medications[index])
    }

    fn position(&self, query: &str) -> Result<usize> {
        let query = query.trim();
        if let Some(index) = self
            .medications
            .iter()
            .position(|m| m.name.eq_ignore_ascii_case(query))
        {
            return Ok(index);
        }

        let by_id: Vec<usize> = self
            .medications
            .iter()
            .enumerate()
            .filter(|(_, m)| !query.is_empty() && m.id.to_string().starts_with(query))
            .map(|(i, _)| i)
            .collect();

        match by_id.as_slice() {
            [index] => Ok(*index),
            _ => Err(Error::MedicationNotFound(query.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recurrence::Recurrence;
    use chrono::FixedOffset;

    fn rule(time: &str, qty: f64) -> DoseRule {
        DoseRule::new(time.parse().unwrap(), qty, Recurrence::Daily).unwrap()
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 5, hour, 0, 0).unwrap()
    }

    fn metformin() -> Medication {
        Medication::new("Metformin", 45.0, vec![rule("08:00", 1.0), rule("20:00", 2.0)]).unwrap()
    }

    #[test]
    fn test_new_sets_display_ceiling() {
        let med = metformin();
        assert_eq!(med.total_stock_level, Some(45.0));
        assert_eq!(med.stock_fraction(), 1.0);
    }

    #[test]
    fn test_new_rejects_bad_input() {
        assert!(Medication::new("  ", 1.0, vec![]).is_err());
        assert!(matches!(
            Medication::new("X", -1.0, vec![]),
            Err(Error::InvalidQuantity(_))
        ));
    }

    #[test]
    fn test_take_uses_rule_quantity() {
        let mut med = metformin();
        let evening = med.doses[1].id;

        let event = med.take_dose(Some(evening), at(20)).unwrap();
        assert_eq!(event.action, DoseAction::Taken);
        assert_eq!(event.dose_rule_id, Some(evening));
        assert_eq!(med.current_stock, 43.0);
        assert_eq!(med.events.len(), 1);
    }

    #[test]
    fn test_take_untargeted_uses_one_unit() {
        let mut med = metformin();
        med.take_dose(None, at(9)).unwrap();
        assert_eq!(med.current_stock, 44.0);
    }

    #[test]
    fn test_take_out_of_stock_changes_nothing() {
        let mut med = Medication::new("Empty", 0.0, vec![rule("08:00", 1.0)]).unwrap();
        let result = med.take_dose(None, at(8));

        assert!(matches!(result, Err(Error::OutOfStock(_))));
        assert!(med.events.is_empty());
        assert_eq!(med.current_stock, 0.0);
    }

    #[test]
    fn test_take_unknown_rule_changes_nothing() {
        let mut med = metformin();
        let result = med.take_dose(Some(Uuid::new_v4()), at(8));

        assert!(matches!(result, Err(Error::UnknownDoseRule(_))));
        assert!(med.events.is_empty());
        assert_eq!(med.current_stock, 45.0);
    }

    #[test]
    fn test_take_clamps_at_zero() {
        let mut med = Medication::new("Half", 0.5, vec![rule("08:00", 1.0)]).unwrap();
        let id = med.doses[0].id;
        med.take_dose(Some(id), at(8)).unwrap();
        assert_eq!(med.current_stock, 0.0);
    }

    #[test]
    fn test_skip_keeps_stock() {
        let mut med = metformin();
        let morning = med.doses[0].id;
        med.skip_dose(Some(morning), at(8)).unwrap();

        assert_eq!(med.current_stock, 45.0);
        assert_eq!(med.events[0].action, DoseAction::Skipped);
    }

    #[test]
    fn test_lost_is_untagged_and_reduces_stock() {
        let mut med = metformin();
        let event = med.report_lost(2.0, at(11)).unwrap();

        assert_eq!(event.action, DoseAction::Lost);
        assert_eq!(event.dose_rule_id, None);
        assert_eq!(med.current_stock, 43.0);
        assert!(med.report_lost(0.0, at(11)).is_err());
        assert_eq!(med.events.len(), 1);
    }

    #[test]
    fn test_restock_records_refill() {
        let mut med = metformin();
        let refill = med
            .restock(30.0, Some(12.0), Some("Corner Pharmacy".into()), at(15))
            .unwrap();

        assert_eq!(refill.unit_price(), Some(0.4));
        assert_eq!(med.current_stock, 75.0);
        assert_eq!(med.refills.len(), 1);
        assert_eq!(med.stock_fraction(), 1.0);
    }

    #[test]
    fn test_restock_rejects_bad_price() {
        let mut med = metformin();
        let result = med.restock(10.0, Some(-1.0), None, at(15));

        assert!(matches!(result, Err(Error::InvalidQuantity(_))));
        assert_eq!(med.current_stock, 45.0);
        assert!(med.refills.is_empty());
    }

    #[test]
    fn test_remove_rule_keeps_history() {
        let mut med = metformin();
        let morning = med.doses[0].id;
        med.take_dose(Some(morning), at(8)).unwrap();

        med.remove_dose_rule(morning).unwrap();
        assert_eq!(med.doses.len(), 1);
        assert_eq!(med.events[0].dose_rule_id, Some(morning));
        assert!(med.remove_dose_rule(morning).is_err());
    }

    #[test]
    fn test_delete_event_does_not_restore_stock() {
        let mut med = metformin();
        let id = med.take_dose(None, at(8)).unwrap().id;

        assert!(med.delete_event(id).is_some());
        assert!(med.events.is_empty());
        assert_eq!(med.current_stock, 44.0);
        assert!(med.delete_event(id).is_none());
    }

    #[test]
    fn test_todays_events_uses_local_day() {
        let mut med = metformin();
        med.take_dose(None, at(23)).unwrap();

        let utc_plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 6, 6, 0, 0).unwrap();

        assert!(med.todays_events(&now).is_empty());
        assert_eq!(med.todays_events(&now.with_timezone(&utc_plus_two)).len(), 1);
    }

    #[test]
    fn test_cabinet_rejects_duplicate_names() {
        let mut cabinet = Cabinet::default();
        cabinet.add(metformin()).unwrap();

        let dup = Medication::new("METFORMIN", 10.0, vec![]).unwrap();
        assert!(matches!(
            cabinet.add(dup),
            Err(Error::DuplicateMedication(_))
        ));
    }

    #[test]
    fn test_cabinet_find_by_name_and_id_prefix() {
        let mut cabinet = Cabinet::default();
        let id = cabinet.add(metformin()).unwrap().id;

        assert_eq!(cabinet.find("metformin").unwrap().id, id);
        assert_eq!(cabinet.find(&id.to_string()[..8]).unwrap().id, id);
        assert!(matches!(
            cabinet.find("aspirin"),
            Err(Error::MedicationNotFound(_))
        ));
    }

    #[test]
    fn test_cabinet_remove_cascades() {
        let mut cabinet = Cabinet::default();
        cabinet.add(metformin()).unwrap().take_dose(None, at(8)).unwrap();

        let removed = cabinet.remove("Metformin").unwrap();
        assert_eq!(removed.events.len(), 1);
        assert!(cabinet.medications.is_empty());
    }

    #[test]
    fn test_take_next_follows_schedule() {
        let mut med = metformin();
        let policy = ResolverPolicy::default();

        let first = med.take_next(&at(9), &policy).unwrap().dose_rule_id;
        assert_eq!(first, Some(med.doses[0].id));

        let second = med.take_next(&at(10), &policy).unwrap().dose_rule_id;
        assert_eq!(second, Some(med.doses[1].id));
        assert_eq!(med.current_stock, 42.0);
    }

    #[test]
    fn test_take_next_refuses_when_nothing_due_today() {
        let mut med = Medication::new("Met", 30.0, vec![rule("08:00", 2.0)]).unwrap();
        let policy = ResolverPolicy::default();

        med.take_next(&at(9), &policy).unwrap();
        let result = med.take_next(&at(10), &policy);

        assert!(matches!(result, Err(Error::NothingDue(_))));
        assert_eq!(med.current_stock, 28.0);
        assert_eq!(med.events.len(), 1);
    }

    #[test]
    fn test_skip_next_refuses_when_nothing_due_today() {
        let mut med = Medication::new("Met", 30.0, vec![rule("08:00", 1.0)]).unwrap();
        let policy = ResolverPolicy::default();

        med.skip_next(&at(9), &policy).unwrap();
        assert!(matches!(
            med.skip_next(&at(10), &policy),
            Err(Error::NothingDue(_))
        ));
        assert_eq!(med.events.len(), 1);
    }

    #[test]
    fn test_take_next_without_schedule_is_untargeted() {
        let mut med = Medication::new("Ibuprofen", 10.0, vec![]).unwrap();
        let policy = ResolverPolicy::default();

        for hour in 9..12 {
            let event = med.take_next(&at(hour), &policy).unwrap();
            assert_eq!(event.dose_rule_id, None);
        }
        assert_eq!(med.current_stock, 7.0);
    }

    #[test]
    fn test_set_details_keeps_unspecified_fields() {
        let mut med = metformin();
        med.set_details(Some("  with food ".into()), None);
        assert_eq!(med.description.as_deref(), Some("with food"));
        assert_eq!(med.unit, Unit::Nos);

        med.set_details(None, Some(Unit::Mg));
        assert_eq!(med.description.as_deref(), Some("with food"));
        assert_eq!(med.unit, Unit::Mg);

        med.set_details(Some(" ".into()), None);
        assert_eq!(med.description, None);
    }

    #[test]
    fn test_cabinet_rename() {
        let mut cabinet = Cabinet::default();
        cabinet.add(metformin()).unwrap();
        cabinet
            .add(Medication::new("Aspirin", 10.0, vec![]).unwrap())
            .unwrap();

        assert!(matches!(
            cabinet.rename("Metformin", "aspirin"),
            Err(Error::DuplicateMedication(_))
        ));
        assert!(matches!(
            cabinet.rename("Metformin", "  "),
            Err(Error::State(_))
        ));

        // Changing only the case of its own name is allowed
        cabinet.rename("metformin", "METFORMIN XR").unwrap();
        cabinet.rename("metformin xr", "Metformin XR").unwrap();
        assert!(cabinet.find("Metformin XR").is_ok());
        assert!(cabinet.find("Metformin").is_err());
    }
}

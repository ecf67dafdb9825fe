//! Read-only schedule catalog.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use common::ScheduleId;
use domain::Schedule;

/// Source of schedule records, owned by the route/fleet system.
#[async_trait]
pub trait ScheduleCatalog: Send + Sync {
    /// Retrieves a schedule by ID.
    async fn get_schedule(&self, schedule_id: ScheduleId) -> Option<Schedule>;

    /// Lists all known schedules, earliest departure first.
    async fn list_schedules(&self) -> Vec<Schedule>;
}

/// In-memory catalog, seeded at startup or by tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryScheduleCatalog {
    schedules: Arc<RwLock<HashMap<ScheduleId, Schedule>>>,
}

impl InMemoryScheduleCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog holding the given schedules.
    pub fn with_schedules(schedules: impl IntoIterator<Item = Schedule>) -> Self {
        let catalog = Self::new();
        for schedule in schedules {
            catalog.insert(schedule);
        }
        catalog
    }

    /// Adds or replaces a schedule.
    pub fn insert(&self, schedule: Schedule) {
        self.schedules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(schedule.schedule_id, schedule);
    }

    /// Returns the number of schedules.
    pub fn len(&self) -> usize {
        self.schedules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ScheduleCatalog for InMemoryScheduleCatalog {
    async fn get_schedule(&self, schedule_id: ScheduleId) -> Option<Schedule> {
        self.schedules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&schedule_id)
            .cloned()
    }

    async fn list_schedules(&self) -> Vec<Schedule> {
        let mut schedules: Vec<_> = self
            .schedules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        schedules.sort_by_key(|s| s.departure_time);
        schedules
    }
}

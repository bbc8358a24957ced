use reborn_reactive::SchedulerConfig;

/// Configuration for an [`App`](crate::App).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Name used in logs and errors.
    pub label: String,
    /// Limits for the update-tick job queue.
    pub scheduler: SchedulerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            label: "app".to_string(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl AppConfig {
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }
}

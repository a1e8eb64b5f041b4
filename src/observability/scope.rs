//! ObservationScope for automatic begin/complete logging

use std::time::Instant;

use super::logger::Logger;

/// A scope that logs `{name}_BEGIN` on creation and exactly one of
/// `{name}_COMPLETE`, `{name}_FAILED` or `{name}_INCOMPLETE` at its end.
///
/// ```ignore
/// let scope = ObservationScope::new("SP_MAP_REFRESH");
/// // ... do work ...
/// scope.complete_with_fields(&[("size", "12")]);
/// ```
///
/// Completion events carry `duration_ms`.
pub struct ObservationScope {
    name: String,
    completed: bool,
    fields: Vec<(String, String)>,
    started: Instant,
}

impl ObservationScope {
    /// Create a new observation scope
    pub fn new(name: &str) -> Self {
        Self::with_fields(name, &[])
    }

    /// Create a new observation scope with fields repeated on every event
    pub fn with_fields(name: &str, fields: &[(&str, &str)]) -> Self {
        Logger::info(&format!("{}_BEGIN", name), fields);

        Self {
            name: name.to_string(),
            completed: false,
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            started: Instant::now(),
        }
    }

    /// Mark the scope as successfully completed
    pub fn complete(self) {
        self.complete_with_fields(&[]);
    }

    /// Mark the scope as successfully completed with additional fields
    pub fn complete_with_fields(mut self, extra_fields: &[(&str, &str)]) {
        self.completed = true;
        let duration = self.elapsed_ms();
        let mut all_fields = self.field_refs();
        all_fields.extend(extra_fields.iter().copied());
        all_fields.push(("duration_ms", duration.as_str()));
        Logger::info(&format!("{}_COMPLETE", self.name), &all_fields);
    }

    /// Mark the scope as failed with a reason
    pub fn fail(mut self, reason: &str) {
        self.completed = true;
        let duration = self.elapsed_ms();
        let mut all_fields = self.field_refs();
        all_fields.push(("reason", reason));
        all_fields.push(("duration_ms", duration.as_str()));
        Logger::error(&format!("{}_FAILED", self.name), &all_fields);
    }

    /// Check if the scope has been completed
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    fn elapsed_ms(&self) -> String {
        self.started.elapsed().as_millis().to_string()
    }

    fn field_refs(&self) -> Vec<(&str, &str)> {
        self.fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.completed {
            Logger::warn(
                &format!("{}_INCOMPLETE", self.name),
                &[("reason", "scope dropped without completion")],
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_creation() {
        let scope = ObservationScope::new("TEST");
        assert!(!scope.is_completed());
        scope.complete();
    }

    #[test]
    fn test_scope_with_fields() {
        let scope = ObservationScope::with_fields("TEST", &[("queue", "q")]);
        scope.complete_with_fields(&[("result", "ok")]);
    }

    #[test]
    fn test_scope_fail() {
        let scope = ObservationScope::new("TEST");
        scope.fail("registry unreachable");
    }

    #[test]
    fn test_scope_drop_without_complete() {
        let scope = ObservationScope::new("TEST");
        drop(scope);
    }

    #[test]
    fn test_scope_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<ObservationScope>();
    }
}

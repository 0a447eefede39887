//! ObservationScope for begin/complete logging around stages and phases
//!
//! - Logs `{name}_BEGIN` on creation
//! - Logs `{name}_COMPLETE` on `complete()`
//! - Logs `{name}_FAILED` on `fail()`
//! - Logs `{name}_INCOMPLETE` on drop otherwise (an error unwound through it)

use std::time::Instant;

use super::logger::Logger;

/// A scope that logs its begin and its outcome
///
/// ```ignore
/// let scope = ObservationScope::with_fields("STAGE_A", &[("commands", "8000")]);
/// driver.run_stage(...)?;
/// scope.complete();
/// ```
pub struct ObservationScope<'a> {
    name: &'a str,
    completed: bool,
    fields: Vec<(&'a str, String)>,
    started: Instant,
}

impl<'a> ObservationScope<'a> {
    /// Create a new observation scope
    pub fn new(name: &'a str) -> Self {
        Self::with_fields(name, &[])
    }

    /// Create a new observation scope with fields repeated on every line
    pub fn with_fields(name: &'a str, fields: &[(&'a str, &str)]) -> Self {
        Logger::info(&format!("{}_BEGIN", name), fields);

        Self {
            name,
            completed: false,
            fields: fields.iter().map(|(k, v)| (*k, v.to_string())).collect(),
            started: Instant::now(),
        }
    }

    fn closing_fields(&self) -> (String, Vec<(&str, &str)>) {
        let elapsed = self.started.elapsed().as_millis().to_string();
        let fields = self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        (elapsed, fields)
    }

    /// Mark the scope as successfully completed
    pub fn complete(mut self) {
        self.completed = true;
        let (elapsed, mut fields) = self.closing_fields();
        fields.push(("elapsed_ms", &elapsed));
        Logger::info(&format!("{}_COMPLETE", self.name), &fields);
    }

    /// Mark the scope as failed with a reason
    pub fn fail(mut self, reason: &str) {
        self.completed = true;
        let (elapsed, mut fields) = self.closing_fields();
        fields.push(("elapsed_ms", &elapsed));
        fields.push(("reason", reason));
        Logger::error(&format!("{}_FAILED", self.name), &fields);
    }
}

impl Drop for ObservationScope<'_> {
    fn drop(&mut self) {
        if !self.completed {
            let (elapsed, mut fields) = self.closing_fields();
            fields.push(("elapsed_ms", &elapsed));
            fields.push(("reason", "scope dropped without completion"));
            Logger::warn(&format!("{}_INCOMPLETE", self.name), &fields);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_lifecycle() {
        let scope = ObservationScope::new("TEST");
        scope.complete();
    }

    #[test]
    fn test_scope_with_fields_and_fail() {
        let scope = ObservationScope::with_fields("TEST", &[("stage", "A")]);
        scope.fail("client 1 exited");
    }

    #[test]
    fn test_scope_drop_without_complete() {
        let scope = ObservationScope::new("TEST");
        drop(scope);
    }
}
